//! AMap (Gaode) weather lookup.
//!
//! City names are geocoded to administrative codes once and cached on disk
//! through [`CityCodeCache`]. Only cities in China resolve.

use crate::cache::CityCodeCache;
use crate::config::WeatherConfig;
use crate::errors::GenerationError;
use crate::stages::Generator;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{transport_error, upstream_error};

/// Forecast days kept in a report.
const FORECAST_DAYS: usize = 3;

/// Current conditions for a city.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveWeather {
    /// Conditions, e.g. `晴`.
    pub weather: String,
    /// Temperature in °C.
    pub temperature: String,
    /// Relative humidity in percent.
    pub humidity: String,
    /// Wind direction, e.g. `南`.
    #[serde(rename = "winddirection")]
    pub wind_direction: String,
    /// Wind force on the Beaufort scale, e.g. `≤3`.
    #[serde(rename = "windpower")]
    pub wind_power: String,
    /// When the station reported.
    #[serde(rename = "reporttime")]
    pub report_time: String,
}

/// One forecast day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct DayForecast {
    /// `YYYY-mm-dd`.
    pub date: String,
    #[serde(rename = "dayweather")]
    pub day_weather: String,
    #[serde(rename = "nightweather")]
    pub night_weather: String,
    #[serde(rename = "daytemp")]
    pub day_temp: String,
    #[serde(rename = "nighttemp")]
    pub night_temp: String,
    #[serde(rename = "daywind")]
    pub day_wind: String,
    #[serde(rename = "nightwind")]
    pub night_wind: String,
    #[serde(rename = "daypower")]
    pub day_power: String,
    #[serde(rename = "nightpower")]
    pub night_power: String,
}

/// Live conditions plus the next few days for one city.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherReport {
    /// The city as asked for.
    pub city: String,
    /// Current conditions.
    pub live: LiveWeather,
    /// Up to three days, today first.
    pub forecast: Vec<DayForecast>,
}

impl WeatherReport {
    /// One line: `"<city>: <weather>, <temp>°C"`.
    #[must_use]
    pub fn brief(&self) -> String {
        format!(
            "{}: {}, {}°C",
            self.city, self.live.weather, self.live.temperature
        )
    }
}

impl fmt::Display for WeatherReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let live = &self.live;
        writeln!(f, "City: {}", self.city)?;
        writeln!(f, "Weather: {}", live.weather)?;
        writeln!(f, "Temperature: {}°C", live.temperature)?;
        writeln!(f, "Humidity: {}%", live.humidity)?;
        writeln!(f, "Wind direction: {}", live.wind_direction)?;
        writeln!(f, "Wind power: {}", live.wind_power)?;
        write!(f, "Reported at: {}", live.report_time)?;

        if !self.forecast.is_empty() {
            write!(f, "\n\nForecast:")?;
        }
        for day in &self.forecast {
            write!(
                f,
                "\n{}: day {}, {}°C, {} wind {}; night {}, {}°C, {} wind {}",
                day.date,
                day.day_weather,
                day.day_temp,
                day.day_wind,
                day.day_power,
                day.night_weather,
                day.night_temp,
                day.night_wind,
                day.night_power
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    count: Option<String>,
    #[serde(default)]
    geocodes: Vec<Geocode>,
}

#[derive(Debug, Deserialize)]
struct Geocode {
    adcode: String,
}

#[derive(Debug, Deserialize)]
struct WeatherResponse {
    status: String,
    #[serde(default)]
    info: Option<String>,
    #[serde(default)]
    lives: Vec<LiveWeather>,
    #[serde(default)]
    forecasts: Vec<ForecastEntry>,
}

#[derive(Debug, Deserialize)]
struct ForecastEntry {
    #[serde(default)]
    casts: Vec<DayForecast>,
}

impl WeatherResponse {
    fn ensure_ok(self, city: &str) -> Result<Self, GenerationError> {
        if self.status == "1" {
            return Ok(self);
        }
        Err(GenerationError::other(format!(
            "weather service refused '{city}': {}",
            self.info.as_deref().unwrap_or("unknown error")
        )))
    }
}

/// Client for the AMap weather and geocoding endpoints.
pub struct AmapWeatherClient {
    client: Client,
    config: WeatherConfig,
    cache: Mutex<CityCodeCache>,
}

impl AmapWeatherClient {
    /// Creates a client, loading the city code cache from the configured file.
    #[must_use]
    pub fn new(config: WeatherConfig) -> Self {
        let cache = CityCodeCache::load(&config.cache_path);
        Self {
            client: Client::new(),
            config,
            cache: Mutex::new(cache),
        }
    }

    /// Returns the administrative code for `city`, geocoding on a cache miss.
    ///
    /// # Errors
    ///
    /// Fails when the geocoder cannot be reached or answers with an error
    /// status. An unknown city is `Ok(None)`.
    pub async fn city_code(&self, city: &str) -> Result<Option<String>, GenerationError> {
        let mut cache = self.cache.lock().await;
        cache.try_resolve(city, |name| self.geocode(name)).await
    }

    async fn geocode(&self, city: String) -> Result<Option<String>, GenerationError> {
        let response: GeocodeResponse = self
            .get_json(&self.config.geocode_url, &[("address", city.as_str())])
            .await?;
        if response.status != "1" || response.count.as_deref() == Some("0") {
            debug!(%city, "Geocoder found no match");
            return Ok(None);
        }
        let code = response.geocodes.into_iter().next().map(|g| g.adcode);
        if let Some(code) = &code {
            info!(%city, code, "Geocoded city");
        }
        Ok(code)
    }

    /// Fetches live conditions and the next three forecast days for `city`.
    ///
    /// # Errors
    ///
    /// Fails for cities the geocoder does not know, for error statuses from
    /// the weather service, and for transport errors.
    pub async fn report(&self, city: &str) -> Result<WeatherReport, GenerationError> {
        let city = city.trim();
        let code = self.city_code(city).await?.ok_or_else(|| {
            GenerationError::other(format!(
                "no city code for '{city}'; only cities in China are supported"
            ))
        })?;

        let live = self
            .weather(&code, "base")
            .await?
            .ensure_ok(city)?
            .lives
            .into_iter()
            .next()
            .ok_or_else(|| GenerationError::other(format!("no live weather for '{city}'")))?;

        let forecast = self
            .weather(&code, "all")
            .await?
            .ensure_ok(city)?
            .forecasts
            .into_iter()
            .next()
            .map(|entry| entry.casts)
            .unwrap_or_default()
            .into_iter()
            .take(FORECAST_DAYS)
            .collect();

        Ok(WeatherReport {
            city: city.to_string(),
            live,
            forecast,
        })
    }

    async fn weather(&self, code: &str, extensions: &str) -> Result<WeatherResponse, GenerationError> {
        self.get_json(
            &self.config.weather_url,
            &[("city", code), ("extensions", extensions)],
        )
        .await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<T, GenerationError> {
        let mut request = self
            .client
            .get(url)
            .query(&[("key", self.config.key.as_str())])
            .query(params);
        if let Some(timeout) = self.config.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            warn!(status = status.as_u16(), url, "Weather request rejected");
            return Err(upstream_error(status.as_u16(), &body));
        }
        serde_json::from_str(&body).map_err(|e| GenerationError::Malformed(e.to_string()))
    }
}

impl fmt::Debug for AmapWeatherClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AmapWeatherClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// A [`Generator`] that reads a city name and returns its weather report.
#[derive(Debug, Clone)]
pub struct WeatherGenerator {
    client: Arc<AmapWeatherClient>,
    brief: bool,
}

impl WeatherGenerator {
    /// Returns the full report.
    #[must_use]
    pub fn new(client: Arc<AmapWeatherClient>) -> Self {
        Self {
            client,
            brief: false,
        }
    }

    /// Returns only [`WeatherReport::brief`].
    #[must_use]
    pub fn brief(client: Arc<AmapWeatherClient>) -> Self {
        Self {
            client,
            brief: true,
        }
    }
}

#[async_trait]
impl Generator for WeatherGenerator {
    async fn generate(&self, input: &str) -> Result<String, GenerationError> {
        let report = self.client.report(input).await?;
        Ok(if self.brief {
            report.brief()
        } else {
            report.to_string()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FailureKind;
    use crate::testing::{assert_completed, assert_failed_with, RecordingGenerator};
    use crate::workflows::{weather_pipeline, LOOKUP_WEATHER};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::path::Path;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn live_body() -> serde_json::Value {
        json!({
            "status": "1",
            "count": "1",
            "info": "OK",
            "lives": [{
                "province": "北京",
                "city": "北京市",
                "adcode": "110000",
                "weather": "晴",
                "temperature": "27",
                "winddirection": "南",
                "windpower": "≤3",
                "humidity": "41",
                "reporttime": "2025-06-30 14:00:00"
            }]
        })
    }

    fn forecast_body() -> serde_json::Value {
        let day = |date: &str| {
            json!({
                "date": date, "week": "1",
                "dayweather": "多云", "nightweather": "晴",
                "daytemp": "31", "nighttemp": "21",
                "daywind": "南", "nightwind": "北",
                "daypower": "1-3", "nightpower": "1-3"
            })
        };
        json!({
            "status": "1",
            "forecasts": [{
                "city": "北京市",
                "casts": [day("2025-06-30"), day("2025-07-01"), day("2025-07-02"), day("2025-07-03")]
            }]
        })
    }

    async fn amap_server(geocode_calls: u64) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/geocode/geo"))
            .and(query_param("key", "test-key"))
            .and(query_param("address", "北京"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "1",
                "count": "1",
                "geocodes": [{"formatted_address": "北京市", "adcode": "110000"}]
            })))
            .expect(geocode_calls)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v3/geocode/geo"))
            .and(query_param("address", "Atlantis"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "1",
                "count": "0",
                "geocodes": []
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v3/weather/weatherInfo"))
            .and(query_param("city", "110000"))
            .and(query_param("extensions", "base"))
            .respond_with(ResponseTemplate::new(200).set_body_json(live_body()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v3/weather/weatherInfo"))
            .and(query_param("city", "110000"))
            .and(query_param("extensions", "all"))
            .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body()))
            .mount(&server)
            .await;
        server
    }

    fn client(server: &MockServer, cache: &Path) -> AmapWeatherClient {
        let config = WeatherConfig::new(format!("{}/v3/weather/weatherInfo", server.uri()), "test-key")
            .with_geocode_url(format!("{}/v3/geocode/geo", server.uri()))
            .with_cache_path(cache);
        AmapWeatherClient::new(config)
    }

    #[tokio::test]
    async fn test_report_reads_live_and_forecast() {
        let server = amap_server(1).await;
        let dir = tempfile::tempdir().unwrap();
        let client = client(&server, &dir.path().join("codes.json"));

        let report = client.report(" 北京 ").await.unwrap();

        assert_eq!(report.city, "北京");
        assert_eq!(report.live.temperature, "27");
        assert_eq!(report.live.wind_direction, "南");
        assert_eq!(report.forecast.len(), 3);
        assert_eq!(report.forecast[2].date, "2025-07-02");
        assert_eq!(report.brief(), "北京: 晴, 27°C");

        let text = report.to_string();
        assert!(text.starts_with("City: 北京\nWeather: 晴\nTemperature: 27°C\nHumidity: 41%\n"));
        assert!(text.contains("Reported at: 2025-06-30 14:00:00\n\nForecast:\n"));
        assert!(text.contains("2025-06-30: day 多云, 31°C, 南 wind 1-3; night 晴, 21°C, 北 wind 1-3"));
    }

    #[tokio::test]
    async fn test_city_code_geocoded_once_and_saved() {
        let server = amap_server(1).await;
        let dir = tempfile::tempdir().unwrap();
        let cache_path = dir.path().join("codes.json");
        let client = client(&server, &cache_path);

        client.report("北京").await.unwrap();
        client.report("北京").await.unwrap();

        let saved = CityCodeCache::load(&cache_path);
        assert_eq!(saved.get("北京"), Some("110000"));
    }

    #[tokio::test]
    async fn test_saved_city_code_skips_geocoder() {
        let server = amap_server(0).await;
        let dir = tempfile::tempdir().unwrap();
        let cache_path = dir.path().join("codes.json");
        let mut cache = CityCodeCache::load(&cache_path);
        cache.insert("北京", "110000");
        cache.save().unwrap();

        let report = client(&server, &cache_path).report("北京").await.unwrap();

        assert_eq!(report.live.weather, "晴");
    }

    #[tokio::test]
    async fn test_unknown_city_is_not_cached() {
        let server = amap_server(0).await;
        let dir = tempfile::tempdir().unwrap();
        let cache_path = dir.path().join("codes.json");
        let client = client(&server, &cache_path);

        let err = client.report("Atlantis").await.unwrap_err();

        assert_eq!(
            err,
            GenerationError::other("no city code for 'Atlantis'; only cities in China are supported")
        );
        assert!(client.city_code("Atlantis").await.unwrap().is_none());
        assert!(!cache_path.exists());
    }

    #[tokio::test]
    async fn test_refused_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/weather/weatherInfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "0",
                "info": "INVALID_USER_KEY"
            })))
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let cache_path = dir.path().join("codes.json");
        let mut cache = CityCodeCache::load(&cache_path);
        cache.insert("上海", "310000");
        cache.save().unwrap();

        let err = client(&server, &cache_path).report("上海").await.unwrap_err();

        assert_eq!(
            err,
            GenerationError::other("weather service refused '上海': INVALID_USER_KEY")
        );
    }

    #[tokio::test]
    async fn test_http_error_is_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("down"))
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();

        let err = client(&server, &dir.path().join("codes.json"))
            .report("北京")
            .await
            .unwrap_err();

        assert_eq!(
            err,
            GenerationError::Upstream {
                status: 500,
                body: "down".into()
            }
        );
    }

    #[tokio::test]
    async fn test_weather_pipeline_presents_report() {
        let server = amap_server(1).await;
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(client(&server, &dir.path().join("codes.json")));
        let presenter = Arc::new(RecordingGenerator::new("answer"));
        let pipeline =
            weather_pipeline(Arc::new(WeatherGenerator::brief(client)), presenter.clone()).unwrap();

        let run = pipeline.run("北京").await.unwrap();

        assert_completed(&run);
        assert_eq!(run.output_of(LOOKUP_WEATHER), Some("北京: 晴, 27°C"));
        assert_eq!(presenter.inputs(), vec!["北京: 晴, 27°C"]);
    }

    #[tokio::test]
    async fn test_weather_pipeline_fails_on_unknown_city() {
        let server = amap_server(0).await;
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(client(&server, &dir.path().join("codes.json")));
        let presenter = Arc::new(RecordingGenerator::new("answer"));
        let pipeline =
            weather_pipeline(Arc::new(WeatherGenerator::new(client)), presenter.clone()).unwrap();

        let run = pipeline.run("Atlantis").await.unwrap();

        assert_failed_with(&run, FailureKind::Generation);
        assert_eq!(presenter.call_count(), 0);
    }
}
