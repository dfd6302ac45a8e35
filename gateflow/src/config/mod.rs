//! Environment-driven configuration.
//!
//! Model endpoints are described by a variable prefix. For the `OPENAI`
//! prefix the variables are:
//!
//! - `OPENAI_API_URL` (required)
//! - `OPENAI_MODEL_NAME` (required)
//! - `OPENAI_API_KEY`
//! - `OPENAI_TEMPERATURE` (default `0.7`)
//! - `OPENAI_MAX_TOKENS`, or bare `MAX_TOKENS` (default `1024`)
//! - `OPENAI_QUERY_TIMEOUT` in seconds
//!
//! The weather lookup reads `GAODEMAP_WEATHER_URL` and `GAODEMAP_KEY`, plus
//! the optional `GAODEMAP_GEOCODE_URL` and `GATEFLOW_CITY_CACHE`.

use crate::errors::ConfigurationError;
use crate::observability::{LogConfig, LogFormat};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
/// Default completion token limit.
pub const DEFAULT_MAX_TOKENS: u32 = 1024;
/// Default directory for saved runs.
pub const DEFAULT_OUTPUT_DIR: &str = "deterministic_output";
/// Default model variable prefix.
pub const DEFAULT_MODEL_PREFIX: &str = "OPENAI";
/// Default directory for rotated log files.
pub const DEFAULT_LOG_DIR: &str = "logs";
/// Default AMap geocoding endpoint.
pub const DEFAULT_GEOCODE_URL: &str = "https://restapi.amap.com/v3/geocode/geo";
/// Default city code cache file.
pub const DEFAULT_CITY_CACHE: &str = "city_code_cache.json";

/// Connection and sampling settings for an OpenAI-compatible endpoint.
#[derive(Clone, PartialEq)]
pub struct ModelConfig {
    /// Base URL, e.g. `http://localhost:11434/v1`.
    pub api_url: String,
    /// Bearer token, if the endpoint needs one.
    pub api_key: Option<String>,
    /// Model identifier sent with each request.
    pub model_name: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Completion token limit.
    pub max_tokens: u32,
    /// Per-request timeout.
    pub timeout: Option<Duration>,
}

impl ModelConfig {
    /// Creates a config with default sampling settings.
    #[must_use]
    pub fn new(api_url: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: None,
            model_name: model_name.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: None,
        }
    }

    /// Reads `{prefix}_*` variables from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL or model name is missing, or a number
    /// does not parse.
    pub fn from_env_prefix(prefix: &str) -> Result<Self, ConfigurationError> {
        Self::from_lookup(prefix, |key| std::env::var(key).ok())
    }

    /// Reads `{prefix}_*` variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Same as [`from_env_prefix`](Self::from_env_prefix).
    pub fn from_lookup<F>(prefix: &str, lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| format!("{prefix}_{name}");
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: String| get(&key).ok_or_else(|| ConfigurationError::missing_env(&key));

        let api_url = require(var("API_URL"))?;
        let model_name = require(var("MODEL_NAME"))?;
        let api_key = get(&var("API_KEY"));

        let temperature = parse_opt(&var("TEMPERATURE"), get(&var("TEMPERATURE")), "number")?
            .unwrap_or(DEFAULT_TEMPERATURE);

        let tokens_key = var("MAX_TOKENS");
        let max_tokens = match get(&tokens_key) {
            Some(raw) => parse_opt(&tokens_key, Some(raw), "positive integer")?,
            None if prefix == DEFAULT_MODEL_PREFIX => {
                parse_opt("MAX_TOKENS", get("MAX_TOKENS"), "positive integer")?
            }
            None => None,
        }
        .unwrap_or(DEFAULT_MAX_TOKENS);

        let timeout = parse_opt::<f64>(&var("QUERY_TIMEOUT"), get(&var("QUERY_TIMEOUT")), "number of seconds")?
            .filter(|secs| *secs > 0.0)
            .map(Duration::from_secs_f64);

        Ok(Self {
            api_url,
            api_key,
            model_name,
            temperature,
            max_tokens,
            timeout,
        })
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the completion token limit.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns the chat completions endpoint.
    #[must_use]
    pub fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_url.trim_end_matches('/'))
    }
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model_name", &self.model_name)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn parse_opt<T: FromStr>(
    key: &str,
    raw: Option<String>,
    expected: &str,
) -> Result<Option<T>, ConfigurationError> {
    raw.map(|value| {
        value
            .trim()
            .parse()
            .map_err(|_| ConfigurationError::invalid_env(key, &value, expected))
    })
    .transpose()
}

/// Settings for the AMap weather lookup.
#[derive(Clone, PartialEq, Eq)]
pub struct WeatherConfig {
    /// Weather endpoint, e.g. `https://restapi.amap.com/v3/weather/weatherInfo`.
    pub weather_url: String,
    /// Geocoding endpoint that maps city names to codes.
    pub geocode_url: String,
    /// API key sent as the `key` parameter.
    pub key: String,
    /// Where resolved city codes are cached.
    pub cache_path: PathBuf,
    /// Per-request timeout.
    pub timeout: Option<Duration>,
}

impl WeatherConfig {
    /// Creates a config with the default geocoder and cache file.
    #[must_use]
    pub fn new(weather_url: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            weather_url: weather_url.into(),
            geocode_url: DEFAULT_GEOCODE_URL.to_string(),
            key: key.into(),
            cache_path: PathBuf::from(DEFAULT_CITY_CACHE),
            timeout: None,
        }
    }

    /// Reads the `GAODEMAP_*` variables from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the weather URL or key is missing.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the `GAODEMAP_*` variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if the weather URL or key is missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| get(key).ok_or_else(|| ConfigurationError::missing_env(key));

        let mut config = Self::new(require("GAODEMAP_WEATHER_URL")?, require("GAODEMAP_KEY")?);
        if let Some(url) = get("GAODEMAP_GEOCODE_URL") {
            config.geocode_url = url;
        }
        if let Some(path) = get("GATEFLOW_CITY_CACHE") {
            config.cache_path = PathBuf::from(path);
        }
        Ok(config)
    }

    /// Sets the geocoding endpoint.
    #[must_use]
    pub fn with_geocode_url(mut self, url: impl Into<String>) -> Self {
        self.geocode_url = url.into();
        self
    }

    /// Sets the city code cache file.
    #[must_use]
    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = path.into();
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl std::fmt::Debug for WeatherConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherConfig")
            .field("weather_url", &self.weather_url)
            .field("geocode_url", &self.geocode_url)
            .field("key", &"<redacted>")
            .field("cache_path", &self.cache_path)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Settings for the `gateflow` binary.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Model endpoint used by every agent.
    pub model: ModelConfig,
    /// Where completed runs are saved.
    pub output_dir: PathBuf,
    /// Logging setup. File logs go to `GATEFLOW_LOG_DIR` (default `logs`,
    /// `off` disables them).
    pub log: LogConfig,
}

impl AppConfig {
    /// Reads the process environment.
    ///
    /// # Errors
    ///
    /// Returns the model config error, if any.
    pub fn from_env(model_prefix: &str) -> Result<Self, ConfigurationError> {
        Self::from_lookup(model_prefix, |key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns the model config error, if any.
    pub fn from_lookup<F>(model_prefix: &str, lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let model = ModelConfig::from_lookup(model_prefix, &lookup)?;
        let output_dir = lookup("GATEFLOW_OUTPUT_DIR")
            .filter(|v| !v.trim().is_empty())
            .map_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR), PathBuf::from);
        let format = lookup("LOG_FORMAT")
            .and_then(|v| v.parse::<LogFormat>().ok())
            .unwrap_or_default();
        let mut log = LogConfig::default().with_format(format);
        match lookup("GATEFLOW_LOG_DIR").map(|v| v.trim().to_string()) {
            Some(dir) if dir.eq_ignore_ascii_case("off") => {}
            Some(dir) if !dir.is_empty() => log = log.with_file_dir(dir),
            _ => log = log.with_file_dir(DEFAULT_LOG_DIR),
        }

        Ok(Self {
            model,
            output_dir,
            log,
        })
    }
}
