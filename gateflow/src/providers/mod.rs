//! HTTP-backed generators and validators.

mod openai;
mod search;
mod weather;

pub use openai::{parse_decision, ChatCompletionGenerator, ChatDecisionValidator};
pub use search::{
    parse_results, DuckDuckGoSearch, SearchBackend, SearchGenerator, SearchHit,
    DUCKDUCKGO_HTML_URL,
};
pub use weather::{
    AmapWeatherClient, DayForecast, LiveWeather, WeatherGenerator, WeatherReport,
};

use crate::errors::GenerationError;

/// Longest upstream error body kept in a [`GenerationError::Upstream`].
const MAX_ERROR_BODY: usize = 512;

fn transport_error(err: reqwest::Error) -> GenerationError {
    if err.is_timeout() {
        GenerationError::Timeout(err.to_string())
    } else {
        GenerationError::Transport(err.to_string())
    }
}

fn upstream_error(status: u16, body: &str) -> GenerationError {
    GenerationError::Upstream {
        status,
        body: body.chars().take(MAX_ERROR_BODY).collect(),
    }
}
