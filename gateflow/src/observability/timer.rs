//! Wall-clock timing for runs and stages.

use chrono::{DateTime, Utc};
use std::time::Instant;

/// Measures elapsed time from a start point.
///
/// Keeps both the monotonic start (for durations) and the wall-clock start
/// (for records).
#[derive(Debug)]
pub struct SpanTimer {
    start: Instant,
    started_at: DateTime<Utc>,
    name: String,
}

impl SpanTimer {
    /// Starts a new timer.
    #[must_use]
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            started_at: Utc::now(),
            name: name.into(),
        }
    }

    /// Returns the elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Wall-clock time the timer started.
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Returns the span name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}
