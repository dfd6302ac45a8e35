//! Lifecycle events emitted by the pipeline runner.
//!
//! Every run emits `pipeline.started`, then a `stage.*` pair per executed
//! stage, then exactly one of `pipeline.completed`, `pipeline.halted` or
//! `pipeline.failed`.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Emitted before the first stage runs.
pub const PIPELINE_STARTED: &str = "pipeline.started";
/// Emitted when every stage ran.
pub const PIPELINE_COMPLETED: &str = "pipeline.completed";
/// Emitted when a gate stopped the run.
pub const PIPELINE_HALTED: &str = "pipeline.halted";
/// Emitted when the run failed.
pub const PIPELINE_FAILED: &str = "pipeline.failed";
/// Emitted before a stage's generator is called.
pub const STAGE_STARTED: &str = "stage.started";
/// Emitted after a stage's output is recorded.
pub const STAGE_COMPLETED: &str = "stage.completed";
/// Emitted when a stage's gate rejects its output.
pub const STAGE_HALTED: &str = "stage.halted";
/// Emitted when a stage's generator or validator fails.
pub const STAGE_FAILED: &str = "stage.failed";

/// One lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineEvent {
    /// Event type, e.g. `stage.completed`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Pipeline name.
    pub pipeline: String,
    /// Run the event belongs to.
    pub run_id: Uuid,
    /// When the event was created.
    pub timestamp: DateTime<Utc>,
    /// Event payload.
    #[serde(default)]
    pub data: serde_json::Value,
}

impl PipelineEvent {
    /// Creates a new event stamped with the current time.
    #[must_use]
    pub fn new(
        event_type: impl Into<String>,
        pipeline: impl Into<String>,
        run_id: Uuid,
        data: serde_json::Value,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            pipeline: pipeline.into(),
            run_id,
            timestamp: Utc::now(),
            data,
        }
    }

    /// Reads a string field from the payload.
    #[must_use]
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(serde_json::Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_type_field() {
        let event = PipelineEvent::new(
            STAGE_COMPLETED,
            "story",
            Uuid::new_v4(),
            serde_json::json!({"stage": "outline"}),
        );
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "stage.completed");
        assert_eq!(event.data_str("stage"), Some("outline"));
        assert_eq!(event.data_str("missing"), None);
    }
}
