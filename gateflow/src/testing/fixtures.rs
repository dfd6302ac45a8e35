//! Test fixtures for pipeline testing.

use std::sync::Arc;

use super::mocks::RecordingGenerator;
use crate::errors::ConfigurationError;
use crate::events::CollectingEventSink;
use crate::pipeline::{Pipeline, PipelineBuilder, StageSpec};
use crate::stages::Validator;

/// A pipeline under test together with the events it emits.
pub struct TestPipeline {
    builder: PipelineBuilder,
    events: Arc<CollectingEventSink>,
}

impl TestPipeline {
    /// Creates an empty test pipeline.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            builder: PipelineBuilder::new(name),
            events: Arc::new(CollectingEventSink::new()),
        }
    }

    /// Creates a pipeline of `count` recording transforms named `stage_0..`.
    ///
    /// Stage `i` appends `|stage_i` to its input.
    #[must_use]
    pub fn linear(name: impl Into<String>, count: usize) -> Self {
        (0..count).fold(Self::new(name), |pipeline, i| {
            let stage = format!("stage_{i}");
            pipeline.with_stage(StageSpec::new(
                stage.clone(),
                Arc::new(RecordingGenerator::new(stage)),
            ))
        })
    }

    /// Appends a stage.
    #[must_use]
    pub fn with_stage(mut self, spec: StageSpec) -> Self {
        self.builder = self.builder.stage(spec);
        self
    }

    /// Appends a gate-only stage.
    #[must_use]
    pub fn with_gate(
        mut self,
        name: impl Into<String>,
        validator: Arc<dyn Validator>,
        required_flags: &[&str],
    ) -> Self {
        self.builder = self.builder.gate(name, validator, required_flags);
        self
    }

    /// Builds the pipeline, wired to the collecting sink.
    ///
    /// # Errors
    ///
    /// Returns the builder's configuration error.
    pub fn build(self) -> Result<(Pipeline, Arc<CollectingEventSink>), ConfigurationError> {
        let pipeline = self.builder.event_sink(self.events.clone()).build()?;
        Ok((pipeline, self.events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticValidator;

    #[test]
    fn test_linear_pipeline_names() {
        let (pipeline, events) = TestPipeline::linear("p", 3).build().unwrap();
        assert_eq!(pipeline.stage_names(), vec!["stage_0", "stage_1", "stage_2"]);
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_linear_pipeline_runs() {
        let (pipeline, events) = TestPipeline::linear("p", 2)
            .with_gate("check", Arc::new(StaticValidator::accepting()), &[])
            .build()
            .unwrap();

        let run = pipeline.run("seed").await.unwrap();

        assert_eq!(run.final_output(), Some("seed|stage_0|stage_1"));
        assert!(!events.is_empty());
    }
}
