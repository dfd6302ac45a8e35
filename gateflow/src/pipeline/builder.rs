//! Pipeline builder with validation.

use super::{Pipeline, StageSpec};
use crate::errors::ConfigurationError;
use crate::events::EventSink;
use crate::stages::{Generator, Router, Validator};
use std::collections::HashSet;
use std::sync::Arc;

/// Builder for creating validated pipelines.
///
/// Stages run in the order they are added.
#[derive(Clone)]
pub struct PipelineBuilder {
    name: String,
    stages: Vec<StageSpec>,
    sink: Option<Arc<dyn EventSink>>,
}

impl PipelineBuilder {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            sink: None,
        }
    }

    /// Appends a stage specification.
    #[must_use]
    pub fn stage(mut self, spec: StageSpec) -> Self {
        self.stages.push(spec);
        self
    }

    /// Appends a plain transform stage.
    #[must_use]
    pub fn transform(self, name: impl Into<String>, generator: Arc<dyn Generator>) -> Self {
        self.stage(StageSpec::new(name, generator))
    }

    /// Appends a gate-only stage with required flags.
    #[must_use]
    pub fn gate(
        self,
        name: impl Into<String>,
        validator: Arc<dyn Validator>,
        required_flags: &[&str],
    ) -> Self {
        self.stage(StageSpec::gate(name, validator).require_flags(required_flags.iter().copied()))
    }

    /// Appends a stage that dispatches to one of `router`'s generators.
    #[must_use]
    pub fn routed(self, name: impl Into<String>, router: Router) -> Self {
        self.stage(StageSpec::routed(name, router))
    }

    /// Sets the event sink for runs of the built pipeline.
    #[must_use]
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages added so far.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no stages, a stage name is blank or
    /// duplicated, or a stage requires flags without a validator.
    pub fn build(self) -> Result<Pipeline, ConfigurationError> {
        let pipeline = Pipeline::new(self.name, self.stages)?;
        Ok(match self.sink {
            Some(sink) => pipeline.with_event_sink(sink),
            None => pipeline,
        })
    }
}

impl std::fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("name", &self.name)
            .field("stages", &self.stages)
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

/// Checks a stage list before it is turned into a pipeline.
pub(crate) fn validate_stages(pipeline: &str, stages: &[StageSpec]) -> Result<(), ConfigurationError> {
    if stages.is_empty() {
        return Err(ConfigurationError::empty_pipeline(pipeline));
    }

    let mut seen = HashSet::new();
    for (index, spec) in stages.iter().enumerate() {
        spec.validate(index)?;
        if !seen.insert(spec.name.as_str()) {
            return Err(ConfigurationError::duplicate_stage(&spec.name));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Decision;
    use crate::events::NoOpEventSink;
    use crate::stages::{FnValidator, PassThrough};

    fn pass() -> Arc<dyn Generator> {
        Arc::new(PassThrough)
    }

    #[test]
    fn test_builder_creation() {
        let builder = PipelineBuilder::new("story");
        assert_eq!(builder.name(), "story");
        assert_eq!(builder.stage_count(), 0);
    }

    #[test]
    fn test_builder_keeps_order() {
        let pipeline = PipelineBuilder::new("story")
            .transform("outline", pass())
            .gate(
                "check",
                Arc::new(FnValidator::new("ok", |_: &str| Ok(Decision::accept()))),
                &["is_scifi"],
            )
            .transform("write", pass())
            .event_sink(Arc::new(NoOpEventSink))
            .build()
            .unwrap();

        assert_eq!(pipeline.stage_names(), vec!["outline", "check", "write"]);
        assert_eq!(pipeline.stages()[1].required_flags, vec!["is_scifi".to_string()]);
    }

    #[test]
    fn test_builder_empty_build() {
        let err = PipelineBuilder::new("story").build().unwrap_err();
        assert_eq!(err.code(), Some("CONFIG-EMPTY"));
    }

    #[test]
    fn test_builder_duplicate_stage() {
        let err = PipelineBuilder::new("story")
            .transform("outline", pass())
            .transform("outline", pass())
            .build()
            .unwrap_err();

        assert_eq!(err.code(), Some("CONFIG-DUPLICATE"));
        assert_eq!(err.stages, vec!["outline".to_string()]);
    }

    #[test]
    fn test_builder_blank_stage_name() {
        let err = PipelineBuilder::new("story")
            .transform("outline", pass())
            .transform("", pass())
            .build()
            .unwrap_err();

        assert_eq!(err.code(), Some("CONFIG-BLANK-NAME"));
    }
}
