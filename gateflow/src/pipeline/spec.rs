//! Stage specifications.

use crate::errors::ConfigurationError;
use crate::stages::{Generator, PassThrough, Router, Validator};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What a stage does, for logs and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Generates new text from its input.
    #[default]
    Transform,
    /// Generates, then validates.
    GatedTransform,
    /// Passes its input through and only validates it.
    Gate,
    /// Picks its generator from an earlier gate's decision.
    Routed,
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transform => write!(f, "transform"),
            Self::GatedTransform => write!(f, "gated_transform"),
            Self::Gate => write!(f, "gate"),
            Self::Routed => write!(f, "routed"),
        }
    }
}

/// Specification for a single stage in a pipeline.
#[derive(Clone)]
pub struct StageSpec {
    /// The stage name, unique within a pipeline.
    pub name: String,
    /// Produces the stage output from the running text. Routed stages use
    /// `router` instead.
    pub generator: Arc<dyn Generator>,
    /// Generator selection for routed stages.
    pub router: Option<Router>,
    /// Optional gate over the stage output.
    pub validator: Option<Arc<dyn Validator>>,
    /// Decision flags that must be true for the gate to pass.
    pub required_flags: Vec<String>,
    kind: StageKind,
}

impl StageSpec {
    /// Creates a transform stage.
    #[must_use]
    pub fn new(name: impl Into<String>, generator: Arc<dyn Generator>) -> Self {
        Self {
            name: name.into(),
            generator,
            router: None,
            validator: None,
            required_flags: Vec::new(),
            kind: StageKind::Transform,
        }
    }

    /// Creates a gate-only stage: the input passes through unchanged and is
    /// then validated.
    #[must_use]
    pub fn gate(name: impl Into<String>, validator: Arc<dyn Validator>) -> Self {
        Self {
            name: name.into(),
            generator: Arc::new(PassThrough),
            router: None,
            validator: Some(validator),
            required_flags: Vec::new(),
            kind: StageKind::Gate,
        }
    }

    /// Creates a routed stage that hands its input to the generator chosen by
    /// `router`.
    #[must_use]
    pub fn routed(name: impl Into<String>, router: Router) -> Self {
        Self {
            name: name.into(),
            generator: Arc::new(PassThrough),
            router: Some(router),
            validator: None,
            required_flags: Vec::new(),
            kind: StageKind::Routed,
        }
    }

    /// Attaches a validator to a transform stage.
    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = Some(validator);
        if self.kind == StageKind::Transform {
            self.kind = StageKind::GatedTransform;
        }
        self
    }

    /// Requires a decision flag to be true.
    #[must_use]
    pub fn require_flag(mut self, flag: impl Into<String>) -> Self {
        self.required_flags.push(flag.into());
        self
    }

    /// Requires several decision flags to be true.
    #[must_use]
    pub fn require_flags(mut self, flags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.required_flags.extend(flags.into_iter().map(Into::into));
        self
    }

    /// Returns the stage kind.
    #[must_use]
    pub fn kind(&self) -> StageKind {
        self.kind
    }

    /// Returns true if the stage has a gate.
    #[must_use]
    pub fn is_gated(&self) -> bool {
        self.validator.is_some()
    }

    /// Validates the stage specification.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is blank.
    pub fn validate(&self, index: usize) -> Result<(), ConfigurationError> {
        if self.name.trim().is_empty() {
            return Err(ConfigurationError::blank_stage_name(index));
        }
        if !self.required_flags.is_empty() && self.validator.is_none() {
            return Err(ConfigurationError::new(format!(
                "Stage '{}' requires flags {:?} but has no validator",
                self.name, self.required_flags
            ))
            .with_stages(vec![self.name.clone()]));
        }
        if self.router.as_ref().is_some_and(Router::is_empty) {
            return Err(ConfigurationError::new(format!(
                "Routed stage '{}' has no routes",
                self.name
            ))
            .with_stages(vec![self.name.clone()]));
        }
        Ok(())
    }
}

impl std::fmt::Debug for StageSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageSpec")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("gated", &self.is_gated())
            .field("router", &self.router)
            .field("required_flags", &self.required_flags)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Decision;
    use crate::stages::FnValidator;

    fn accept_all() -> Arc<dyn Validator> {
        Arc::new(FnValidator::new("accept", |_: &str| Ok(Decision::accept())))
    }

    #[test]
    fn test_transform_stage() {
        let spec = StageSpec::new("outline", Arc::new(PassThrough));
        assert_eq!(spec.kind(), StageKind::Transform);
        assert!(!spec.is_gated());
        assert!(spec.validate(0).is_ok());
    }

    #[test]
    fn test_gate_stage() {
        let spec = StageSpec::gate("check", accept_all()).require_flag("is_scifi");
        assert_eq!(spec.kind(), StageKind::Gate);
        assert!(spec.is_gated());
        assert_eq!(spec.required_flags, vec!["is_scifi".to_string()]);
    }

    #[test]
    fn test_with_validator_becomes_gated_transform() {
        let spec = StageSpec::new("write", Arc::new(PassThrough))
            .with_validator(accept_all())
            .require_flags(["a", "b"]);
        assert_eq!(spec.kind(), StageKind::GatedTransform);
        assert_eq!(spec.required_flags.len(), 2);
    }

    #[test]
    fn test_blank_name_rejected() {
        let spec = StageSpec::new("   ", Arc::new(PassThrough));
        let err = spec.validate(2).unwrap_err();
        assert_eq!(err.code(), Some("CONFIG-BLANK-NAME"));
    }

    #[test]
    fn test_required_flags_without_validator_rejected() {
        let spec = StageSpec::new("write", Arc::new(PassThrough)).require_flag("is_scifi");
        assert!(spec.validate(0).is_err());
    }

    #[test]
    fn test_stage_kind_display() {
        assert_eq!(StageKind::Gate.to_string(), "gate");
        assert_eq!(StageKind::GatedTransform.to_string(), "gated_transform");
    }

    #[test]
    fn test_routed_stage() {
        let router = Router::new("language").route("english", Arc::new(PassThrough));
        let spec = StageSpec::routed("respond", router);

        assert_eq!(spec.kind(), StageKind::Routed);
        assert_eq!(spec.kind().to_string(), "routed");
        assert!(spec.validate(1).is_ok());
    }

    #[test]
    fn test_routed_stage_without_routes_rejected() {
        let spec = StageSpec::routed("respond", Router::new("language"));
        let err = spec.validate(1).unwrap_err();
        assert_eq!(err.stages, vec!["respond".to_string()]);
    }
}
