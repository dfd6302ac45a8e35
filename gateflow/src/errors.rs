//! Error types for the gateflow crate.
//!
//! Only [`GateflowError::EmptyInput`] ever escapes
//! [`Pipeline::run`](crate::pipeline::Pipeline::run); stage lists are checked
//! when the pipeline is built, so [`GateflowError::Configuration`] surfaces
//! from [`Pipeline::new`](crate::pipeline::Pipeline::new) and the builder.
//! Generation and validation failures that happen mid-run are folded into the
//! returned [`PipelineRun`](crate::core::PipelineRun) status instead.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for gateflow operations.
#[derive(Debug, Error)]
pub enum GateflowError {
    /// The seed input was empty or whitespace-only.
    #[error("Seed input cannot be empty or whitespace-only")]
    EmptyInput,

    /// The stage list or the environment configuration is invalid.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// An external generator failed.
    #[error("{0}")]
    Generation(#[from] GenerationError),

    /// An external validator failed or produced an unusable decision.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// A run could not be persisted.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Metadata about a configuration error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "CONFIG-EMPTY").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Error raised when a pipeline or its environment is misconfigured.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ConfigurationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
    /// Optional contract error info.
    pub error_info: Option<ContractErrorInfo>,
}

impl ConfigurationError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
            error_info: None,
        }
    }

    /// The pipeline has no stages.
    #[must_use]
    pub fn empty_pipeline(pipeline: &str) -> Self {
        Self::new(format!("Pipeline '{pipeline}' has no stages")).with_error_info(
            ContractErrorInfo::new("CONFIG-EMPTY", "Cannot run an empty pipeline")
                .with_fix_hint("Add at least one stage to the pipeline before running it."),
        )
    }

    /// Two stages share a name.
    #[must_use]
    pub fn duplicate_stage(name: &str) -> Self {
        Self::new(format!("Stage '{name}' is declared more than once"))
            .with_stages(vec![name.to_string()])
            .with_error_info(
                ContractErrorInfo::new("CONFIG-DUPLICATE", format!("Duplicate stage '{name}'"))
                    .with_fix_hint("Give every stage a unique name."),
            )
    }

    /// A stage name is empty or whitespace-only.
    #[must_use]
    pub fn blank_stage_name(index: usize) -> Self {
        Self::new(format!("Stage #{} has a blank name", index + 1)).with_error_info(
            ContractErrorInfo::new("CONFIG-BLANK-NAME", "Stage names cannot be blank")
                .with_context_entry("index", index.to_string()),
        )
    }

    /// A required environment variable is missing.
    #[must_use]
    pub fn missing_env(var: &str) -> Self {
        Self::new(format!("Environment variable {var} is not set")).with_error_info(
            ContractErrorInfo::new("CONFIG-ENV-MISSING", format!("{var} is required"))
                .with_context_entry("variable", var),
        )
    }

    /// An environment variable holds a value that does not parse.
    #[must_use]
    pub fn invalid_env(var: &str, value: &str, expected: &str) -> Self {
        Self::new(format!(
            "Environment variable {var}='{value}' is not a valid {expected}"
        ))
        .with_error_info(
            ContractErrorInfo::new("CONFIG-ENV-INVALID", format!("{var} must be a {expected}"))
                .with_context_entry("variable", var),
        )
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }

    /// Sets the contract error info.
    #[must_use]
    pub fn with_error_info(mut self, info: ContractErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Returns the contract code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.code.as_str())
    }
}

/// Failure reported by an external generator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
    /// The upstream service did not answer in time.
    #[error("generation timed out: {0}")]
    Timeout(String),

    /// The request never reached the upstream service or the connection broke.
    #[error("generation transport error: {0}")]
    Transport(String),

    /// The upstream service answered with an error status.
    #[error("generation upstream returned {status}: {body}")]
    Upstream {
        /// HTTP-like status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// The upstream answer could not be understood.
    #[error("malformed generation response: {0}")]
    Malformed(String),

    /// Any other generator-specific failure.
    #[error("generation failed: {0}")]
    Other(String),
}

impl GenerationError {
    /// Creates a generic generation failure.
    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

/// Failure reported by an external validator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The validator backend could not be reached or failed.
    #[error("validator backend failed: {0}")]
    Backend(String),

    /// The validator answered with something that is not a decision.
    #[error("unparseable decision: {0}")]
    Unparseable(String),
}

impl ValidationError {
    /// Creates an unparseable-decision error.
    #[must_use]
    pub fn unparseable(message: impl Into<String>) -> Self {
        Self::Unparseable(message.into())
    }
}
