//! Scripted generators and validators for tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;

use crate::core::Decision;
use crate::errors::{GenerationError, ValidationError};
use crate::stages::{Generator, Validator};

/// A generator that replays queued outputs, then falls back to a default.
///
/// Records every input it receives.
#[derive(Debug)]
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Result<String, GenerationError>>>,
    fallback: String,
    inputs: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    /// Creates a generator that always returns `output`.
    #[must_use]
    pub fn constant(output: impl Into<String>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: output.into(),
            inputs: Mutex::new(Vec::new()),
        }
    }

    /// Queues an output for the next call.
    #[must_use]
    pub fn then(self, output: impl Into<String>) -> Self {
        self.script.lock().push_back(Ok(output.into()));
        self
    }

    /// Queues a failure for the next call.
    #[must_use]
    pub fn then_fail(self, error: GenerationError) -> Self {
        self.script.lock().push_back(Err(error));
        self
    }

    /// Returns the number of calls so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.inputs.lock().len()
    }

    /// Returns every input received, in call order.
    #[must_use]
    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().clone()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, input: &str) -> Result<String, GenerationError> {
        self.inputs.lock().push(input.to_string());
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

/// A generator that always fails.
#[derive(Debug)]
pub struct FailingGenerator {
    error: GenerationError,
}

impl FailingGenerator {
    /// Creates a generator that fails with `error`.
    #[must_use]
    pub fn new(error: GenerationError) -> Self {
        Self { error }
    }

    /// Creates a generator that times out.
    #[must_use]
    pub fn timeout() -> Self {
        Self::new(GenerationError::Timeout("upstream did not answer".into()))
    }
}

#[async_trait]
impl Generator for FailingGenerator {
    async fn generate(&self, _input: &str) -> Result<String, GenerationError> {
        Err(self.error.clone())
    }
}

/// A generator that tags its input, optionally after a delay, and records calls.
#[derive(Debug)]
pub struct RecordingGenerator {
    tag: String,
    delay: Option<Duration>,
    inputs: Mutex<Vec<String>>,
}

impl RecordingGenerator {
    /// Creates a generator returning `"{input}|{tag}"`.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            delay: None,
            inputs: Mutex::new(Vec::new()),
        }
    }

    /// Sleeps for `delay` before answering.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Returns every input received, in call order.
    #[must_use]
    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().clone()
    }

    /// Returns the number of calls so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.inputs.lock().len()
    }
}

#[async_trait]
impl Generator for RecordingGenerator {
    async fn generate(&self, input: &str) -> Result<String, GenerationError> {
        self.inputs.lock().push(input.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(format!("{input}|{}", self.tag))
    }
}

/// A validator that always returns the same decision.
#[derive(Debug)]
pub struct StaticValidator {
    decision: Decision,
    seen: Mutex<Vec<String>>,
}

impl StaticValidator {
    /// Creates a validator returning `decision`.
    #[must_use]
    pub fn new(decision: Decision) -> Self {
        Self {
            decision,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Creates a validator that accepts everything.
    #[must_use]
    pub fn accepting() -> Self {
        Self::new(Decision::accept())
    }

    /// Creates a validator that rejects on quality.
    #[must_use]
    pub fn rejecting() -> Self {
        Self::new(Decision::reject())
    }

    /// Returns every output judged so far.
    #[must_use]
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl Validator for StaticValidator {
    async fn validate(&self, output: &str) -> Result<Decision, ValidationError> {
        self.seen.lock().push(output.to_string());
        Ok(self.decision.clone())
    }
}

/// A validator that always fails.
#[derive(Debug)]
pub struct FailingValidator {
    error: ValidationError,
}

impl FailingValidator {
    /// Creates a validator that fails with `error`.
    #[must_use]
    pub fn new(error: ValidationError) -> Self {
        Self { error }
    }
}

#[async_trait]
impl Validator for FailingValidator {
    async fn validate(&self, _output: &str) -> Result<Decision, ValidationError> {
        Err(self.error.clone())
    }
}
