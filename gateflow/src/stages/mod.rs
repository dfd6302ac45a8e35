//! Generator and validator capabilities.
//!
//! A stage delegates its work to two external capabilities: a [`Generator`]
//! that turns input text into output text, and an optional [`Validator`] that
//! judges the output. Both are async traits so backends can await network
//! calls; both must be `Send + Sync` so one pipeline can serve concurrent runs.

use crate::core::Decision;
use crate::errors::{GenerationError, ValidationError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

/// Produces output text from input text.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generates the stage output for `input`.
    async fn generate(&self, input: &str) -> Result<String, GenerationError>;
}

/// Judges a stage's output and returns a gate decision.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Validator: Send + Sync {
    /// Produces a decision for `output`.
    async fn validate(&self, output: &str) -> Result<Decision, ValidationError>;
}

/// A generator that returns its input unchanged.
///
/// Used by gate-only stages: the validated text flows on to the next stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

#[async_trait]
impl Generator for PassThrough {
    async fn generate(&self, input: &str) -> Result<String, GenerationError> {
        Ok(input.to_string())
    }
}

/// A function-based generator.
pub struct FnGenerator<F>
where
    F: Fn(&str) -> Result<String, GenerationError> + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnGenerator<F>
where
    F: Fn(&str) -> Result<String, GenerationError> + Send + Sync,
{
    /// Creates a new function-based generator.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnGenerator<F>
where
    F: Fn(&str) -> Result<String, GenerationError> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnGenerator")
            .field("name", &self.name)
            .finish()
    }
}

#[async_trait]
impl<F> Generator for FnGenerator<F>
where
    F: Fn(&str) -> Result<String, GenerationError> + Send + Sync,
{
    async fn generate(&self, input: &str) -> Result<String, GenerationError> {
        (self.func)(input)
    }
}

/// A function-based validator.
pub struct FnValidator<F>
where
    F: Fn(&str) -> Result<Decision, ValidationError> + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnValidator<F>
where
    F: Fn(&str) -> Result<Decision, ValidationError> + Send + Sync,
{
    /// Creates a new function-based validator.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnValidator<F>
where
    F: Fn(&str) -> Result<Decision, ValidationError> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnValidator")
            .field("name", &self.name)
            .finish()
    }
}

#[async_trait]
impl<F> Validator for FnValidator<F>
where
    F: Fn(&str) -> Result<Decision, ValidationError> + Send + Sync,
{
    async fn validate(&self, output: &str) -> Result<Decision, ValidationError> {
        (self.func)(output)
    }
}

/// Picks a generator by the categorical value an earlier gate decided.
///
/// A routed stage looks at the most recent recorded [`Decision`] in the run
/// and hands its input to the generator registered for the value of
/// [`flag`](Self::flag). Values match case-insensitively after trimming.
#[derive(Clone)]
pub struct Router {
    flag: String,
    routes: BTreeMap<String, Arc<dyn Generator>>,
}

impl Router {
    /// Creates a router keyed on the categorical flag `flag`.
    #[must_use]
    pub fn new(flag: impl Into<String>) -> Self {
        Self {
            flag: flag.into(),
            routes: BTreeMap::new(),
        }
    }

    /// Registers the generator for `value`.
    #[must_use]
    pub fn route(mut self, value: &str, generator: Arc<dyn Generator>) -> Self {
        self.routes.insert(route_key(value), generator);
        self
    }

    /// The decision flag the router reads.
    #[must_use]
    pub fn flag(&self) -> &str {
        &self.flag
    }

    /// Registered route values, sorted.
    #[must_use]
    pub fn values(&self) -> Vec<&str> {
        self.routes.keys().map(String::as_str).collect()
    }

    /// Returns true if no route is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Selects the route for `decision`.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Other`] when there is no decision, the flag
    /// is missing or boolean, or no generator is registered for its value.
    pub fn select(
        &self,
        decision: Option<&Decision>,
    ) -> Result<(&str, &Arc<dyn Generator>), GenerationError> {
        let decision = decision.ok_or_else(|| {
            GenerationError::other(format!("no gate decision to route on '{}'", self.flag))
        })?;
        let value = decision.category(&self.flag).ok_or_else(|| {
            GenerationError::other(format!("decision has no '{}' value to route on", self.flag))
        })?;
        self.routes
            .get_key_value(&route_key(value))
            .map(|(key, generator)| (key.as_str(), generator))
            .ok_or_else(|| {
                GenerationError::other(format!("no route for {} '{}'", self.flag, value.trim()))
            })
    }
}

fn route_key(value: &str) -> String {
    value.trim().to_lowercase()
}

impl Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("flag", &self.flag)
            .field("routes", &self.values())
            .finish()
    }
}
