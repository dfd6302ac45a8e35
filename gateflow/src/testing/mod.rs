//! Testing utilities for gateflow pipelines.
//!
//! This module provides:
//! - Scripted generators and validators
//! - Assertions over run outcomes
//! - A pipeline fixture that captures emitted events

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{assert_completed, assert_failed_with, assert_halted_at, assert_outputs};
pub use fixtures::TestPipeline;
pub use mocks::{
    FailingGenerator, FailingValidator, RecordingGenerator, ScriptedGenerator, StaticValidator,
};
