//! Pipeline building and execution.
//!
//! This module provides:
//! - Stage specifications (transform, gated transform, gate)
//! - A pipeline builder with validation
//! - The sequential runner with fail-fast gates

mod builder;
mod runner;
mod spec;


pub use builder::PipelineBuilder;
pub use runner::{Pipeline, RunOptions};
pub use spec::{StageKind, StageSpec};
