//! Core domain model types for gateflow.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Gate decisions produced by validators
//! - Run status and failure kinds
//! - The pipeline run record and its stage records

mod decision;
mod run;
mod status;

pub use decision::{Decision, FlagValue, QUALITY_FLAG};
pub use run::{GateRejection, PipelineRun, StageRecord};
pub use status::{FailureKind, RunStatus};
