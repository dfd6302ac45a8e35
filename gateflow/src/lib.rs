//! # Gateflow
//!
//! Ordered, fail-fast pipelines of generate-then-validate stages.
//!
//! A pipeline threads one running text through a fixed list of stages:
//!
//! - **Transform stages** call a [`Generator`](stages::Generator) on the current text
//! - **Gated stages** also ask a [`Validator`](stages::Validator) for a
//!   [`Decision`](core::Decision) and halt the run unless every required flag holds
//! - **Routed stages** pick one of several generators by a categorical flag of the
//!   latest gate decision
//! - **Runs** are recorded as a [`PipelineRun`](core::PipelineRun) with every
//!   stage output, the gate outcome and a terminal status
//! - **Events** describe each run and stage transition for logging or inspection
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use gateflow::prelude::*;
//!
//! let pipeline = PipelineBuilder::new("story")
//!     .transform("outline", outliner)
//!     .gate("check_outline", checker, &["is_scifi"])
//!     .transform("write_story", writer)
//!     .build()?;
//!
//! let run = pipeline.run("a robot learns to paint").await?;
//! println!("{}", run.status());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cache;
pub mod cancellation;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod persist;
pub mod pipeline;
pub mod stages;
pub mod testing;
pub mod utils;
pub mod workflows;

#[cfg(feature = "http")]
pub mod providers;

pub use utils::text;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::core::{
        Decision, FailureKind, FlagValue, GateRejection, PipelineRun, RunStatus, StageRecord,
    };
    pub use crate::errors::{
        ConfigurationError, ContractErrorInfo, GateflowError, GenerationError, ValidationError,
    };
    pub use crate::events::{
        CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink, PipelineEvent,
    };
    pub use crate::pipeline::{Pipeline, PipelineBuilder, RunOptions, StageKind, StageSpec};
    pub use crate::stages::{
        FnGenerator, FnValidator, Generator, PassThrough, Router, Validator,
    };
}
