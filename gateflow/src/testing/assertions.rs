//! Test assertions for pipeline runs.

use crate::core::{FailureKind, PipelineRun, RunStatus};

/// Asserts that the run completed.
pub fn assert_completed(run: &PipelineRun) {
    assert!(
        run.status().is_completed(),
        "Expected completed run, got status: {}",
        run.status()
    );
}

/// Asserts that the run halted at `stage`.
pub fn assert_halted_at(run: &PipelineRun, stage: &str) {
    assert_eq!(
        run.halted_stage(),
        Some(stage),
        "Expected halt at '{}', got status: {}",
        stage,
        run.status()
    );
}

/// Asserts that the run failed with `kind`.
pub fn assert_failed_with(run: &PipelineRun, kind: FailureKind) {
    match run.status() {
        RunStatus::Failed { kind: actual, .. } => assert_eq!(
            *actual, kind,
            "Expected failure kind {kind}, got {actual}"
        ),
        other => panic!("Expected failed run, got status: {other}"),
    }
}

/// Asserts the recorded outputs, in stage order.
pub fn assert_outputs(run: &PipelineRun, expected: &[&str]) {
    assert_eq!(
        run.outputs(),
        expected,
        "Unexpected outputs for run with status {}",
        run.status()
    );
}
