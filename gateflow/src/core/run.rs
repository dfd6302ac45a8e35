//! The record of one pipeline execution.

use super::{Decision, FailureKind, RunStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The recorded output of one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    /// Zero-based position of the stage in the pipeline.
    pub index: usize,
    /// Stage name.
    pub stage: String,
    /// The generator output, verbatim.
    pub output: String,
    /// The gate decision, for stages with a validator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
    /// When the stage started.
    pub started_at: DateTime<Utc>,
    /// Stage wall time in milliseconds.
    pub duration_ms: f64,
}

/// Details about the gate that halted a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateRejection {
    /// Zero-based position of the halting stage.
    pub index: usize,
    /// Name of the halting stage.
    pub stage: String,
    /// The decision that blocked the gate.
    pub decision: Decision,
    /// Flags that were not satisfied.
    pub unmet: Vec<String>,
    /// The rejected output. Not part of the recorded outputs.
    pub rejected_output: String,
}

/// One execution of a pipeline over a seed.
///
/// Only the runner mutates a run, and only by appending records and setting
/// the status. Records are never modified once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    run_id: Uuid,
    pipeline: String,
    seed: String,
    records: Vec<StageRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rejection: Option<GateRejection>,
    status: RunStatus,
    started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    finished_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    pub(crate) fn new(pipeline: impl Into<String>, seed: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            pipeline: pipeline.into(),
            seed: seed.into(),
            records: Vec::new(),
            rejection: None,
            status: RunStatus::NotStarted,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Unique id of this run.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Name of the pipeline that produced this run.
    #[must_use]
    pub fn pipeline(&self) -> &str {
        &self.pipeline
    }

    /// The seed input.
    #[must_use]
    pub fn seed(&self) -> &str {
        &self.seed
    }

    /// Recorded stage outputs in execution order.
    #[must_use]
    pub fn records(&self) -> &[StageRecord] {
        &self.records
    }

    /// Recorded output texts in execution order.
    #[must_use]
    pub fn outputs(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.output.as_str()).collect()
    }

    /// Output of the named stage, if it was recorded.
    #[must_use]
    pub fn output_of(&self, stage: &str) -> Option<&str> {
        self.records
            .iter()
            .find(|r| r.stage == stage)
            .map(|r| r.output.as_str())
    }

    /// Output of the last recorded stage.
    #[must_use]
    pub fn final_output(&self) -> Option<&str> {
        self.records.last().map(|r| r.output.as_str())
    }

    /// Decision of the most recent recorded gate.
    #[must_use]
    pub fn latest_decision(&self) -> Option<&Decision> {
        self.records.iter().rev().find_map(|r| r.decision.as_ref())
    }

    /// The gate rejection, for halted runs.
    #[must_use]
    pub fn rejection(&self) -> Option<&GateRejection> {
        self.rejection.as_ref()
    }

    /// Name of the halting stage, for halted runs.
    #[must_use]
    pub fn halted_stage(&self) -> Option<&str> {
        self.rejection.as_ref().map(|r| r.stage.as_str())
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> &RunStatus {
        &self.status
    }

    /// When the run started.
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// When the run reached a terminal state.
    #[must_use]
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub(crate) fn enter_stage(&mut self, stage_index: usize) {
        debug_assert!(!self.status.is_terminal());
        self.status = RunStatus::Running { stage_index };
    }

    pub(crate) fn record(&mut self, record: StageRecord) {
        debug_assert_eq!(record.index, self.records.len());
        self.records.push(record);
    }

    pub(crate) fn complete(&mut self) {
        self.finish(RunStatus::Completed);
    }

    pub(crate) fn halt(&mut self, rejection: GateRejection) {
        let stage = rejection.stage.clone();
        self.rejection = Some(rejection);
        self.finish(RunStatus::Halted { stage });
    }

    pub(crate) fn fail(&mut self, stage: Option<&str>, kind: FailureKind, reason: impl Into<String>) {
        self.finish(RunStatus::Failed {
            stage: stage.map(str::to_string),
            kind,
            reason: reason.into(),
        });
    }

    fn finish(&mut self, status: RunStatus) {
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
        self.finished_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(index: usize, stage: &str, output: &str) -> StageRecord {
        StageRecord {
            index,
            stage: stage.to_string(),
            output: output.to_string(),
            decision: None,
            started_at: Utc::now(),
            duration_ms: 0.0,
        }
    }

    #[test]
    fn test_new_run_not_started() {
        let run = PipelineRun::new("story", "a robot on mars");
        assert_eq!(run.status(), &RunStatus::NotStarted);
        assert!(run.records().is_empty());
        assert!(run.final_output().is_none());
        assert!(run.finished_at().is_none());
    }

    #[test]
    fn test_record_and_lookup() {
        let mut run = PipelineRun::new("story", "seed");
        run.enter_stage(0);
        run.record(record(0, "outline", "Outline"));
        run.enter_stage(1);
        run.record(record(1, "write", "Story"));
        run.complete();

        assert_eq!(run.outputs(), vec!["Outline", "Story"]);
        assert_eq!(run.output_of("outline"), Some("Outline"));
        assert_eq!(run.output_of("missing"), None);
        assert_eq!(run.final_output(), Some("Story"));
        assert!(run.status().is_completed());
        assert!(run.finished_at().is_some());
    }

    #[test]
    fn test_terminal_status_is_sticky() {
        let mut run = PipelineRun::new("story", "seed");
        run.fail(Some("outline"), FailureKind::Generation, "boom");
        run.complete();

        assert!(run.status().is_failed());
        assert_eq!(run.status().to_string(), "failed:boom");
    }

    #[test]
    fn test_halt_keeps_rejection() {
        let mut run = PipelineRun::new("story", "seed");
        run.halt(GateRejection {
            index: 1,
            stage: "check".into(),
            decision: Decision::reject(),
            unmet: vec!["quality_acceptable".into()],
            rejected_output: "weak outline".into(),
        });

        assert_eq!(run.halted_stage(), Some("check"));
        assert_eq!(run.status().to_string(), "halted_at_stage:check");
        assert!(run.outputs().is_empty());
    }

    #[test]
    fn test_run_serialization() {
        let mut run = PipelineRun::new("story", "seed");
        run.record(record(0, "outline", "Outline"));
        run.complete();

        let json = serde_json::to_string(&run).unwrap();
        let back: PipelineRun = serde_json::from_str(&json).unwrap();
        assert_eq!(back, run);
    }

    #[test]
    fn test_latest_decision_skips_ungated_records() {
        let mut run = PipelineRun::new("translate", "bonjour");
        assert!(run.latest_decision().is_none());

        let mut routed = record(0, "route_language", "bonjour");
        routed.decision = Some(Decision::accept().with_flag("language", "french"));
        run.record(routed);
        run.record(record(1, "respond", "Bonjour !"));

        assert_eq!(
            run.latest_decision().and_then(|d| d.category("language")),
            Some("french")
        );
    }
}
