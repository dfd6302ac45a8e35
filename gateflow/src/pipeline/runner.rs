//! Sequential stage execution with fail-fast gates.

use super::builder::validate_stages;
use super::StageSpec;
use crate::cancellation::CancellationToken;
use crate::core::{FailureKind, GateRejection, PipelineRun, StageRecord};
use crate::errors::{ConfigurationError, GateflowError};
use crate::events::{self, EventSink, NoOpEventSink, PipelineEvent};
use crate::observability::SpanTimer;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span, warn, Instrument};

/// Per-run controls checked between stages.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Stops the run before the next stage once cancelled.
    pub cancel: Option<CancellationToken>,
    /// Stops the run before the next stage once this much time has passed.
    pub deadline: Option<Duration>,
}

impl RunOptions {
    /// Creates empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Sets the overall deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// An ordered, validated list of stages.
///
/// Runs borrow the pipeline immutably, so one pipeline can serve many
/// concurrent runs as long as its generators and validators are reentrant.
#[derive(Clone)]
pub struct Pipeline {
    name: String,
    stages: Vec<StageSpec>,
    sink: Arc<dyn EventSink>,
}

impl Pipeline {
    /// Creates a pipeline from an ordered stage list.
    ///
    /// # Errors
    ///
    /// Returns an error if the list is empty, a stage name is blank or
    /// duplicated, or a stage requires flags without a validator.
    pub fn new(name: impl Into<String>, stages: Vec<StageSpec>) -> Result<Self, ConfigurationError> {
        let name = name.into();
        validate_stages(&name, &stages)?;
        Ok(Self {
            name,
            stages,
            sink: Arc::new(NoOpEventSink),
        })
    }

    /// Replaces the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the stages in execution order.
    #[must_use]
    pub fn stages(&self) -> &[StageSpec] {
        &self.stages
    }

    /// Returns the stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    /// Runs every stage against `seed`.
    ///
    /// # Errors
    ///
    /// Returns [`GateflowError::EmptyInput`] for a blank seed. Failures after
    /// the first stage starts are reported through the run status instead.
    pub async fn run(&self, seed: &str) -> Result<PipelineRun, GateflowError> {
        self.run_with(seed, &RunOptions::default()).await
    }

    /// Runs every stage against `seed`, honoring cancellation and deadline.
    ///
    /// # Errors
    ///
    /// Returns [`GateflowError::EmptyInput`] for a blank seed.
    pub async fn run_with(
        &self,
        seed: &str,
        options: &RunOptions,
    ) -> Result<PipelineRun, GateflowError> {
        if seed.trim().is_empty() {
            return Err(GateflowError::EmptyInput);
        }

        let run = PipelineRun::new(&self.name, seed);
        let span = info_span!("pipeline_run", pipeline = %self.name, run_id = %run.run_id());
        Ok(self.execute(run, options).instrument(span).await)
    }

    async fn execute(&self, mut run: PipelineRun, options: &RunOptions) -> PipelineRun {
        let started = Instant::now();
        info!(stages = self.stages.len(), "Pipeline run started");
        self.emit(&run, events::PIPELINE_STARTED, json!({ "stages": self.stage_names() }))
            .await;

        let mut current = run.seed().to_string();

        for (index, stage) in self.stages.iter().enumerate() {
            if let Some((kind, reason)) = interruption(options, started, &run) {
                warn!(stage = %stage.name, %reason, "Pipeline run interrupted before stage");
                run.fail(None, kind, reason.clone());
                self.emit(
                    &run,
                    events::PIPELINE_FAILED,
                    json!({ "kind": kind, "reason": reason, "next_stage": stage.name }),
                )
                .await;
                return run;
            }

            run.enter_stage(index);
            let timer = SpanTimer::start(&stage.name);
            debug!(stage = %stage.name, index, kind = %stage.kind(), "Stage started");
            self.emit(
                &run,
                events::STAGE_STARTED,
                json!({ "stage": stage.name, "index": index }),
            )
            .await;

            let generator = match &stage.router {
                None => &stage.generator,
                Some(router) => match router.select(run.latest_decision()) {
                    Ok((route, generator)) => {
                        debug!(stage = %stage.name, flag = router.flag(), route, "Stage routed");
                        generator
                    }
                    Err(err) => {
                        let reason = err.to_string();
                        self.fail_stage(&mut run, stage, index, FailureKind::Generation, reason, &timer)
                            .await;
                        return run;
                    }
                },
            };

            let output = match generator.generate(&current).await {
                Ok(output) => output,
                Err(err) => {
                    let reason = err.to_string();
                    self.fail_stage(&mut run, stage, index, FailureKind::Generation, reason, &timer)
                        .await;
                    return run;
                }
            };

            let decision = match &stage.validator {
                None => None,
                Some(validator) => match validator.validate(&output).await {
                    Ok(decision) => {
                        let unmet = decision.unmet(&stage.required_flags);
                        if !unmet.is_empty() {
                            warn!(stage = %stage.name, ?unmet, "Gate rejected stage output");
                            self.emit(
                                &run,
                                events::STAGE_HALTED,
                                json!({
                                    "stage": stage.name,
                                    "index": index,
                                    "unmet": unmet,
                                    "duration_ms": timer.elapsed_ms(),
                                }),
                            )
                            .await;
                            run.halt(GateRejection {
                                index,
                                stage: stage.name.clone(),
                                decision,
                                unmet,
                                rejected_output: output,
                            });
                            info!(status = %run.status(), "Pipeline run halted");
                            self.emit(
                                &run,
                                events::PIPELINE_HALTED,
                                json!({ "stage": stage.name, "index": index }),
                            )
                            .await;
                            return run;
                        }
                        Some(decision)
                    }
                    Err(err) => {
                        let reason = err.to_string();
                        self.fail_stage(&mut run, stage, index, FailureKind::Validation, reason, &timer)
                            .await;
                        return run;
                    }
                },
            };

            let duration_ms = timer.elapsed_ms();
            run.record(StageRecord {
                index,
                stage: stage.name.clone(),
                output: output.clone(),
                decision,
                started_at: timer.started_at(),
                duration_ms,
            });
            debug!(stage = %stage.name, index, duration_ms, "Stage completed");
            self.emit(
                &run,
                events::STAGE_COMPLETED,
                json!({
                    "stage": stage.name,
                    "index": index,
                    "output_chars": output.chars().count(),
                    "duration_ms": duration_ms,
                }),
            )
            .await;

            current = output;
        }

        run.complete();
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        info!(duration_ms, "Pipeline run completed");
        self.emit(
            &run,
            events::PIPELINE_COMPLETED,
            json!({ "stages": run.records().len(), "duration_ms": duration_ms }),
        )
        .await;
        run
    }

    async fn fail_stage(
        &self,
        run: &mut PipelineRun,
        stage: &StageSpec,
        index: usize,
        kind: FailureKind,
        reason: String,
        timer: &SpanTimer,
    ) {
        warn!(stage = %stage.name, index, %kind, error = %reason, "Stage failed");
        self.emit(
            run,
            events::STAGE_FAILED,
            json!({
                "stage": stage.name,
                "index": index,
                "kind": kind,
                "error": reason,
                "duration_ms": timer.elapsed_ms(),
            }),
        )
        .await;
        run.fail(Some(&stage.name), kind, reason.clone());
        self.emit(
            run,
            events::PIPELINE_FAILED,
            json!({ "stage": stage.name, "kind": kind, "reason": reason }),
        )
        .await;
    }

    async fn emit(&self, run: &PipelineRun, event_type: &str, data: serde_json::Value) {
        let event = PipelineEvent::new(event_type, &self.name, run.run_id(), data);
        self.sink.emit(&event).await;
    }
}

/// Returns why the run must stop before the next stage, if it must.
fn interruption(
    options: &RunOptions,
    started: Instant,
    run: &PipelineRun,
) -> Option<(FailureKind, String)> {
    if let Some(token) = options.cancel.as_ref().filter(|t| t.is_cancelled()) {
        let reason = token.reason().unwrap_or_else(|| "no reason given".to_string());
        return Some((FailureKind::Cancelled, format!("cancelled: {reason}")));
    }

    if let Some(deadline) = options.deadline {
        if started.elapsed() >= deadline {
            let after = run.records().last().map_or("start", |r| r.stage.as_str());
            return Some((
                FailureKind::DeadlineExceeded,
                format!("deadline exceeded after {after}"),
            ));
        }
    }
    None
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("stages", &self.stages)
            .finish_non_exhaustive()
    }
}
