//! Concurrent fan-out of scorer calls over one transcript.
//!
//! Each requested evaluator runs as its own task in a [`JoinSet`] and hands
//! its result back through the join handle, so the orchestrator is the only
//! writer of the [`EvaluationOutcome`]. A failed evaluator fills `errors`
//! and leaves its siblings running. Cancelling the run's token aborts every
//! task that has not finished and discards whatever was already collected.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::error::{ScorerError, ScorerResult};
use crate::evaluation::outcome::{
    EvaluationOutcome, EvaluatorKind, RunOutcome, SatisfactionResult, SuccessResult, SummaryResult,
};
use crate::evaluation::scorer::Scorers;
use crate::obs;
use crate::transcript::Transcript;
use crate::METRICS;

/// Lifecycle of a single orchestration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Dispatched,
    Collecting,
    Completed,
    Cancelled,
}

/// The input to one run: a shared, immutable transcript plus the optional
/// success criteria (only the success evaluator reads them).
#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    pub run_id: Uuid,
    pub transcript: Arc<Transcript>,
    pub success_criteria: Option<String>,
}

impl EvaluationRequest {
    pub fn new(transcript: impl Into<Arc<Transcript>>, success_criteria: Option<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            transcript: transcript.into(),
            success_criteria,
        }
    }

    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }
}

enum SlotValue {
    Satisfaction(SatisfactionResult),
    Success(SuccessResult),
    Summary(SummaryResult),
}

struct SlotReport {
    kind: EvaluatorKind,
    /// `None` when the task saw the cancellation before its scorer finished.
    result: Option<ScorerResult<SlotValue>>,
    elapsed_ms: u64,
}

/// Drives scorer calls for a transcript and aggregates their results.
#[derive(Debug, Clone)]
pub struct EvaluationOrchestrator {
    scorers: Scorers,
}

impl EvaluationOrchestrator {
    pub fn new(scorers: Scorers) -> Self {
        Self { scorers }
    }

    /// Run every requested evaluator concurrently and collect the outcome.
    ///
    /// Returns [`RunOutcome::Cancelled`] if `cancel` fires before all tasks
    /// finish; nothing collected by then is returned.
    #[instrument(skip_all, fields(run_id = %request.run_id))]
    pub async fn evaluate(
        &self,
        request: &EvaluationRequest,
        requested: &[EvaluatorKind],
        cancel: &CancellationToken,
    ) -> RunOutcome {
        let kinds = EvaluatorKind::dedup(requested);
        let run_id = request.run_id.to_string();
        let mut state = RunState::Idle;

        if cancel.is_cancelled() {
            obs::emit_evaluation_cancelled(&run_id, state);
            METRICS.inc_runs_cancelled();
            return RunOutcome::Cancelled;
        }

        METRICS.inc_runs_started();
        let kind_list: Vec<EvaluatorKind> = kinds.iter().copied().collect();
        obs::emit_evaluation_dispatched(&run_id, &kind_list, request.transcript.len());

        let mut tasks = JoinSet::new();
        for kind in kinds.iter().copied() {
            let scorers = self.scorers.clone();
            let transcript = Arc::clone(&request.transcript);
            let criteria = request.success_criteria.clone();
            let token = cancel.clone();

            tasks.spawn(async move {
                let started = Instant::now();
                let call = AssertUnwindSafe(run_scorer(kind, scorers, transcript, criteria))
                    .catch_unwind();
                let result = tokio::select! {
                    biased;
                    _ = token.cancelled() => None,
                    caught = call => Some(caught.unwrap_or_else(|panic| {
                        Err(ScorerError::Panicked(panic_message(panic.as_ref())))
                    })),
                };
                SlotReport {
                    kind,
                    result,
                    elapsed_ms: started.elapsed().as_millis() as u64,
                }
            });
        }
        state = transition(state, RunState::Dispatched);
        state = transition(state, RunState::Collecting);

        let mut outcome = EvaluationOutcome::default();
        let mut interrupted = false;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tasks.abort_all();
                    obs::emit_evaluation_cancelled(&run_id, state);
                    METRICS.inc_runs_cancelled();
                    return RunOutcome::Cancelled;
                }
                joined = tasks.join_next() => match joined {
                    None => break,
                    Some(Ok(report)) => {
                        interrupted |= record(&mut outcome, &run_id, report);
                    }
                    Some(Err(e)) => {
                        warn!(run_id = %run_id, error = %e, "evaluator task did not complete");
                    }
                },
            }
        }

        seal(&run_id, state, &kind_list, outcome, interrupted, cancel)
    }
}

/// Turn the collected slots into the run's outcome. A token cancelled after
/// the last task joined still wins over the collected results.
fn seal(
    run_id: &str,
    state: RunState,
    kinds: &[EvaluatorKind],
    mut outcome: EvaluationOutcome,
    interrupted: bool,
    cancel: &CancellationToken,
) -> RunOutcome {
    if interrupted || cancel.is_cancelled() {
        obs::emit_evaluation_cancelled(run_id, state);
        METRICS.inc_runs_cancelled();
        return RunOutcome::Cancelled;
    }

    for kind in kinds.iter().copied() {
        if !outcome.is_populated(kind) && !outcome.has_error(kind) {
            METRICS.inc_evaluator_failures();
            outcome.record_error(kind, "evaluator task terminated unexpectedly");
        }
    }

    transition(state, RunState::Completed);
    METRICS.inc_runs_completed();
    obs::emit_evaluation_completed(run_id, &outcome);
    RunOutcome::Completed(outcome)
}

fn transition(from: RunState, to: RunState) -> RunState {
    debug!(from = ?from, to = ?to, "evaluation run state");
    to
}

/// Merge one task report into the outcome. Returns `true` if the task was
/// interrupted by cancellation.
fn record(outcome: &mut EvaluationOutcome, run_id: &str, report: SlotReport) -> bool {
    let SlotReport {
        kind,
        result,
        elapsed_ms,
    } = report;

    match result {
        None => return true,
        Some(Ok(value)) => {
            obs::emit_evaluator_finished(run_id, kind, elapsed_ms, true);
            match value {
                SlotValue::Satisfaction(r) => outcome.satisfaction = Some(r),
                SlotValue::Success(r) => outcome.success = Some(r),
                SlotValue::Summary(r) => outcome.summary = Some(r),
            }
        }
        Some(Err(e)) => {
            obs::emit_evaluator_finished(run_id, kind, elapsed_ms, false);
            obs::emit_evaluator_failed(run_id, kind, &e);
            METRICS.inc_evaluator_failures();
            outcome.record_error(kind, e.to_string());
        }
    }
    false
}

async fn run_scorer(
    kind: EvaluatorKind,
    scorers: Scorers,
    transcript: Arc<Transcript>,
    criteria: Option<String>,
) -> ScorerResult<SlotValue> {
    match kind {
        EvaluatorKind::Satisfaction => scorers
            .satisfaction
            .score_satisfaction(&transcript)
            .await
            .and_then(SatisfactionResult::validate)
            .map(SlotValue::Satisfaction),
        EvaluatorKind::Success => {
            let criteria = criteria
                .filter(|c| !c.trim().is_empty())
                .ok_or(ScorerError::MissingCriteria)?;
            scorers
                .success
                .classify_success(&transcript, &criteria)
                .await
                .map(SlotValue::Success)
        }
        EvaluatorKind::Summary => scorers
            .summary
            .summarize(&transcript)
            .await
            .map(SlotValue::Summary),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FailingScorer, PendingScorer, StaticScorer};

    fn transcript() -> Arc<Transcript> {
        Arc::new(Transcript::from_text(
            "user: my order never arrived {quite distressed}\nassistant: I've issued a refund",
        ))
    }

    #[tokio::test]
    async fn test_all_evaluators_populate_their_slots() {
        let orchestrator = EvaluationOrchestrator::new(Scorers::uniform(StaticScorer::arc()));
        let request = EvaluationRequest::new(transcript(), Some("refund issued".to_string()));

        let outcome = orchestrator
            .evaluate(&request, &EvaluatorKind::ALL, &CancellationToken::new())
            .await
            .completed()
            .expect("run should complete");

        assert!(outcome.satisfaction.is_some());
        assert!(outcome.success.is_some());
        assert!(outcome.summary.is_some());
        assert!(outcome.errors.is_empty());
    }

    #[tokio::test]
    async fn test_success_without_criteria_is_slot_error() {
        let orchestrator = EvaluationOrchestrator::new(Scorers::uniform(StaticScorer::arc()));
        let request = EvaluationRequest::new(transcript(), None);

        let outcome = orchestrator
            .evaluate(
                &request,
                &[EvaluatorKind::Success, EvaluatorKind::Summary],
                &CancellationToken::new(),
            )
            .await
            .completed()
            .unwrap();

        assert!(outcome.success.is_none());
        assert!(outcome.summary.is_some());
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].source, EvaluatorKind::Success);
    }

    #[tokio::test]
    async fn test_out_of_range_score_is_recorded_as_malformed() {
        let scorers = Scorers {
            satisfaction: Arc::new(StaticScorer::default().with_satisfaction_score(9)),
            ..Scorers::uniform(StaticScorer::arc())
        };
        let orchestrator = EvaluationOrchestrator::new(scorers);
        let request = EvaluationRequest::new(transcript(), None);

        let outcome = orchestrator
            .evaluate(&request, &[EvaluatorKind::Satisfaction], &CancellationToken::new())
            .await
            .completed()
            .unwrap();

        assert!(outcome.satisfaction.is_none());
        assert!(outcome.errors[0].message.contains("malformed"));
    }

    #[tokio::test]
    async fn test_panicking_scorer_is_contained() {
        let scorers = Scorers {
            summary: Arc::new(FailingScorer::panicking()),
            ..Scorers::uniform(StaticScorer::arc())
        };
        let orchestrator = EvaluationOrchestrator::new(scorers);
        let request = EvaluationRequest::new(transcript(), None);

        let outcome = orchestrator
            .evaluate(
                &request,
                &[EvaluatorKind::Satisfaction, EvaluatorKind::Summary],
                &CancellationToken::new(),
            )
            .await
            .completed()
            .unwrap();

        assert!(outcome.satisfaction.is_some());
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].message.contains("panicked"));
    }

    #[tokio::test]
    async fn test_cancelled_before_dispatch() {
        let orchestrator = EvaluationOrchestrator::new(Scorers::uniform(StaticScorer::arc()));
        let request = EvaluationRequest::new(transcript(), None);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let run = orchestrator
            .evaluate(&request, &[EvaluatorKind::Summary], &cancel)
            .await;
        assert!(run.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_while_collecting() {
        let orchestrator = EvaluationOrchestrator::new(Scorers::uniform(Arc::new(PendingScorer)));
        let request = EvaluationRequest::new(transcript(), Some("anything".into()));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            trigger.cancel();
        });

        let run = orchestrator
            .evaluate(&request, &EvaluatorKind::ALL, &cancel)
            .await;
        assert_eq!(run, RunOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_empty_request_completes_immediately() {
        let orchestrator = EvaluationOrchestrator::new(Scorers::uniform(StaticScorer::arc()));
        let request = EvaluationRequest::new(transcript(), None);

        let outcome = orchestrator
            .evaluate(&request, &[], &CancellationToken::new())
            .await
            .completed()
            .unwrap();
        assert_eq!(outcome, EvaluationOutcome::default());
    }

    #[test]
    fn test_cancel_after_last_join_discards_results() {
        let outcome = EvaluationOutcome {
            summary: Some(SummaryResult {
                text: "resolved".to_string(),
            }),
            ..EvaluationOutcome::default()
        };
        let cancel = CancellationToken::new();
        cancel.cancel();

        let run = seal(
            "run-late",
            RunState::Collecting,
            &[EvaluatorKind::Summary],
            outcome.clone(),
            false,
            &cancel,
        );
        assert_eq!(run, RunOutcome::Cancelled);

        let run = seal(
            "run-live",
            RunState::Collecting,
            &[EvaluatorKind::Summary],
            outcome.clone(),
            false,
            &CancellationToken::new(),
        );
        assert_eq!(run, RunOutcome::Completed(outcome));
    }

    #[test]
    fn test_panic_message_extraction() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
    }
}
