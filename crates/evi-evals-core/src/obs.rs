//! Structured observability hooks for the evaluation lifecycle.
//!
//! This module provides:
//! - A conversation-scoped tracing span via [`evaluation_span`]
//! - Emission functions for lifecycle events: transcript built, dispatch,
//!   per-evaluator finish/failure, completion, cancellation, supersession
//!
//! Events are emitted at `info!` level (failures at `warn!`). Filtering and
//! JSON output are configured through [`crate::telemetry::init_tracing`].

use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ScorerError;
use crate::evaluation::orchestrator::RunState;
use crate::evaluation::outcome::{EvaluationOutcome, EvaluatorKind};

/// Conversation-scoped span for one evaluation.
///
/// Attach it to the evaluation future with
/// [`Instrument::instrument`](tracing::Instrument::instrument) so it follows
/// the future across await points:
///
/// ```ignore
/// service_call.instrument(obs::evaluation_span("chat-12345")).await
/// ```
pub fn evaluation_span(conversation_id: &str) -> tracing::Span {
    tracing::info_span!("evi_evals.evaluation", conversation_id = %conversation_id)
}

/// Emit event: transcript built from the event feed.
pub fn emit_transcript_built(conversation_id: &str, lines: usize) {
    info!(event = "transcript.built", conversation_id = %conversation_id, lines = lines);
}

/// Emit event: evaluator tasks dispatched for a run.
pub fn emit_evaluation_dispatched(run_id: &str, kinds: &[EvaluatorKind], transcript_lines: usize) {
    let kinds: Vec<String> = kinds.iter().map(|k| k.to_string()).collect();
    info!(
        event = "evaluation.dispatched",
        run_id = %run_id,
        evaluators = %kinds.join(","),
        transcript_lines = transcript_lines,
    );
}

/// Emit event: one evaluator task reached a terminal state.
pub fn emit_evaluator_finished(run_id: &str, kind: EvaluatorKind, duration_ms: u64, success: bool) {
    info!(
        event = "evaluator.finished",
        run_id = %run_id,
        evaluator = %kind,
        duration_ms = duration_ms,
        success = success,
    );
}

/// Emit event: an evaluator failed; the failure is recorded in the outcome.
pub fn emit_evaluator_failed(run_id: &str, kind: EvaluatorKind, error: &ScorerError) {
    warn!(event = "evaluator.failed", run_id = %run_id, evaluator = %kind, error = %error);
}

/// Emit event: every requested evaluator terminated.
pub fn emit_evaluation_completed(run_id: &str, outcome: &EvaluationOutcome) {
    info!(
        event = "evaluation.completed",
        run_id = %run_id,
        satisfaction = outcome.satisfaction.is_some(),
        success = outcome.success.is_some(),
        summary = outcome.summary.is_some(),
        errors = outcome.errors.len(),
    );
}

/// Emit event: run cancelled; its partial results were discarded.
pub fn emit_evaluation_cancelled(run_id: &str, state: RunState) {
    info!(event = "evaluation.cancelled", run_id = %run_id, state = ?state);
}

/// Emit event: a newer run replaced an in-flight run for the same conversation.
pub fn emit_evaluation_superseded(conversation_id: &str, previous: Uuid, next: Uuid) {
    info!(
        event = "evaluation.superseded",
        conversation_id = %conversation_id,
        previous_run_id = %previous,
        run_id = %next,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluation_span_create() {
        let span = evaluation_span("test-conversation");
        let _entered = span.enter();
    }
}
