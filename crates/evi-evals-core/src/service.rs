//! Evaluation boundary presented to external callers.
//!
//! Validates a [`ServiceRequest`], resolves its transcript (supplied text or a
//! drained event feed), registers the run and hands it to the orchestrator.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::error::{InputError, ServiceError, ServiceResult};
use crate::evaluation::{
    EvaluationOrchestrator, EvaluationRequest, EvaluatorKind, InFlightRegistry, RunOutcome,
    RunState, Scorers,
};
use crate::obs;
use crate::transcript::{fetch_transcript, EventFeed, Transcript};
use crate::METRICS;

/// A request to evaluate one conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRequest {
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// Pre-built transcript text; skips the event feed when present.
    #[serde(default)]
    pub transcript: Option<String>,
    #[serde(default)]
    pub success_criteria: Option<String>,
    #[serde(default = "all_evaluators")]
    pub evaluators: Vec<EvaluatorKind>,
}

fn all_evaluators() -> Vec<EvaluatorKind> {
    EvaluatorKind::ALL.to_vec()
}

impl Default for ServiceRequest {
    fn default() -> Self {
        Self {
            conversation_id: None,
            transcript: None,
            success_criteria: None,
            evaluators: all_evaluators(),
        }
    }
}

impl ServiceRequest {
    pub fn for_conversation(conversation_id: &str) -> Self {
        Self {
            conversation_id: Some(conversation_id.to_string()),
            ..Self::default()
        }
    }

    pub fn for_transcript(transcript: &str) -> Self {
        Self {
            transcript: Some(transcript.to_string()),
            ..Self::default()
        }
    }

    pub fn with_transcript(mut self, transcript: &str) -> Self {
        self.transcript = Some(transcript.to_string());
        self
    }

    pub fn with_success_criteria(mut self, criteria: &str) -> Self {
        self.success_criteria = Some(criteria.to_string());
        self
    }

    pub fn with_evaluators(mut self, evaluators: &[EvaluatorKind]) -> Self {
        self.evaluators = evaluators.to_vec();
        self
    }

    /// Evaluators to run. An empty list means all of them.
    pub fn requested(&self) -> Vec<EvaluatorKind> {
        if self.evaluators.is_empty() {
            all_evaluators()
        } else {
            self.evaluators.clone()
        }
    }

    /// Check the request shape before any I/O happens.
    pub fn validate(&self) -> Result<(), InputError> {
        if self.conversation_id.is_none() && self.transcript.is_none() {
            return Err(InputError::MissingTranscriptSource);
        }
        if matches!(&self.conversation_id, Some(id) if id.trim().is_empty()) {
            return Err(InputError::MissingConversationId);
        }
        if matches!(&self.transcript, Some(text) if text.trim().is_empty()) {
            return Err(InputError::EmptyTranscript);
        }
        if self.requested().contains(&EvaluatorKind::Success)
            && is_blank(self.success_criteria.as_deref())
        {
            return Err(InputError::MissingSuccessCriteria);
        }
        Ok(())
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map(|v| v.trim().is_empty()).unwrap_or(true)
}

/// Entry point tying the event feed, the run registry and the orchestrator
/// together.
#[derive(Clone)]
pub struct EvaluationService {
    feed: Option<Arc<dyn EventFeed>>,
    orchestrator: EvaluationOrchestrator,
    registry: InFlightRegistry,
}

impl std::fmt::Debug for EvaluationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluationService")
            .field("feed", &self.feed.is_some())
            .field("in_flight", &self.registry.in_flight())
            .finish()
    }
}

impl EvaluationService {
    pub fn new(scorers: Scorers) -> Self {
        Self {
            feed: None,
            orchestrator: EvaluationOrchestrator::new(scorers),
            registry: InFlightRegistry::new(),
        }
    }

    /// Event feed used for requests that carry only a conversation id.
    pub fn with_feed(mut self, feed: Arc<dyn EventFeed>) -> Self {
        self.feed = Some(feed);
        self
    }

    pub fn registry(&self) -> &InFlightRegistry {
        &self.registry
    }

    /// Validate `request`, resolve its transcript and run the evaluators.
    ///
    /// A run keyed by a conversation id replaces (and cancels) any run still
    /// in flight for the same conversation; the replaced call returns
    /// [`RunOutcome::Cancelled`].
    pub async fn evaluate(&self, request: ServiceRequest) -> ServiceResult<RunOutcome> {
        request.validate()?;
        let span = obs::evaluation_span(request.conversation_id.as_deref().unwrap_or("-"));
        self.run(request).instrument(span).await
    }

    async fn run(&self, request: ServiceRequest) -> ServiceResult<RunOutcome> {
        let guard = request
            .conversation_id
            .as_deref()
            .map(|id| self.registry.begin(id));
        let token = match &guard {
            Some(guard) => guard.token().clone(),
            None => self.registry.detached_token(),
        };

        let transcript = match (&request.transcript, &request.conversation_id) {
            (Some(text), _) => Transcript::from_text(text),
            (None, Some(conversation_id)) => {
                let feed = self.require_feed(conversation_id)?;
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        let run_id = guard
                            .as_ref()
                            .map(|g| g.run_id().to_string())
                            .unwrap_or_default();
                        obs::emit_evaluation_cancelled(&run_id, RunState::Idle);
                        METRICS.inc_runs_cancelled();
                        return Ok(RunOutcome::Cancelled);
                    }
                    built = fetch_transcript(feed, conversation_id) => built?,
                }
            }
            (None, None) => return Err(InputError::MissingTranscriptSource.into()),
        };

        let mut eval_request = EvaluationRequest::new(transcript, request.success_criteria.clone());
        if let Some(guard) = &guard {
            eval_request = eval_request.with_run_id(guard.run_id());
        }

        Ok(self
            .orchestrator
            .evaluate(&eval_request, &request.requested(), &token)
            .await)
    }

    /// Build the transcript for `conversation_id` without evaluating it.
    pub async fn transcript(&self, conversation_id: &str) -> ServiceResult<Transcript> {
        if conversation_id.trim().is_empty() {
            return Err(InputError::MissingConversationId.into());
        }
        let feed = self.require_feed(conversation_id)?;
        Ok(fetch_transcript(feed, conversation_id).await?)
    }

    /// Cancel the in-flight run for `conversation_id`, if any.
    pub fn cancel(&self, conversation_id: &str) -> bool {
        self.registry.cancel(conversation_id)
    }

    /// Cancel every in-flight run.
    pub fn shutdown(&self) {
        self.registry.shutdown();
    }

    fn require_feed(&self, conversation_id: &str) -> ServiceResult<&dyn EventFeed> {
        self.feed
            .as_deref()
            .ok_or_else(|| ServiceError::FeedNotConfigured(conversation_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TranscriptError;
    use crate::fakes::{MemoryEventFeed, PendingScorer, StaticScorer};
    use crate::transcript::ConversationEvent;

    fn service_with_feed(feed: MemoryEventFeed) -> EvaluationService {
        EvaluationService::new(Scorers::uniform(StaticScorer::arc())).with_feed(Arc::new(feed))
    }

    #[test]
    fn test_validation_rules() {
        assert_eq!(
            ServiceRequest::default().validate(),
            Err(InputError::MissingTranscriptSource)
        );
        assert_eq!(
            ServiceRequest::for_conversation("  ")
                .with_success_criteria("booked")
                .validate(),
            Err(InputError::MissingConversationId)
        );
        assert_eq!(
            ServiceRequest::for_transcript(" \n ")
                .with_success_criteria("booked")
                .validate(),
            Err(InputError::EmptyTranscript)
        );
        assert_eq!(
            ServiceRequest::for_transcript("user: hi").validate(),
            Err(InputError::MissingSuccessCriteria)
        );
        assert!(ServiceRequest::for_transcript("user: hi")
            .with_evaluators(&[EvaluatorKind::Summary])
            .validate()
            .is_ok());
    }

    #[test]
    fn test_request_deserializes_camel_case_with_default_evaluators() {
        let request: ServiceRequest = serde_json::from_str(
            r#"{"conversationId": "chat-1", "successCriteria": "refund issued"}"#,
        )
        .unwrap();
        assert_eq!(request.conversation_id.as_deref(), Some("chat-1"));
        assert_eq!(request.evaluators, EvaluatorKind::ALL.to_vec());
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_empty_evaluator_list_means_all() {
        let request = ServiceRequest::for_transcript("user: hi").with_evaluators(&[]);
        assert_eq!(request.requested().len(), 3);
    }

    #[tokio::test]
    async fn test_evaluate_supplied_transcript() {
        let service = EvaluationService::new(Scorers::uniform(StaticScorer::arc()));
        let outcome = service
            .evaluate(
                ServiceRequest::for_transcript("user: hi\nassistant: hello")
                    .with_success_criteria("greet"),
            )
            .await
            .unwrap()
            .completed()
            .unwrap();
        assert!(outcome.is_complete(&EvaluatorKind::ALL));
        assert!(outcome.errors.is_empty());
    }

    #[tokio::test]
    async fn test_conversation_without_feed_is_rejected() {
        let service = EvaluationService::new(Scorers::uniform(StaticScorer::arc()));
        let err = service
            .evaluate(
                ServiceRequest::for_conversation("chat-1")
                    .with_evaluators(&[EvaluatorKind::Summary]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::FeedNotConfigured(_)));
        assert!(!err.is_client_error());
    }

    #[tokio::test]
    async fn test_empty_feed_aborts_before_dispatch() {
        let scorer = StaticScorer::arc();
        let service = EvaluationService::new(Scorers::uniform(scorer.clone()))
            .with_feed(Arc::new(MemoryEventFeed::new()));
        let err = service
            .evaluate(
                ServiceRequest::for_conversation("chat-1")
                    .with_evaluators(&[EvaluatorKind::Summary]),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Transcript(TranscriptError::EmptyFeed)
        ));
        assert_eq!(scorer.calls(), 0);
    }

    #[tokio::test]
    async fn test_transcript_from_feed() {
        let service = service_with_feed(MemoryEventFeed::new().with_events(
            "chat-1",
            vec![ConversationEvent::user("hi"), ConversationEvent::agent("hello")],
        ));
        let transcript = service.transcript("chat-1").await.unwrap();
        assert_eq!(transcript.lines(), ["user: hi {neutral}", "assistant: hello"]);
        assert_eq!(service.registry().in_flight(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_pending_run() {
        let service = EvaluationService::new(Scorers::uniform(Arc::new(PendingScorer)));
        let runner = service.clone();
        let handle = tokio::spawn(async move {
            runner
                .evaluate(
                    ServiceRequest::for_transcript("user: hi")
                        .with_evaluators(&[EvaluatorKind::Summary]),
                )
                .await
        });

        tokio::task::yield_now().await;
        service.shutdown();
        let outcome = handle.await.unwrap().unwrap();
        assert!(outcome.is_cancelled());
    }
}
