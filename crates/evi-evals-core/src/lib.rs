//! evi-evals core library
//!
//! Builds emotion-annotated transcripts from voice-agent conversation events
//! and runs concurrent LLM evaluations (satisfaction, success, summary) over
//! them.

pub mod anthropic;
pub mod config;
pub mod emotion;
pub mod error;
pub mod evaluation;
pub mod fakes;
pub mod hume;
pub mod metrics;
pub mod obs;
pub mod service;
pub mod telemetry;
pub mod transcript;

pub use anthropic::AnthropicScorer;
pub use config::{EvalConfig, FeedConfig, ScorerConfig};
pub use emotion::{annotate, EmotionAnnotation, EmotionDescriptor, EmotionScores, NEUTRAL};
pub use error::{
    ConfigError, FeedError, InputError, ScorerError, ServiceError, ServiceResult, TranscriptError,
};
pub use evaluation::{
    EvaluationOrchestrator, EvaluationOutcome, EvaluationRequest, EvaluatorError, EvaluatorKind,
    InFlightRegistry, PromptTemplates, RunGuard, RunOutcome, RunState, SatisfactionResult,
    SatisfactionScorer, Scorers, SuccessResult, SuccessScorer, SuccessStatus, SummaryResult,
    SummaryScorer,
};
pub use hume::HumeEventFeed;
pub use service::{EvaluationService, ServiceRequest};
pub use transcript::{
    build_transcript, fetch_transcript, ConversationEvent, EventFeed, EventKind, EventPage,
    Speaker, Transcript,
};

pub use metrics::METRICS;
pub use obs::{
    emit_evaluation_cancelled, emit_evaluation_completed, emit_evaluation_dispatched,
    emit_evaluation_superseded, emit_evaluator_failed, emit_evaluator_finished,
    emit_transcript_built, evaluation_span,
};
pub use telemetry::init_tracing;

/// evi-evals version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
