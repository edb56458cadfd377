//! Concurrent LLM evaluation of transcripts.
//!
//! # Module layout
//!
//! - [`outcome`]: `EvaluatorKind`, typed results, `EvaluationOutcome`, `RunOutcome`
//! - [`scorer`]: `SatisfactionScorer`, `SuccessScorer`, `SummaryScorer`, `Scorers`
//! - [`prompt`]: `PromptTemplates`
//! - [`orchestrator`]: `EvaluationOrchestrator`, `EvaluationRequest`, `RunState`
//! - [`registry`]: `InFlightRegistry`, `RunGuard`

pub mod orchestrator;
pub mod outcome;
pub mod prompt;
pub mod registry;
pub mod scorer;

pub use orchestrator::{EvaluationOrchestrator, EvaluationRequest, RunState};
pub use outcome::{
    EvaluationOutcome, EvaluatorError, EvaluatorKind, RunOutcome, SatisfactionResult,
    SuccessResult, SuccessStatus, SummaryResult,
};
pub use prompt::PromptTemplates;
pub use registry::{InFlightRegistry, RunGuard};
pub use scorer::{SatisfactionScorer, Scorers, SuccessScorer, SummaryScorer};
