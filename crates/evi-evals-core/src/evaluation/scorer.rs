//! Scorer seams: the externally supplied assessment capabilities.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ScorerResult;
use crate::evaluation::outcome::{SatisfactionResult, SuccessResult, SummaryResult};
use crate::transcript::Transcript;

/// Rates user satisfaction from a transcript.
#[async_trait]
pub trait SatisfactionScorer: Send + Sync {
    async fn score_satisfaction(&self, transcript: &Transcript) -> ScorerResult<SatisfactionResult>;
}

/// Judges whether a conversation met the caller's success criteria.
#[async_trait]
pub trait SuccessScorer: Send + Sync {
    async fn classify_success(
        &self,
        transcript: &Transcript,
        criteria: &str,
    ) -> ScorerResult<SuccessResult>;
}

/// Produces a short prose summary of a transcript.
#[async_trait]
pub trait SummaryScorer: Send + Sync {
    async fn summarize(&self, transcript: &Transcript) -> ScorerResult<SummaryResult>;
}

/// The three scorer capabilities an orchestrator dispatches to.
#[derive(Clone)]
pub struct Scorers {
    pub satisfaction: Arc<dyn SatisfactionScorer>,
    pub success: Arc<dyn SuccessScorer>,
    pub summary: Arc<dyn SummaryScorer>,
}

impl Scorers {
    pub fn new(
        satisfaction: Arc<dyn SatisfactionScorer>,
        success: Arc<dyn SuccessScorer>,
        summary: Arc<dyn SummaryScorer>,
    ) -> Self {
        Self {
            satisfaction,
            success,
            summary,
        }
    }

    /// Use one backend for all three capabilities.
    pub fn uniform<S>(scorer: Arc<S>) -> Self
    where
        S: SatisfactionScorer + SuccessScorer + SummaryScorer + 'static,
    {
        Self {
            satisfaction: scorer.clone(),
            success: scorer.clone(),
            summary: scorer,
        }
    }
}

impl std::fmt::Debug for Scorers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scorers").finish_non_exhaustive()
    }
}
