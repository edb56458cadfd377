//! Evaluator vocabulary and the aggregated outcome of one run.

use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ScorerError, ScorerResult};

/// The independent assessments that can be requested for a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluatorKind {
    Satisfaction,
    Success,
    Summary,
}

impl EvaluatorKind {
    pub const ALL: [EvaluatorKind; 3] = [
        EvaluatorKind::Satisfaction,
        EvaluatorKind::Success,
        EvaluatorKind::Summary,
    ];

    /// De-duplicate a requested list, keeping a stable order.
    pub fn dedup(requested: &[EvaluatorKind]) -> BTreeSet<EvaluatorKind> {
        requested.iter().copied().collect()
    }
}

impl std::fmt::Display for EvaluatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EvaluatorKind::Satisfaction => "satisfaction",
            EvaluatorKind::Success => "success",
            EvaluatorKind::Summary => "summary",
        };
        write!(f, "{s}")
    }
}

impl FromStr for EvaluatorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "satisfaction" => Ok(EvaluatorKind::Satisfaction),
            "success" => Ok(EvaluatorKind::Success),
            "summary" => Ok(EvaluatorKind::Summary),
            other => Err(format!(
                "unknown evaluator '{other}' (expected satisfaction, success or summary)"
            )),
        }
    }
}

/// User satisfaction on a 1..=5 scale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SatisfactionResult {
    pub score: u8,
    pub reasoning: String,
}

impl SatisfactionResult {
    pub const MIN_SCORE: u8 = 1;
    pub const MAX_SCORE: u8 = 5;

    /// Reject scores outside 1..=5 as malformed scorer output.
    pub fn validate(self) -> ScorerResult<Self> {
        if (Self::MIN_SCORE..=Self::MAX_SCORE).contains(&self.score) {
            Ok(self)
        } else {
            Err(ScorerError::MalformedOutput(format!(
                "satisfaction score {} outside {}..={}",
                self.score,
                Self::MIN_SCORE,
                Self::MAX_SCORE
            )))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuccessStatus {
    Success,
    Failure,
    Unknown,
}

/// Whether the conversation met the caller's success criteria.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessResult {
    pub status: SuccessStatus,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryResult {
    pub text: String,
}

/// A failed evaluator, in task-completion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluatorError {
    pub source: EvaluatorKind,
    pub message: String,
}

/// Aggregated, partially-fillable result of one orchestration run.
///
/// Every requested evaluator ends up either in its slot or in `errors`,
/// never both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationOutcome {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub satisfaction: Option<SatisfactionResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<SuccessResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<SummaryResult>,
    #[serde(default)]
    pub errors: Vec<EvaluatorError>,
}

impl EvaluationOutcome {
    pub fn is_populated(&self, kind: EvaluatorKind) -> bool {
        match kind {
            EvaluatorKind::Satisfaction => self.satisfaction.is_some(),
            EvaluatorKind::Success => self.success.is_some(),
            EvaluatorKind::Summary => self.summary.is_some(),
        }
    }

    pub fn has_error(&self, kind: EvaluatorKind) -> bool {
        self.errors.iter().any(|e| e.source == kind)
    }

    /// Every requested kind is exactly one of populated / errored.
    pub fn is_complete(&self, requested: &[EvaluatorKind]) -> bool {
        requested
            .iter()
            .all(|k| self.is_populated(*k) != self.has_error(*k))
    }

    pub(crate) fn record_error(&mut self, source: EvaluatorKind, message: impl Into<String>) {
        self.errors.push(EvaluatorError {
            source,
            message: message.into(),
        });
    }
}

/// Terminal state of one orchestration run.
///
/// `Cancelled` is neither success nor failure: the run was superseded or
/// abandoned and its partial results were discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(EvaluationOutcome),
    Cancelled,
}

impl RunOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunOutcome::Cancelled)
    }

    pub fn completed(self) -> Option<EvaluationOutcome> {
        match self {
            RunOutcome::Completed(outcome) => Some(outcome),
            RunOutcome::Cancelled => None,
        }
    }
}
