//! In-memory fakes for the event feed and scorer seams (testing only)
//!
//! Provides `MemoryEventFeed`, `StaticScorer`, `FailingScorer`,
//! `PendingScorer` and `DelayedScorer` that satisfy the trait contracts
//! without any network access.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{FeedError, FeedResult, ScorerError, ScorerResult};
use crate::evaluation::outcome::{SatisfactionResult, SuccessResult, SuccessStatus, SummaryResult};
use crate::evaluation::scorer::{SatisfactionScorer, SuccessScorer, SummaryScorer};
use crate::transcript::{ConversationEvent, EventFeed, EventPage, Transcript};

// ---------------------------------------------------------------------------
// MemoryEventFeed
// ---------------------------------------------------------------------------

/// Paginated event feed backed by a `HashMap<conversation_id, pages>`.
///
/// Unknown conversations return a single empty page.
#[derive(Debug, Default)]
pub struct MemoryEventFeed {
    pages: Mutex<HashMap<String, Vec<Vec<ConversationEvent>>>>,
    fail_at_page: Option<u32>,
    latency: Option<Duration>,
    fetched: AtomicUsize,
}

impl MemoryEventFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `events` for `conversation_id` as a single page.
    pub fn with_events(self, conversation_id: &str, events: Vec<ConversationEvent>) -> Self {
        self.with_pages(conversation_id, vec![events])
    }

    pub fn with_pages(self, conversation_id: &str, pages: Vec<Vec<ConversationEvent>>) -> Self {
        self.pages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(conversation_id.to_string(), pages);
        self
    }

    /// Fail every fetch of `page_number` with a transport error.
    pub fn failing_at_page(mut self, page_number: u32) -> Self {
        self.fail_at_page = Some(page_number);
        self
    }

    /// Sleep for `latency` before answering each page fetch.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of page fetches served so far.
    pub fn pages_fetched(&self) -> usize {
        self.fetched.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventFeed for MemoryEventFeed {
    async fn fetch_page(&self, conversation_id: &str, page_number: u32) -> FeedResult<EventPage> {
        self.fetched.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.fail_at_page == Some(page_number) {
            return Err(FeedError::Transport(format!(
                "injected failure at page {page_number}"
            )));
        }

        let pages = self.pages.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(conversation) = pages.get(conversation_id) else {
            return Ok(EventPage::default());
        };
        let index = page_number as usize;
        Ok(EventPage {
            events: conversation.get(index).cloned().unwrap_or_default(),
            has_more: index + 1 < conversation.len(),
        })
    }
}

// ---------------------------------------------------------------------------
// StaticScorer
// ---------------------------------------------------------------------------

/// Scorer that answers every call with canned results and counts calls.
#[derive(Debug)]
pub struct StaticScorer {
    pub satisfaction: SatisfactionResult,
    pub success: SuccessResult,
    pub summary: SummaryResult,
    calls: AtomicUsize,
}

impl Default for StaticScorer {
    fn default() -> Self {
        Self {
            satisfaction: SatisfactionResult {
                score: 4,
                reasoning: "the user thanked the assistant".to_string(),
            },
            success: SuccessResult {
                status: SuccessStatus::Success,
                reasoning: "the stated goal was met".to_string(),
            },
            summary: SummaryResult {
                text: "The user asked for help and the assistant resolved it.".to_string(),
            },
            calls: AtomicUsize::new(0),
        }
    }
}

impl StaticScorer {
    pub fn arc() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_satisfaction_score(mut self, score: u8) -> Self {
        self.satisfaction.score = score;
        self
    }

    pub fn with_status(mut self, status: SuccessStatus) -> Self {
        self.success.status = status;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SatisfactionScorer for StaticScorer {
    async fn score_satisfaction(&self, _transcript: &Transcript) -> ScorerResult<SatisfactionResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.satisfaction.clone())
    }
}

#[async_trait]
impl SuccessScorer for StaticScorer {
    async fn classify_success(
        &self,
        _transcript: &Transcript,
        _criteria: &str,
    ) -> ScorerResult<SuccessResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.success.clone())
    }
}

#[async_trait]
impl SummaryScorer for StaticScorer {
    async fn summarize(&self, _transcript: &Transcript) -> ScorerResult<SummaryResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.summary.clone())
    }
}

// ---------------------------------------------------------------------------
// FailingScorer
// ---------------------------------------------------------------------------

/// Scorer that always fails, either with an error or by panicking.
#[derive(Debug, Clone)]
pub struct FailingScorer {
    message: String,
    panic: bool,
}

impl FailingScorer {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
            panic: false,
        }
    }

    pub fn panicking() -> Self {
        Self {
            message: "scorer exploded".to_string(),
            panic: true,
        }
    }

    fn fail<T>(&self) -> ScorerResult<T> {
        if self.panic {
            panic!("{}", self.message);
        }
        Err(ScorerError::Transport(self.message.clone()))
    }
}

#[async_trait]
impl SatisfactionScorer for FailingScorer {
    async fn score_satisfaction(&self, _transcript: &Transcript) -> ScorerResult<SatisfactionResult> {
        self.fail()
    }
}

#[async_trait]
impl SuccessScorer for FailingScorer {
    async fn classify_success(
        &self,
        _transcript: &Transcript,
        _criteria: &str,
    ) -> ScorerResult<SuccessResult> {
        self.fail()
    }
}

#[async_trait]
impl SummaryScorer for FailingScorer {
    async fn summarize(&self, _transcript: &Transcript) -> ScorerResult<SummaryResult> {
        self.fail()
    }
}

// ---------------------------------------------------------------------------
// PendingScorer
// ---------------------------------------------------------------------------

/// Scorer whose calls never complete.
#[derive(Debug, Clone, Copy, Default)]
pub struct PendingScorer;

#[async_trait]
impl SatisfactionScorer for PendingScorer {
    async fn score_satisfaction(&self, _transcript: &Transcript) -> ScorerResult<SatisfactionResult> {
        std::future::pending().await
    }
}

#[async_trait]
impl SuccessScorer for PendingScorer {
    async fn classify_success(
        &self,
        _transcript: &Transcript,
        _criteria: &str,
    ) -> ScorerResult<SuccessResult> {
        std::future::pending().await
    }
}

#[async_trait]
impl SummaryScorer for PendingScorer {
    async fn summarize(&self, _transcript: &Transcript) -> ScorerResult<SummaryResult> {
        std::future::pending().await
    }
}

// ---------------------------------------------------------------------------
// DelayedScorer
// ---------------------------------------------------------------------------

/// Wraps a [`StaticScorer`], sleeping before every answer and counting how
/// many calls actually finished (vs. were dropped by cancellation).
#[derive(Debug)]
pub struct DelayedScorer {
    inner: StaticScorer,
    delay: Duration,
    finished: AtomicUsize,
}

impl DelayedScorer {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: StaticScorer::default(),
            delay,
            finished: AtomicUsize::new(0),
        }
    }

    pub fn with_inner(mut self, inner: StaticScorer) -> Self {
        self.inner = inner;
        self
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    async fn wait(&self) {
        tokio::time::sleep(self.delay).await;
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SatisfactionScorer for DelayedScorer {
    async fn score_satisfaction(&self, transcript: &Transcript) -> ScorerResult<SatisfactionResult> {
        self.wait().await;
        self.inner.score_satisfaction(transcript).await
    }
}

#[async_trait]
impl SuccessScorer for DelayedScorer {
    async fn classify_success(
        &self,
        transcript: &Transcript,
        criteria: &str,
    ) -> ScorerResult<SuccessResult> {
        self.wait().await;
        self.inner.classify_success(transcript, criteria).await
    }
}

#[async_trait]
impl SummaryScorer for DelayedScorer {
    async fn summarize(&self, transcript: &Transcript) -> ScorerResult<SummaryResult> {
        self.wait().await;
        self.inner.summarize(transcript).await
    }
}
