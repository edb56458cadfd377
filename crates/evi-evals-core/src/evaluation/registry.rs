//! Per-conversation tracking of in-flight evaluation runs.
//!
//! At most one run per conversation is live: starting a new run cancels the
//! previous one's token, so a stale run can never publish over a fresh one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::obs;

#[derive(Debug)]
struct InFlightRun {
    run_id: Uuid,
    token: CancellationToken,
}

#[derive(Debug, Default)]
struct RegistryInner {
    root: CancellationToken,
    runs: Mutex<HashMap<String, InFlightRun>>,
}

impl RegistryInner {
    fn runs(&self) -> MutexGuard<'_, HashMap<String, InFlightRun>> {
        self.runs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Registry of live runs keyed by conversation id.
///
/// Cheap to clone; clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct InFlightRegistry {
    inner: Arc<RegistryInner>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new run for `conversation_id`, cancelling any run already
    /// in flight for it.
    pub fn begin(&self, conversation_id: &str) -> RunGuard {
        let run_id = Uuid::new_v4();
        let token = self.inner.root.child_token();

        let previous = self.inner.runs().insert(
            conversation_id.to_string(),
            InFlightRun {
                run_id,
                token: token.clone(),
            },
        );

        if let Some(previous) = previous {
            previous.token.cancel();
            obs::emit_evaluation_superseded(conversation_id, previous.run_id, run_id);
        }

        RunGuard {
            conversation_id: conversation_id.to_string(),
            run_id,
            token,
            inner: Arc::clone(&self.inner),
        }
    }

    /// Cancel the live run for `conversation_id`. Returns `false` if none.
    pub fn cancel(&self, conversation_id: &str) -> bool {
        match self.inner.runs().get(conversation_id) {
            Some(run) => {
                run.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Run id of the live run for `conversation_id`, if any.
    pub fn current(&self, conversation_id: &str) -> Option<Uuid> {
        self.inner.runs().get(conversation_id).map(|r| r.run_id)
    }

    pub fn in_flight(&self) -> usize {
        self.inner.runs().len()
    }

    /// A token that is cancelled on [`shutdown`](Self::shutdown) but not
    /// tracked per conversation.
    pub fn detached_token(&self) -> CancellationToken {
        self.inner.root.child_token()
    }

    /// Cancel every live and future run.
    pub fn shutdown(&self) {
        self.inner.root.cancel();
    }
}

/// Handle to one registered run. Dropping it deregisters the run unless a
/// newer run has already replaced it.
#[derive(Debug)]
pub struct RunGuard {
    conversation_id: String,
    run_id: Uuid,
    token: CancellationToken,
    inner: Arc<RegistryInner>,
}

impl RunGuard {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// `true` once a newer run (or an explicit cancel) has taken over.
    pub fn is_superseded(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut runs = self.inner.runs();
        let owned = runs
            .get(&self.conversation_id)
            .map(|r| r.run_id == self.run_id)
            .unwrap_or(false);
        if owned {
            runs.remove(&self.conversation_id);
        }
    }
}
