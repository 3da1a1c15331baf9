//! Reset confirmation conversations.
//!
//! A reset request opens a conversation keyed by chat and requester. The
//! next text from that requester closes it; so does the timeout, silently.

use crate::group::GroupId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// State of one reset conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetState {
    /// No reset pending
    Idle,
    /// Prompt sent, waiting for the answer
    AwaitingConfirmation,
}

type ConversationKey = (GroupId, i64);

struct Pending {
    generation: u64,
    timer: CancellationToken,
}

/// Open reset prompts with their expiry timers
pub struct ResetConversations {
    timeout: Duration,
    generation: AtomicU64,
    pending: Arc<Mutex<HashMap<ConversationKey, Pending>>>,
}

impl ResetConversations {
    /// Conversations expiring after `timeout` without an answer.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            generation: AtomicU64::new(0),
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Current state for `user` in `chat`.
    #[must_use]
    pub fn state(&self, chat: GroupId, user: i64) -> ResetState {
        let pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if pending.contains_key(&(chat, user)) {
            ResetState::AwaitingConfirmation
        } else {
            ResetState::Idle
        }
    }

    /// Moves to `AwaitingConfirmation` and starts the expiry timer. A prompt
    /// already open for the same key is replaced and its timer cancelled.
    ///
    /// Must be called from within a tokio runtime.
    pub fn begin(&self, chat: GroupId, user: i64) {
        let key = (chat, user);
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let timer = CancellationToken::new();
        {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(previous) = pending.insert(
                key,
                Pending {
                    generation,
                    timer: timer.clone(),
                },
            ) {
                previous.timer.cancel();
            }
        }

        let pending = Arc::clone(&self.pending);
        let timeout = self.timeout;
        tokio::spawn(async move {
            tokio::select! {
                () = timer.cancelled() => {}
                () = tokio::time::sleep(timeout) => {
                    let mut pending = pending.lock().unwrap_or_else(PoisonError::into_inner);
                    if pending.get(&key).is_some_and(|p| p.generation == generation) {
                        pending.remove(&key);
                        info!(chat = %chat, user, "Reset confirmation timed out");
                    }
                }
            }
        });
    }

    /// Returns to `Idle`. Returns `true` if a confirmation was pending, in
    /// which case the caller owns the answer.
    pub fn finish(&self, chat: GroupId, user: i64) -> bool {
        let removed = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(chat, user));
        match removed {
            Some(p) => {
                p.timer.cancel();
                true
            }
            None => false,
        }
    }
}
