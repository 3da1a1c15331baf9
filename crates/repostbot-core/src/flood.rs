//! Per-actor rate limiting of bot actions.
//!
//! An actor may run a given action at most once per window. Suppressed
//! calls are not errors; the caller just skips the action.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

/// Source of the current time
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Clock frozen at `start`.
    #[must_use]
    pub const fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        let by = chrono::Duration::from_std(by).unwrap_or(chrono::Duration::MAX);
        if let Some(next) = now.checked_add_signed(by) {
            *now = next;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

type Track = HashMap<i64, HashMap<String, DateTime<Utc>>>;

/// Last successful call per actor and action
pub struct FloodGovernor {
    clock: Arc<dyn Clock>,
    track: Mutex<Track>,
}

impl Default for FloodGovernor {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl FloodGovernor {
    /// Governor reading time from `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            track: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `true` and records the call if `actor` has not run `action`
    /// within `window`. Every check also drops entries older than `window`.
    pub fn allow(&self, actor: i64, action: &str, window: Duration) -> bool {
        let now = self.clock.now();
        let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);
        let mut track = self.track.lock().unwrap_or_else(PoisonError::into_inner);

        track.retain(|_, actions| {
            actions.retain(|_, last| now.signed_duration_since(*last) < window);
            !actions.is_empty()
        });

        let actions = track.entry(actor).or_default();
        if actions.contains_key(action) {
            debug!(actor, action, "Anti-flood protection");
            return false;
        }
        actions.insert(action.to_string(), now);
        true
    }

    /// Number of actors with a live entry.
    #[must_use]
    pub fn tracked_actors(&self) -> usize {
        self.track
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
