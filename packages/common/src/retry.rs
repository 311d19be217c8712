use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::info;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A single failed processing attempt for a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryAttempt {
    /// 1-based attempt number.
    pub attempt: u8,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

impl RetryAttempt {
    pub fn new(attempt: u8, error: impl Into<String>) -> Self {
        Self {
            attempt,
            error: error.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Outcome of recording a failure.
#[derive(Debug, Clone)]
pub enum RetryDecision {
    Retry {
        attempt: u8,
        history: Vec<RetryAttempt>,
    },
    Exhausted {
        history: Vec<RetryAttempt>,
    },
}

#[derive(Debug, Clone)]
struct RetryState {
    attempt: u8,
    history: Vec<RetryAttempt>,
    last_updated: Instant,
}

impl RetryState {
    fn new() -> Self {
        Self {
            attempt: 0,
            history: Vec::new(),
            last_updated: Instant::now(),
        }
    }
}

/// Tracks in-handler retry state per message id (the submission id for
/// pipeline events). State is process-local; a redelivered message after a
/// crash starts with a fresh budget, which is fine under at-least-once.
#[derive(Debug, Default)]
pub struct RetryTracker {
    state: HashMap<String, RetryState>,
    max_retries: u8,
}

impl RetryTracker {
    pub fn new(max_retries: u8) -> Self {
        Self {
            state: HashMap::new(),
            max_retries,
        }
    }

    /// Record a failure. Returns `Exhausted` once the attempt count passes
    /// `max_retries`, clearing the entry.
    pub fn record_failure(&mut self, id: &str, error: &str) -> RetryDecision {
        let retry_state = self
            .state
            .entry(id.to_string())
            .or_insert_with(RetryState::new);

        retry_state.attempt += 1;
        retry_state.last_updated = Instant::now();
        retry_state
            .history
            .push(RetryAttempt::new(retry_state.attempt, error));

        if retry_state.attempt <= self.max_retries {
            RetryDecision::Retry {
                attempt: retry_state.attempt,
                history: retry_state.history.clone(),
            }
        } else {
            let final_history = retry_state.history.clone();
            self.state.remove(id);
            RetryDecision::Exhausted {
                history: final_history,
            }
        }
    }

    pub fn clear(&mut self, id: &str) {
        self.state.remove(id);
    }

    pub fn get_attempt(&self, id: &str) -> u8 {
        self.state.get(id).map(|s| s.attempt).unwrap_or(0)
    }

    /// Remove entries not updated within `max_age`.
    pub fn cleanup_stale(&mut self, max_age: Duration) {
        let now = Instant::now();
        self.state
            .retain(|_, state| now.duration_since(state.last_updated) < max_age);
    }

    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }
}

/// Exponential backoff with jitter: `min(base_ms * 2^(attempt-1) + jitter, max_ms)`
/// where jitter is 0-25% of the uncapped delay.
pub fn calculate_backoff(attempt: u8, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let exp_factor = 2u64.saturating_pow((attempt - 1) as u32);
    let delay_ms = base_ms.saturating_mul(exp_factor);

    let jitter = if delay_ms > 0 {
        rand::rng().random_range(0..=delay_ms / 4)
    } else {
        0
    };

    let total_delay = delay_ms.saturating_add(jitter).min(max_ms);
    Duration::from_millis(total_delay)
}

/// Clears a message's retry state on drop unless defused. Handlers defuse
/// after the terminal outcome (success or dead-letter) has cleaned up
/// explicitly; the guard covers early returns and panics.
pub struct RetryCleanupGuard<'a> {
    tracker: &'a Arc<Mutex<RetryTracker>>,
    message_id: String,
    defused: bool,
}

impl<'a> RetryCleanupGuard<'a> {
    pub fn new(tracker: &'a Arc<Mutex<RetryTracker>>, message_id: impl Into<String>) -> Self {
        Self {
            tracker,
            message_id: message_id.into(),
            defused: false,
        }
    }

    pub fn defuse(&mut self) {
        self.defused = true;
    }
}

impl Drop for RetryCleanupGuard<'_> {
    fn drop(&mut self) {
        if !self.defused {
            if let Ok(mut tracker) = self.tracker.try_lock() {
                tracker.clear(&self.message_id);
            }
        }
    }
}

/// Periodically evicts stale tracker entries so ids that never reached a
/// terminal state don't accumulate.
pub fn spawn_cleanup_task(
    tracker: Arc<Mutex<RetryTracker>>,
    cleanup_interval: Duration,
    max_age: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(cleanup_interval);

        loop {
            interval.tick().await;
            let removed = {
                let mut guard = tracker.lock().await;
                let before = guard.len();
                guard.cleanup_stale(max_age);
                before - guard.len()
            };
            if removed > 0 {
                info!(removed, "Cleaned up stale retry tracker entries");
            }
        }
    })
}
