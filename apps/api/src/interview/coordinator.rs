//! Turn Coordinator: single-flight + minimum-gap throttle per interview session.
//!
//! Guarantees, within one process:
//! - at most one provider call in flight per session id;
//! - successive successful calls for a session start at least `min_gap` apart.
//!
//! Waiters queue on a per-session async mutex (FIFO), so there is no polling.
//! The lock is released when the guard drops, including on error, panic, or
//! when the request future is cancelled. Failed calls do not move the
//! throttle window.
//!
//! State is process-local. Running several API instances allows overlapping
//! calls for the same session across instances.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::debug;

use super::timing::remaining;

/// Map size above which idle sessions are evicted.
const EVICT_THRESHOLD: usize = 1024;
/// A session untouched for this long has no throttle state worth keeping.
const IDLE_TTL: Duration = Duration::from_secs(600);

#[derive(Default)]
struct Slot {
    last_invoked: Option<Instant>,
}

#[derive(Clone, Default)]
pub struct TurnCoordinator {
    slots: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<Slot>>>>>,
}

impl TurnCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `call` once the session's previous call has finished and at least
    /// `min_gap` has passed since its last successful call started.
    pub async fn run<F, Fut, T, E>(&self, key: &str, min_gap: Duration, call: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let slot = self.slot(key);
        let mut guard = slot.lock().await;

        if let Some(last) = guard.last_invoked {
            let wait = remaining(last, Instant::now(), min_gap);
            if !wait.is_zero() {
                debug!("Throttling turn for session {key}: waiting {}ms", wait.as_millis());
                sleep(wait).await;
            }
        }

        let started = Instant::now();
        let result = call().await;
        if result.is_ok() {
            guard.last_invoked = Some(started);
        }
        result
    }

    fn slot(&self, key: &str) -> Arc<tokio::sync::Mutex<Slot>> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        if slots.len() > EVICT_THRESHOLD {
            evict_idle(&mut slots);
        }
        slots.entry(key.to_string()).or_default().clone()
    }

    #[cfg(test)]
    fn tracked_sessions(&self) -> usize {
        self.slots.lock().unwrap().len()
    }
}

/// Drops slots nobody holds or waits on and whose last call is older than `IDLE_TTL`.
fn evict_idle(slots: &mut HashMap<String, Arc<tokio::sync::Mutex<Slot>>>) {
    let now = Instant::now();
    slots.retain(|_, slot| {
        if Arc::strong_count(slot) > 1 {
            return true;
        }
        match slot.try_lock() {
            Ok(s) => s
                .last_invoked
                .is_some_and(|last| now.saturating_duration_since(last) < IDLE_TTL),
            Err(_) => true,
        }
    });
}
