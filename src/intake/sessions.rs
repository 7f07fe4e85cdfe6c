//! In-memory session store with per-user locking.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;

use crate::channels::UserId;

use super::state::SessionState;

/// Exclusive access to one user's session slot. `None` means no session.
pub type SessionGuard = OwnedMutexGuard<Option<SessionState>>;

/// Maps each applicant to their in-progress conversation.
///
/// Each user gets their own lock, held by a handler for its whole run, so two
/// events from the same user never interleave even if handlers run
/// concurrently.
#[derive(Default)]
pub struct SessionStore {
    slots: Mutex<HashMap<UserId, Arc<Mutex<Option<SessionState>>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock a user's session slot, creating an empty one if needed.
    pub async fn lock(&self, user_id: UserId) -> SessionGuard {
        let slot = {
            let mut slots = self.slots.lock().await;
            Arc::clone(slots.entry(user_id).or_default())
        };
        slot.lock_owned().await
    }

    /// Snapshot of a user's session.
    pub async fn get(&self, user_id: UserId) -> Option<SessionState> {
        let slot = {
            let slots = self.slots.lock().await;
            slots.get(&user_id).cloned()
        }?;
        let guard = slot.lock().await;
        guard.clone()
    }

    /// Number of users with a live session.
    pub async fn active_count(&self) -> usize {
        let slots: Vec<_> = self.slots.lock().await.values().cloned().collect();
        let mut count = 0;
        for slot in slots {
            if slot.lock().await.is_some() {
                count += 1;
            }
        }
        count
    }

    /// Drop sessions idle for longer than `max_idle`, plus empty slots.
    /// Slots held or about to be locked by a handler are left alone. Returns
    /// the number of live sessions dropped.
    pub async fn prune_idle(&self, max_idle: Duration, now: DateTime<Utc>) -> usize {
        let max_idle =
            chrono::Duration::from_std(max_idle).unwrap_or_else(|_| chrono::Duration::days(36_500));
        let mut pruned = 0;
        let mut slots = self.slots.lock().await;
        slots.retain(|_, slot| {
            // Another owner means `lock` or `get` has cloned the slot and may
            // be about to write to it.
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.try_lock() {
                Ok(guard) => match guard.as_ref() {
                    Some(session) if now - session.updated_at > max_idle => {
                        pruned += 1;
                        false
                    }
                    Some(_) => true,
                    None => false,
                },
                Err(_) => true,
            }
        });
        pruned
    }
}

/// Spawn a background task that prunes idle sessions on an interval.
pub fn spawn_pruning_task(
    store: Arc<SessionStore>,
    max_idle: Duration,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await; // Skip immediate first tick
        loop {
            interval.tick().await;
            let pruned = store.prune_idle(max_idle, Utc::now()).await;
            if pruned > 0 {
                tracing::info!(pruned, "Pruned idle intake sessions");
            }
        }
    })
}
