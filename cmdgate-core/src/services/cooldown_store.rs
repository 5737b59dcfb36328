// File: cmdgate-core/src/services/cooldown_store.rs

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, trace};
use uuid::Uuid;

use cmdgate_common::traits::Clock;

use crate::utils::time::{add_std, remaining};

/// "Cooldown expires at" timestamps keyed by `(command, actor)`.
///
/// Expired entries are purged lazily on every lookup; there is no timer. Entries
/// survive disconnects so a relog within the cooldown does not reset it.
pub struct CooldownStore {
    entries: DashMap<(String, Uuid), DateTime<Utc>>,
    clock: Arc<dyn Clock>,
}

impl CooldownStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Remaining cooldown for this actor on this command, if any.
    pub fn is_on_cooldown(&self, command: &str, actor_id: Uuid) -> Option<Duration> {
        let now = self.clock.now();
        self.purge_expired(now);

        self.entries
            .get(&(command.to_string(), actor_id))
            .and_then(|expires_at| remaining(now, *expires_at.value()))
    }

    /// Inserts or overwrites the entry with `now + duration`. No-op for a zero duration.
    pub fn arm(&self, command: &str, actor_id: Uuid, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        let expires_at = add_std(self.clock.now(), duration);
        debug!(
            "Cooldown armed: command='{}', actor={}, expires_at={}",
            command, actor_id, expires_at
        );
        self.entries.insert((command.to_string(), actor_id), expires_at);
    }

    pub fn clear(&self, command: &str, actor_id: Uuid) -> bool {
        self.entries.remove(&(command.to_string(), actor_id)).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn purge_expired(&self, now: DateTime<Utc>) {
        let before = self.entries.len();
        self.entries.retain(|_, expires_at| *expires_at > now);
        let purged = before.saturating_sub(self.entries.len());
        if purged > 0 {
            trace!("Purged {} expired cooldown(s)", purged);
        }
    }
}
