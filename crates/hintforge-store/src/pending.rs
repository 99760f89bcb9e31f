//! Durable queue of hint requests made while disconnected.
//!
//! A solved puzzle earns a hint whether or not the client is online. When
//! it is not, the fully built request is queued here, tagged with the slot
//! name and password it was made for, and persisted at once. After the
//! next successful connect the supervisor calls
//! [`PendingHintQueue::dispatch_all`] to send it.

use std::sync::Arc;

use hintforge_protocol::ClientCommand;
use serde::{Deserialize, Serialize};

use crate::{KeyValueStore, StoreError};

/// Key/value key the queue is persisted under.
pub const PENDING_HINTS_KEY: &str = "pending_hints";

/// What happens to entries that did not match the session during a
/// dispatch pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeftoverPolicy {
    /// Clear the whole queue after every pass, sent or not.
    #[default]
    Discard,
    /// Keep entries that were not sent for a later, matching session.
    Retain,
}

/// A queued hint request and the credentials it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingHint {
    pub command: ClientCommand,
    pub slot_name: String,
    pub password: String,
}

impl PendingHint {
    fn matches(&self, slot_name: &str, password: &str) -> bool {
        self.slot_name == slot_name && self.password == password
    }
}

/// Counts from one dispatch pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub sent: usize,
    /// Entries whose tag did not match the session.
    pub skipped: usize,
    /// Matching entries the send callback rejected.
    pub failed: usize,
    /// Entries still queued after the pass.
    pub remaining: usize,
}

pub struct PendingHintQueue {
    entries: Vec<PendingHint>,
    store: Arc<dyn KeyValueStore>,
    policy: LeftoverPolicy,
}

impl std::fmt::Debug for PendingHintQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingHintQueue")
            .field("entries", &self.entries)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl PendingHintQueue {
    /// Reads the queue back from `store`.
    ///
    /// An unparseable stored queue is logged and replaced by an empty one.
    pub fn load(store: Arc<dyn KeyValueStore>, policy: LeftoverPolicy) -> Self {
        let entries = match store.get(PENDING_HINTS_KEY) {
            None => Vec::new(),
            Some(raw) => match serde_json::from_str::<Vec<PendingHint>>(&raw) {
                Ok(entries) => {
                    if !entries.is_empty() {
                        tracing::info!(pending = entries.len(), "restored pending hints");
                    }
                    entries
                }
                Err(error) => {
                    tracing::warn!(%error, "discarding unreadable pending hints");
                    Vec::new()
                }
            },
        };
        Self {
            entries,
            store,
            policy,
        }
    }

    /// Appends a request and persists the queue.
    ///
    /// The entry stays queued in memory even if persisting fails.
    ///
    /// # Errors
    /// Returns the store error if the queue could not be written.
    pub fn enqueue(
        &mut self,
        command: ClientCommand,
        slot_name: &str,
        password: &str,
    ) -> Result<(), StoreError> {
        tracing::debug!(cmd = command.name(), slot = slot_name, "queued hint request");
        self.entries.push(PendingHint {
            command,
            slot_name: slot_name.to_owned(),
            password: password.to_owned(),
        });
        self.save()
    }

    /// Sends every entry tagged with `slot_name`/`password` through `send`,
    /// in queue order.
    ///
    /// Entries with another tag are never passed to `send`. What remains
    /// queued afterwards depends on the [`LeftoverPolicy`]: `Discard`
    /// empties the queue, `Retain` keeps the skipped and failed entries in
    /// their original relative order.
    ///
    /// # Errors
    /// Returns the store error if the updated queue could not be written.
    /// The in-memory queue is already updated at that point.
    pub fn dispatch_all<F, E>(
        &mut self,
        slot_name: &str,
        password: &str,
        mut send: F,
    ) -> Result<DispatchSummary, StoreError>
    where
        F: FnMut(&ClientCommand) -> Result<(), E>,
        E: std::fmt::Display,
    {
        let mut summary = DispatchSummary::default();
        let mut kept = Vec::new();

        for entry in std::mem::take(&mut self.entries) {
            if !entry.matches(slot_name, password) {
                tracing::debug!(slot = %entry.slot_name, "skipping pending hint for another slot");
                summary.skipped += 1;
                kept.push(entry);
                continue;
            }
            match send(&entry.command) {
                Ok(()) => summary.sent += 1,
                Err(error) => {
                    tracing::warn!(%error, "failed to send pending hint");
                    summary.failed += 1;
                    kept.push(entry);
                }
            }
        }

        if self.policy == LeftoverPolicy::Retain {
            self.entries = kept;
        } else if !kept.is_empty() {
            tracing::warn!(dropped = kept.len(), "clearing unsent pending hints");
        }
        summary.remaining = self.entries.len();
        self.save()?;
        Ok(summary)
    }

    fn save(&self) -> Result<(), StoreError> {
        if self.entries.is_empty() {
            return self.store.remove(PENDING_HINTS_KEY);
        }
        let raw = serde_json::to_string(&self.entries).map_err(StoreError::Serialize)?;
        self.store.set(PENDING_HINTS_KEY, &raw)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[PendingHint] {
        &self.entries
    }

    pub fn policy(&self) -> LeftoverPolicy {
        self.policy
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use hintforge_protocol::SlotAuth;

    use super::*;
    use crate::MemoryStore;

    fn scout(location: i64, slot: &str, password: &str) -> ClientCommand {
        ClientCommand::LocationScouts {
            locations: vec![location],
            create_as_hint: 1,
            auth: SlotAuth::new(slot, password),
        }
    }

    fn queue(policy: LeftoverPolicy) -> (PendingHintQueue, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (PendingHintQueue::load(store.clone(), policy), store)
    }

    fn scouted(cmd: &ClientCommand) -> i64 {
        match cmd {
            ClientCommand::LocationScouts { locations, .. } => locations[0],
            other => panic!("unexpected command {}", other.name()),
        }
    }

    #[test]
    fn test_enqueue_persists_immediately() {
        let (mut q, store) = queue(LeftoverPolicy::Discard);
        q.enqueue(scout(5, "Alice", "pw"), "Alice", "pw").unwrap();

        let raw = store.get(PENDING_HINTS_KEY).unwrap();
        let stored: Vec<PendingHint> = serde_json::from_str(&raw).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].slot_name, "Alice");
    }

    #[test]
    fn test_load_restores_queue_from_store() {
        let (mut q, store) = queue(LeftoverPolicy::Discard);
        q.enqueue(scout(5, "Alice", "pw"), "Alice", "pw").unwrap();
        q.enqueue(scout(6, "Alice", "pw"), "Alice", "pw").unwrap();

        let restored = PendingHintQueue::load(store, LeftoverPolicy::Discard);
        assert_eq!(restored.len(), 2);
        assert_eq!(scouted(&restored.entries()[1].command), 6);
    }

    #[test]
    fn test_load_unreadable_queue_starts_empty() {
        let store = Arc::new(MemoryStore::new());
        store.set(PENDING_HINTS_KEY, "[{oops").unwrap();
        let q = PendingHintQueue::load(store, LeftoverPolicy::Discard);
        assert!(q.is_empty());
    }

    // =====================================================================
    // dispatch_all
    // =====================================================================

    #[test]
    fn test_dispatch_all_sends_only_matching_entries() {
        let (mut q, _store) = queue(LeftoverPolicy::Discard);
        q.enqueue(scout(1, "Alice", "pw"), "Alice", "pw").unwrap();
        q.enqueue(scout(2, "Bob", "pw"), "Bob", "pw").unwrap();
        q.enqueue(scout(3, "Alice", "other"), "Alice", "other").unwrap();
        q.enqueue(scout(4, "Alice", "pw"), "Alice", "pw").unwrap();

        let mut sent = Vec::new();
        let summary = q
            .dispatch_all("Alice", "pw", |cmd| {
                sent.push(scouted(cmd));
                Ok::<(), String>(())
            })
            .unwrap();

        assert_eq!(sent, vec![1, 4]);
        assert_eq!(summary.sent, 2);
        assert_eq!(summary.skipped, 2);
    }

    #[test]
    fn test_dispatch_all_discard_clears_everything() {
        let (mut q, store) = queue(LeftoverPolicy::Discard);
        q.enqueue(scout(1, "Alice", "pw"), "Alice", "pw").unwrap();
        q.enqueue(scout(2, "Bob", "pw"), "Bob", "pw").unwrap();

        let summary = q
            .dispatch_all("Alice", "pw", |_| Ok::<(), String>(()))
            .unwrap();

        assert_eq!(summary.remaining, 0);
        assert!(q.is_empty());
        assert_eq!(store.get(PENDING_HINTS_KEY), None);
    }

    #[test]
    fn test_dispatch_all_retain_keeps_unsent_in_order() {
        let (mut q, store) = queue(LeftoverPolicy::Retain);
        q.enqueue(scout(1, "Bob", "pw"), "Bob", "pw").unwrap();
        q.enqueue(scout(2, "Alice", "pw"), "Alice", "pw").unwrap();
        q.enqueue(scout(3, "Alice", "pw"), "Alice", "pw").unwrap();
        q.enqueue(scout(4, "Carol", "pw"), "Carol", "pw").unwrap();

        // Location 3 fails to send and must stay queued.
        let summary = q
            .dispatch_all("Alice", "pw", |cmd| {
                if scouted(cmd) == 3 {
                    Err("socket gone")
                } else {
                    Ok(())
                }
            })
            .unwrap();

        assert_eq!(summary.sent, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.remaining, 3);
        let left: Vec<i64> =
            q.entries().iter().map(|e| scouted(&e.command)).collect();
        assert_eq!(left, vec![1, 3, 4]);

        let restored = PendingHintQueue::load(store, LeftoverPolicy::Retain);
        assert_eq!(restored.len(), 3);
    }

    #[test]
    fn test_dispatch_all_empty_queue_sends_nothing() {
        let (mut q, _store) = queue(LeftoverPolicy::Discard);
        let summary = q
            .dispatch_all("Alice", "pw", |_| -> Result<(), String> {
                panic!("nothing to send")
            })
            .unwrap();
        assert_eq!(summary, DispatchSummary::default());
    }

    #[test]
    fn test_leftover_policy_serde_names() {
        assert_eq!(
            serde_json::to_string(&LeftoverPolicy::Retain).unwrap(),
            "\"retain\""
        );
        assert_eq!(LeftoverPolicy::default(), LeftoverPolicy::Discard);
    }
}
