//! Read receipts and unread counts.
//!
//! A receipt records how many messages of a thread an actor has seen. It is
//! a position in the whole thread, so a counterpart message is unread when its
//! sequence is beyond that position. The actor's own messages and system
//! messages never count.

use std::sync::Arc;

use durable_store::DurableStore;
use tracing::debug;

use crate::cas::{self, Mutation, Stored};
use crate::chat::ChatThreadRegistry;
use crate::config::NegotiationConfig;
use crate::error::Result;
use crate::models::{ActorRole, ChatMessage, ReadState, Sender};

fn receipt_key(thread_id: &str, role: ActorRole) -> String {
    format!("receipts/{}/{}", thread_id, role.as_str())
}

impl Stored for ReadState {}

/// Number of counterpart messages past `last_seen_count`.
pub fn unread_in(messages: &[ChatMessage], role: ActorRole, last_seen_count: u64) -> usize {
    messages
        .iter()
        .filter(|message| message.sender != Sender::System && message.sender != role.sender())
        .filter(|message| message.sequence > last_seen_count)
        .count()
}

/// Per-(thread, actor) read bookmarks.
#[derive(Clone)]
pub struct ReadReceiptTracker {
    store: Arc<dyn DurableStore>,
    threads: ChatThreadRegistry,
    max_attempts: u32,
}

impl ReadReceiptTracker {
    pub fn new(
        store: Arc<dyn DurableStore>,
        threads: ChatThreadRegistry,
        config: &NegotiationConfig,
    ) -> Self {
        Self {
            store,
            threads,
            max_attempts: config.max_cas_attempts,
        }
    }

    /// Record that `role` has seen every message currently in the thread.
    ///
    /// The stored position never moves backwards: if a concurrent view already
    /// recorded a later position, it is kept.
    pub fn mark_read(&self, thread_id: &str, role: ActorRole) -> Result<ReadState> {
        let seen = self.threads.message_count(thread_id)? as u64;
        let key = receipt_key(thread_id, role);

        let state = cas::mutate(
            self.store.as_ref(),
            &key,
            self.max_attempts,
            |current: Option<ReadState>| match current {
                Some(state) => {
                    self.ensure_receipt(&key, &state, thread_id, role)?;
                    if state.last_seen_count >= seen {
                        return Ok(Mutation::Keep(state));
                    }
                    let state = ReadState {
                        last_seen_count: seen,
                        ..state
                    };
                    Ok(Mutation::Write(state.clone(), state))
                }
                None => {
                    let state = ReadState {
                        thread_id: thread_id.to_string(),
                        actor_role: role,
                        last_seen_count: seen,
                    };
                    Ok(Mutation::Write(state.clone(), state))
                }
            },
        )?;

        debug!(
            thread_id,
            role = role.as_str(),
            last_seen = state.last_seen_count,
            "Thread marked read"
        );
        Ok(state)
    }

    pub fn read_state(&self, thread_id: &str, role: ActorRole) -> Result<Option<ReadState>> {
        let key = receipt_key(thread_id, role);
        match cas::load::<ReadState>(self.store.as_ref(), &key)? {
            Some((state, _)) => {
                self.ensure_receipt(&key, &state, thread_id, role)?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    /// Counterpart messages `role` has not seen yet.
    pub fn unread_count(&self, thread_id: &str, role: ActorRole) -> Result<usize> {
        // Receipt first: the thread only grows, so it can never be shorter
        // than a position recorded before it was read.
        let last_seen = self
            .read_state(thread_id, role)?
            .map(|state| state.last_seen_count)
            .unwrap_or(0);
        let messages = self.threads.list(thread_id)?;

        if last_seen > messages.len() as u64 {
            return Err(cas::corrupt(
                &receipt_key(thread_id, role),
                format!(
                    "last seen count {} exceeds thread length {}",
                    last_seen,
                    messages.len()
                ),
            ));
        }

        Ok(unread_in(&messages, role, last_seen))
    }

    fn ensure_receipt(
        &self,
        key: &str,
        state: &ReadState,
        thread_id: &str,
        role: ActorRole,
    ) -> Result<()> {
        cas::ensure_linked(key, &state.thread_id, thread_id)?;
        if state.actor_role != role {
            return Err(cas::corrupt(
                key,
                format!("receipt is for {}", state.actor_role.as_str()),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NegotiationError;
    use chrono::Utc;
    use durable_store::MemoryStore;

    fn setup() -> (Arc<MemoryStore>, ChatThreadRegistry, ReadReceiptTracker) {
        let store = Arc::new(MemoryStore::new());
        let config = NegotiationConfig::default();
        let threads = ChatThreadRegistry::new(store.clone(), &config);
        let tracker = ReadReceiptTracker::new(store.clone(), threads.clone(), &config);
        (store, threads, tracker)
    }

    fn message(sender: Sender, sequence: u64) -> ChatMessage {
        ChatMessage {
            thread_id: "EST-000001".to_string(),
            sender,
            text: "x".to_string(),
            sequence,
            inserted_at: Utc::now(),
        }
    }

    #[test]
    fn test_unread_in_ignores_own_and_system_messages() {
        let messages = vec![
            message(Sender::Customer, 1),
            message(Sender::System, 2),
            message(Sender::Administrator, 3),
            message(Sender::Customer, 4),
        ];

        assert_eq!(unread_in(&messages, ActorRole::Administrator, 0), 2);
        assert_eq!(unread_in(&messages, ActorRole::Customer, 0), 1);
        assert_eq!(unread_in(&messages, ActorRole::Customer, 3), 0);
        assert_eq!(unread_in(&messages, ActorRole::Administrator, 2), 1);
        assert_eq!(unread_in(&messages, ActorRole::Administrator, 4), 0);
    }

    #[test]
    fn test_unread_count_without_receipt() {
        let (_, threads, tracker) = setup();
        assert_eq!(tracker.unread_count("EST-000001", ActorRole::Customer).unwrap(), 0);

        threads
            .append("EST-000001", ActorRole::Customer, "Can you do 130000?")
            .unwrap();
        assert_eq!(
            tracker.unread_count("EST-000001", ActorRole::Administrator).unwrap(),
            1
        );
        assert_eq!(tracker.unread_count("EST-000001", ActorRole::Customer).unwrap(), 0);
        assert_eq!(tracker.read_state("EST-000001", ActorRole::Administrator).unwrap(), None);
    }

    #[test]
    fn test_mark_read_clears_unread() {
        let (_, threads, tracker) = setup();
        threads
            .append("EST-000001", ActorRole::Customer, "Hello")
            .unwrap();

        let state = tracker.mark_read("EST-000001", ActorRole::Administrator).unwrap();
        assert_eq!(state.last_seen_count, 2);
        assert_eq!(
            tracker.unread_count("EST-000001", ActorRole::Administrator).unwrap(),
            0
        );

        threads
            .append("EST-000001", ActorRole::Customer, "Still there?")
            .unwrap();
        assert_eq!(
            tracker.unread_count("EST-000001", ActorRole::Administrator).unwrap(),
            1
        );
    }

    #[test]
    fn test_mark_read_on_empty_thread_creates_receipt() {
        let (_, _, tracker) = setup();
        let state = tracker.mark_read("EST-000001", ActorRole::Customer).unwrap();
        assert_eq!(state.last_seen_count, 0);
        assert_eq!(
            tracker.read_state("EST-000001", ActorRole::Customer).unwrap(),
            Some(state)
        );
    }

    #[test]
    fn test_mark_read_never_lowers() {
        let (store, threads, tracker) = setup();
        threads
            .append("EST-000001", ActorRole::Administrator, "Quote is ready")
            .unwrap();

        // A receipt recorded further along by another process
        let ahead = ReadState {
            thread_id: "EST-000001".to_string(),
            actor_role: ActorRole::Customer,
            last_seen_count: 1,
        };
        store
            .set(
                "receipts/EST-000001/customer",
                &serde_json::to_vec(&ahead).unwrap(),
                None,
            )
            .unwrap();
        let before = store.get("receipts/EST-000001/customer").unwrap().unwrap().version;

        let state = tracker.mark_read("EST-000001", ActorRole::Customer).unwrap();
        assert_eq!(state, ahead);

        let after = store.get("receipts/EST-000001/customer").unwrap().unwrap().version;
        assert_eq!(before, after);
    }

    #[test]
    fn test_receipt_past_thread_end_is_corrupt() {
        let (store, _, tracker) = setup();
        let bogus = ReadState {
            thread_id: "EST-000001".to_string(),
            actor_role: ActorRole::Administrator,
            last_seen_count: 3,
        };
        store
            .set(
                "receipts/EST-000001/administrator",
                &serde_json::to_vec(&bogus).unwrap(),
                None,
            )
            .unwrap();

        let err = tracker
            .unread_count("EST-000001", ActorRole::Administrator)
            .unwrap_err();
        assert_eq!(err.corrupt_key(), Some("receipts/EST-000001/administrator"));
    }

    #[test]
    fn test_receipt_for_wrong_role_is_corrupt() {
        let (store, _, tracker) = setup();
        let misfiled = ReadState {
            thread_id: "EST-000001".to_string(),
            actor_role: ActorRole::Administrator,
            last_seen_count: 0,
        };
        store
            .set(
                "receipts/EST-000001/customer",
                &serde_json::to_vec(&misfiled).unwrap(),
                None,
            )
            .unwrap();

        assert!(matches!(
            tracker.read_state("EST-000001", ActorRole::Customer),
            Err(NegotiationError::CorruptState { .. })
        ));
    }
}
