//! Chat thread registry.
//!
//! Each request has one append-only thread stored as a single document under
//! `threads/{id}`. The registry assigns sequence numbers and injects the
//! automatic acknowledgement after a customer's first message.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use durable_store::DurableStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cas::{self, Mutation, Stored};
use crate::config::NegotiationConfig;
use crate::error::Result;
use crate::models::{ActorRole, ChatMessage, Sender};
use crate::validation::normalize_message;

pub(crate) fn thread_key(thread_id: &str) -> String {
    format!("threads/{}", thread_id)
}

/// Stored form of a thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatThread {
    thread_id: String,
    messages: Vec<ChatMessage>,
}

impl ChatThread {
    fn new(thread_id: &str) -> Self {
        Self {
            thread_id: thread_id.to_string(),
            messages: Vec::new(),
        }
    }

    fn has_customer_message(&self) -> bool {
        self.messages
            .iter()
            .any(|message| message.sender == Sender::Customer)
    }

    fn push(&mut self, sender: Sender, text: String, inserted_at: DateTime<Utc>) -> ChatMessage {
        let message = ChatMessage {
            thread_id: self.thread_id.clone(),
            sender,
            text,
            sequence: self.messages.len() as u64 + 1,
            inserted_at,
        };
        self.messages.push(message.clone());
        message
    }
}

impl Stored for ChatThread {
    fn check(&self) -> std::result::Result<(), String> {
        for (position, message) in self.messages.iter().enumerate() {
            let expected = position as u64 + 1;
            if message.sequence != expected {
                return Err(format!(
                    "message at position {} has sequence {}",
                    expected, message.sequence
                ));
            }
            if message.thread_id != self.thread_id {
                return Err(format!(
                    "message {} belongs to thread {}",
                    expected, message.thread_id
                ));
            }
        }
        Ok(())
    }
}

/// Map from request id to its negotiation thread.
#[derive(Clone)]
pub struct ChatThreadRegistry {
    store: Arc<dyn DurableStore>,
    max_attempts: u32,
    auto_reply_text: String,
}

impl ChatThreadRegistry {
    pub fn new(store: Arc<dyn DurableStore>, config: &NegotiationConfig) -> Self {
        Self {
            store,
            max_attempts: config.max_cas_attempts,
            auto_reply_text: config.auto_reply_text.clone(),
        }
    }

    /// Append a message and return what was added.
    ///
    /// If this is the first customer message in the thread, the system
    /// acknowledgement is appended right after it in the same write, and both
    /// are returned.
    pub fn append(&self, thread_id: &str, role: ActorRole, text: &str) -> Result<Vec<ChatMessage>> {
        let text = normalize_message(text)?;
        let key = thread_key(thread_id);

        let appended = cas::mutate(
            self.store.as_ref(),
            &key,
            self.max_attempts,
            |current: Option<ChatThread>| {
                let mut thread = match current {
                    Some(thread) => {
                        cas::ensure_linked(&key, &thread.thread_id, thread_id)?;
                        thread
                    }
                    None => ChatThread::new(thread_id),
                };

                // Derived from the thread itself so a retry re-evaluates it
                let acknowledge = role == ActorRole::Customer && !thread.has_customer_message();

                let now = Utc::now();
                let mut appended = vec![thread.push(role.sender(), text.clone(), now)];
                if acknowledge {
                    appended.push(thread.push(Sender::System, self.auto_reply_text.clone(), now));
                }
                Ok(Mutation::Write(thread, appended))
            },
        )?;

        debug!(
            thread_id,
            sender = role.as_str(),
            sequence = appended[0].sequence,
            "Message appended"
        );
        if appended.len() > 1 {
            info!(thread_id, "Auto-reply injected");
        }
        Ok(appended)
    }

    /// All messages of a thread in sequence order. An absent thread is empty.
    pub fn list(&self, thread_id: &str) -> Result<Vec<ChatMessage>> {
        let key = thread_key(thread_id);
        match cas::load::<ChatThread>(self.store.as_ref(), &key)? {
            Some((thread, _)) => {
                cas::ensure_linked(&key, &thread.thread_id, thread_id)?;
                Ok(thread.messages)
            }
            None => Ok(Vec::new()),
        }
    }

    pub fn message_count(&self, thread_id: &str) -> Result<usize> {
        Ok(self.list(thread_id)?.len())
    }
}
