//! Negotiation coordinator.
//!
//! The single entry point for the wizards, the quoting form and both
//! dashboards. It composes the ledger, the response registry, the chat
//! registry and the read-receipt tracker, and is the only layer that turns a
//! missing request into [`NegotiationError::NotFound`].

use std::sync::Arc;

use durable_store::DurableStore;

use crate::chat::ChatThreadRegistry;
use crate::config::NegotiationConfig;
use crate::error::{NegotiationError, Result};
use crate::ledger::{RequestFilter, RequestIter, RequestLedger};
use crate::models::{ActorRole, ChatMessage, NewRequest, QuoteDraft, Request, Response};
use crate::receipts::ReadReceiptTracker;
use crate::responses::ResponseRegistry;

/// Façade over the negotiation state.
#[derive(Clone)]
pub struct NegotiationCoordinator {
    config: NegotiationConfig,
    ledger: RequestLedger,
    responses: ResponseRegistry,
    threads: ChatThreadRegistry,
    receipts: ReadReceiptTracker,
}

impl NegotiationCoordinator {
    /// Create a coordinator with default settings.
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self::with_config(store, NegotiationConfig::default())
    }

    /// Create a coordinator with settings loaded from the environment.
    pub fn from_env(store: Arc<dyn DurableStore>) -> Self {
        Self::with_config(store, NegotiationConfig::from_env())
    }

    pub fn with_config(store: Arc<dyn DurableStore>, config: NegotiationConfig) -> Self {
        let ledger = RequestLedger::new(store.clone(), &config);
        let responses = ResponseRegistry::new(store.clone(), ledger.clone(), &config);
        let threads = ChatThreadRegistry::new(store.clone(), &config);
        let receipts = ReadReceiptTracker::new(store, threads.clone(), &config);

        Self {
            config,
            ledger,
            responses,
            threads,
            receipts,
        }
    }

    pub fn config(&self) -> &NegotiationConfig {
        &self.config
    }

    pub fn ledger(&self) -> &RequestLedger {
        &self.ledger
    }

    pub fn responses(&self) -> &ResponseRegistry {
        &self.responses
    }

    pub fn threads(&self) -> &ChatThreadRegistry {
        &self.threads
    }

    pub fn receipts(&self) -> &ReadReceiptTracker {
        &self.receipts
    }

    /// Submit a wizard result. Returns the new request id.
    pub fn submit_request(&self, new: NewRequest) -> Result<String> {
        Ok(self.ledger.create(new)?.id)
    }

    pub fn request(&self, request_id: &str) -> Result<Option<Request>> {
        self.ledger.get(request_id)
    }

    pub fn list_requests(&self, filter: RequestFilter) -> Result<RequestIter> {
        self.ledger.list(filter)
    }

    /// Post or edit the quote for an existing request.
    ///
    /// The first successful call moves the request to `responded`.
    pub fn post_response(&self, request_id: &str, draft: QuoteDraft) -> Result<Response> {
        self.require_request(request_id)?;
        self.responses.put(request_id, draft)
    }

    /// Response for a request as `role` may see it.
    pub fn response_for(&self, request_id: &str, role: ActorRole) -> Result<Option<Response>> {
        let response = self.responses.get(request_id)?;
        Ok(match role {
            ActorRole::Administrator => response,
            ActorRole::Customer => response.map(|response| response.for_customer()),
        })
    }

    /// Append a chat message to a request's thread.
    ///
    /// Returns the appended messages, including the automatic acknowledgement
    /// when one was injected.
    pub fn post_message(&self, request_id: &str, role: ActorRole, text: &str) -> Result<Vec<ChatMessage>> {
        self.require_request(request_id)?;
        self.threads.append(request_id, role, text)
    }

    /// Mark the thread read for `role`, then return it.
    pub fn view_thread(&self, request_id: &str, role: ActorRole) -> Result<Vec<ChatMessage>> {
        self.receipts.mark_read(request_id, role)?;
        self.threads.list(request_id)
    }

    pub fn unread_count(&self, request_id: &str, role: ActorRole) -> Result<usize> {
        self.receipts.unread_count(request_id, role)
    }

    /// Total unread messages for `role` over the given requests.
    pub fn unread_badge<I, S>(&self, role: ActorRole, request_ids: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        request_ids
            .into_iter()
            .try_fold(0, |total: usize, id| -> Result<usize> {
                Ok(total + self.receipts.unread_count(id.as_ref(), role)?)
            })
    }

    fn require_request(&self, request_id: &str) -> Result<Request> {
        self.ledger
            .get(request_id)?
            .ok_or_else(|| NegotiationError::NotFound {
                entity: "Request",
                id: request_id.to_string(),
            })
    }
}
