//! Response registry: at most one priced response per request.

use std::sync::Arc;

use chrono::Utc;
use durable_store::DurableStore;
use tracing::info;

use crate::cas::{self, Mutation, Stored};
use crate::config::NegotiationConfig;
use crate::error::Result;
use crate::ledger::RequestLedger;
use crate::models::{QuoteDraft, Response};
use crate::validation::{validate_attachments, validate_quote};

fn response_key(request_id: &str) -> String {
    format!("responses/{}", request_id)
}

impl Stored for Response {
    fn check(&self) -> std::result::Result<(), String> {
        validate_attachments(&self.attachments).map_err(|err| err.to_string())
    }
}

/// Map from request id to its response.
#[derive(Clone)]
pub struct ResponseRegistry {
    store: Arc<dyn DurableStore>,
    ledger: RequestLedger,
    max_attempts: u32,
}

impl ResponseRegistry {
    pub fn new(store: Arc<dyn DurableStore>, ledger: RequestLedger, config: &NegotiationConfig) -> Self {
        Self {
            store,
            ledger,
            max_attempts: config.max_cas_attempts,
        }
    }

    /// Create or replace the response for a request, then mark the request
    /// responded.
    ///
    /// The status transition is re-attempted on every call, so a writer that
    /// stopped between the two writes is repaired by the next edit.
    pub fn put(&self, request_id: &str, draft: QuoteDraft) -> Result<Response> {
        validate_quote(&draft)?;

        let response = Response {
            request_id: request_id.to_string(),
            quote_amount: draft.quote_amount,
            timeline_text: draft.timeline_text.trim().to_string(),
            warranty_text: draft.warranty_text.trim().to_string(),
            description: draft.description.trim().to_string(),
            internal_notes: draft.internal_notes.trim().to_string(),
            attachments: draft.attachments,
            responded_at: Utc::now(),
        };

        let key = response_key(request_id);
        let created = cas::mutate(
            self.store.as_ref(),
            &key,
            self.max_attempts,
            |existing: Option<Response>| {
                if let Some(existing) = &existing {
                    cas::ensure_linked(&key, &existing.request_id, request_id)?;
                }
                Ok(Mutation::Write(response.clone(), existing.is_none()))
            },
        )?;

        self.ledger.mark_responded(request_id)?;

        if created {
            info!(request_id, quote = response.quote_amount, "Response posted");
        } else {
            info!(request_id, quote = response.quote_amount, "Response updated");
        }
        Ok(response)
    }

    /// Get the response for a request, including internal notes.
    pub fn get(&self, request_id: &str) -> Result<Option<Response>> {
        let key = response_key(request_id);
        match cas::load::<Response>(self.store.as_ref(), &key)? {
            Some((response, _)) => {
                cas::ensure_linked(&key, &response.request_id, request_id)?;
                Ok(Some(response))
            }
            None => Ok(None),
        }
    }
}
