//! Negotiation and fulfillment state for Quote Desk.
//!
//! This crate provides the [`NegotiationCoordinator`] type which tracks a
//! customer's service request from submission through a priced response and
//! the chat that follows, on top of any [`durable_store::DurableStore`].
//!
//! # Features
//!
//! - Request ledger with category-prefixed ids and a `pending -> responded`
//!   transition that happens exactly once
//! - One editable response per request, with internal notes hidden from the
//!   customer
//! - Per-request chat threads ordered by sequence number, with an automatic
//!   acknowledgement after the customer's first message
//! - Read receipts per thread and role, driving unread badges
//! - Dashboard aggregates that report corrupt records instead of failing
//!
//! # Architecture
//!
//! ```text
//! Wizards / quoting form / dashboards
//!          ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 NEGOTIATION COORDINATOR                     │
//! │                                                             │
//! │   RequestLedger      ResponseRegistry                       │
//! │   ChatThreadRegistry ReadReceiptTracker                     │
//! │         ↓                                                   │
//! │   cas::mutate (read, compute, write if version unchanged,   │
//! │                retry up to max_cas_attempts)                │
//! └─────────────────────────────────────────────────────────────┘
//!          ↓
//! DurableStore (SQLite file shared by both roles)
//! ```
//!
//! Every aggregate is one document under one key, so no operation needs more
//! than single-key atomicity. Writes that touch two keys (submission, posting
//! a response) are ordered so that a crash between them leaves a state the
//! next call repairs or ignores.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use durable_store::MemoryStore;
//! use negotiation::{ActorRole, NegotiationCoordinator, NewRequest, QuoteDraft, ServiceCategory};
//!
//! # fn main() -> negotiation::Result<()> {
//! let coordinator = NegotiationCoordinator::new(Arc::new(MemoryStore::new()));
//!
//! let id = coordinator.submit_request(NewRequest::new(
//!     "rajesh@example.com",
//!     ServiceCategory::Kitchen,
//!     "L-shaped modular kitchen",
//!     150_000,
//! ))?;
//!
//! coordinator.post_response(&id, QuoteDraft {
//!     quote_amount: 140_000,
//!     timeline_text: "30-45 working days".into(),
//!     warranty_text: "1 year".into(),
//!     description: "Modular cabinets with quartz top".into(),
//!     ..Default::default()
//! })?;
//!
//! coordinator.post_message(&id, ActorRole::Customer, "Can you do 130000?")?;
//! assert_eq!(coordinator.unread_badge(ActorRole::Administrator, [&id])?, 1);
//!
//! coordinator.view_thread(&id, ActorRole::Administrator)?;
//! assert_eq!(coordinator.unread_badge(ActorRole::Administrator, [&id])?, 0);
//! # Ok(())
//! # }
//! ```

mod cas;
mod chat;
mod config;
mod coordinator;
mod dashboard;
mod error;
mod ledger;
mod models;
mod receipts;
mod responses;
pub mod validation;

pub use chat::ChatThreadRegistry;
pub use config::{NegotiationConfig, DEFAULT_AUTO_REPLY_TEXT, DEFAULT_MAX_CAS_ATTEMPTS};
pub use coordinator::NegotiationCoordinator;
pub use dashboard::{
    BadgeReport, CategoryCount, CustomerDirectory, CustomerQuote, CustomerQuotes, CustomerSummary,
    DashboardSummary,
};
pub use error::{NegotiationError, Result};
pub use ledger::{RequestFilter, RequestIter, RequestLedger};
pub use models::{
    ActorRole, Attachment, ChatMessage, CustomerContact, NewRequest, QuoteDraft, ReadState,
    Request, RequestStatus, Response, Sender, ServiceCategory,
};
pub use receipts::{unread_in, ReadReceiptTracker};
pub use responses::ResponseRegistry;
pub use validation::ValidationError;
