//! Request ledger.
//!
//! Requests live under `ledger/requests/{id}`. The list of ids, in submission
//! order, lives in a separate `ledger/index` document together with the last
//! sequence number handed out, so ids are never reused.

use std::sync::Arc;

use chrono::Utc;
use durable_store::DurableStore;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cas::{self, Mutation, Stored};
use crate::config::NegotiationConfig;
use crate::error::Result;
use crate::models::{NewRequest, Request, RequestStatus};
use crate::validation::validate_new_request;

const INDEX_KEY: &str = "ledger/index";

fn request_key(id: &str) -> String {
    format!("ledger/requests/{}", id)
}

/// Submission order of every request ever created.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedgerIndex {
    last_sequence: u64,
    ids: Vec<String>,
}

impl Stored for LedgerIndex {
    fn check(&self) -> std::result::Result<(), String> {
        if self.ids.len() as u64 > self.last_sequence {
            return Err(format!(
                "{} ids but last sequence is {}",
                self.ids.len(),
                self.last_sequence
            ));
        }
        Ok(())
    }
}

impl Stored for Request {
    fn check(&self) -> std::result::Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("request has an empty id".to_string());
        }
        Ok(())
    }
}

/// CRUD over request records.
#[derive(Clone)]
pub struct RequestLedger {
    store: Arc<dyn DurableStore>,
    max_attempts: u32,
}

impl RequestLedger {
    pub fn new(store: Arc<dyn DurableStore>, config: &NegotiationConfig) -> Self {
        Self {
            store,
            max_attempts: config.max_cas_attempts,
        }
    }

    /// Validate a submission and store it as a new pending request.
    pub fn create(&self, new: NewRequest) -> Result<Request> {
        let (category, budget_estimate) = validate_new_request(&new)?;

        let id = cas::mutate(
            self.store.as_ref(),
            INDEX_KEY,
            self.max_attempts,
            |index: Option<LedgerIndex>| {
                let mut index = index.unwrap_or_default();
                index.last_sequence += 1;
                let id = format!("{}-{:06}", category.id_prefix(), index.last_sequence);
                index.ids.push(id.clone());
                Ok(Mutation::Write(index, id))
            },
        )?;

        let request = Request {
            id: id.clone(),
            customer_id: new.customer_id.trim().to_string(),
            category,
            description: new.description.trim().to_string(),
            budget_estimate,
            status: RequestStatus::Pending,
            created_at: Utc::now(),
            contact: new.contact,
        };

        let key = request_key(&id);
        cas::mutate(
            self.store.as_ref(),
            &key,
            self.max_attempts,
            |existing: Option<Request>| match existing {
                Some(_) => Err(cas::corrupt(&key, "request id already in use")),
                None => Ok(Mutation::Write(request.clone(), ())),
            },
        )?;

        info!(
            request_id = %id,
            category = category.as_str(),
            budget = budget_estimate,
            "Request submitted"
        );
        Ok(request)
    }

    /// Get a request by id. Absent is not an error.
    pub fn get(&self, id: &str) -> Result<Option<Request>> {
        let key = request_key(id);
        match cas::load::<Request>(self.store.as_ref(), &key)? {
            Some((request, _)) => {
                cas::ensure_linked(&key, &request.id, id)?;
                Ok(Some(request))
            }
            None => Ok(None),
        }
    }

    /// Move a request from pending to responded.
    ///
    /// Returns `true` only for the call that performed the transition. An
    /// absent or already responded request is left alone.
    pub fn mark_responded(&self, id: &str) -> Result<bool> {
        let key = request_key(id);
        let changed = cas::mutate(
            self.store.as_ref(),
            &key,
            self.max_attempts,
            |current: Option<Request>| {
                let Some(mut request) = current else {
                    return Ok(Mutation::Keep(false));
                };
                cas::ensure_linked(&key, &request.id, id)?;

                if request.status == RequestStatus::Responded {
                    return Ok(Mutation::Keep(false));
                }
                request.status = RequestStatus::Responded;
                Ok(Mutation::Write(request, true))
            },
        )?;

        if changed {
            info!(request_id = %id, "Request responded");
        }
        Ok(changed)
    }

    /// Ids of every request, in submission order.
    pub fn ids(&self) -> Result<Vec<String>> {
        Ok(cas::load::<LedgerIndex>(self.store.as_ref(), INDEX_KEY)?
            .map(|(index, _)| index.ids)
            .unwrap_or_default())
    }

    /// Iterate over requests matching `filter`, in submission order.
    ///
    /// The id list is read once up front. Each request is loaded when the
    /// iterator reaches it, so a corrupt record yields an error for that item
    /// only. Call again to restart.
    pub fn list(&self, filter: RequestFilter) -> Result<RequestIter> {
        Ok(RequestIter {
            ledger: self.clone(),
            ids: self.ids()?.into_iter(),
            filter,
        })
    }
}

/// Criteria for [`RequestLedger::list`]. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
    pub customer_id: Option<String>,
    /// Case-insensitive match on id, category label, description or
    /// customer name.
    pub text: Option<String>,
}

impl RequestFilter {
    pub fn status(mut self, status: RequestStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn customer(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn matches(&self, request: &Request) -> bool {
        if self.status.is_some_and(|status| status != request.status) {
            return false;
        }

        if let Some(customer_id) = &self.customer_id {
            if customer_id.trim() != request.customer_id {
                return false;
            }
        }

        match self.text.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(needle) => {
                let needle = needle.to_lowercase();
                [
                    request.id.as_str(),
                    request.category.label(),
                    request.description.as_str(),
                    request.display_name(),
                ]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
            }
        }
    }
}

/// Lazy iterator returned by [`RequestLedger::list`].
pub struct RequestIter {
    ledger: RequestLedger,
    ids: std::vec::IntoIter<String>,
    filter: RequestFilter,
}

impl Iterator for RequestIter {
    type Item = Result<Request>;

    fn next(&mut self) -> Option<Self::Item> {
        for id in self.ids.by_ref() {
            match self.ledger.get(&id) {
                Ok(Some(request)) if self.filter.matches(&request) => return Some(Ok(request)),
                // Reserved id whose record was never written, or filtered out
                Ok(_) => continue,
                Err(err) => return Some(Err(err)),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NegotiationError;
    use crate::models::{CustomerContact, ServiceCategory};
    use durable_store::MemoryStore;

    fn ledger() -> (Arc<MemoryStore>, RequestLedger) {
        let store = Arc::new(MemoryStore::new());
        let ledger = RequestLedger::new(store.clone(), &NegotiationConfig::default());
        (store, ledger)
    }

    fn kitchen(customer: &str) -> NewRequest {
        NewRequest::new(customer, ServiceCategory::Kitchen, "L-shaped kitchen", 150_000)
    }

    #[test]
    fn test_create_assigns_prefixed_sequential_ids() {
        let (_, ledger) = ledger();

        let first = ledger.create(kitchen("rajesh")).unwrap();
        let second = ledger
            .create(NewRequest::new("anita", ServiceCategory::Property, "2BHK flat", 9_000_000))
            .unwrap();

        assert_eq!(first.id, "EST-000001");
        assert_eq!(second.id, "PROP-000002");
        assert_eq!(first.status, RequestStatus::Pending);
        assert_eq!(ledger.ids().unwrap(), vec!["EST-000001", "PROP-000002"]);
    }

    #[test]
    fn test_create_rejects_invalid_submission() {
        let (_, ledger) = ledger();
        let request = NewRequest {
            budget_estimate: Some(0),
            ..kitchen("rajesh")
        };
        assert!(matches!(
            ledger.create(request),
            Err(NegotiationError::Validation(_))
        ));
        assert!(ledger.ids().unwrap().is_empty());
    }

    #[test]
    fn test_get_absent_is_none() {
        let (_, ledger) = ledger();
        assert_eq!(ledger.get("EST-000099").unwrap(), None);
    }

    #[test]
    fn test_mark_responded_is_idempotent() {
        let (_, ledger) = ledger();
        let request = ledger.create(kitchen("rajesh")).unwrap();

        assert!(ledger.mark_responded(&request.id).unwrap());
        assert!(!ledger.mark_responded(&request.id).unwrap());
        assert!(!ledger.mark_responded("EST-404404").unwrap());

        let stored = ledger.get(&request.id).unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::Responded);
    }

    #[test]
    fn test_get_detects_misfiled_record() {
        let (store, ledger) = ledger();
        let request = ledger.create(kitchen("rajesh")).unwrap();

        let bytes = serde_json::to_vec(&request).unwrap();
        store.set("ledger/requests/EST-000777", &bytes, None).unwrap();

        assert!(matches!(
            ledger.get("EST-000777"),
            Err(NegotiationError::CorruptState { .. })
        ));
    }

    #[test]
    fn test_list_filters() {
        let (_, ledger) = ledger();
        let a = ledger
            .create(kitchen("rajesh").with_contact(CustomerContact {
                name: "Rajesh Kumar".to_string(),
                email: "rajesh@example.com".to_string(),
                phone: None,
                address: None,
            }))
            .unwrap();
        let b = ledger
            .create(NewRequest::new("anita", ServiceCategory::Wardrobe, "Sliding wardrobe", 60_000))
            .unwrap();
        ledger.mark_responded(&b.id).unwrap();

        let all: Vec<_> = ledger
            .list(RequestFilter::default())
            .unwrap()
            .map(|r| r.unwrap().id)
            .collect();
        assert_eq!(all, vec![a.id.clone(), b.id.clone()]);

        let pending: Vec<_> = ledger
            .list(RequestFilter::default().status(RequestStatus::Pending))
            .unwrap()
            .map(|r| r.unwrap().id)
            .collect();
        assert_eq!(pending, vec![a.id.clone()]);

        let by_name: Vec<_> = ledger
            .list(RequestFilter::default().text("kumar"))
            .unwrap()
            .map(|r| r.unwrap().id)
            .collect();
        assert_eq!(by_name, vec![a.id.clone()]);

        let by_label: Vec<_> = ledger
            .list(RequestFilter::default().text("WARDROBE estimator"))
            .unwrap()
            .map(|r| r.unwrap().id)
            .collect();
        assert_eq!(by_label, vec![b.id.clone()]);

        let by_customer = ledger
            .list(RequestFilter::default().customer("anita"))
            .unwrap()
            .count();
        assert_eq!(by_customer, 1);
    }

    #[test]
    fn test_list_yields_corrupt_entry_and_continues() {
        let (store, ledger) = ledger();
        let a = ledger.create(kitchen("rajesh")).unwrap();
        let b = ledger.create(kitchen("anita")).unwrap();

        let key = format!("ledger/requests/{}", a.id);
        let version = store.get(&key).unwrap().unwrap().version;
        store.set(&key, b"{\"id\":", Some(version)).unwrap();

        let items: Vec<_> = ledger.list(RequestFilter::default()).unwrap().collect();
        assert_eq!(items.len(), 2);
        assert_eq!(
            items[0].as_ref().unwrap_err().corrupt_key(),
            Some(key.as_str())
        );
        assert_eq!(items[1].as_ref().unwrap().id, b.id);
    }

    #[test]
    fn test_list_skips_reserved_ids_without_record() {
        let (store, ledger) = ledger();
        let a = ledger.create(kitchen("rajesh")).unwrap();
        store.delete(&format!("ledger/requests/{}", a.id)).unwrap();

        assert_eq!(ledger.list(RequestFilter::default()).unwrap().count(), 0);

        // The sequence keeps counting past the orphaned id
        let b = ledger.create(kitchen("rajesh")).unwrap();
        assert_eq!(b.id, "EST-000002");
    }
}
