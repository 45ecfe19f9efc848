//! Dashboard aggregates.
//!
//! These read every request, so one corrupt record must not blank the whole
//! dashboard. Corrupt keys are collected and returned next to the figures.

use std::collections::HashMap;

use serde::Serialize;

use crate::coordinator::NegotiationCoordinator;
use crate::error::{NegotiationError, Result};
use crate::ledger::RequestFilter;
use crate::models::{ActorRole, Request, RequestStatus, Response, ServiceCategory};

/// Administrator overview figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_requests: usize,
    pub pending: usize,
    pub responded: usize,
    /// Responded share in percent, rounded to one decimal.
    pub conversion_rate: f64,
    pub total_budget: u64,
    pub by_category: Vec<CategoryCount>,
    /// Keys of records that could not be read.
    pub corrupt: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCount {
    pub category: ServiceCategory,
    pub label: &'static str,
    pub count: usize,
}

/// One row of the customers directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSummary {
    pub customer_id: String,
    pub name: String,
    pub request_count: usize,
    pub total_budget: u64,
    pub request_ids: Vec<String>,
}

/// Customers directory plus any requests that could not be read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDirectory {
    pub customers: Vec<CustomerSummary>,
    pub corrupt: Vec<String>,
}

/// A responded request together with the quote the customer may see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerQuote {
    pub request: Request,
    pub response: Response,
}

/// Quotes a customer has received plus any records that could not be read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerQuotes {
    pub quotes: Vec<CustomerQuote>,
    pub corrupt: Vec<String>,
}

/// Unread total plus any threads that could not be counted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeReport {
    pub count: usize,
    pub corrupt: Vec<String>,
}

/// Pass values through, divert corrupt-record errors into `corrupt`.
fn absorb<T>(result: Result<T>, corrupt: &mut Vec<String>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(NegotiationError::CorruptState { key, .. }) => {
            corrupt.push(key);
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

impl NegotiationCoordinator {
    fn readable_requests(&self, filter: RequestFilter) -> Result<(Vec<Request>, Vec<String>)> {
        let mut requests = Vec::new();
        let mut corrupt = Vec::new();
        for item in self.list_requests(filter)? {
            if let Some(request) = absorb(item, &mut corrupt)? {
                requests.push(request);
            }
        }
        Ok((requests, corrupt))
    }

    /// Totals for the administrator dashboard.
    pub fn summary(&self) -> Result<DashboardSummary> {
        let (requests, corrupt) = self.readable_requests(RequestFilter::default())?;

        let total_requests = requests.len();
        let responded = requests
            .iter()
            .filter(|request| request.status == RequestStatus::Responded)
            .count();
        let conversion_rate = if total_requests == 0 {
            0.0
        } else {
            round_one_decimal(responded as f64 * 100.0 / total_requests as f64)
        };

        let by_category = ServiceCategory::ALL
            .iter()
            .map(|category| CategoryCount {
                category: *category,
                label: category.label(),
                count: requests
                    .iter()
                    .filter(|request| request.category == *category)
                    .count(),
            })
            .collect();

        Ok(DashboardSummary {
            total_requests,
            pending: total_requests - responded,
            responded,
            conversion_rate,
            total_budget: requests.iter().map(|request| request.budget_estimate).sum(),
            by_category,
            corrupt,
        })
    }

    /// Customers grouped by id, in order of their first request.
    ///
    /// A corrupt request cannot be attributed to a customer, so its key is
    /// listed in `corrupt` instead.
    pub fn customers(&self) -> Result<CustomerDirectory> {
        let (requests, corrupt) = self.readable_requests(RequestFilter::default())?;

        let mut customers: Vec<CustomerSummary> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for request in requests {
            let position = *positions
                .entry(request.customer_id.clone())
                .or_insert_with(|| {
                    customers.push(CustomerSummary {
                        customer_id: request.customer_id.clone(),
                        name: request.display_name().to_string(),
                        request_count: 0,
                        total_budget: 0,
                        request_ids: Vec::new(),
                    });
                    customers.len() - 1
                });

            let customer = &mut customers[position];
            // Earlier submissions may have skipped the contact step
            if customer.name == customer.customer_id {
                customer.name = request.display_name().to_string();
            }
            customer.request_count += 1;
            customer.total_budget = customer.total_budget.saturating_add(request.budget_estimate);
            customer.request_ids.push(request.id);
        }

        Ok(CustomerDirectory { customers, corrupt })
    }

    /// Quotes a customer has received, without internal notes.
    pub fn customer_quotes(&self, customer_id: &str) -> Result<CustomerQuotes> {
        let filter = RequestFilter::default()
            .customer(customer_id)
            .status(RequestStatus::Responded);
        let (requests, mut corrupt) = self.readable_requests(filter)?;

        let mut quotes = Vec::new();
        for request in requests {
            let response = absorb(self.response_for(&request.id, ActorRole::Customer), &mut corrupt)?;
            if let Some(Some(response)) = response {
                quotes.push(CustomerQuote { request, response });
            }
        }
        Ok(CustomerQuotes { quotes, corrupt })
    }

    /// Unread messages for a customer across their requests.
    pub fn customer_badge(&self, customer_id: &str) -> Result<BadgeReport> {
        let (requests, corrupt) =
            self.readable_requests(RequestFilter::default().customer(customer_id))?;
        self.badge(ActorRole::Customer, &requests, corrupt)
    }

    /// Unread messages for the administrator across all requests.
    pub fn administrator_badge(&self) -> Result<BadgeReport> {
        let (requests, corrupt) = self.readable_requests(RequestFilter::default())?;
        self.badge(ActorRole::Administrator, &requests, corrupt)
    }

    fn badge(&self, role: ActorRole, requests: &[Request], mut corrupt: Vec<String>) -> Result<BadgeReport> {
        let mut count = 0;
        for request in requests {
            if let Some(unread) = absorb(self.unread_count(&request.id, role), &mut corrupt)? {
                count += unread;
            }
        }
        Ok(BadgeReport { count, corrupt })
    }
}
