//! Negotiation records.
//!
//! These are the stable shapes shared with the wizards and dashboards. Field
//! names serialize in camelCase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Service a request is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceCategory {
    Kitchen,
    Wardrobe,
    FullHome,
    Property,
}

impl ServiceCategory {
    /// All categories, in dashboard display order.
    pub const ALL: [ServiceCategory; 4] = [
        ServiceCategory::Kitchen,
        ServiceCategory::FullHome,
        ServiceCategory::Wardrobe,
        ServiceCategory::Property,
    ];

    /// Stable identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kitchen => "kitchen",
            Self::Wardrobe => "wardrobe",
            Self::FullHome => "full_home",
            Self::Property => "property",
        }
    }

    /// Human-readable label shown on dashboards.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Kitchen => "Kitchen Estimator",
            Self::Wardrobe => "Wardrobe Estimator",
            Self::FullHome => "Full Home Estimator",
            Self::Property => "Property Submission",
        }
    }

    /// Prefix used for request ids in this category.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Self::Property => "PROP",
            Self::Kitchen | Self::Wardrobe | Self::FullHome => "EST",
        }
    }

    /// Parse a category name, accepting `full_home`, `full-home` and `fullhome`
    /// in any case.
    pub fn parse(value: &str) -> Option<Self> {
        let normalized: String = value
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect();
        match normalized.as_str() {
            "kitchen" => Some(Self::Kitchen),
            "wardrobe" => Some(Self::Wardrobe),
            "fullhome" => Some(Self::FullHome),
            "property" => Some(Self::Property),
            _ => None,
        }
    }
}

/// Lifecycle status of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Waiting for a quote.
    Pending,
    /// A quote has been posted. Terminal.
    Responded,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Responded => "responded",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "responded" => Some(Self::Responded),
            _ => None,
        }
    }
}

/// Contact details captured by the wizard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerContact {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// A customer's service inquiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// Unique id, e.g. "EST-000042". Never reused.
    pub id: String,
    /// Stable identifier of the submitting customer.
    pub customer_id: String,
    pub category: ServiceCategory,
    pub description: String,
    /// Budget in whole currency units.
    pub budget_estimate: u64,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<CustomerContact>,
}

impl Request {
    /// Name to show for the customer, falling back to the customer id.
    pub fn display_name(&self) -> &str {
        self.contact
            .as_ref()
            .map(|contact| contact.name.as_str())
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.customer_id)
    }
}

/// A wizard submission, before an id and status are assigned.
///
/// Category and budget are optional here so that a half-filled wizard can be
/// rejected with a precise validation error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewRequest {
    pub customer_id: String,
    pub category: Option<ServiceCategory>,
    pub description: String,
    pub budget_estimate: Option<u64>,
    pub contact: Option<CustomerContact>,
}

impl NewRequest {
    /// A submission with the required fields filled in.
    pub fn new(
        customer_id: impl Into<String>,
        category: ServiceCategory,
        description: impl Into<String>,
        budget_estimate: u64,
    ) -> Self {
        Self {
            customer_id: customer_id.into(),
            category: Some(category),
            description: description.into(),
            budget_estimate: Some(budget_estimate),
            contact: None,
        }
    }

    /// Attach contact details.
    pub fn with_contact(mut self, contact: CustomerContact) -> Self {
        self.contact = Some(contact);
        self
    }
}

/// Reference to an uploaded file. The bytes live elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub name: String,
    /// MIME type, e.g. "image/png".
    pub media_type: String,
    /// Opaque locator (path, URL or data URI).
    pub reference: String,
}

impl Attachment {
    pub fn new(
        name: impl Into<String>,
        media_type: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            reference: reference.into(),
        }
    }

    pub fn is_image(&self) -> bool {
        self.media_type.trim().to_lowercase().starts_with("image/")
    }
}

/// The administrator's priced answer to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub request_id: String,
    pub quote_amount: u64,
    pub timeline_text: String,
    pub warranty_text: String,
    pub description: String,
    /// Visible only to the administrator.
    pub internal_notes: String,
    pub attachments: Vec<Attachment>,
    pub responded_at: DateTime<Utc>,
}

impl Response {
    /// Copy of this response as the customer may see it.
    pub fn for_customer(&self) -> Self {
        Self {
            internal_notes: String::new(),
            ..self.clone()
        }
    }
}

/// Contents of the admin quoting form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuoteDraft {
    pub quote_amount: u64,
    pub timeline_text: String,
    pub warranty_text: String,
    pub description: String,
    pub internal_notes: String,
    pub attachments: Vec<Attachment>,
}

/// Who wrote a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    Customer,
    Administrator,
    /// Synthetic sender used for the automatic acknowledgement.
    System,
}

impl Sender {
    /// The actor behind this sender, if it is a person.
    pub fn role(&self) -> Option<ActorRole> {
        match self {
            Self::Customer => Some(ActorRole::Customer),
            Self::Administrator => Some(ActorRole::Administrator),
            Self::System => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Administrator => "administrator",
            Self::System => "system",
        }
    }
}

/// One of the two parties of a negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Customer,
    Administrator,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        self.sender().as_str()
    }

    /// The sender value this role writes messages as.
    pub fn sender(&self) -> Sender {
        match self {
            Self::Customer => Sender::Customer,
            Self::Administrator => Sender::Administrator,
        }
    }

    /// Accepts "customer"/"user" and "administrator"/"admin".
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "customer" | "user" => Some(Self::Customer),
            "administrator" | "admin" => Some(Self::Administrator),
            _ => None,
        }
    }
}

impl From<ActorRole> for Sender {
    fn from(role: ActorRole) -> Self {
        role.sender()
    }
}

/// One entry in a request's negotiation thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Same as the request id.
    pub thread_id: String,
    pub sender: Sender,
    pub text: String,
    /// Position in the thread, starting at 1. The only ordering key.
    pub sequence: u64,
    /// Display time only. Clocks of the two actors may disagree.
    pub inserted_at: DateTime<Utc>,
}

/// How far an actor has read a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadState {
    pub thread_id: String,
    pub actor_role: ActorRole,
    pub last_seen_count: u64,
}
