//! Input validation for submissions, quotes and chat messages.

use std::fmt;

use crate::models::{Attachment, NewRequest, QuoteDraft, ServiceCategory};

/// Validation error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field was not provided.
    Missing(String),
    /// Empty value where one is required.
    Empty(String),
    /// Value too long.
    TooLong { field: String, max: usize, actual: usize },
    /// Amount must be greater than zero.
    NotPositive(String),
    /// More attachments than a response may carry.
    TooManyAttachments { max: usize, actual: usize },
    /// Attachment is not an image.
    NotAnImage { name: String, media_type: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Missing(field) => write!(f, "{} is required", field),
            ValidationError::Empty(field) => write!(f, "{} cannot be empty", field),
            ValidationError::TooLong { field, max, actual } => {
                write!(f, "{} is too long ({} chars, max {})", field, actual, max)
            }
            ValidationError::NotPositive(field) => write!(f, "{} must be greater than zero", field),
            ValidationError::TooManyAttachments { max, actual } => {
                write!(f, "Max {} images allowed ({} given)", max, actual)
            }
            ValidationError::NotAnImage { name, media_type } => {
                write!(f, "Only images allowed: {} is {}", name, media_type)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Maximum number of attachments on a response.
pub const MAX_ATTACHMENTS: usize = 5;

/// Maximum length of a chat message.
pub const MAX_MESSAGE_LENGTH: usize = 4000;

/// Maximum length of a request or quote description.
pub const MAX_DESCRIPTION_LENGTH: usize = 8000;

/// Validate a wizard submission.
///
/// Returns the category and budget, which are known to be present afterwards.
pub fn validate_new_request(request: &NewRequest) -> Result<(ServiceCategory, u64), ValidationError> {
    require_text("customer id", &request.customer_id, 256)?;

    let category = request
        .category
        .ok_or_else(|| ValidationError::Missing("category".to_string()))?;

    let budget = match request.budget_estimate {
        None | Some(0) => return Err(ValidationError::Missing("budget estimate".to_string())),
        Some(budget) => budget,
    };

    require_text("description", &request.description, MAX_DESCRIPTION_LENGTH)?;

    if let Some(contact) = &request.contact {
        require_text("contact name", &contact.name, 256)?;
        require_text("contact email", &contact.email, 254)?;
    }

    Ok((category, budget))
}

/// Validate the admin quoting form.
pub fn validate_quote(draft: &QuoteDraft) -> Result<(), ValidationError> {
    if draft.quote_amount == 0 {
        return Err(ValidationError::NotPositive("quote amount".to_string()));
    }
    require_text("timeline", &draft.timeline_text, 512)?;
    require_text("warranty", &draft.warranty_text, 512)?;
    require_text("description", &draft.description, MAX_DESCRIPTION_LENGTH)?;
    validate_attachments(&draft.attachments)
}

/// At most [`MAX_ATTACHMENTS`], all image-typed.
pub fn validate_attachments(attachments: &[Attachment]) -> Result<(), ValidationError> {
    if attachments.len() > MAX_ATTACHMENTS {
        return Err(ValidationError::TooManyAttachments {
            max: MAX_ATTACHMENTS,
            actual: attachments.len(),
        });
    }

    if let Some(bad) = attachments.iter().find(|attachment| !attachment.is_image()) {
        return Err(ValidationError::NotAnImage {
            name: bad.name.clone(),
            media_type: bad.media_type.clone(),
        });
    }

    Ok(())
}

/// Trim a chat message and check it is sendable.
pub fn normalize_message(text: &str) -> Result<String, ValidationError> {
    let text = text.trim();
    require_text("message", text, MAX_MESSAGE_LENGTH)?;
    Ok(text.to_string())
}

fn require_text(field: &str, value: &str, max: usize) -> Result<(), ValidationError> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Empty(field.to_string()));
    }

    let length = value.chars().count();
    if length > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
            actual: length,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CustomerContact;

    fn kitchen() -> NewRequest {
        NewRequest::new("rajesh@example.com", ServiceCategory::Kitchen, "L-shaped kitchen", 150_000)
    }

    fn quote() -> QuoteDraft {
        QuoteDraft {
            quote_amount: 140_000,
            timeline_text: "30-45 working days".to_string(),
            warranty_text: "1 year on labor".to_string(),
            description: "Modular cabinets, quartz top".to_string(),
            internal_notes: String::new(),
            attachments: vec![],
        }
    }

    #[test]
    fn test_validate_new_request_valid() {
        assert_eq!(
            validate_new_request(&kitchen()),
            Ok((ServiceCategory::Kitchen, 150_000))
        );
    }

    #[test]
    fn test_validate_new_request_missing_fields() {
        let request = NewRequest {
            category: None,
            ..kitchen()
        };
        assert_eq!(
            validate_new_request(&request),
            Err(ValidationError::Missing("category".to_string()))
        );

        let request = NewRequest {
            budget_estimate: None,
            ..kitchen()
        };
        assert!(matches!(
            validate_new_request(&request),
            Err(ValidationError::Missing(_))
        ));

        // Zero budget is as good as none
        let request = NewRequest {
            budget_estimate: Some(0),
            ..kitchen()
        };
        assert!(matches!(
            validate_new_request(&request),
            Err(ValidationError::Missing(_))
        ));

        let request = NewRequest {
            customer_id: "  ".to_string(),
            ..kitchen()
        };
        assert!(matches!(
            validate_new_request(&request),
            Err(ValidationError::Empty(_))
        ));
    }

    #[test]
    fn test_validate_new_request_contact() {
        let request = kitchen().with_contact(CustomerContact {
            name: String::new(),
            email: "rajesh@example.com".to_string(),
            phone: None,
            address: None,
        });
        assert_eq!(
            validate_new_request(&request),
            Err(ValidationError::Empty("contact name".to_string()))
        );
    }

    #[test]
    fn test_validate_quote() {
        assert!(validate_quote(&quote()).is_ok());

        let draft = QuoteDraft {
            quote_amount: 0,
            ..quote()
        };
        assert!(matches!(
            validate_quote(&draft),
            Err(ValidationError::NotPositive(_))
        ));

        let draft = QuoteDraft {
            warranty_text: " ".to_string(),
            ..quote()
        };
        assert_eq!(
            validate_quote(&draft),
            Err(ValidationError::Empty("warranty".to_string()))
        );
    }

    #[test]
    fn test_validate_attachments() {
        let image = Attachment::new("ref.png", "image/png", "uploads/ref.png");
        assert!(validate_attachments(&vec![image.clone(); 5]).is_ok());

        assert_eq!(
            validate_attachments(&vec![image.clone(); 6]),
            Err(ValidationError::TooManyAttachments { max: 5, actual: 6 })
        );

        let pdf = Attachment::new("plan.pdf", "application/pdf", "uploads/plan.pdf");
        assert!(matches!(
            validate_attachments(&[image, pdf]),
            Err(ValidationError::NotAnImage { .. })
        ));
    }

    #[test]
    fn test_normalize_message() {
        assert_eq!(normalize_message("  Can you do 130000?\n"), Ok("Can you do 130000?".to_string()));
        assert!(matches!(normalize_message("   "), Err(ValidationError::Empty(_))));

        let long = "a".repeat(MAX_MESSAGE_LENGTH + 1);
        assert!(matches!(
            normalize_message(&long),
            Err(ValidationError::TooLong { .. })
        ));
    }

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::TooManyAttachments { max: 5, actual: 7 };
        assert_eq!(err.to_string(), "Max 5 images allowed (7 given)");

        let err = ValidationError::Missing("category".to_string());
        assert_eq!(err.to_string(), "category is required");
    }
}
