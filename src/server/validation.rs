use chrono::{DateTime, Utc};

use crate::server::dto::{CustomerPayload, LeadPayload};
use crate::server::response::ApiError;
use crate::types::{LeadPriority, LeadStatus};

/// Customer payload after validation: trimmed, with optional fields
/// defaulted to empty.
#[derive(Debug)]
pub struct ValidCustomer {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub company: String,
}

/// Lead creation payload after validation, with defaults applied.
#[derive(Debug)]
pub struct ValidLead {
    pub customer_id: String,
    pub title: String,
    pub description: String,
    pub status: LeadStatus,
    pub value: f64,
    pub priority: LeadPriority,
    pub source: String,
    pub assigned_to: String,
    pub notes: String,
    pub tags: Vec<String>,
    pub expected_close_date: Option<DateTime<Utc>>,
}

/// Validated partial update for a lead: `None` means the field was not
/// supplied and stays untouched. `customer_id` is carried only so the
/// handler can re-check ownership; the stored reference never changes.
#[derive(Debug, Default)]
pub struct LeadChanges {
    pub customer_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<LeadStatus>,
    pub value: Option<f64>,
    pub priority: Option<LeadPriority>,
    pub source: Option<String>,
    pub assigned_to: Option<String>,
    pub notes: Option<String>,
    pub tags: Option<Vec<String>>,
    /// One-way: a supplied date replaces the stored one, but an absent field
    /// leaves it untouched, so updates can set the date but never clear it.
    pub expected_close_date: Option<DateTime<Utc>>,
}

fn trimmed(value: Option<String>) -> String {
    value.map(|s| s.trim().to_string()).unwrap_or_default()
}

/// Minimal email grammar: one `@`, non-empty local part, and a domain with
/// an interior dot. Anything stricter belongs to the mail system.
fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return false;
    }
    domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

/// Trims tags, drops empties, and removes duplicates while preserving the
/// first occurrence of each.
fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

fn invalid_status_message() -> String {
    format!("Invalid status. Must be one of: {}", LeadStatus::valid_values())
}

fn invalid_priority_message() -> String {
    format!("Invalid priority. Must be one of: {}", LeadPriority::valid_values())
}

/// Validates and normalizes a customer payload. Pure: no store access, no
/// side effects, just the normalized fields or the full message list.
pub fn validate_customer(payload: CustomerPayload) -> Result<ValidCustomer, ApiError> {
    let mut errors = Vec::new();

    let name = trimmed(payload.name);
    if name.is_empty() {
        errors.push("Name is required".to_string());
    }

    let email = trimmed(payload.email);
    if email.is_empty() {
        errors.push("Email is required".to_string());
    } else if !is_valid_email(&email) {
        errors.push("Email is not a valid email address".to_string());
    }

    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    Ok(ValidCustomer {
        name,
        email,
        phone: trimmed(payload.phone),
        company: trimmed(payload.company),
    })
}

/// Validates and normalizes a lead creation payload. The customer reference
/// is checked for presence only; ownership resolution happens afterwards in
/// the access-scoping step.
pub fn validate_lead(payload: LeadPayload) -> Result<ValidLead, ApiError> {
    let mut errors = Vec::new();

    let title = trimmed(payload.title);
    if title.is_empty() {
        errors.push("Title is required".to_string());
    }

    let customer_id = trimmed(payload.customer_id);
    if customer_id.is_empty() {
        errors.push("Customer ID is required".to_string());
    }

    let status = match payload.status.as_deref().map(str::trim) {
        None | Some("") => LeadStatus::default(),
        Some(raw) => match raw.parse() {
            Ok(status) => status,
            Err(()) => {
                errors.push(invalid_status_message());
                LeadStatus::default()
            }
        },
    };

    let priority = match payload.priority.as_deref().map(str::trim) {
        None | Some("") => LeadPriority::default(),
        Some(raw) => match raw.parse() {
            Ok(priority) => priority,
            Err(()) => {
                errors.push(invalid_priority_message());
                LeadPriority::default()
            }
        },
    };

    let value = payload.value.unwrap_or(0.0);
    if !value.is_finite() || value < 0.0 {
        errors.push("Value must be a non-negative number".to_string());
    }

    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    Ok(ValidLead {
        customer_id,
        title,
        description: trimmed(payload.description),
        status,
        value,
        priority,
        source: trimmed(payload.source),
        assigned_to: trimmed(payload.assigned_to),
        notes: trimmed(payload.notes),
        tags: normalize_tags(payload.tags.unwrap_or_default()),
        expected_close_date: payload.expected_close_date,
    })
}

/// Validates a partial lead update: only supplied fields are checked and
/// carried through, with the same trimming and enum rules as creation.
pub fn validate_lead_update(payload: LeadPayload) -> Result<LeadChanges, ApiError> {
    let mut errors = Vec::new();
    let mut changes = LeadChanges::default();

    if let Some(title) = payload.title {
        let title = title.trim().to_string();
        if title.is_empty() {
            errors.push("Title is required".to_string());
        } else {
            changes.title = Some(title);
        }
    }

    if let Some(customer_id) = payload.customer_id {
        let customer_id = customer_id.trim().to_string();
        if !customer_id.is_empty() {
            changes.customer_id = Some(customer_id);
        }
    }

    if let Some(status) = payload.status {
        match status.trim().parse() {
            Ok(status) => changes.status = Some(status),
            Err(()) => errors.push(invalid_status_message()),
        }
    }

    if let Some(priority) = payload.priority {
        match priority.trim().parse() {
            Ok(priority) => changes.priority = Some(priority),
            Err(()) => errors.push(invalid_priority_message()),
        }
    }

    if let Some(value) = payload.value {
        if !value.is_finite() || value < 0.0 {
            errors.push("Value must be a non-negative number".to_string());
        } else {
            changes.value = Some(value);
        }
    }

    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    changes.description = payload.description.map(|s| s.trim().to_string());
    changes.source = payload.source.map(|s| s.trim().to_string());
    changes.assigned_to = payload.assigned_to.map(|s| s.trim().to_string());
    changes.notes = payload.notes.map(|s| s.trim().to_string());
    changes.tags = payload.tags.map(normalize_tags);
    changes.expected_close_date = payload.expected_close_date;

    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer_payload(name: &str, email: &str) -> CustomerPayload {
        CustomerPayload {
            name: Some(name.to_string()),
            email: Some(email.to_string()),
            phone: None,
            company: None,
        }
    }

    #[test]
    fn test_customer_trims_and_defaults() {
        let valid = validate_customer(CustomerPayload {
            name: Some("  Acme Corp  ".to_string()),
            email: Some(" a@acme.com ".to_string()),
            phone: None,
            company: Some(" Acme ".to_string()),
        })
        .unwrap();

        assert_eq!(valid.name, "Acme Corp");
        assert_eq!(valid.email, "a@acme.com");
        assert_eq!(valid.phone, "");
        assert_eq!(valid.company, "Acme");
    }

    #[test]
    fn test_customer_collects_all_field_errors() {
        let err = validate_customer(CustomerPayload::default()).unwrap_err();
        assert_eq!(
            err.errors,
            vec!["Name is required".to_string(), "Email is required".to_string()]
        );
    }

    #[test]
    fn test_customer_rejects_bad_email() {
        for email in ["not-an-email", "a@b", "@x.com", "a@.com", "a @b.com", "a@b.com@c"] {
            let err = validate_customer(customer_payload("Acme", email)).unwrap_err();
            assert_eq!(err.errors, vec!["Email is not a valid email address".to_string()]);
        }

        assert!(validate_customer(customer_payload("Acme", "x@ACME.io")).is_ok());
    }

    #[test]
    fn test_lead_defaults() {
        let valid = validate_lead(LeadPayload {
            customer_id: Some("cust-1".to_string()),
            title: Some("Big deal".to_string()),
            ..LeadPayload::default()
        })
        .unwrap();

        assert_eq!(valid.status, LeadStatus::New);
        assert_eq!(valid.priority, LeadPriority::Medium);
        assert_eq!(valid.value, 0.0);
        assert_eq!(valid.description, "");
        assert!(valid.tags.is_empty());
    }

    #[test]
    fn test_lead_requires_title_and_customer() {
        let err = validate_lead(LeadPayload {
            title: Some("   ".to_string()),
            ..LeadPayload::default()
        })
        .unwrap_err();

        assert_eq!(
            err.errors,
            vec![
                "Title is required".to_string(),
                "Customer ID is required".to_string(),
            ]
        );
    }

    #[test]
    fn test_lead_status_message_enumerates_valid_set() {
        let err = validate_lead(LeadPayload {
            customer_id: Some("cust-1".to_string()),
            title: Some("Deal".to_string()),
            status: Some("Open".to_string()),
            ..LeadPayload::default()
        })
        .unwrap_err();

        assert_eq!(
            err.errors,
            vec![
                "Invalid status. Must be one of: New, Contacted, Qualified, Proposal, \
                 Negotiation, Converted, Lost"
                    .to_string()
            ]
        );
    }

    #[test]
    fn test_lead_rejects_negative_value() {
        let err = validate_lead(LeadPayload {
            customer_id: Some("cust-1".to_string()),
            title: Some("Deal".to_string()),
            value: Some(-1.0),
            ..LeadPayload::default()
        })
        .unwrap_err();

        assert_eq!(err.errors, vec!["Value must be a non-negative number".to_string()]);
    }

    #[test]
    fn test_lead_tags_normalized() {
        let valid = validate_lead(LeadPayload {
            customer_id: Some("cust-1".to_string()),
            title: Some("Deal".to_string()),
            tags: Some(vec![
                " inbound ".to_string(),
                "inbound".to_string(),
                "".to_string(),
                "q3".to_string(),
            ]),
            ..LeadPayload::default()
        })
        .unwrap();

        assert_eq!(valid.tags, vec!["inbound".to_string(), "q3".to_string()]);
    }

    #[test]
    fn test_lead_update_is_partial() {
        let changes = validate_lead_update(LeadPayload {
            status: Some("Converted".to_string()),
            ..LeadPayload::default()
        })
        .unwrap();

        assert_eq!(changes.status, Some(LeadStatus::Converted));
        assert!(changes.title.is_none());
        assert!(changes.value.is_none());
        assert!(changes.tags.is_none());
    }

    #[test]
    fn test_lead_update_close_date_set_but_never_cleared() {
        let date = Utc::now();
        let changes = validate_lead_update(LeadPayload {
            expected_close_date: Some(date),
            ..LeadPayload::default()
        })
        .unwrap();
        assert_eq!(changes.expected_close_date, Some(date));

        // An absent field carries no change; there is no way to express
        // clearing the stored date through an update
        let changes = validate_lead_update(LeadPayload::default()).unwrap();
        assert!(changes.expected_close_date.is_none());
    }

    #[test]
    fn test_lead_update_rejects_blank_title() {
        let err = validate_lead_update(LeadPayload {
            title: Some("  ".to_string()),
            ..LeadPayload::default()
        })
        .unwrap_err();

        assert_eq!(err.errors, vec!["Title is required".to_string()]);
    }

    #[test]
    fn test_lead_update_invalid_priority() {
        let err = validate_lead_update(LeadPayload {
            priority: Some("Critical".to_string()),
            ..LeadPayload::default()
        })
        .unwrap_err();

        assert_eq!(
            err.errors,
            vec!["Invalid priority. Must be one of: Low, Medium, High, Urgent".to_string()]
        );
    }
}
