use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::Result as StoreResult;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// API error that converts to a proper HTTP response. Validation failures
/// carry the full field-level message list alongside the headline message.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub errors: Vec<String>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<&'a [String]>,
}

impl ApiError {
    /// A 400 carrying every field message intact. The first message doubles
    /// as the headline so single-field failures read naturally.
    #[must_use]
    pub fn validation(errors: Vec<String>) -> Self {
        let message = errors
            .first()
            .cloned()
            .unwrap_or_else(|| "Validation error".to_string());
        Self {
            status: StatusCode::BAD_REQUEST,
            message,
            errors,
        }
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
            errors: Vec::new(),
        }
    }

    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            message: message.into(),
            errors: Vec::new(),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
            errors: Vec::new(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            message: &self.message,
            errors: (!self.errors.is_empty()).then_some(self.errors.as_slice()),
        })
        .into_response();
        (self.status, body).into_response()
    }
}

/// Coerces a raw query value to a positive number, falling back to the
/// default when absent, non-numeric, or below 1.
#[must_use]
pub fn positive_or_default(raw: Option<&str>, default: i64) -> i64 {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|n| *n >= 1)
        .unwrap_or(default)
}

/// Total page count for a listing: ceil(total/limit), zero when empty.
#[must_use]
pub fn page_count(total: i64, limit: i64) -> i64 {
    if total == 0 {
        0
    } else {
        (total + limit - 1) / limit
    }
}

/// Row offset for a 1-based page. Saturates so an absurdly large page
/// number stays a valid beyond-the-end offset instead of wrapping negative.
#[must_use]
pub fn page_offset(page: i64, limit: i64) -> i64 {
    page.saturating_sub(1).saturating_mul(limit)
}

/// Extension trait for converting store results to API errors with a custom message.
pub trait StoreResultExt<T> {
    fn api_err(self, message: &'static str) -> Result<T, ApiError>;
}

impl<T> StoreResultExt<T> for StoreResult<T> {
    fn api_err(self, message: &'static str) -> Result<T, ApiError> {
        self.map_err(|_| ApiError::internal(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_or_default() {
        assert_eq!(positive_or_default(None, 1), 1);
        assert_eq!(positive_or_default(Some("3"), 1), 3);
        assert_eq!(positive_or_default(Some(" 7 "), 1), 7);
        assert_eq!(positive_or_default(Some("abc"), 1), 1);
        assert_eq!(positive_or_default(Some("0"), 10), 10);
        assert_eq!(positive_or_default(Some("-5"), 10), 10);
        assert_eq!(positive_or_default(Some(""), 10), 10);
    }

    #[test]
    fn test_page_count() {
        assert_eq!(page_count(0, 10), 0);
        assert_eq!(page_count(1, 10), 1);
        assert_eq!(page_count(10, 10), 1);
        assert_eq!(page_count(11, 10), 2);
        assert_eq!(page_count(5, 2), 3);
    }

    #[test]
    fn test_page_offset_saturates_on_huge_pages() {
        assert_eq!(page_offset(1, 10), 0);
        assert_eq!(page_offset(3, 10), 20);
        assert_eq!(page_offset(i64::MAX, 10), i64::MAX);
        assert_eq!(page_offset(i64::MAX, i64::MAX), i64::MAX);
        assert!(page_offset(i64::MAX, 10) >= 0);
    }

    #[test]
    fn test_error_debug_output_includes_message() {
        let rendered = format!("{:?}", ApiError::not_found("Customer not found"));
        assert!(rendered.contains("Customer not found"));
        assert!(rendered.contains("404"));
    }

    #[test]
    fn test_validation_error_keeps_message_list() {
        let err = ApiError::validation(vec![
            "Name is required".to_string(),
            "Email is required".to_string(),
        ]);
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Name is required");
        assert_eq!(err.errors.len(), 2);
    }
}
