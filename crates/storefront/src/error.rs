//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//! Error bodies are JSON: `{"error": "..."}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::cart::CartError;
use crate::erp::ErpError;
use crate::session::SessionError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// ERP call failed.
    #[error("ERP error: {0}")]
    Erp(#[from] ErpError),

    /// Cart operation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Session storage failed.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn erp_status(err: &ErpError) -> StatusCode {
    match err {
        ErpError::Unauthorized(_) | ErpError::MissingCredentials => StatusCode::UNAUTHORIZED,
        ErpError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
        ErpError::NotFound(_) => StatusCode::NOT_FOUND,
        ErpError::Application(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::BAD_GATEWAY,
    }
}

fn erp_message(err: &ErpError) -> String {
    match err {
        ErpError::Unauthorized(_) | ErpError::MissingCredentials => {
            "Session expired, please log in again".to_string()
        }
        ErpError::RateLimited(secs) => format!("Too many requests, retry in {secs}s"),
        ErpError::NotFound(what) => format!("Not found: {what}"),
        // Validation messages from the ERP are meant for the user
        ErpError::Application(message) => message.clone(),
        _ => "External service error".to_string(),
    }
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Erp(err) | Self::Cart(CartError::Remote(err)) => erp_status(err),
            Self::Cart(CartError::LineNotFound(_)) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Cart(
                CartError::LineBusy(_)
                | CartError::NoActiveCart
                | CartError::Superseded
                | CartError::NotDraft(_),
            ) => StatusCode::CONFLICT,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) | Self::Cart(CartError::InvalidQuantity(_)) => {
                StatusCode::BAD_REQUEST
            }
            Self::Session(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the client.
    fn public_message(&self) -> String {
        match self {
            Self::Erp(err) | Self::Cart(CartError::Remote(err)) => erp_message(err),
            Self::Cart(err) => err.to_string(),
            Self::Session(_) | Self::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose internal error details to clients
        let body = Json(json!({ "error": self.public_message() }));
        (status, body).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(email: &str, full_name: &str) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            email: Some(email.to_string()),
            username: Some(full_name.to_string()),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Updated line", Some(&[("line", "row-1"), ("qty", "3")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode as ReqwestStatus;
    use rust_decimal::Decimal;
    use tradedesk_core::{LineId, LineName, QuotationName};

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("item A".to_string());
        assert_eq!(err.to_string(), "Not found: item A");

        let err = AppError::BadRequest("qty must be at least 1".to_string());
        assert_eq!(err.to_string(), "Bad request: qty must be at least 1");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_erp_error_status_codes() {
        assert_eq!(
            get_status(ErpError::MissingCredentials.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(ErpError::RateLimited(3).into()),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(ErpError::Application("Item disabled".to_string()).into()),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            get_status(
                ErpError::Status {
                    status: ReqwestStatus::INTERNAL_SERVER_ERROR,
                    message: "boom".to_string(),
                }
                .into()
            ),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_cart_error_status_codes() {
        assert_eq!(
            get_status(CartError::LineBusy(LineId::Persisted(LineName::new("row-1"))).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(CartError::LineNotFound(LineName::new("row-1")).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(CartError::NotDraft(QuotationName::new("Q-1")).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(CartError::InvalidQuantity(Decimal::MAX).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(CartError::Remote(ErpError::Unauthorized("x".to_string())).into()),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_internal_details_hidden() {
        let err = AppError::Erp(ErpError::InvalidData("secret detail".to_string()));
        assert_eq!(err.public_message(), "External service error");

        let err = AppError::Internal("db password".to_string());
        assert_eq!(err.public_message(), "Internal server error");
    }
}
