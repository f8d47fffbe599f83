//! ERP backend client.
//!
//! # Architecture
//!
//! - The ERP is the source of truth - NO local copy beyond the cart prediction
//! - Every call is a JSON `POST` to `{base}/api/method/{app}.{method}`
//! - Replies are wrapped as `{"message": {"success": bool, "data": ..., "error": ...}}`
//! - Base URL resolves per tenant: the logged-in user's company URL wins over
//!   the configured default
//!
//! # Error mapping
//!
//! | Condition | Error |
//! |---|---|
//! | transport failure | [`ErpError::Http`] |
//! | 401 / 403 | [`ErpError::Unauthorized`] |
//! | 429 | [`ErpError::RateLimited`] |
//! | other non-2xx | [`ErpError::Status`] |
//! | 200 with `success: false` | [`ErpError::Application`] |
//! | no logged-in user | [`ErpError::MissingCredentials`] |
//!
//! # Example
//!
//! ```rust,ignore
//! use tradedesk_storefront::erp::ErpClient;
//!
//! let client = ErpClient::new(&config.erp, session.clone());
//! let page = client.get_items(1, 20).await?;
//! let quotation = client.create_cart(&[draft]).await?;
//! ```

mod client;
mod conversions;
pub mod methods;
pub mod types;

pub use client::ErpClient;

use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur when talking to the ERP.
#[derive(Debug, Error)]
pub enum ErpError {
    /// HTTP transport failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The ERP answered with a non-success status.
    #[error("ERP returned {status}: {message}")]
    Status {
        /// HTTP status code.
        status: StatusCode,
        /// Message extracted from the error body.
        message: String,
    },

    /// Credentials were rejected.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// No user is logged in, so there are no credentials to send.
    #[error("Not logged in")]
    MissingCredentials,

    /// The call returned 200 but flagged `success: false`.
    #[error("ERP rejected request: {0}")]
    Application(String),

    /// Rate limited by the ERP.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The reply body could not be decoded.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The reply decoded but carried values we cannot represent.
    #[error("Invalid ERP data: {0}")]
    InvalidData(String),

    /// A URL could not be built.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ErpError {
    /// Whether this is an authentication failure (credentials missing or rejected).
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthorized(_) | Self::MissingCredentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_erp_error_display() {
        let err = ErpError::Status {
            status: StatusCode::BAD_GATEWAY,
            message: "upstream down".to_string(),
        };
        assert_eq!(err.to_string(), "ERP returned 502 Bad Gateway: upstream down");

        let err = ErpError::Application("Item A is disabled".to_string());
        assert_eq!(err.to_string(), "ERP rejected request: Item A is disabled");
    }

    #[test]
    fn test_auth_classification() {
        assert!(ErpError::MissingCredentials.is_auth());
        assert!(ErpError::Unauthorized("bad token".to_string()).is_auth());
        assert!(!ErpError::RateLimited(5).is_auth());
    }
}
