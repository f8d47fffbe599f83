//! Authentication extractor.
//!
//! Every gated request re-checks the stored session, so a logout or a login
//! as someone else (from the CLI, say) takes effect immediately. The cart
//! belongs to the user who built it and is dropped when the session changes
//! hands.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::session::AuthUser;
use crate::state::AppState;

/// Extractor that requires a valid session.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(user): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", user.full_name)
/// }
/// ```
pub struct RequireAuth(pub AuthUser);

/// Error returned when the request has no valid session.
#[derive(Debug)]
pub enum AuthRejection {
    /// Not logged in, or the stored session failed its fingerprint check.
    Unauthorized,
    /// Session storage could not be read.
    Unavailable,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "Not logged in"),
            Self::Unavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Session storage unavailable",
            ),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let previous = state.session().current().map(|user| user.email);
        match state.session().verify() {
            Ok(Some(user)) => {
                if previous.is_some_and(|email| email != user.email) {
                    state.cart().clear();
                }
                Ok(Self(user))
            }
            Ok(None) => {
                if previous.is_some() {
                    state.cart().clear();
                }
                Err(AuthRejection::Unauthorized)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to verify session");
                Err(AuthRejection::Unavailable)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use axum::http::Request;
    use secrecy::SecretString;
    use tradedesk_core::{Email, QuotationName};

    use crate::config::StorefrontConfig;
    use crate::session::{ApiCredentials, MemoryStorage, SessionStore, UserDefaults};

    use super::*;

    fn user(email: &str, secret: &str) -> AuthUser {
        AuthUser {
            email: Email::parse(email).unwrap(),
            full_name: "Buyer".to_string(),
            company_url: None,
            credentials: ApiCredentials::new("key", SecretString::from(secret.to_string()), None),
            defaults: UserDefaults::default(),
        }
    }

    /// A server state and a second session handle on the same storage, the
    /// way `td-cli` shares the state directory.
    fn server_and_cli() -> (AppState, SessionStore) {
        // Nothing listens on the discard port, so ERP calls fail fast.
        let config = StorefrontConfig::from_vars(&|key| {
            (key == "ERP_BASE_URL").then(|| "http://127.0.0.1:9".to_string())
        })
        .unwrap();
        let storage = Arc::new(MemoryStorage::new());
        let server = SessionStore::open(Arc::clone(&storage)).unwrap();
        let cli = SessionStore::open(storage).unwrap();
        (AppState::new(config, server), cli)
    }

    async fn authorize(state: &AppState) -> Result<AuthUser, AuthRejection> {
        let (mut parts, ()) = Request::builder().body(()).unwrap().into_parts();
        RequireAuth::from_request_parts(&mut parts, state)
            .await
            .map(|RequireAuth(user)| user)
    }

    /// Log in through the CLI handle and give the server an active cart.
    async fn with_cart(state: &AppState, cli: &SessionStore) -> QuotationName {
        cli.login(user("buyer@acme.test", "secret-1")).unwrap();
        authorize(state).await.unwrap();

        let name = QuotationName::new("SAL-QTN-0001");
        // The fetch fails but the name is kept.
        let _ = state.cart().resume(name.clone()).await;
        state.session().remember_cart(Some(&name)).unwrap();
        assert_eq!(state.cart().quotation_name(), Some(name.clone()));
        name
    }

    #[tokio::test]
    async fn test_login_as_other_user_drops_cart() {
        let (state, cli) = server_and_cli();
        with_cart(&state, &cli).await;

        cli.login(user("other@acme.test", "secret-2")).unwrap();

        let user = authorize(&state).await.unwrap();
        assert_eq!(user.email.as_str(), "other@acme.test");
        assert_eq!(state.cart().quotation_name(), None);
        assert_eq!(state.session().remembered_cart().unwrap(), None);
    }

    #[tokio::test]
    async fn test_relogin_as_same_user_keeps_cart() {
        let (state, cli) = server_and_cli();
        let name = with_cart(&state, &cli).await;

        cli.login(user("buyer@acme.test", "secret-3")).unwrap();

        authorize(&state).await.unwrap();
        assert_eq!(state.cart().quotation_name(), Some(name.clone()));
        assert_eq!(state.session().remembered_cart().unwrap(), Some(name));
    }

    #[tokio::test]
    async fn test_logout_elsewhere_drops_cart() {
        let (state, cli) = server_and_cli();
        with_cart(&state, &cli).await;

        cli.logout().unwrap();

        assert!(matches!(
            authorize(&state).await,
            Err(AuthRejection::Unauthorized)
        ));
        assert_eq!(state.cart().quotation_name(), None);
        assert!(!state.session().is_authenticated());
    }

    #[tokio::test]
    async fn test_no_session_is_unauthorized() {
        let (state, _cli) = server_and_cli();

        assert!(matches!(
            authorize(&state).await,
            Err(AuthRejection::Unauthorized)
        ));
        assert_eq!(state.cart().quotation_name(), None);
    }

    #[test]
    fn test_rejection_status() {
        assert_eq!(
            AuthRejection::Unauthorized.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthRejection::Unavailable.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
