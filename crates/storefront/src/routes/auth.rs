//! Authentication route handlers.
//!
//! Login happens through `td-cli login`, which writes the shared session
//! storage. The server only ends sessions.

use axum::{extract::State, http::StatusCode};
use tracing::instrument;

use crate::error::{Result, clear_sentry_user};
use crate::middleware::RequireAuth;
use crate::state::AppState;

/// Log out: forget the user, the remembered cart and cached prices.
#[instrument(skip(state, user), fields(email = %user.email))]
pub async fn logout(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<StatusCode> {
    state.cart().clear();
    state.catalog().invalidate_all();
    state.session().logout()?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}
