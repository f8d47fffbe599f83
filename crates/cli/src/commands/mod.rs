//! CLI command implementations.

pub mod account;
pub mod session;

use std::path::PathBuf;

use thiserror::Error;

use tradedesk_core::EmailError;
use tradedesk_storefront::config::{ConfigError, ErpConfig};
use tradedesk_storefront::erp::ErpError;
use tradedesk_storefront::session::{FileStorage, SessionError, SessionStore};

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Configuration is missing or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Session storage failed.
    #[error("Session storage error: {0}")]
    Session(#[from] SessionError),

    /// ERP call failed.
    #[error("ERP error: {0}")]
    Erp(#[from] ErpError),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// The command needs a logged-in user.
    #[error("Not logged in, run `td-cli login` first")]
    NotLoggedIn,
}

/// Directory of the session shared with the storefront server.
fn state_dir() -> PathBuf {
    std::env::var("TRADEDESK_STATE_DIR")
        .ok()
        .filter(|dir| !dir.trim().is_empty())
        .map_or_else(|| PathBuf::from(".tradedesk"), PathBuf::from)
}

/// Open the shared session store.
fn open_session() -> Result<SessionStore, CommandError> {
    dotenvy::dotenv().ok();
    let dir = state_dir();
    tracing::debug!(dir = %dir.display(), "Opening session storage");
    Ok(SessionStore::open(FileStorage::new(dir))?)
}

/// Load the ERP settings from the environment.
fn erp_config() -> Result<ErpConfig, CommandError> {
    Ok(ErpConfig::from_vars(&|key| std::env::var(key).ok())?)
}
