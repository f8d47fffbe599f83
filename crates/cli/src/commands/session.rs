//! Session commands.
//!
//! # Usage
//!
//! ```bash
//! td-cli login -e buyer@acme.example --url https://acme.erp.example
//! td-cli whoami
//! td-cli logout
//! ```
//!
//! # Environment Variables
//!
//! - `ERP_BASE_URL` - Default ERP tenant URL
//! - `ERP_API_APP` - App namespace of the whitelisted methods
//! - `TRADEDESK_STATE_DIR` - Session storage directory
//! - `TRADEDESK_PASSWORD` - Password for `login` when `--password` is omitted

use secrecy::{ExposeSecret, SecretString};
use url::Url;

use tradedesk_core::Email;
use tradedesk_storefront::erp::ErpClient;

use super::{CommandError, erp_config, open_session};

/// Log in and store the session.
///
/// Replaces any previous session, including its remembered cart.
///
/// # Errors
///
/// Returns an error if the email is invalid, the ERP rejects the login, or
/// the session cannot be written.
pub async fn login(email: &str, password: String, tenant: Option<Url>) -> Result<(), CommandError> {
    let email = Email::parse(email)?;
    let password = SecretString::from(password);

    let session = open_session()?;
    let client = ErpClient::new(&erp_config()?, session.clone());

    tracing::info!("Logging in as {}...", email);
    let user = client
        .login(&email, password.expose_secret(), tenant.as_ref())
        .await?;

    let full_name = user.full_name.clone();
    session.login(user)?;
    tracing::info!("Logged in as {} ({})", full_name, email);
    Ok(())
}

/// Remove the stored session.
///
/// # Errors
///
/// Returns an error if the session storage cannot be cleared.
pub fn logout() -> Result<(), CommandError> {
    let session = open_session()?;
    match session.current() {
        Some(user) => {
            session.logout()?;
            tracing::info!("Logged out {}", user.email);
        }
        None => tracing::info!("No active session"),
    }
    Ok(())
}

/// Show the logged-in user.
///
/// # Errors
///
/// Returns [`CommandError::NotLoggedIn`] without a valid session.
#[allow(clippy::print_stdout)]
pub fn whoami() -> Result<(), CommandError> {
    let session = open_session()?;
    let user = session.current().ok_or(CommandError::NotLoggedIn)?;

    println!("{} <{}>", user.full_name, user.email);
    if let Some(url) = &user.company_url {
        println!("  tenant:        {url}");
    }
    if let Some(warehouse) = &user.defaults.warehouse {
        println!("  warehouse:     {warehouse}");
    }
    if let Some(currency) = &user.defaults.currency {
        println!("  currency:      {currency}");
    }
    if let Some(terms) = &user.defaults.payment_terms {
        println!("  payment terms: {terms}");
    }
    if let Some(cart) = session.remembered_cart()? {
        println!("  active cart:   {cart}");
    }
    Ok(())
}
