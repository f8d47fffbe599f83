//! Authenticated session.
//!
//! The logged-in [`AuthUser`] lives in memory behind a [`SessionStore`]
//! handle and is mirrored to a [`SessionStorage`] so it survives restarts and
//! is shared with the CLI.
//!
//! # Validity
//!
//! Next to the user entry, storage keeps a SHA-256 fingerprint of the API
//! secret under its own key. A session is only valid while the fingerprint
//! matches the stored user's secret. Anything else (a half-written login, a
//! user entry left behind by another account) is purged on [`SessionStore::verify`].

mod storage;

use std::sync::{Arc, PoisonError, RwLock};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use tradedesk_core::{CurrencyCode, Email, QuotationName, WarehouseName};

pub use storage::{FileStorage, MemoryStorage, SessionStorage};

/// Storage keys.
pub mod keys {
    /// Serialized [`super::AuthUser`].
    pub const USER: &str = "user";

    /// SHA-256 hex of the user's API secret.
    pub const FINGERPRINT: &str = "user_key";

    /// Name of the active quotation.
    pub const ACTIVE_CART: &str = "cart";
}

/// Errors from the session store.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Storage I/O failed.
    #[error("Session storage error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored entry could not be encoded.
    #[error("Session encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

// =============================================================================
// AuthUser
// =============================================================================

/// API credentials issued by the ERP at login.
#[derive(Clone)]
pub struct ApiCredentials {
    api_key: String,
    api_secret: SecretString,
    sid: Option<SecretString>,
}

impl ApiCredentials {
    /// Bundle credentials.
    #[must_use]
    pub fn new(api_key: impl Into<String>, api_secret: SecretString, sid: Option<SecretString>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret,
            sid,
        }
    }

    /// The public API key.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// `Authorization` header value.
    #[must_use]
    pub fn authorization(&self) -> String {
        format!("token {}:{}", self.api_key, self.api_secret.expose_secret())
    }

    /// Session id for the `sid` cookie.
    #[must_use]
    pub fn sid(&self) -> Option<&str> {
        self.sid.as_ref().map(ExposeSecret::expose_secret)
    }

    /// SHA-256 hex digest of the API secret.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        fingerprint(self.api_secret.expose_secret())
    }
}

impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .field("sid", &self.sid.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Per-user defaults the ERP hands out at login.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDefaults {
    pub warehouse: Option<WarehouseName>,
    pub currency: Option<CurrencyCode>,
    pub payment_terms: Option<String>,
}

/// The logged-in user.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub email: Email,
    pub full_name: String,
    /// Tenant URL. Overrides the configured ERP base URL when set.
    pub company_url: Option<Url>,
    pub credentials: ApiCredentials,
    pub defaults: UserDefaults,
}

/// On-disk form of [`AuthUser`].
#[derive(Serialize, Deserialize)]
struct StoredUser {
    email: Email,
    full_name: String,
    company_url: Option<Url>,
    api_key: String,
    api_secret: String,
    sid: Option<String>,
    #[serde(default)]
    defaults: UserDefaults,
}

impl From<&AuthUser> for StoredUser {
    fn from(user: &AuthUser) -> Self {
        Self {
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            company_url: user.company_url.clone(),
            api_key: user.credentials.api_key.clone(),
            api_secret: user.credentials.api_secret.expose_secret().to_owned(),
            sid: user.credentials.sid().map(str::to_owned),
            defaults: user.defaults.clone(),
        }
    }
}

impl From<StoredUser> for AuthUser {
    fn from(stored: StoredUser) -> Self {
        Self {
            email: stored.email,
            full_name: stored.full_name,
            company_url: stored.company_url,
            credentials: ApiCredentials::new(
                stored.api_key,
                SecretString::from(stored.api_secret),
                stored.sid.map(SecretString::from),
            ),
            defaults: stored.defaults,
        }
    }
}

fn fingerprint(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

// =============================================================================
// SessionStore
// =============================================================================

/// Handle to the current session. Cheap to clone.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<SessionStoreInner>,
}

struct SessionStoreInner {
    storage: Box<dyn SessionStorage>,
    current: RwLock<Option<AuthUser>>,
}

impl SessionStore {
    /// Open a session over `storage`, restoring any valid stored login.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read or purged.
    pub fn open(storage: impl SessionStorage + 'static) -> Result<Self, SessionError> {
        let store = Self {
            inner: Arc::new(SessionStoreInner {
                storage: Box::new(storage),
                current: RwLock::new(None),
            }),
        };
        store.verify()?;
        Ok(store)
    }

    /// Persist `user` and make it current.
    ///
    /// The fingerprint is written last, so an interrupted login never
    /// validates. The remembered cart survives only when the same account
    /// logs in again; a running storefront keeps its in-memory cart under
    /// the same rule.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be written.
    pub fn login(&self, user: AuthUser) -> Result<(), SessionError> {
        let storage = &self.inner.storage;
        let same_account = self.stored_email()?.is_some_and(|email| email == user.email);
        storage.remove(keys::FINGERPRINT)?;
        if !same_account {
            storage.remove(keys::ACTIVE_CART)?;
        }
        storage.write(keys::USER, &serde_json::to_string(&StoredUser::from(&user))?)?;
        storage.write(keys::FINGERPRINT, &user.credentials.fingerprint())?;

        info!(email = %user.email, "Logged in");
        *self.write_current() = Some(user);
        Ok(())
    }

    /// Forget the user and the remembered cart.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be cleared. Memory is cleared
    /// regardless.
    pub fn logout(&self) -> Result<(), SessionError> {
        if let Some(user) = self.write_current().take() {
            info!(email = %user.email, "Logged out");
        }
        self.purge()
    }

    /// Re-read storage and return the valid session, if any.
    ///
    /// A stored user without a matching fingerprint is purged. A session
    /// ended elsewhere (for example by `td-cli logout`) ends here too.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read or purged.
    pub fn verify(&self) -> Result<Option<AuthUser>, SessionError> {
        let restored = self.load()?;
        let mut current = self.write_current();
        match (&*current, &restored) {
            (Some(old), Some(new)) if old.email != new.email => {
                info!(from = %old.email, to = %new.email, "Session switched user");
            }
            (Some(old), None) => debug!(email = %old.email, "Session no longer valid"),
            _ => {}
        }
        current.clone_from(&restored);
        Ok(restored)
    }

    /// The current user, without touching storage.
    #[must_use]
    pub fn current(&self) -> Option<AuthUser> {
        self.inner
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether a user is logged in.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Remember (or forget, with `None`) the active quotation.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be written.
    pub fn remember_cart(&self, name: Option<&QuotationName>) -> Result<(), SessionError> {
        match name {
            Some(name) => self
                .inner
                .storage
                .write(keys::ACTIVE_CART, &serde_json::to_string(name)?),
            None => self.inner.storage.remove(keys::ACTIVE_CART),
        }
    }

    /// The remembered active quotation.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read.
    pub fn remembered_cart(&self) -> Result<Option<QuotationName>, SessionError> {
        let Some(raw) = self.inner.storage.read(keys::ACTIVE_CART)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(name) => Ok(Some(name)),
            Err(e) => {
                warn!(error = %e, "Discarding unreadable remembered cart");
                self.inner.storage.remove(keys::ACTIVE_CART)?;
                Ok(None)
            }
        }
    }

    fn load(&self) -> Result<Option<AuthUser>, SessionError> {
        let storage = &self.inner.storage;
        let Some(raw) = storage.read(keys::USER)? else {
            return Ok(None);
        };

        let user: AuthUser = match serde_json::from_str::<StoredUser>(&raw) {
            Ok(stored) => stored.into(),
            Err(e) => {
                warn!(error = %e, "Discarding unreadable stored session");
                self.purge()?;
                return Ok(None);
            }
        };

        let stored_fingerprint = storage.read(keys::FINGERPRINT)?;
        if stored_fingerprint.as_deref().map(str::trim) != Some(user.credentials.fingerprint().as_str()) {
            warn!(email = %user.email, "Stored session fingerprint mismatch, purging");
            self.purge()?;
            return Ok(None);
        }

        Ok(Some(user))
    }

    /// Email of the stored user entry, valid or not.
    fn stored_email(&self) -> Result<Option<Email>, SessionError> {
        let raw = self.inner.storage.read(keys::USER)?;
        Ok(raw
            .and_then(|raw| serde_json::from_str::<StoredUser>(&raw).ok())
            .map(|stored| stored.email))
    }

    fn purge(&self) -> Result<(), SessionError> {
        let storage = &self.inner.storage;
        storage.remove(keys::FINGERPRINT)?;
        storage.remove(keys::USER)?;
        storage.remove(keys::ACTIVE_CART)
    }

    fn write_current(&self) -> std::sync::RwLockWriteGuard<'_, Option<AuthUser>> {
        self.inner
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("current", &self.current().map(|user| user.email))
            .finish_non_exhaustive()
    }
}
