//! Application state shared across handlers.

use std::sync::Arc;

use crate::cart::CartStore;
use crate::catalog::Catalog;
use crate::config::StorefrontConfig;
use crate::erp::ErpClient;
use crate::session::SessionStore;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// session, the ERP client, the catalog cache and the cart store.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    session: SessionStore,
    erp: ErpClient,
    catalog: Catalog,
    cart: CartStore<ErpClient>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// The cart starts empty in the logged-in user's default currency; call
    /// [`CartStore::resume`] to pick up a remembered cart.
    #[must_use]
    pub fn new(config: StorefrontConfig, session: SessionStore) -> Self {
        let erp = ErpClient::new(&config.erp, session.clone());
        let catalog = Catalog::new(erp.clone(), session.clone(), &config.erp);
        let currency = session
            .current()
            .and_then(|user| user.defaults.currency)
            .unwrap_or_default();
        let cart = CartStore::new(erp.clone(), currency);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                session,
                erp,
                catalog,
                cart,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the session store.
    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    /// Get a reference to the ERP client.
    #[must_use]
    pub fn erp(&self) -> &ErpClient {
        &self.inner.erp
    }

    /// Get a reference to the catalog.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    /// Get a reference to the cart store.
    #[must_use]
    pub fn cart(&self) -> &CartStore<ErpClient> {
        &self.inner.cart
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.inner.config)
            .field("session", &self.inner.session)
            .field("cart", &self.inner.cart)
            .finish_non_exhaustive()
    }
}
