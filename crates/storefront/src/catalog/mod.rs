//! Read-only catalog access.
//!
//! Pages and item details go through a `moka` cache with a TTL, keyed by the
//! logged-in user since prices follow the customer. Search is always live.

mod api;
mod cache;

use std::time::Duration;

use moka::future::Cache;
use tracing::{debug, instrument};

use tradedesk_core::{CatalogItem, ItemCode, ItemPage};

use crate::config::ErpConfig;
use crate::erp::{ErpClient, ErpError};
use crate::session::SessionStore;

pub use api::CatalogApi;
use cache::{CacheKey, CacheValue};

/// Items per catalog page.
pub const PAGE_LENGTH: u32 = 20;

/// Maximum search results.
pub const SEARCH_LIMIT: u32 = 20;

/// Cached catalog reads.
#[derive(Clone)]
pub struct Catalog<C = ErpClient> {
    client: C,
    session: SessionStore,
    cache: Cache<CacheKey, CacheValue>,
}

impl<C> std::fmt::Debug for Catalog<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("entries", &self.cache.entry_count())
            .finish_non_exhaustive()
    }
}

impl<C: CatalogApi> Catalog<C> {
    /// Create a catalog over `client`, scoped to the user of `session`.
    #[must_use]
    pub fn new(client: C, session: SessionStore, config: &ErpConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.catalog_cache_capacity)
            .time_to_live(Duration::from_secs(config.catalog_cache_ttl_secs))
            .build();
        Self {
            client,
            session,
            cache,
        }
    }

    fn user_scope(&self) -> Result<String, ErpError> {
        self.session
            .current()
            .map(|user| user.email.as_str().to_owned())
            .ok_or(ErpError::MissingCredentials)
    }

    /// Fetch a catalog page (pages start at 1).
    ///
    /// # Errors
    ///
    /// Returns an error if the ERP call fails.
    #[instrument(skip(self))]
    pub async fn page(&self, page: u32) -> Result<ItemPage, ErpError> {
        let page = page.max(1);
        let key = CacheKey::Page {
            user: self.user_scope()?,
            page,
        };

        if let Some(CacheValue::Page(cached)) = self.cache.get(&key).await {
            debug!("Cache hit for catalog page");
            return Ok(cached);
        }

        let fetched = self.client.get_items(page, PAGE_LENGTH).await?;
        self.cache.insert(key, CacheValue::Page(fetched.clone())).await;
        Ok(fetched)
    }

    /// Fetch one item.
    ///
    /// # Errors
    ///
    /// Returns [`ErpError::NotFound`] for an unknown item, or another error
    /// if the ERP call fails.
    #[instrument(skip(self, code), fields(item_code = %code))]
    pub async fn item(&self, code: &ItemCode) -> Result<CatalogItem, ErpError> {
        let key = CacheKey::Item {
            user: self.user_scope()?,
            code: code.clone(),
        };

        if let Some(CacheValue::Item(cached)) = self.cache.get(&key).await {
            debug!("Cache hit for item");
            return Ok(*cached);
        }

        let item = self.client.get_item(code).await?;
        self.cache
            .insert(key, CacheValue::Item(Box::new(item.clone())))
            .await;
        Ok(item)
    }

    /// An item already in the cache, looked up in the item entries and then
    /// in the cached pages. Never calls the ERP.
    pub async fn cached_item(&self, code: &ItemCode) -> Option<CatalogItem> {
        let user = self.user_scope().ok()?;
        let key = CacheKey::Item {
            user: user.clone(),
            code: code.clone(),
        };
        if let Some(CacheValue::Item(cached)) = self.cache.get(&key).await {
            return Some(*cached);
        }

        self.cache.iter().find_map(|(key, value)| match (&*key, value) {
            (CacheKey::Page { user: owner, .. }, CacheValue::Page(page)) if *owner == user => {
                page.items.into_iter().find(|item| &item.item_code == code)
            }
            _ => None,
        })
    }

    /// Search the catalog. Never cached.
    ///
    /// # Errors
    ///
    /// Returns an error if the ERP call fails.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str) -> Result<Vec<CatalogItem>, ErpError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        self.client.search_items(query, SEARCH_LIMIT).await
    }

    /// Drop every cached entry.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}
