//! Cache types for catalog responses.

use tradedesk_core::{CatalogItem, ItemCode, ItemPage};

/// Cache key. Prices are per customer, so every key carries the user it was
/// fetched for.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Page { user: String, page: u32 },
    Item { user: String, code: ItemCode },
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Page(ItemPage),
    Item(Box<CatalogItem>),
}
