//! Backend seam for the catalog.

use std::future::Future;

use tradedesk_core::{CatalogItem, ItemCode, ItemPage};

use crate::erp::{ErpClient, ErpError};

/// Remote catalog reads.
pub trait CatalogApi: Send + Sync + 'static {
    /// One page of items (pages start at 1).
    fn get_items(
        &self,
        page: u32,
        page_length: u32,
    ) -> impl Future<Output = Result<ItemPage, ErpError>> + Send;

    /// One item, [`ErpError::NotFound`] if unknown.
    fn get_item(
        &self,
        item_code: &ItemCode,
    ) -> impl Future<Output = Result<CatalogItem, ErpError>> + Send;

    /// Full-text search.
    fn search_items(
        &self,
        query: &str,
        page_length: u32,
    ) -> impl Future<Output = Result<Vec<CatalogItem>, ErpError>> + Send;
}

impl CatalogApi for ErpClient {
    async fn get_items(&self, page: u32, page_length: u32) -> Result<ItemPage, ErpError> {
        Self::get_items(self, page, page_length).await
    }

    async fn get_item(&self, item_code: &ItemCode) -> Result<CatalogItem, ErpError> {
        Self::get_item(self, item_code).await
    }

    async fn search_items(
        &self,
        query: &str,
        page_length: u32,
    ) -> Result<Vec<CatalogItem>, ErpError> {
        Self::search_items(self, query, page_length).await
    }
}
