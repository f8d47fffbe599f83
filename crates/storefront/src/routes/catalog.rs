//! Catalog route handlers: listing, item detail and search.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use tradedesk_core::{CatalogItem, ItemCode, ItemPage};

use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::state::AppState;

/// Product display data.
#[derive(Debug, Clone, Serialize)]
pub struct ProductView {
    pub item_code: String,
    pub item_name: String,
    pub item_group: Option<String>,
    pub description: Option<String>,
    pub uom: Option<String>,
    /// Formatted price, `None` when the item has no price for this customer.
    pub price: Option<String>,
    pub rate: Option<Decimal>,
    pub image: Option<String>,
    pub available_qty: Option<Decimal>,
    pub in_stock: bool,
}

impl From<CatalogItem> for ProductView {
    fn from(item: CatalogItem) -> Self {
        Self {
            item_code: item.item_code.into_inner(),
            item_name: item.item_name,
            item_group: item.item_group,
            description: item.description,
            uom: item.stock_uom,
            price: item.price.as_ref().map(ToString::to_string),
            rate: item.price.map(|price| price.amount),
            image: item.image,
            in_stock: item.available_qty.is_none_or(|qty| qty > Decimal::ZERO),
            available_qty: item.available_qty,
        }
    }
}

/// Product listing page.
#[derive(Debug, Clone, Serialize)]
pub struct ProductPageView {
    pub items: Vec<ProductView>,
    pub page: u32,
    pub has_more: bool,
}

impl From<ItemPage> for ProductPageView {
    fn from(page: ItemPage) -> Self {
        Self {
            items: page.items.into_iter().map(ProductView::from).collect(),
            page: page.page,
            has_more: page.has_more,
        }
    }
}

/// Search results.
#[derive(Debug, Clone, Serialize)]
pub struct SearchView {
    pub query: String,
    pub items: Vec<ProductView>,
}

/// `?page=` query parameter.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
}

/// `?q=` query parameter.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// List products.
#[instrument(skip(state, _user))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    Query(query): Query<PageQuery>,
) -> Result<Json<ProductPageView>> {
    let page = state.catalog().page(query.page.unwrap_or(1)).await?;
    Ok(Json(ProductPageView::from(page)))
}

/// Product detail.
#[instrument(skip(state, _user))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    Path(item_code): Path<String>,
) -> Result<Json<ProductView>> {
    let item_code = ItemCode::new(item_code.trim());
    if item_code.as_str().is_empty() {
        return Err(AppError::BadRequest("item_code is required".to_string()));
    }

    let item = state.catalog().item(&item_code).await?;
    Ok(Json(ProductView::from(item)))
}

/// Search products.
#[instrument(skip(state, _user))]
pub async fn search(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchView>> {
    let items = state.catalog().search(&query.q).await?;
    Ok(Json(SearchView {
        query: query.q.trim().to_string(),
        items: items.into_iter().map(ProductView::from).collect(),
    }))
}
