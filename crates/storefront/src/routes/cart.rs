//! Cart route handlers.
//!
//! Handlers only call [`CartStore`](crate::cart::CartStore) operations and
//! render its latest snapshot. Lines with a mutation in flight are flagged
//! `updating` so the UI can disable their controls.

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use tradedesk_core::{
    CatalogItem, CurrencyCode, DocStatus, ItemCode, LineDraft, LineName, Money, ParentFields,
    Quotation, WarehouseName, WorkflowState,
};

use crate::cart::{CartSnapshot, SyncPhase};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::state::AppState;

/// Cart line display data.
#[derive(Debug, Clone, Serialize)]
pub struct CartItemView {
    /// Line identity; placeholders render as `pending:{uuid}`.
    pub id: String,
    pub item_code: String,
    pub item_name: Option<String>,
    pub qty: Decimal,
    pub rate: String,
    pub amount: String,
    pub uom: Option<String>,
    pub warehouse: Option<String>,
    pub note: Option<String>,
    /// Not yet confirmed by the ERP.
    pub pending: bool,
    /// A mutation on this line is in flight.
    pub updating: bool,
}

/// Cart display data.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub name: Option<String>,
    pub status: DocStatus,
    pub workflow_state: Option<&'static str>,
    pub phase: SyncPhase,
    pub items: Vec<CartItemView>,
    pub item_count: usize,
    pub total_qty: Decimal,
    pub net_total: String,
    pub discount: String,
    pub grand_total: String,
    pub coupon_code: Option<String>,
    pub notes: Option<String>,
    pub valid_till: Option<NaiveDate>,
}

/// Format an amount as a price string.
fn format_price(amount: Decimal, currency: &CurrencyCode) -> String {
    Money::new(amount, currency.clone()).to_string()
}

fn workflow_label(state: Option<WorkflowState>) -> Option<&'static str> {
    state.map(WorkflowState::label)
}

impl From<&CartSnapshot> for CartView {
    fn from(snapshot: &CartSnapshot) -> Self {
        let cart = &snapshot.cart;
        let currency = &cart.currency;
        Self {
            name: cart.name.as_ref().map(ToString::to_string),
            status: cart.status,
            workflow_state: workflow_label(cart.workflow_state),
            phase: snapshot.phase,
            items: cart
                .lines
                .iter()
                .map(|line| CartItemView {
                    id: line.id.to_string(),
                    item_code: line.item_code.to_string(),
                    item_name: line.item_name.clone(),
                    qty: line.qty,
                    rate: format_price(line.rate, currency),
                    amount: format_price(line.amount, currency),
                    uom: line.uom.clone(),
                    warehouse: line.warehouse.as_ref().map(ToString::to_string),
                    note: line.note.clone(),
                    pending: line.id.is_pending(),
                    updating: snapshot.is_updating(&line.id),
                })
                .collect(),
            item_count: cart.line_count(),
            total_qty: cart.total_qty(),
            net_total: format_price(cart.totals.net_total, currency),
            discount: format_price(cart.totals.discount_amount, currency),
            grand_total: format_price(cart.totals.grand_total, currency),
            coupon_code: cart.coupon_code.clone(),
            notes: cart.notes.clone(),
            valid_till: cart.valid_till,
        }
    }
}

/// Submitted quotation summary.
#[derive(Debug, Clone, Serialize)]
pub struct SubmittedView {
    pub name: String,
    pub status: DocStatus,
    pub workflow_state: Option<&'static str>,
    pub grand_total: String,
}

impl From<&Quotation> for SubmittedView {
    fn from(quotation: &Quotation) -> Self {
        Self {
            name: quotation.name.to_string(),
            status: quotation.status,
            workflow_state: workflow_label(quotation.workflow_state),
            grand_total: format_price(quotation.totals.grand_total, &quotation.currency),
        }
    }
}

/// Add item request body.
///
/// `rate`, `item_name` and `uom` are what the page already shows for the
/// item. They only shape the optimistic line; the ERP prices the real one.
#[derive(Debug, Default, Deserialize)]
pub struct AddItemRequest {
    pub item_code: String,
    pub qty: Option<Decimal>,
    pub warehouse: Option<String>,
    pub note: Option<String>,
    pub rate: Option<Decimal>,
    pub item_name: Option<String>,
    pub uom: Option<String>,
}

/// Update quantity request body.
#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub qty: Decimal,
}

/// Largest quantity a line accepts.
const MAX_QTY: u32 = 1_000_000;

/// Quantities outside `1..=MAX_QTY` are rejected before reaching the store.
fn validate_qty(qty: Decimal) -> Result<Decimal> {
    if qty < Decimal::ONE || qty > Decimal::from(MAX_QTY) {
        return Err(AppError::BadRequest(format!(
            "Quantity must be between 1 and {MAX_QTY}"
        )));
    }
    Ok(qty)
}

/// Build the draft for an add from the request and whatever the catalog
/// already holds for the item. Missing prices predict as zero.
fn line_draft(
    item_code: ItemCode,
    qty: Decimal,
    body: AddItemRequest,
    cached: Option<CatalogItem>,
    default_warehouse: Option<WarehouseName>,
) -> LineDraft {
    let cached_rate = cached
        .as_ref()
        .and_then(|item| item.price.as_ref())
        .map(|price| price.amount);
    let rate = body.rate.or(cached_rate).unwrap_or(Decimal::ZERO);

    let mut draft = LineDraft::new(item_code, qty, rate);
    draft.item_name = body
        .item_name
        .filter(|n| !n.trim().is_empty())
        .or_else(|| cached.as_ref().map(|item| item.item_name.clone()));
    draft.uom = body
        .uom
        .filter(|u| !u.trim().is_empty())
        .or_else(|| cached.and_then(|item| item.stock_uom));
    draft.warehouse = body
        .warehouse
        .filter(|w| !w.trim().is_empty())
        .map(WarehouseName::new)
        .or(default_warehouse);
    draft.note = body.note.filter(|n| !n.trim().is_empty());
    draft
}

fn view(state: &AppState) -> Json<CartView> {
    Json(CartView::from(&state.cart().snapshot()))
}

/// Display the cart.
#[instrument(skip(state, _user))]
pub async fn show(State(state): State<AppState>, RequireAuth(_user): RequireAuth) -> Json<CartView> {
    view(&state)
}

/// Add an item.
///
/// The optimistic line is built from the request and the catalog cache
/// only, so it is in the cart before any ERP round trip. The re-fetch after
/// the add brings the ERP's name, unit and price.
#[instrument(skip(state, user, body), fields(item_code = %body.item_code))]
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<AddItemRequest>,
) -> Result<Json<CartView>> {
    let qty = validate_qty(body.qty.unwrap_or(Decimal::ONE))?;
    let item_code = ItemCode::new(body.item_code.trim());
    if item_code.as_str().is_empty() {
        return Err(AppError::BadRequest("item_code is required".to_string()));
    }
    if body.rate.is_some_and(|rate| rate.is_sign_negative()) {
        return Err(AppError::BadRequest("rate must not be negative".to_string()));
    }

    let cached = if body.rate.is_some() {
        None
    } else {
        state.catalog().cached_item(&item_code).await
    };
    let draft = line_draft(item_code, qty, body, cached, user.defaults.warehouse);

    add_breadcrumb(
        "cart",
        "Added item",
        Some(&[
            ("item_code", draft.item_code.as_str()),
            ("qty", &qty.to_string()),
        ]),
    );

    state.cart().add_item(draft).await?;
    Ok(view(&state))
}

/// Set a line's quantity.
#[instrument(skip(state, _user, body))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    Path(line): Path<String>,
    Json(body): Json<UpdateItemRequest>,
) -> Result<Json<CartView>> {
    let qty = validate_qty(body.qty)?;
    add_breadcrumb(
        "cart",
        "Updated line",
        Some(&[("line", &line), ("qty", &qty.to_string())]),
    );

    state.cart().update_item(&LineName::new(line), qty).await?;
    Ok(view(&state))
}

/// Remove a line.
#[instrument(skip(state, _user))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    Path(line): Path<String>,
) -> Result<Json<CartView>> {
    add_breadcrumb("cart", "Removed line", Some(&[("line", &line)]));

    state.cart().remove_item(&LineName::new(line)).await?;
    Ok(view(&state))
}

/// Update coupon code and notes.
#[instrument(skip(state, _user, body))]
pub async fn details(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    Json(body): Json<ParentFields>,
) -> Result<Json<CartView>> {
    add_breadcrumb("cart", "Updated details", None);

    state.cart().update_details(body).await?;
    Ok(view(&state))
}

/// Submit the cart as a quotation.
#[instrument(skip(state, _user))]
pub async fn submit(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
) -> Result<Json<SubmittedView>> {
    add_breadcrumb("cart", "Submitted cart", None);

    let quotation = state.cart().submit().await?;
    Ok(Json(SubmittedView::from(&quotation)))
}

/// Forget the cart locally. The quotation stays in the ERP.
#[instrument(skip(state, _user))]
pub async fn clear(State(state): State<AppState>, RequireAuth(_user): RequireAuth) -> Json<CartView> {
    add_breadcrumb("cart", "Cleared cart", None);

    state.cart().clear();
    view(&state)
}

/// Re-fetch the cart from the ERP.
#[instrument(skip(state, _user))]
pub async fn refresh(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
) -> Result<Json<CartView>> {
    state.cart().revalidate().await?;
    Ok(view(&state))
}
