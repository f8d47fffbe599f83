//! Wire types for the ERP JSON RPC.
//!
//! These mirror the ERP's field names. Conversion into the domain types of
//! `tradedesk_core` happens in `conversions`.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tradedesk_core::ParentFields;

// =============================================================================
// Envelopes
// =============================================================================

/// Outer wrapper every whitelisted method reply uses.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub message: Reply<T>,
}

/// Application-level reply carried inside a 200 response.
#[derive(Debug, Deserialize)]
pub struct Reply<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

/// Body of a non-2xx response.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    pub exc_type: Option<String>,
    pub exception: Option<String>,
    pub message: Option<serde_json::Value>,
    /// JSON-encoded array of JSON-encoded `{"message": ...}` objects.
    #[serde(rename = "_server_messages")]
    pub server_messages: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ServerMessage {
    pub message: String,
}

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Serialize)]
pub struct LoginParams<'a> {
    pub usr: &'a str,
    pub pwd: &'a str,
}

/// A line as the ERP accepts it. The rate is never sent; the ERP prices it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineInput {
    pub item_code: String,
    pub qty: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uom: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warehouse: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateCartParams {
    pub items: Vec<LineInput>,
}

#[derive(Debug, Serialize)]
pub struct QuotationParams<'a> {
    pub quotation: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ModifyCartParams<'a> {
    pub quotation: &'a str,
    pub action: &'static str,
    pub payload: ModifyPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ModifyPayload {
    AddItem(LineInput),
    UpdateItem { row: String, qty: Decimal },
    DeleteItem { row: String },
    UpdateParent(ParentFields),
}

#[derive(Debug, Serialize)]
pub struct PageParams {
    pub page: u32,
    pub page_length: u32,
}

#[derive(Debug, Serialize)]
pub struct SearchParams<'a> {
    pub query: &'a str,
    pub page_length: u32,
}

#[derive(Debug, Serialize)]
pub struct ItemParams<'a> {
    pub item_code: &'a str,
}

// =============================================================================
// Replies
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginData {
    pub email: String,
    pub full_name: String,
    pub company_url: Option<String>,
    pub api_key: String,
    pub api_secret: String,
    pub sid: Option<String>,
    pub default_warehouse: Option<String>,
    pub default_currency: Option<String>,
    pub payment_terms: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QuotationDoc {
    pub name: String,
    pub docstatus: i64,
    pub workflow_state: Option<String>,
    pub currency: String,
    #[serde(default)]
    pub items: Vec<QuotationItemDoc>,
    #[serde(default)]
    pub total: Decimal,
    #[serde(default)]
    pub discount_amount: Decimal,
    #[serde(default)]
    pub grand_total: Decimal,
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub additional_discount_percentage: Decimal,
    pub notes: Option<String>,
    pub transaction_date: Option<NaiveDate>,
    pub valid_till: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct QuotationItemDoc {
    /// Child row name.
    pub name: String,
    pub item_code: String,
    pub item_name: Option<String>,
    pub qty: Decimal,
    pub rate: Decimal,
    pub amount: Decimal,
    pub uom: Option<String>,
    pub warehouse: Option<String>,
    pub additional_notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QuotationSummaryDoc {
    pub name: String,
    pub docstatus: i64,
    pub workflow_state: Option<String>,
    pub currency: String,
    #[serde(default)]
    pub grand_total: Decimal,
    pub transaction_date: Option<NaiveDate>,
    pub valid_till: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct ItemDoc {
    pub item_code: String,
    pub item_name: String,
    pub item_group: Option<String>,
    pub description: Option<String>,
    pub stock_uom: Option<String>,
    pub price_list_rate: Option<Decimal>,
    pub currency: Option<String>,
    pub image: Option<String>,
    pub actual_qty: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct ItemPageDoc {
    #[serde(default)]
    pub items: Vec<ItemDoc>,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Deserialize)]
pub struct StatementDoc {
    pub currency: String,
    #[serde(default)]
    pub entries: Vec<StatementEntryDoc>,
    #[serde(default)]
    pub closing_balance: Decimal,
    #[serde(default)]
    pub has_more: bool,
}

/// A GL entry against the customer's receivable account.
#[derive(Debug, Deserialize)]
pub struct StatementEntryDoc {
    pub posting_date: NaiveDate,
    pub voucher_type: String,
    pub voucher_no: String,
    #[serde(default)]
    pub debit: Decimal,
    #[serde(default)]
    pub credit: Decimal,
    #[serde(default)]
    pub balance: Decimal,
    pub remarks: Option<String>,
}
