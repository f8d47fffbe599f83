//! Read-only catalog and account listing types.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{ItemCode, QuotationName};
use super::money::Money;
use super::status::{DocStatus, WorkflowState};

/// A sellable item as shown in listings and on the detail page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    /// ERP item code.
    pub item_code: ItemCode,
    /// Display name.
    pub item_name: String,
    /// Item group (category).
    pub item_group: Option<String>,
    /// Long description (may contain HTML from the ERP).
    pub description: Option<String>,
    /// Stock unit of measure.
    pub stock_uom: Option<String>,
    /// Price from the customer's price list, if any.
    pub price: Option<Money>,
    /// Image URL.
    pub image: Option<String>,
    /// Quantity available in the default warehouse.
    pub available_qty: Option<Decimal>,
}

/// One page of catalog results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPage {
    /// Items in this page.
    pub items: Vec<CatalogItem>,
    /// 1-based page number.
    pub page: u32,
    /// Whether another page follows.
    pub has_more: bool,
}

/// A quotation row on the account page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotationSummary {
    /// Quotation name.
    pub name: QuotationName,
    /// Document status.
    pub status: DocStatus,
    /// Approval workflow state.
    pub workflow_state: Option<WorkflowState>,
    /// Grand total.
    pub grand_total: Money,
    /// Date the quotation was created.
    pub transaction_date: Option<NaiveDate>,
    /// Last date the quoted prices hold.
    pub valid_till: Option<NaiveDate>,
}

/// One posting on the customer's account statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementEntry {
    pub posting_date: NaiveDate,
    /// Source document type, e.g. `Sales Invoice` or `Payment Entry`.
    pub voucher_type: String,
    pub voucher_no: String,
    pub debit: Money,
    pub credit: Money,
    /// Running balance after this posting.
    pub balance: Money,
    pub remarks: Option<String>,
}

/// One page of the account statement, oldest posting first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    pub entries: Vec<StatementEntry>,
    /// Balance owed after every posting, not just this page.
    pub closing_balance: Money,
    /// 1-based page number.
    pub page: u32,
    pub has_more: bool,
}
