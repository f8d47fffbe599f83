//! Account route handlers.
//!
//! These routes require authentication.

use axum::{
    Json,
    extract::{Query, State},
};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::instrument;

use tradedesk_core::{DocStatus, QuotationSummary, Statement, StatementEntry};

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::routes::catalog::PageQuery;
use crate::session::AuthUser;
use crate::state::AppState;

/// Quotations per account page.
const QUOTATIONS_PER_PAGE: u32 = 20;

/// Postings per statement page.
const ENTRIES_PER_PAGE: u32 = 50;

/// User display data.
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub email: String,
    pub full_name: String,
    pub company_url: Option<String>,
    pub default_warehouse: Option<String>,
    pub default_currency: Option<String>,
    pub payment_terms: Option<String>,
}

impl From<&AuthUser> for UserView {
    fn from(user: &AuthUser) -> Self {
        Self {
            email: user.email.to_string(),
            full_name: user.full_name.clone(),
            company_url: user.company_url.as_ref().map(ToString::to_string),
            default_warehouse: user.defaults.warehouse.as_ref().map(ToString::to_string),
            default_currency: user.defaults.currency.as_ref().map(ToString::to_string),
            payment_terms: user.defaults.payment_terms.clone(),
        }
    }
}

/// Quotation row display data.
#[derive(Debug, Clone, Serialize)]
pub struct QuotationView {
    pub name: String,
    pub status: DocStatus,
    pub workflow_state: Option<&'static str>,
    pub grand_total: String,
    pub transaction_date: Option<NaiveDate>,
    pub valid_till: Option<NaiveDate>,
}

impl From<QuotationSummary> for QuotationView {
    fn from(summary: QuotationSummary) -> Self {
        Self {
            name: summary.name.into_inner(),
            status: summary.status,
            workflow_state: summary.workflow_state.map(|state| state.label()),
            grand_total: summary.grand_total.to_string(),
            transaction_date: summary.transaction_date,
            valid_till: summary.valid_till,
        }
    }
}

/// Account overview.
#[derive(Debug, Clone, Serialize)]
pub struct AccountView {
    pub user: UserView,
    pub quotations: Vec<QuotationView>,
    pub page: u32,
}

/// Display the current user and their quotations.
#[instrument(skip(state, user))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(query): Query<PageQuery>,
) -> Result<Json<AccountView>> {
    let page = query.page.unwrap_or(1).max(1);
    let quotations = state
        .erp()
        .list_quotations(page, QUOTATIONS_PER_PAGE)
        .await?;

    Ok(Json(AccountView {
        user: UserView::from(&user),
        quotations: quotations.into_iter().map(QuotationView::from).collect(),
        page,
    }))
}

/// Statement row display data.
#[derive(Debug, Clone, Serialize)]
pub struct StatementEntryView {
    pub posting_date: NaiveDate,
    pub voucher_type: String,
    pub voucher_no: String,
    pub debit: String,
    pub credit: String,
    pub balance: String,
    pub remarks: Option<String>,
}

impl From<StatementEntry> for StatementEntryView {
    fn from(entry: StatementEntry) -> Self {
        Self {
            posting_date: entry.posting_date,
            voucher_type: entry.voucher_type,
            voucher_no: entry.voucher_no,
            debit: entry.debit.to_string(),
            credit: entry.credit.to_string(),
            balance: entry.balance.to_string(),
            remarks: entry.remarks,
        }
    }
}

/// Account statement page.
#[derive(Debug, Clone, Serialize)]
pub struct StatementView {
    pub entries: Vec<StatementEntryView>,
    pub closing_balance: String,
    pub page: u32,
    pub has_more: bool,
}

impl From<Statement> for StatementView {
    fn from(statement: Statement) -> Self {
        Self {
            entries: statement
                .entries
                .into_iter()
                .map(StatementEntryView::from)
                .collect(),
            closing_balance: statement.closing_balance.to_string(),
            page: statement.page,
            has_more: statement.has_more,
        }
    }
}

/// Display the customer's account statement.
#[instrument(skip(state, _user))]
pub async fn statement(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    Query(query): Query<PageQuery>,
) -> Result<Json<StatementView>> {
    let page = query.page.unwrap_or(1).max(1);
    let statement = state.erp().get_statement(page, ENTRIES_PER_PAGE).await?;
    Ok(Json(StatementView::from(statement)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use rust_decimal::Decimal;
    use tradedesk_core::{CurrencyCode, Money};

    use super::*;

    fn usd(units: i64) -> Money {
        Money::new(Decimal::new(units, 2), CurrencyCode::new("USD"))
    }

    #[test]
    fn test_statement_view() {
        let statement = Statement {
            entries: vec![StatementEntry {
                posting_date: NaiveDate::from_ymd_opt(2026, 9, 30).unwrap(),
                voucher_type: "Sales Invoice".to_string(),
                voucher_no: "ACC-SINV-0007".to_string(),
                debit: usd(12050),
                credit: usd(0),
                balance: usd(12050),
                remarks: None,
            }],
            closing_balance: usd(2050),
            page: 1,
            has_more: false,
        };

        let view = StatementView::from(statement);
        assert_eq!(view.closing_balance, "USD 20.50");
        assert_eq!(view.entries[0].debit, "USD 120.50");
        assert_eq!(view.entries[0].credit, "USD 0.00");
        assert_eq!(view.entries[0].voucher_no, "ACC-SINV-0007");
        assert!(!view.has_more);
    }
}
