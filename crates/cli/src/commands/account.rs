//! Account commands.

use tradedesk_storefront::erp::ErpClient;

use super::{CommandError, erp_config, open_session};

/// Quotations per page.
const PAGE_LENGTH: u32 = 20;

/// Statement postings per page.
const STATEMENT_PAGE_LENGTH: u32 = 50;

fn erp_client() -> Result<ErpClient, CommandError> {
    let session = open_session()?;
    if !session.is_authenticated() {
        return Err(CommandError::NotLoggedIn);
    }
    Ok(ErpClient::new(&erp_config()?, session))
}

/// List the user's quotations.
///
/// # Errors
///
/// Returns an error without a valid session or if the ERP call fails.
#[allow(clippy::print_stdout)]
pub async fn quotations(page: u32) -> Result<(), CommandError> {
    let client = erp_client()?;

    let rows = client.list_quotations(page.max(1), PAGE_LENGTH).await?;
    if rows.is_empty() {
        tracing::info!("No quotations on page {}", page.max(1));
        return Ok(());
    }

    for row in rows {
        let workflow = row.workflow_state.map_or("-", |state| state.label());
        let valid_till = row
            .valid_till
            .map_or_else(|| "-".to_string(), |date| date.to_string());
        println!(
            "{:<20} {:<10} {:<10} {:>16}  valid till {}",
            row.name,
            row.status.label(),
            workflow,
            row.grand_total.to_string(),
            valid_till,
        );
    }
    Ok(())
}

/// Print one page of the account statement.
///
/// # Errors
///
/// Returns an error without a valid session or if the ERP call fails.
#[allow(clippy::print_stdout)]
pub async fn statement(page: u32) -> Result<(), CommandError> {
    let client = erp_client()?;

    let statement = client
        .get_statement(page.max(1), STATEMENT_PAGE_LENGTH)
        .await?;
    for entry in &statement.entries {
        println!(
            "{}  {:<16} {:<20} {:>14} {:>14} {:>14}",
            entry.posting_date,
            entry.voucher_type,
            entry.voucher_no,
            entry.debit.to_string(),
            entry.credit.to_string(),
            entry.balance.to_string(),
        );
    }
    println!("Closing balance: {}", statement.closing_balance);
    if statement.has_more {
        tracing::info!("More postings on page {}", statement.page + 1);
    }
    Ok(())
}
