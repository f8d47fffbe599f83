//! Backend seam for the cart store.

use std::future::Future;

use tradedesk_core::{CartChange, LineDraft, Quotation, QuotationName};

use crate::erp::ErpError;

/// Remote quotation operations the cart store needs.
///
/// [`crate::erp::ErpClient`] talks to the real ERP. Tests substitute an
/// in-memory backend.
pub trait QuotationApi: Send + Sync + 'static {
    /// Create a draft quotation holding `lines`.
    fn create_cart(
        &self,
        lines: &[LineDraft],
    ) -> impl Future<Output = Result<Quotation, ErpError>> + Send;

    /// Fetch a quotation.
    fn get_cart(
        &self,
        name: &QuotationName,
    ) -> impl Future<Output = Result<Quotation, ErpError>> + Send;

    /// Apply one change and return the updated quotation.
    fn modify_cart(
        &self,
        name: &QuotationName,
        change: &CartChange,
    ) -> impl Future<Output = Result<Quotation, ErpError>> + Send;

    /// Submit a draft quotation.
    fn submit_cart(
        &self,
        name: &QuotationName,
    ) -> impl Future<Output = Result<Quotation, ErpError>> + Send;
}
