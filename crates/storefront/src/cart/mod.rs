//! Optimistic cart synchronization.
//!
//! The cart is a draft quotation in the ERP. [`CartStore`] keeps a local
//! prediction of it so the UI reflects a change before the ERP confirms it.
//!
//! # Lifecycle of a mutation
//!
//! ```text
//! Idle ──mutation──► PendingMutation ──reply──► Idle
//!                          │
//!                          └──failure──► Reconciling ──fetch──► Idle
//! ```
//!
//! 1. The patch is applied to the prediction and the line marked updating
//! 2. The RPC waits its turn: round trips for the cart run one at a time, in
//!    call order
//! 3. The reply (or on failure a fresh fetch) becomes the new server state
//!    and the patch is dropped
//!
//! A line accepts one mutation at a time; a second one fails with
//! [`CartError::LineBusy`]. If the re-fetch after a failure fails too, the
//! prediction falls back to the last server state.
//!
//! Adds always re-fetch, since only the persisted cart knows the real line
//! name and price.

mod api;
mod state;
mod store;

pub use api::QuotationApi;
pub use state::{CartSnapshot, SyncPhase};
pub use store::CartStore;

use rust_decimal::Decimal;
use thiserror::Error;

use tradedesk_core::{LineId, LineName, QuotationName};

use crate::erp::ErpError;

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// The ERP call failed. The cart has been rolled back.
    #[error(transparent)]
    Remote(#[from] ErpError),

    /// A mutation on this line is still in flight.
    #[error("Line {0} is being updated")]
    LineBusy(LineId),

    /// The line is not in the cart.
    #[error("Line {0} is not in the cart")]
    LineNotFound(LineName),

    /// The operation needs an existing quotation.
    #[error("No active cart")]
    NoActiveCart,

    /// The cart was cleared or replaced while the operation ran.
    #[error("Cart was reset during the operation")]
    Superseded,

    /// The line amount for this quantity is out of range.
    #[error("Quantity {0} is out of range")]
    InvalidQuantity(Decimal),

    /// The quotation is no longer a draft.
    #[error("Quotation {0} is no longer a draft")]
    NotDraft(QuotationName),
}
