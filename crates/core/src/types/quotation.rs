//! Quotations (server carts) and the client-side cart prediction.
//!
//! A [`Quotation`] is what the ERP last told us. A [`Cart`] is what we expect
//! the quotation to look like once every pending mutation lands: the last
//! quotation with the pending [`CartPatch`]es folded over it.
//!
//! ```text
//! server quotation ──► Cart::from ──► apply(patch 1) ──► apply(patch 2) ──► prediction
//! ```
//!
//! With no pending patches the prediction is exactly the server quotation,
//! totals included. Totals are only re-estimated when a patch is applied.

use core::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::id::{ItemCode, LineName, QuotationName, WarehouseName};
use super::money::{CurrencyCode, Money};
use super::status::{DocStatus, WorkflowState};

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

// =============================================================================
// Line identity
// =============================================================================

/// Identity of a cart line.
///
/// Lines get a server name once persisted. Until the first successful round
/// trip, an optimistic line carries a client-generated placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum LineId {
    /// Server-assigned row name.
    Persisted(LineName),
    /// Client placeholder for a line the server has not confirmed.
    Pending(Uuid),
}

impl LineId {
    /// A fresh placeholder identity.
    #[must_use]
    pub fn placeholder() -> Self {
        Self::Pending(Uuid::new_v4())
    }

    /// Whether this is a client placeholder.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    /// The server name, if persisted.
    #[must_use]
    pub const fn persisted(&self) -> Option<&LineName> {
        match self {
            Self::Persisted(name) => Some(name),
            Self::Pending(_) => None,
        }
    }
}

impl From<LineName> for LineId {
    fn from(name: LineName) -> Self {
        Self::Persisted(name)
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Persisted(name) => f.write_str(name.as_str()),
            Self::Pending(id) => write!(f, "pending:{id}"),
        }
    }
}

// =============================================================================
// Lines
// =============================================================================

/// A line the user asked to add.
///
/// `rate` is the price the user saw in the catalog. It only feeds the
/// optimistic prediction; the ERP prices the real line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineDraft {
    pub item_code: ItemCode,
    pub item_name: Option<String>,
    pub qty: Decimal,
    pub rate: Decimal,
    pub uom: Option<String>,
    pub warehouse: Option<WarehouseName>,
    pub note: Option<String>,
}

impl LineDraft {
    /// A draft with only the required fields.
    #[must_use]
    pub const fn new(item_code: ItemCode, qty: Decimal, rate: Decimal) -> Self {
        Self {
            item_code,
            item_name: None,
            qty,
            rate,
            uom: None,
            warehouse: None,
            note: None,
        }
    }
}

/// One product entry in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: LineId,
    pub item_code: ItemCode,
    pub item_name: Option<String>,
    pub qty: Decimal,
    pub rate: Decimal,
    /// `qty × rate` as computed by whoever produced the line.
    pub amount: Decimal,
    pub uom: Option<String>,
    pub warehouse: Option<WarehouseName>,
    pub note: Option<String>,
}

impl CartLine {
    /// Build the optimistic line for a draft.
    #[must_use]
    pub fn provisional(id: LineId, draft: &LineDraft) -> Self {
        Self {
            id,
            item_code: draft.item_code.clone(),
            item_name: draft.item_name.clone(),
            qty: draft.qty,
            rate: draft.rate,
            amount: draft.qty.saturating_mul(draft.rate),
            uom: draft.uom.clone(),
            warehouse: draft.warehouse.clone(),
            note: draft.note.clone(),
        }
    }

    /// `qty × rate`, or `None` when the product does not fit a [`Decimal`].
    #[must_use]
    pub fn amount_for(qty: Decimal, rate: Decimal) -> Option<Decimal> {
        qty.checked_mul(rate)
    }

    fn set_qty(&mut self, qty: Decimal) {
        self.qty = qty;
        self.amount = qty.saturating_mul(self.rate);
    }
}

// =============================================================================
// Documents
// =============================================================================

/// Cart totals.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CartTotals {
    /// Sum of line amounts.
    pub net_total: Decimal,
    /// Document-level discount.
    pub discount_amount: Decimal,
    /// Net total minus discount (before taxes, which the ERP adds later).
    pub grand_total: Decimal,
}

/// Quotation header fields the user may edit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParentFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// The quotation as last returned by the ERP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quotation {
    pub name: QuotationName,
    pub status: DocStatus,
    pub workflow_state: Option<WorkflowState>,
    pub currency: CurrencyCode,
    /// Lines in server order; every id is [`LineId::Persisted`].
    pub lines: Vec<CartLine>,
    pub totals: CartTotals,
    pub coupon_code: Option<String>,
    pub additional_discount_percentage: Decimal,
    pub notes: Option<String>,
    pub transaction_date: Option<NaiveDate>,
    pub valid_till: Option<NaiveDate>,
}

impl Quotation {
    /// Find a line by server name.
    #[must_use]
    pub fn line(&self, name: &LineName) -> Option<&CartLine> {
        self.lines
            .iter()
            .find(|line| line.id.persisted() == Some(name))
    }
}

/// A single mutation sent to the ERP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartChange {
    AddItem(LineDraft),
    UpdateItem { line: LineName, qty: Decimal },
    DeleteItem { line: LineName },
    UpdateParent(ParentFields),
}

/// An optimistic edit applied to the prediction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartPatch {
    AddLine(CartLine),
    SetQty { line: LineId, qty: Decimal },
    RemoveLine(LineId),
}

impl CartPatch {
    /// The line this patch touches.
    #[must_use]
    pub const fn line_id(&self) -> &LineId {
        match self {
            Self::AddLine(line) => &line.id,
            Self::SetQty { line, .. } | Self::RemoveLine(line) => line,
        }
    }
}

// =============================================================================
// Prediction
// =============================================================================

/// The client's predicted view of the active quotation.
///
/// `name` is `None` until the ERP has created the quotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub name: Option<QuotationName>,
    pub status: DocStatus,
    pub workflow_state: Option<WorkflowState>,
    pub currency: CurrencyCode,
    pub lines: Vec<CartLine>,
    pub totals: CartTotals,
    pub coupon_code: Option<String>,
    pub additional_discount_percentage: Decimal,
    pub notes: Option<String>,
    pub valid_till: Option<NaiveDate>,
}

impl Cart {
    /// An empty, not-yet-created cart.
    #[must_use]
    pub fn empty(currency: CurrencyCode) -> Self {
        Self {
            name: None,
            status: DocStatus::Draft,
            workflow_state: None,
            currency,
            lines: Vec::new(),
            totals: CartTotals::default(),
            coupon_code: None,
            additional_discount_percentage: Decimal::ZERO,
            notes: None,
            valid_till: None,
        }
    }

    /// Fold pending patches over the last server quotation.
    #[must_use]
    pub fn predict<'a>(
        server: Option<&Quotation>,
        currency: &CurrencyCode,
        pending: impl IntoIterator<Item = &'a CartPatch>,
    ) -> Self {
        let mut cart = server.map_or_else(|| Self::empty(currency.clone()), Self::from);
        for patch in pending {
            cart.apply(patch);
        }
        cart
    }

    /// Apply one optimistic patch and re-estimate totals.
    ///
    /// Patches for lines that no longer exist are ignored: the server already
    /// removed the line, so there is nothing left to predict.
    pub fn apply(&mut self, patch: &CartPatch) {
        match patch {
            CartPatch::AddLine(line) => self.lines.push(line.clone()),
            CartPatch::SetQty { line, qty } => {
                if let Some(existing) = self.lines.iter_mut().find(|l| &l.id == line) {
                    existing.set_qty(*qty);
                }
            }
            CartPatch::RemoveLine(line) => self.lines.retain(|l| &l.id != line),
        }
        self.estimate_totals();
    }

    /// Look up a line.
    #[must_use]
    pub fn line(&self, id: &LineId) -> Option<&CartLine> {
        self.lines.iter().find(|line| &line.id == id)
    }

    /// Number of lines.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Sum of quantities across lines.
    #[must_use]
    pub fn total_qty(&self) -> Decimal {
        self.lines
            .iter()
            .fold(Decimal::ZERO, |total, line| total.saturating_add(line.qty))
    }

    /// Whether any line is still a placeholder.
    #[must_use]
    pub fn has_placeholders(&self) -> bool {
        self.lines.iter().any(|line| line.id.is_pending())
    }

    /// Grand total as money.
    #[must_use]
    pub fn grand_total(&self) -> Money {
        Money::new(self.totals.grand_total, self.currency.clone())
    }

    // Saturating throughout: the estimate runs while the cart lock is held and
    // must not panic on oversized input.
    fn estimate_totals(&mut self) {
        let net_total = self
            .lines
            .iter()
            .fold(Decimal::ZERO, |total, line| total.saturating_add(line.amount));
        let discount_amount = if self.additional_discount_percentage.is_zero() {
            self.totals.discount_amount.min(net_total)
        } else {
            (net_total.saturating_mul(self.additional_discount_percentage) / HUNDRED).round_dp(2)
        };
        self.totals = CartTotals {
            net_total,
            discount_amount,
            grand_total: net_total.saturating_sub(discount_amount),
        };
    }
}

impl From<&Quotation> for Cart {
    fn from(quotation: &Quotation) -> Self {
        Self {
            name: Some(quotation.name.clone()),
            status: quotation.status,
            workflow_state: quotation.workflow_state,
            currency: quotation.currency.clone(),
            lines: quotation.lines.clone(),
            totals: quotation.totals.clone(),
            coupon_code: quotation.coupon_code.clone(),
            additional_discount_percentage: quotation.additional_discount_percentage,
            notes: quotation.notes.clone(),
            valid_till: quotation.valid_till,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn dec(units: i64, scale: u32) -> Decimal {
        Decimal::new(units, scale)
    }

    fn persisted_line(name: &str, item: &str, qty: i64, rate: Decimal) -> CartLine {
        CartLine {
            id: LineId::Persisted(LineName::new(name)),
            item_code: ItemCode::new(item),
            item_name: None,
            qty: Decimal::from(qty),
            rate,
            amount: Decimal::from(qty) * rate,
            uom: Some("Nos".to_string()),
            warehouse: None,
            note: None,
        }
    }

    fn quotation(lines: Vec<CartLine>) -> Quotation {
        let net_total: Decimal = lines.iter().map(|l| l.amount).sum();
        Quotation {
            name: QuotationName::new("SAL-QTN-0001"),
            status: DocStatus::Draft,
            workflow_state: Some(WorkflowState::Pending),
            currency: CurrencyCode::new("USD"),
            lines,
            totals: CartTotals {
                net_total,
                discount_amount: Decimal::ZERO,
                grand_total: net_total,
            },
            coupon_code: None,
            additional_discount_percentage: Decimal::ZERO,
            notes: None,
            transaction_date: None,
            valid_till: None,
        }
    }

    #[test]
    fn test_predict_without_patches_is_server_state() {
        let mut server = quotation(vec![persisted_line("row-a", "A", 2, dec(500, 2))]);
        // Server totals that a naive re-estimate would not reproduce (taxes, rounding).
        server.totals.grand_total = dec(1099, 2);

        let no_patches: [&CartPatch; 0] = [];
        let cart = Cart::predict(Some(&server), &CurrencyCode::default(), no_patches);
        assert_eq!(cart, Cart::from(&server));
        assert_eq!(cart.totals.grand_total, dec(1099, 2));
    }

    #[test]
    fn test_set_qty_recomputes_amount() {
        let server = quotation(vec![persisted_line("row-a", "A", 2, dec(500, 2))]);
        let patch = CartPatch::SetQty {
            line: LineId::Persisted(LineName::new("row-a")),
            qty: Decimal::from(3),
        };

        let cart = Cart::predict(Some(&server), &CurrencyCode::default(), [&patch]);
        assert_eq!(cart.lines[0].amount, dec(1500, 2));
        assert_eq!(cart.totals.net_total, dec(1500, 2));
        assert_eq!(cart.totals.grand_total, dec(1500, 2));
    }

    #[test]
    fn test_add_line_on_empty_cart() {
        let draft = LineDraft::new(ItemCode::new("B"), Decimal::from(4), dec(250, 2));
        let line = CartLine::provisional(LineId::placeholder(), &draft);
        let patch = CartPatch::AddLine(line);

        let cart = Cart::predict(None, &CurrencyCode::new("EUR"), [&patch]);
        assert!(cart.name.is_none());
        assert_eq!(cart.line_count(), 1);
        assert!(cart.has_placeholders());
        assert_eq!(cart.lines[0].amount, Decimal::from(10));
        assert_eq!(cart.currency.as_str(), "EUR");
    }

    #[test]
    fn test_remove_line() {
        let server = quotation(vec![
            persisted_line("row-a", "A", 2, dec(500, 2)),
            persisted_line("row-b", "B", 1, dec(300, 2)),
        ]);
        let patch = CartPatch::RemoveLine(LineId::Persisted(LineName::new("row-a")));

        let cart = Cart::predict(Some(&server), &CurrencyCode::default(), [&patch]);
        assert_eq!(cart.line_count(), 1);
        assert!(cart.line(&LineId::Persisted(LineName::new("row-a"))).is_none());
        assert_eq!(cart.totals.net_total, dec(300, 2));
    }

    #[test]
    fn test_percentage_discount_is_reestimated() {
        let mut server = quotation(vec![persisted_line("row-a", "A", 2, dec(500, 2))]);
        server.additional_discount_percentage = Decimal::from(10);
        server.totals.discount_amount = Decimal::ONE;
        server.totals.grand_total = Decimal::from(9);

        let patch = CartPatch::SetQty {
            line: LineId::Persisted(LineName::new("row-a")),
            qty: Decimal::from(4),
        };
        let cart = Cart::predict(Some(&server), &CurrencyCode::default(), [&patch]);
        assert_eq!(cart.totals.net_total, Decimal::from(20));
        assert_eq!(cart.totals.discount_amount, Decimal::from(2));
        assert_eq!(cart.totals.grand_total, Decimal::from(18));
    }

    #[test]
    fn test_patch_for_missing_line_is_ignored() {
        let server = quotation(vec![persisted_line("row-a", "A", 1, Decimal::ONE)]);
        let patch = CartPatch::SetQty {
            line: LineId::Persisted(LineName::new("gone")),
            qty: Decimal::from(9),
        };

        let cart = Cart::predict(Some(&server), &CurrencyCode::default(), [&patch]);
        assert_eq!(cart.lines, server.lines);
    }

    #[test]
    fn test_oversized_quantity_saturates() {
        let server = quotation(vec![
            persisted_line("row-a", "A", 1, dec(500, 2)),
            persisted_line("row-b", "B", 1, dec(300, 2)),
        ]);
        let patch = CartPatch::SetQty {
            line: LineId::Persisted(LineName::new("row-a")),
            qty: Decimal::MAX,
        };

        let cart = Cart::predict(Some(&server), &CurrencyCode::default(), [&patch]);
        assert_eq!(cart.lines[0].amount, Decimal::MAX);
        assert_eq!(cart.totals.net_total, Decimal::MAX);
        assert_eq!(cart.total_qty(), Decimal::MAX);
        assert!(CartLine::amount_for(Decimal::MAX, dec(500, 2)).is_none());
        assert_eq!(
            CartLine::amount_for(Decimal::from(3), dec(500, 2)),
            Some(dec(1500, 2))
        );
    }

    #[test]
    fn test_line_id_display() {
        let persisted = LineId::Persisted(LineName::new("row-a"));
        assert_eq!(persisted.to_string(), "row-a");
        assert!(LineId::placeholder().to_string().starts_with("pending:"));
    }
}
