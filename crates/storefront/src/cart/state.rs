//! Cart state and the snapshots published from it.

use std::collections::BTreeSet;

use serde::Serialize;

use tradedesk_core::{
    Cart, CartLine, CartPatch, CurrencyCode, LineId, LineName, Quotation, QuotationName,
};

use super::CartError;

/// Where the cart is in its sync cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    /// Prediction equals the last server state.
    Idle,
    /// At least one mutation has not settled.
    PendingMutation,
    /// The authoritative cart is being re-fetched.
    Reconciling,
}

/// A consistent view of the cart at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartSnapshot {
    /// The predicted cart.
    pub cart: Cart,
    pub phase: SyncPhase,
    /// Lines with a mutation in flight.
    pub updating: BTreeSet<LineId>,
}

impl CartSnapshot {
    /// Whether a mutation on `line` is in flight.
    #[must_use]
    pub fn is_updating(&self, line: &LineId) -> bool {
        self.updating.contains(line)
    }
}

/// How a settled operation changes the server state.
#[derive(Debug)]
pub(super) enum Outcome {
    /// Keep the last server state.
    Keep,
    /// Adopt a fresh authoritative quotation.
    Adopt(Quotation),
    /// Drop the cart reference.
    Reset,
}

/// An operation between its optimistic start and its settlement.
#[derive(Debug)]
pub(super) struct Op {
    pub generation: u64,
    ticket: Option<u64>,
    line: Option<LineId>,
}

#[derive(Debug, Default)]
pub(super) struct CartState {
    /// Bumped on every reset. Operations started in an older generation
    /// settle without touching the cart.
    pub generation: u64,
    /// Active quotation. Known before `server` when resuming.
    pub name: Option<QuotationName>,
    /// Last authoritative quotation.
    pub server: Option<Quotation>,
    pending: Vec<(u64, CartPatch)>,
    updating: BTreeSet<LineId>,
    in_flight: usize,
    pub reconciling: usize,
    next_ticket: u64,
}

impl CartState {
    pub fn phase(&self) -> SyncPhase {
        if self.reconciling > 0 {
            SyncPhase::Reconciling
        } else if self.in_flight > 0 || !self.pending.is_empty() {
            SyncPhase::PendingMutation
        } else {
            SyncPhase::Idle
        }
    }

    pub fn prediction(&self, currency: &CurrencyCode) -> Cart {
        let mut cart = Cart::predict(
            self.server.as_ref(),
            currency,
            self.pending.iter().map(|(_, patch)| patch),
        );
        if cart.name.is_none() {
            cart.name.clone_from(&self.name);
        }
        cart
    }

    pub fn snapshot(&self, currency: &CurrencyCode) -> CartSnapshot {
        CartSnapshot {
            cart: self.prediction(currency),
            phase: self.phase(),
            updating: self.updating.clone(),
        }
    }

    /// Refuse to mutate a quotation that has left draft.
    pub fn ensure_draft(&self) -> Result<(), CartError> {
        match &self.server {
            Some(server) if !server.status.is_draft() => {
                Err(CartError::NotDraft(server.name.clone()))
            }
            _ => Ok(()),
        }
    }

    /// Check that a persisted line exists and has no mutation in flight.
    ///
    /// Returns the line as currently predicted.
    pub fn claim_line(
        &self,
        line: &LineName,
        currency: &CurrencyCode,
    ) -> Result<CartLine, CartError> {
        let id = LineId::Persisted(line.clone());
        if self.updating.contains(&id) {
            return Err(CartError::LineBusy(id));
        }
        self.prediction(currency)
            .lines
            .into_iter()
            .find(|predicted| predicted.id == id)
            .ok_or_else(|| CartError::LineNotFound(line.clone()))
    }

    /// Start an operation, optionally with an optimistic patch.
    pub fn begin(&mut self, patch: Option<CartPatch>) -> Op {
        let (ticket, line) = match patch {
            Some(patch) => {
                let ticket = self.next_ticket;
                self.next_ticket += 1;
                let line = patch.line_id().clone();
                self.updating.insert(line.clone());
                self.pending.push((ticket, patch));
                (Some(ticket), Some(line))
            }
            None => (None, None),
        };
        self.in_flight += 1;
        Op {
            generation: self.generation,
            ticket,
            line,
        }
    }

    /// Settle an operation. Returns `false` if the cart was reset meanwhile
    /// and the outcome was discarded.
    pub fn finish(&mut self, op: Op, outcome: Outcome) -> bool {
        self.in_flight = self.in_flight.saturating_sub(1);
        if let Some(ticket) = op.ticket {
            self.pending.retain(|(t, _)| *t != ticket);
        }
        if let Some(line) = &op.line {
            self.updating.remove(line);
        }

        if op.generation != self.generation {
            return false;
        }
        match outcome {
            Outcome::Keep => {}
            Outcome::Adopt(quotation) => self.adopt(quotation),
            Outcome::Reset => self.reset(),
        }
        true
    }

    pub fn adopt(&mut self, quotation: Quotation) {
        self.name = Some(quotation.name.clone());
        self.server = Some(quotation);
    }

    /// Drop the cart reference. In-flight operations still settle, but
    /// their outcomes are discarded.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.name = None;
        self.server = None;
        self.pending.clear();
        self.updating.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use rust_decimal::Decimal;
    use tradedesk_core::{CartTotals, DocStatus, ItemCode, LineDraft};

    use super::*;

    fn server(lines: Vec<CartLine>) -> Quotation {
        Quotation {
            name: QuotationName::new("SAL-QTN-0001"),
            status: DocStatus::Draft,
            workflow_state: None,
            currency: CurrencyCode::new("USD"),
            lines,
            totals: CartTotals::default(),
            coupon_code: None,
            additional_discount_percentage: Decimal::ZERO,
            notes: None,
            transaction_date: None,
            valid_till: None,
        }
    }

    fn line(name: &str) -> CartLine {
        let draft = LineDraft::new(ItemCode::new("A"), Decimal::from(2), Decimal::from(5));
        CartLine::provisional(LineId::Persisted(LineName::new(name)), &draft)
    }

    #[test]
    fn test_phase_transitions() {
        let usd = CurrencyCode::new("USD");
        let mut state = CartState::default();
        assert_eq!(state.phase(), SyncPhase::Idle);

        let draft = LineDraft::new(ItemCode::new("A"), Decimal::ONE, Decimal::ONE);
        let op = state.begin(Some(CartPatch::AddLine(CartLine::provisional(
            LineId::placeholder(),
            &draft,
        ))));
        assert_eq!(state.phase(), SyncPhase::PendingMutation);
        assert_eq!(state.prediction(&usd).line_count(), 1);

        state.reconciling += 1;
        assert_eq!(state.phase(), SyncPhase::Reconciling);
        state.reconciling -= 1;

        assert!(state.finish(op, Outcome::Adopt(server(vec![line("row-1")]))));
        assert_eq!(state.phase(), SyncPhase::Idle);
        let cart = state.prediction(&usd);
        assert!(!cart.has_placeholders());
        assert_eq!(cart.name.unwrap().as_str(), "SAL-QTN-0001");
    }

    #[test]
    fn test_claim_line() {
        let usd = CurrencyCode::new("USD");
        let mut state = CartState::default();
        state.adopt(server(vec![line("row-1")]));

        let row = LineName::new("row-1");
        let id = state.claim_line(&row, &usd).unwrap().id;
        let _op = state.begin(Some(CartPatch::SetQty {
            line: id,
            qty: Decimal::from(3),
        }));

        assert!(matches!(
            state.claim_line(&row, &usd),
            Err(CartError::LineBusy(_))
        ));
        assert!(matches!(
            state.claim_line(&LineName::new("row-9"), &usd),
            Err(CartError::LineNotFound(_))
        ));
    }

    #[test]
    fn test_reset_discards_stale_outcome() {
        let usd = CurrencyCode::new("USD");
        let mut state = CartState::default();
        state.adopt(server(vec![line("row-1")]));

        let op = state.begin(Some(CartPatch::RemoveLine(LineId::Persisted(
            LineName::new("row-1"),
        ))));
        state.reset();
        assert_eq!(state.phase(), SyncPhase::PendingMutation);

        assert!(!state.finish(op, Outcome::Adopt(server(vec![]))));
        assert!(state.server.is_none());
        assert!(state.name.is_none());
        assert_eq!(state.phase(), SyncPhase::Idle);
        assert!(state.prediction(&usd).lines.is_empty());
    }

    #[test]
    fn test_ensure_draft() {
        let mut state = CartState::default();
        assert!(state.ensure_draft().is_ok());

        let mut submitted = server(vec![]);
        submitted.status = DocStatus::Submitted;
        state.adopt(submitted);
        assert!(matches!(state.ensure_draft(), Err(CartError::NotDraft(_))));
    }
}
