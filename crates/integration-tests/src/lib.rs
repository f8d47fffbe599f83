//! Integration tests for Tradedesk.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p tradedesk-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `cart_store` - Optimistic cart sync against an in-memory ERP
//!
//! # Fake ERP
//!
//! [`FakeErp`] keeps quotations in memory and prices lines like the real
//! backend: `amount = qty × rate`, with an optional document discount. It
//! can fail the next calls and hold a mutation mid-flight so tests can look
//! at the optimistic state.
//!
//! ```rust,ignore
//! let erp = FakeErp::new();
//! let store = CartStore::new(erp.clone(), CurrencyCode::new("USD"));
//!
//! let pause = erp.pause_next_mutation();
//! let task = tokio::spawn({
//!     let store = store.clone();
//!     async move { store.add_item(draft).await }
//! });
//! pause.entered().await;
//! assert!(store.snapshot().cart.has_placeholders());
//! pause.release();
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use reqwest::StatusCode;
use rust_decimal::Decimal;
use tokio::sync::Notify;

use tradedesk_core::{
    CartChange, CartLine, CartTotals, CurrencyCode, DocStatus, ItemCode, LineDraft, LineId,
    LineName, Quotation, QuotationName, WorkflowState,
};
use tradedesk_storefront::cart::QuotationApi;
use tradedesk_storefront::erp::ErpError;

/// An in-memory quotation backend.
///
/// Cheap to clone; clones share state, so a test can keep a handle while the
/// store owns another.
#[derive(Clone, Default)]
pub struct FakeErp {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    quotations: Mutex<HashMap<QuotationName, Quotation>>,
    prices: Mutex<HashMap<ItemCode, Decimal>>,
    discount_percentage: Mutex<Decimal>,
    next_id: AtomicU64,
    fail_mutation: AtomicBool,
    fail_fetches: AtomicUsize,
    gate: Mutex<Option<Gate>>,
    creates: AtomicUsize,
    fetches: AtomicUsize,
    modifies: AtomicUsize,
    submits: AtomicUsize,
}

#[derive(Clone)]
struct Gate {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

/// Holds one mutation inside the fake until released.
pub struct Pause {
    gate: Gate,
}

impl Pause {
    /// Wait until the held mutation has reached the fake.
    pub async fn entered(&self) {
        self.gate.entered.notified().await;
    }

    /// Let the held mutation complete.
    pub fn release(&self) {
        self.gate.release.notify_one();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn unavailable() -> ErpError {
    ErpError::Status {
        status: StatusCode::SERVICE_UNAVAILABLE,
        message: "injected failure".to_string(),
    }
}

fn recompute(quotation: &mut Quotation) {
    let net_total: Decimal = quotation.lines.iter().map(|line| line.amount).sum();
    let discount_amount =
        (net_total * quotation.additional_discount_percentage / Decimal::ONE_HUNDRED).round_dp(2);
    quotation.totals = CartTotals {
        net_total,
        discount_amount,
        grand_total: net_total - discount_amount,
    };
}

impl FakeErp {
    /// An empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Price `item_code` at `rate` regardless of the rate the client saw.
    pub fn set_price(&self, item_code: &str, rate: Decimal) {
        lock(&self.inner.prices).insert(ItemCode::new(item_code), rate);
    }

    /// Apply a document discount to quotations created from now on.
    pub fn set_discount_percentage(&self, percentage: Decimal) {
        *lock(&self.inner.discount_percentage) = percentage;
    }

    /// Fail the next create, modify or submit call.
    pub fn fail_next_mutation(&self) {
        self.inner.fail_mutation.store(true, Ordering::SeqCst);
    }

    /// Fail the next `count` fetches.
    pub fn fail_next_fetches(&self, count: usize) {
        self.inner.fail_fetches.store(count, Ordering::SeqCst);
    }

    /// Hold the next create or modify call until [`Pause::release`].
    #[must_use]
    pub fn pause_next_mutation(&self) -> Pause {
        let gate = Gate {
            entered: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        };
        *lock(&self.inner.gate) = Some(gate.clone());
        Pause { gate }
    }

    /// Mark a quotation submitted behind the client's back.
    pub fn submit_externally(&self, name: &QuotationName) {
        if let Some(quotation) = lock(&self.inner.quotations).get_mut(name) {
            quotation.status = DocStatus::Submitted;
        }
    }

    /// The stored quotation.
    #[must_use]
    pub fn quotation(&self, name: &QuotationName) -> Option<Quotation> {
        lock(&self.inner.quotations).get(name).cloned()
    }

    /// Number of quotations created.
    #[must_use]
    pub fn create_calls(&self) -> usize {
        self.inner.creates.load(Ordering::SeqCst)
    }

    /// Number of fetches, failed ones included.
    #[must_use]
    pub fn fetch_calls(&self) -> usize {
        self.inner.fetches.load(Ordering::SeqCst)
    }

    /// Number of modify calls, failed ones included.
    #[must_use]
    pub fn modify_calls(&self) -> usize {
        self.inner.modifies.load(Ordering::SeqCst)
    }

    /// Number of submit calls, failed ones included.
    #[must_use]
    pub fn submit_calls(&self) -> usize {
        self.inner.submits.load(Ordering::SeqCst)
    }

    fn next_id(&self) -> u64 {
        self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn hold(&self) {
        let gate = lock(&self.inner.gate).take();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
    }

    fn take_mutation_failure(&self) -> Result<(), ErpError> {
        if self.inner.fail_mutation.swap(false, Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(())
    }

    fn line(&self, draft: &LineDraft) -> CartLine {
        let rate = lock(&self.inner.prices)
            .get(&draft.item_code)
            .copied()
            .unwrap_or(draft.rate);
        CartLine {
            id: LineId::Persisted(LineName::new(format!("row-{}", self.next_id()))),
            item_code: draft.item_code.clone(),
            item_name: draft.item_name.clone(),
            qty: draft.qty,
            rate,
            amount: draft.qty * rate,
            uom: draft.uom.clone(),
            warehouse: draft.warehouse.clone(),
            note: draft.note.clone(),
        }
    }

    fn edit(&self, name: &QuotationName, change: &CartChange) -> Result<Quotation, ErpError> {
        let new_line = match change {
            CartChange::AddItem(draft) => Some(self.line(draft)),
            _ => None,
        };

        let mut quotations = lock(&self.inner.quotations);
        let quotation = quotations
            .get_mut(name)
            .ok_or_else(|| ErpError::NotFound(name.to_string()))?;
        if !quotation.status.is_draft() {
            return Err(ErpError::Application(format!(
                "Quotation {name} is not a draft"
            )));
        }

        match change {
            CartChange::AddItem(_) => quotation.lines.extend(new_line),
            CartChange::UpdateItem { line, qty } => {
                let row = quotation
                    .lines
                    .iter_mut()
                    .find(|row| row.id.persisted() == Some(line))
                    .ok_or_else(|| ErpError::Application(format!("Row {line} not found")))?;
                row.qty = *qty;
                row.amount = *qty * row.rate;
            }
            CartChange::DeleteItem { line } => {
                quotation.lines.retain(|row| row.id.persisted() != Some(line));
            }
            CartChange::UpdateParent(fields) => {
                if let Some(coupon) = &fields.coupon_code {
                    quotation.coupon_code = Some(coupon.clone());
                }
                if let Some(notes) = &fields.notes {
                    quotation.notes = Some(notes.clone());
                }
            }
        }
        recompute(quotation);
        Ok(quotation.clone())
    }
}

impl QuotationApi for FakeErp {
    async fn create_cart(&self, lines: &[LineDraft]) -> Result<Quotation, ErpError> {
        self.inner.creates.fetch_add(1, Ordering::SeqCst);
        self.hold().await;
        self.take_mutation_failure()?;

        let mut quotation = Quotation {
            name: QuotationName::new(format!("SAL-QTN-{:05}", self.next_id())),
            status: DocStatus::Draft,
            workflow_state: Some(WorkflowState::Pending),
            currency: CurrencyCode::new("USD"),
            lines: lines.iter().map(|draft| self.line(draft)).collect(),
            totals: CartTotals::default(),
            coupon_code: None,
            additional_discount_percentage: *lock(&self.inner.discount_percentage),
            notes: None,
            transaction_date: None,
            valid_till: None,
        };
        recompute(&mut quotation);

        lock(&self.inner.quotations).insert(quotation.name.clone(), quotation.clone());
        Ok(quotation)
    }

    async fn get_cart(&self, name: &QuotationName) -> Result<Quotation, ErpError> {
        self.inner.fetches.fetch_add(1, Ordering::SeqCst);
        let failed = self
            .inner
            .fail_fetches
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(unavailable());
        }
        self.quotation(name)
            .ok_or_else(|| ErpError::NotFound(name.to_string()))
    }

    async fn modify_cart(
        &self,
        name: &QuotationName,
        change: &CartChange,
    ) -> Result<Quotation, ErpError> {
        self.inner.modifies.fetch_add(1, Ordering::SeqCst);
        self.hold().await;
        self.take_mutation_failure()?;
        self.edit(name, change)
    }

    async fn submit_cart(&self, name: &QuotationName) -> Result<Quotation, ErpError> {
        self.inner.submits.fetch_add(1, Ordering::SeqCst);
        self.take_mutation_failure()?;

        let mut quotations = lock(&self.inner.quotations);
        let quotation = quotations
            .get_mut(name)
            .ok_or_else(|| ErpError::NotFound(name.to_string()))?;
        if !quotation.status.is_draft() {
            return Err(ErpError::Application(format!(
                "Quotation {name} is not a draft"
            )));
        }
        quotation.status = DocStatus::Submitted;
        Ok(quotation.clone())
    }
}
