//! The cart store.

use std::slice;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rust_decimal::Decimal;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use tradedesk_core::{
    Cart, CartChange, CartLine, CartPatch, CurrencyCode, LineDraft, LineId, LineName,
    ParentFields, Quotation, QuotationName,
};

use crate::erp::ErpError;

use super::api::QuotationApi;
use super::state::{CartSnapshot, CartState, Op, Outcome};
use super::CartError;

/// Holds the active cart and serializes its round trips.
///
/// Cheap to clone; clones share state.
pub struct CartStore<A> {
    inner: Arc<Shared<A>>,
}

struct Shared<A> {
    api: A,
    currency: CurrencyCode,
    state: Mutex<CartState>,
    /// Held across each RPC and the revalidation that follows it.
    wire: tokio::sync::Mutex<()>,
    snapshots: watch::Sender<CartSnapshot>,
}

impl<A> Clone for CartStore<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A> std::fmt::Debug for CartStore<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.inner.snapshots.borrow();
        f.debug_struct("CartStore")
            .field("name", &snapshot.cart.name)
            .field("phase", &snapshot.phase)
            .field("lines", &snapshot.cart.line_count())
            .finish_non_exhaustive()
    }
}

/// Settles its operation when dropped, so a cancelled caller cannot leave
/// a patch or a busy line behind.
struct Settle<'a, A> {
    store: &'a CartStore<A>,
    op: Option<Op>,
}

impl<A> Settle<'_, A> {
    fn generation(&self) -> u64 {
        self.op.as_ref().map_or(0, |op| op.generation)
    }

    /// Returns the settled prediction, or `None` if the cart was reset while
    /// the operation ran.
    fn finish(mut self, outcome: Outcome) -> Option<Cart> {
        let op = self.op.take()?;
        self.store.with_state(|state, currency| {
            state
                .finish(op, outcome)
                .then(|| state.prediction(currency))
        })
    }
}

impl<A> Drop for Settle<'_, A> {
    fn drop(&mut self) {
        if let Some(op) = self.op.take() {
            self.store.with_state(|state, _| state.finish(op, Outcome::Keep));
        }
    }
}

/// Marks the cart as reconciling while alive.
struct Reconciling<'a, A> {
    store: &'a CartStore<A>,
}

impl<'a, A> Reconciling<'a, A> {
    fn enter(store: &'a CartStore<A>) -> Self {
        store.with_state(|state, _| state.reconciling += 1);
        Self { store }
    }
}

impl<A> Drop for Reconciling<'_, A> {
    fn drop(&mut self) {
        self.store
            .with_state(|state, _| state.reconciling = state.reconciling.saturating_sub(1));
    }
}

impl<A> CartStore<A> {
    fn lock_state(&self) -> MutexGuard<'_, CartState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against the state and publish the resulting snapshot.
    fn with_state<R>(&self, f: impl FnOnce(&mut CartState, &CurrencyCode) -> R) -> R {
        let mut state = self.lock_state();
        let result = f(&mut state, &self.inner.currency);
        self.inner
            .snapshots
            .send_replace(state.snapshot(&self.inner.currency));
        result
    }

    fn start(&self, op: Op) -> Settle<'_, A> {
        Settle {
            store: self,
            op: Some(op),
        }
    }

    /// Name of the active quotation, unless the cart was reset since
    /// `generation`.
    fn current_name(&self, generation: u64) -> Result<Option<QuotationName>, CartError> {
        let state = self.lock_state();
        if state.generation != generation {
            return Err(CartError::Superseded);
        }
        Ok(state.name.clone())
    }

    /// The latest snapshot.
    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        self.inner.snapshots.borrow().clone()
    }

    /// Receive every published snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartSnapshot> {
        self.inner.snapshots.subscribe()
    }

    /// Name of the active quotation, if one exists.
    #[must_use]
    pub fn quotation_name(&self) -> Option<QuotationName> {
        self.lock_state().name.clone()
    }

    /// Drop the local cart reference so the next add creates a new cart.
    ///
    /// Nothing is sent to the ERP; the old quotation stays a draft there.
    pub fn clear(&self) {
        let name = self.with_state(|state, _| {
            let name = state.name.clone();
            state.reset();
            name
        });
        info!(quotation = ?name, "Cart cleared");
    }
}

impl<A: QuotationApi> CartStore<A> {
    /// Create an empty store. `currency` is used until the ERP returns a
    /// quotation.
    pub fn new(api: A, currency: CurrencyCode) -> Self {
        let state = CartState::default();
        let (snapshots, _) = watch::channel(state.snapshot(&currency));
        Self {
            inner: Arc::new(Shared {
                api,
                currency,
                state: Mutex::new(state),
                wire: tokio::sync::Mutex::new(()),
                snapshots,
            }),
        }
    }

    /// Fetch a quotation with the cart marked as reconciling.
    async fn refetch(&self, name: &QuotationName) -> Result<Quotation, ErpError> {
        let _reconciling = Reconciling::enter(self);
        let fetched = self.inner.api.get_cart(name).await;
        if let Err(e) = &fetched {
            error!(quotation = %name, error = %e, "Cart revalidation failed");
        }
        fetched
    }

    /// Send `change`, adopting the reply, or the re-fetched cart on failure.
    async fn mutate(&self, settle: Settle<'_, A>, change: CartChange) -> Result<Cart, CartError> {
        let _wire = self.inner.wire.lock().await;
        let name = self
            .current_name(settle.generation())?
            .ok_or(CartError::NoActiveCart)?;

        match self.inner.api.modify_cart(&name, &change).await {
            Ok(quotation) => settle
                .finish(Outcome::Adopt(quotation))
                .ok_or(CartError::Superseded),
            Err(e) => {
                warn!(quotation = %name, error = %e, "Cart mutation failed, revalidating");
                let outcome = self
                    .refetch(&name)
                    .await
                    .map_or(Outcome::Keep, Outcome::Adopt);
                settle.finish(outcome);
                Err(e.into())
            }
        }
    }

    /// Add a line.
    ///
    /// The line shows up in the prediction at once under a placeholder id.
    /// The first add creates the quotation. Whatever the outcome, the cart is
    /// re-fetched afterwards, which swaps the placeholder for the persisted
    /// line or drops it.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidQuantity`] if `qty × rate` overflows, the
    /// ERP error if the add was rejected, [`CartError::NotDraft`]
    /// if the quotation was already submitted, or [`CartError::Superseded`]
    /// if the cart was cleared meanwhile.
    #[instrument(skip(self, draft), fields(item_code = %draft.item_code, qty = %draft.qty))]
    pub async fn add_item(&self, draft: LineDraft) -> Result<Cart, CartError> {
        if CartLine::amount_for(draft.qty, draft.rate).is_none() {
            return Err(CartError::InvalidQuantity(draft.qty));
        }
        let line = CartLine::provisional(LineId::placeholder(), &draft);
        let op = self.with_state(|state, _| {
            state.ensure_draft()?;
            Ok::<_, CartError>(state.begin(Some(CartPatch::AddLine(line))))
        })?;
        let settle = self.start(op);

        let _wire = self.inner.wire.lock().await;
        let existing = self.current_name(settle.generation())?;

        let result = if let Some(name) = &existing {
            let change = CartChange::AddItem(draft);
            self.inner.api.modify_cart(name, &change).await
        } else {
            self.inner.api.create_cart(slice::from_ref(&draft)).await
        };

        match &result {
            Ok(quotation) if existing.is_none() => {
                info!(quotation = %quotation.name, "Cart created");
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Add item failed, revalidating"),
        }

        let target = result
            .as_ref()
            .ok()
            .map(|quotation| quotation.name.clone())
            .or(existing);
        let fetched = match &target {
            Some(name) => self.refetch(name).await.ok(),
            None => None,
        };

        let outcome = match (fetched, &result) {
            (Some(quotation), _) => Outcome::Adopt(quotation),
            (None, Ok(quotation)) => Outcome::Adopt(quotation.clone()),
            (None, Err(_)) => Outcome::Keep,
        };
        let settled = settle.finish(outcome);

        result?;
        settled.ok_or(CartError::Superseded)
    }

    /// Set a line's quantity.
    ///
    /// Quantities below one are the caller's concern.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::LineBusy`] if the line already has a mutation in
    /// flight, [`CartError::LineNotFound`] if it is not in the cart,
    /// [`CartError::InvalidQuantity`] if `qty × rate` overflows, or the
    /// ERP error if the update was rejected (after rolling back).
    #[instrument(skip(self, line), fields(line = %line))]
    pub async fn update_item(&self, line: &LineName, qty: Decimal) -> Result<Cart, CartError> {
        let op = self.with_state(|state, currency| {
            state.ensure_draft()?;
            let claimed = state.claim_line(line, currency)?;
            if CartLine::amount_for(qty, claimed.rate).is_none() {
                return Err(CartError::InvalidQuantity(qty));
            }
            Ok::<_, CartError>(state.begin(Some(CartPatch::SetQty {
                line: claimed.id,
                qty,
            })))
        })?;
        let settle = self.start(op);

        let change = CartChange::UpdateItem {
            line: line.clone(),
            qty,
        };
        self.mutate(settle, change).await
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Same as [`Self::update_item`].
    #[instrument(skip(self, line), fields(line = %line))]
    pub async fn remove_item(&self, line: &LineName) -> Result<Cart, CartError> {
        let op = self.with_state(|state, currency| {
            state.ensure_draft()?;
            let id = state.claim_line(line, currency)?.id;
            Ok::<_, CartError>(state.begin(Some(CartPatch::RemoveLine(id))))
        })?;
        let settle = self.start(op);

        let change = CartChange::DeleteItem { line: line.clone() };
        self.mutate(settle, change).await
    }

    /// Update quotation header fields. Nothing is predicted.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NoActiveCart`] if no quotation exists yet, or the
    /// ERP error if the update was rejected.
    #[instrument(skip(self, details))]
    pub async fn update_details(&self, details: ParentFields) -> Result<Cart, CartError> {
        let op = self.with_state(|state, _| {
            state.ensure_draft()?;
            if state.name.is_none() {
                return Err(CartError::NoActiveCart);
            }
            Ok(state.begin(None))
        })?;
        let settle = self.start(op);

        self.mutate(settle, CartChange::UpdateParent(details)).await
    }

    /// Submit the quotation and end the cart.
    ///
    /// Waits for every earlier mutation first. On success the local
    /// reference is dropped and the submitted quotation returned.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NoActiveCart`] if no quotation exists, or the ERP
    /// error if submission was rejected (after revalidating).
    #[instrument(skip(self))]
    pub async fn submit(&self) -> Result<Quotation, CartError> {
        let op = self.with_state(|state, _| {
            state.ensure_draft()?;
            if state.name.is_none() {
                return Err(CartError::NoActiveCart);
            }
            Ok(state.begin(None))
        })?;
        let settle = self.start(op);

        let _wire = self.inner.wire.lock().await;
        let name = self
            .current_name(settle.generation())?
            .ok_or(CartError::NoActiveCart)?;

        match self.inner.api.submit_cart(&name).await {
            Ok(quotation) => {
                settle.finish(Outcome::Reset);
                info!(quotation = %quotation.name, "Quotation submitted");
                Ok(quotation)
            }
            Err(e) => {
                warn!(quotation = %name, error = %e, "Submit failed, revalidating");
                let outcome = self
                    .refetch(&name)
                    .await
                    .map_or(Outcome::Keep, Outcome::Adopt);
                settle.finish(outcome);
                Err(e.into())
            }
        }
    }

    /// Re-fetch the authoritative cart.
    ///
    /// A quotation that has left draft (submitted or cancelled in the ERP)
    /// ends the cart.
    ///
    /// # Errors
    ///
    /// Returns the ERP error if the fetch fails; the prediction is left as
    /// it was. Returns [`CartError::NotDraft`] if the cart ended.
    #[instrument(skip(self))]
    pub async fn revalidate(&self) -> Result<Cart, CartError> {
        let generation = self.lock_state().generation;
        self.reload(generation).await
    }

    /// Make `name` the active cart and load it.
    ///
    /// # Errors
    ///
    /// Same as [`Self::revalidate`]. On a failed fetch the name is kept, so
    /// a later revalidation can still pick the cart up.
    #[instrument(skip(self, name), fields(quotation = %name))]
    pub async fn resume(&self, name: QuotationName) -> Result<Cart, CartError> {
        let generation = self.with_state(|state, _| {
            state.reset();
            state.name = Some(name);
            state.generation
        });
        self.reload(generation).await
    }

    async fn reload(&self, generation: u64) -> Result<Cart, CartError> {
        let _wire = self.inner.wire.lock().await;
        let Some(name) = self.current_name(generation)? else {
            return Ok(self.snapshot().cart);
        };

        let quotation = self.refetch(&name).await?;
        self.with_state(|state, currency| {
            if state.generation != generation {
                return Err(CartError::Superseded);
            }
            if !quotation.status.is_draft() {
                debug!(status = ?quotation.status, "Quotation left draft, dropping cart");
                state.reset();
                return Err(CartError::NotDraft(quotation.name));
            }
            state.adopt(quotation);
            Ok(state.prediction(currency))
        })
    }
}
