//! Integration tests for the optimistic cart store.
//!
//! These run the store against the in-memory [`FakeErp`], so they cover
//! reconciliation without a real ERP.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use rust_decimal::Decimal;

use tradedesk_core::{
    Cart, CurrencyCode, DocStatus, ItemCode, LineDraft, LineId, LineName, ParentFields,
};
use tradedesk_integration_tests::FakeErp;
use tradedesk_storefront::cart::{CartError, CartStore, SyncPhase};

fn store() -> (FakeErp, CartStore<FakeErp>) {
    let erp = FakeErp::new();
    let store = CartStore::new(erp.clone(), CurrencyCode::new("USD"));
    (erp, store)
}

fn draft(item: &str, qty: i64, rate: Decimal) -> LineDraft {
    let mut draft = LineDraft::new(ItemCode::new(item), Decimal::from(qty), rate);
    draft.item_name = Some(format!("Item {item}"));
    draft.uom = Some("Nos".to_string());
    draft
}

fn five() -> Decimal {
    Decimal::new(500, 2)
}

fn line_name(cart: &Cart, index: usize) -> LineName {
    cart.lines[index].id.persisted().unwrap().clone()
}

/// The store's prediction must equal what the ERP holds.
fn assert_converged(erp: &FakeErp, store: &CartStore<FakeErp>) {
    let snapshot = store.snapshot();
    let name = snapshot.cart.name.clone().unwrap();
    assert_eq!(snapshot.cart, Cart::from(&erp.quotation(&name).unwrap()));
    assert_eq!(snapshot.phase, SyncPhase::Idle);
    assert!(snapshot.updating.is_empty());
}

// =============================================================================
// Add
// =============================================================================

#[tokio::test]
async fn test_first_add_creates_cart() {
    let (erp, store) = store();

    let cart = store.add_item(draft("A", 2, five())).await.unwrap();

    assert_eq!(cart.line_count(), 1);
    assert!(!cart.has_placeholders());
    assert!(cart.name.is_some());
    assert_eq!(cart.lines[0].amount, Decimal::new(1000, 2));
    assert_eq!(erp.create_calls(), 1);
    assert_eq!(erp.modify_calls(), 0);
    assert_eq!(erp.fetch_calls(), 1);
    assert_converged(&erp, &store);
}

#[tokio::test]
async fn test_add_grows_cart_by_one_line() {
    let (erp, store) = store();
    let before = store.add_item(draft("A", 2, five())).await.unwrap();

    let after = store.add_item(draft("B", 1, five())).await.unwrap();

    assert_eq!(after.line_count(), before.line_count() + 1);
    assert_eq!(after.name, before.name);
    assert!(!after.has_placeholders());
    assert_eq!(erp.create_calls(), 1);
    assert_eq!(erp.modify_calls(), 1);
    assert_converged(&erp, &store);
}

#[tokio::test]
async fn test_add_adopts_server_price() {
    let (erp, store) = store();
    erp.set_price("A", Decimal::new(450, 2));

    let cart = store.add_item(draft("A", 2, five())).await.unwrap();

    assert_eq!(cart.lines[0].rate, Decimal::new(450, 2));
    assert_eq!(cart.totals.grand_total, Decimal::new(900, 2));
}

#[tokio::test]
async fn test_placeholder_visible_while_add_in_flight() {
    let (erp, store) = store();
    let pause = erp.pause_next_mutation();

    let task = tokio::spawn({
        let store = store.clone();
        async move { store.add_item(draft("A", 2, five())).await }
    });
    pause.entered().await;

    let snapshot = store.snapshot();
    assert_eq!(snapshot.phase, SyncPhase::PendingMutation);
    assert_eq!(snapshot.cart.line_count(), 1);
    assert!(snapshot.cart.name.is_none());
    let placeholder = snapshot.cart.lines[0].id.clone();
    assert!(placeholder.is_pending());
    assert!(snapshot.is_updating(&placeholder));
    assert_eq!(snapshot.cart.totals.net_total, Decimal::new(1000, 2));

    pause.release();
    let cart = task.await.unwrap().unwrap();

    assert!(cart.line(&placeholder).is_none());
    assert!(!cart.has_placeholders());
    assert_converged(&erp, &store);
}

#[tokio::test]
async fn test_failed_add_drops_placeholder() {
    let (erp, store) = store();
    let before = store.add_item(draft("A", 2, five())).await.unwrap();

    erp.fail_next_mutation();
    let result = store.add_item(draft("B", 1, five())).await;

    assert!(matches!(result, Err(CartError::Remote(_))));
    let snapshot = store.snapshot();
    assert_eq!(snapshot.cart, before);
    assert!(!snapshot.cart.has_placeholders());
    assert_converged(&erp, &store);
}

#[tokio::test]
async fn test_failed_first_add_leaves_empty_cart() {
    let (erp, store) = store();

    erp.fail_next_mutation();
    let result = store.add_item(draft("A", 1, five())).await;

    assert!(result.is_err());
    let snapshot = store.snapshot();
    assert!(snapshot.cart.name.is_none());
    assert_eq!(snapshot.cart.line_count(), 0);
    assert_eq!(snapshot.phase, SyncPhase::Idle);
    // Nothing to re-fetch without a quotation
    assert_eq!(erp.fetch_calls(), 0);
}

#[tokio::test]
async fn test_concurrent_first_adds_create_one_cart() {
    let (erp, store) = store();

    let (a, b) = tokio::join!(
        store.add_item(draft("A", 1, five())),
        store.add_item(draft("B", 2, five())),
    );

    a.unwrap();
    let cart = b.unwrap();
    assert_eq!(erp.create_calls(), 1);
    assert_eq!(erp.modify_calls(), 1);
    assert_eq!(cart.line_count(), 2);
    assert_converged(&erp, &store);
}

// =============================================================================
// Update and remove
// =============================================================================

#[tokio::test]
async fn test_update_sets_amount() {
    let (erp, store) = store();
    let cart = store.add_item(draft("A", 2, five())).await.unwrap();
    let line = line_name(&cart, 0);

    let cart = store.update_item(&line, Decimal::from(3)).await.unwrap();

    let updated = cart.line(&LineId::Persisted(line)).unwrap();
    assert_eq!(updated.qty, Decimal::from(3));
    assert_eq!(updated.amount, Decimal::new(1500, 2));
    assert_eq!(cart.totals.grand_total, Decimal::new(1500, 2));
    assert_converged(&erp, &store);
}

#[tokio::test]
async fn test_update_predicts_before_reply() {
    let (erp, store) = store();
    let cart = store.add_item(draft("A", 2, five())).await.unwrap();
    let line = line_name(&cart, 0);
    let id = LineId::Persisted(line.clone());

    let pause = erp.pause_next_mutation();
    let task = tokio::spawn({
        let store = store.clone();
        let line = line.clone();
        async move { store.update_item(&line, Decimal::from(4)).await }
    });
    pause.entered().await;

    let snapshot = store.snapshot();
    assert_eq!(snapshot.phase, SyncPhase::PendingMutation);
    assert!(snapshot.is_updating(&id));
    assert_eq!(snapshot.cart.line(&id).unwrap().amount, Decimal::new(2000, 2));

    pause.release();
    task.await.unwrap().unwrap();
    assert_converged(&erp, &store);
}

#[tokio::test]
async fn test_second_mutation_on_busy_line_rejected() {
    let (erp, store) = store();
    let cart = store.add_item(draft("A", 2, five())).await.unwrap();
    let line = line_name(&cart, 0);

    let pause = erp.pause_next_mutation();
    let task = tokio::spawn({
        let store = store.clone();
        let line = line.clone();
        async move { store.update_item(&line, Decimal::from(3)).await }
    });
    pause.entered().await;

    let busy = store.update_item(&line, Decimal::from(5)).await;
    assert!(matches!(busy, Err(CartError::LineBusy(_))));
    let busy = store.remove_item(&line).await;
    assert!(matches!(busy, Err(CartError::LineBusy(_))));

    pause.release();
    let cart = task.await.unwrap().unwrap();
    assert_eq!(cart.lines[0].qty, Decimal::from(3));

    // The slot frees up once the first mutation settles
    store.update_item(&line, Decimal::from(5)).await.unwrap();
    assert_eq!(erp.modify_calls(), 2);
}

#[tokio::test]
async fn test_unknown_line_rejected() {
    let (erp, store) = store();
    store.add_item(draft("A", 1, five())).await.unwrap();

    let result = store
        .update_item(&LineName::new("row-missing"), Decimal::from(2))
        .await;

    assert!(matches!(result, Err(CartError::LineNotFound(_))));
    assert_eq!(erp.modify_calls(), 0);
}

#[tokio::test]
async fn test_out_of_range_quantity_leaves_store_usable() {
    let (erp, store) = store();
    let cart = store.add_item(draft("A", 1, five())).await.unwrap();
    let row = line_name(&cart, 0);

    let result = store.update_item(&row, Decimal::MAX).await;
    assert!(matches!(result, Err(CartError::InvalidQuantity(_))));

    let mut huge = draft("B", 1, five());
    huge.qty = Decimal::MAX;
    let result = store.add_item(huge).await;
    assert!(matches!(result, Err(CartError::InvalidQuantity(_))));

    assert_eq!(store.snapshot().phase, SyncPhase::Idle);
    assert!(store.snapshot().updating.is_empty());
    assert_eq!(erp.modify_calls(), 0);

    store.revalidate().await.unwrap();
    let cart = store.update_item(&row, Decimal::from(3)).await.unwrap();
    assert_eq!(cart.lines[0].amount, Decimal::new(1500, 2));
    let cart = store.add_item(draft("B", 1, five())).await.unwrap();
    assert_eq!(cart.line_count(), 2);
    assert_converged(&erp, &store);
}

#[tokio::test]
async fn test_remove_drops_line() {
    let (erp, store) = store();
    store.add_item(draft("A", 1, five())).await.unwrap();
    let cart = store.add_item(draft("B", 2, five())).await.unwrap();
    let line = line_name(&cart, 0);

    let cart = store.remove_item(&line).await.unwrap();

    assert!(cart.line(&LineId::Persisted(line)).is_none());
    assert_eq!(cart.line_count(), 1);
    assert_eq!(cart.totals.net_total, Decimal::new(1000, 2));
    assert_converged(&erp, &store);
}

// =============================================================================
// Rollback
// =============================================================================

#[tokio::test]
async fn test_failed_update_rolls_back_to_server_state() {
    let (erp, store) = store();
    let cart = store.add_item(draft("A", 2, five())).await.unwrap();
    let line = line_name(&cart, 0);
    let fetches = erp.fetch_calls();

    erp.fail_next_mutation();
    let result = store.update_item(&line, Decimal::from(9)).await;

    assert!(matches!(result, Err(CartError::Remote(_))));
    assert_eq!(erp.fetch_calls(), fetches + 1);
    let snapshot = store.snapshot();
    assert_eq!(snapshot.cart, cart);
    assert_eq!(snapshot.cart.lines[0].qty, Decimal::from(2));
    assert_converged(&erp, &store);
}

#[tokio::test]
async fn test_failed_refetch_falls_back_to_last_server_state() {
    let (erp, store) = store();
    let cart = store.add_item(draft("A", 2, five())).await.unwrap();
    let line = line_name(&cart, 0);

    erp.fail_next_mutation();
    erp.fail_next_fetches(1);
    let result = store.remove_item(&line).await;

    assert!(result.is_err());
    let snapshot = store.snapshot();
    assert_eq!(snapshot.cart, cart);
    assert_eq!(snapshot.phase, SyncPhase::Idle);
    assert!(snapshot.updating.is_empty());
}

#[tokio::test]
async fn test_failed_add_with_failed_refetch_keeps_last_state() {
    let (erp, store) = store();
    let cart = store.add_item(draft("A", 2, five())).await.unwrap();

    erp.fail_next_mutation();
    erp.fail_next_fetches(1);
    let result = store.add_item(draft("B", 1, five())).await;

    assert!(result.is_err());
    assert_eq!(store.snapshot().cart, cart);
}

// =============================================================================
// Clear, submit, resume
// =============================================================================

#[tokio::test]
async fn test_clear_then_add_creates_new_cart() {
    let (erp, store) = store();
    let first = store.add_item(draft("A", 1, five())).await.unwrap();

    store.clear();
    let snapshot = store.snapshot();
    assert!(snapshot.cart.name.is_none());
    assert_eq!(snapshot.cart.line_count(), 0);

    let second = store.add_item(draft("B", 1, five())).await.unwrap();

    assert_ne!(first.name, second.name);
    assert_eq!(second.line_count(), 1);
    assert_eq!(erp.create_calls(), 2);
    // The old quotation is untouched
    let old = erp.quotation(first.name.as_ref().unwrap()).unwrap();
    assert_eq!(old.status, DocStatus::Draft);
    assert_eq!(old.lines.len(), 1);
}

#[tokio::test]
async fn test_clear_during_add_discards_outcome() {
    let (erp, store) = store();
    store.add_item(draft("A", 1, five())).await.unwrap();

    let pause = erp.pause_next_mutation();
    let task = tokio::spawn({
        let store = store.clone();
        async move { store.add_item(draft("B", 1, five())).await }
    });
    pause.entered().await;

    store.clear();
    pause.release();

    let result = task.await.unwrap();
    assert!(matches!(result, Err(CartError::Superseded)));
    let snapshot = store.snapshot();
    assert!(snapshot.cart.name.is_none());
    assert_eq!(snapshot.cart.line_count(), 0);
    assert_eq!(snapshot.phase, SyncPhase::Idle);
}

#[tokio::test]
async fn test_submit_ends_cart() {
    let (_erp, store) = store();
    let cart = store.add_item(draft("A", 2, five())).await.unwrap();
    let name = cart.name.unwrap();

    let submitted = store.submit().await.unwrap();

    assert_eq!(submitted.name, name);
    assert_eq!(submitted.status, DocStatus::Submitted);
    assert!(store.quotation_name().is_none());
    assert_eq!(store.snapshot().cart.line_count(), 0);

    let next = store.add_item(draft("B", 1, five())).await.unwrap();
    assert_ne!(next.name.as_ref(), Some(&name));
}

#[tokio::test]
async fn test_submit_without_cart() {
    let (erp, store) = store();

    let result = store.submit().await;

    assert!(matches!(result, Err(CartError::NoActiveCart)));
    assert_eq!(erp.submit_calls(), 0);
}

#[tokio::test]
async fn test_failed_submit_keeps_cart() {
    let (erp, store) = store();
    let cart = store.add_item(draft("A", 2, five())).await.unwrap();

    erp.fail_next_mutation();
    let result = store.submit().await;

    assert!(matches!(result, Err(CartError::Remote(_))));
    assert_eq!(store.quotation_name(), cart.name);
    assert_converged(&erp, &store);
}

#[tokio::test]
async fn test_resume_loads_cart() {
    let (erp, store) = store();
    let cart = store.add_item(draft("A", 2, five())).await.unwrap();
    let name = cart.name.clone().unwrap();

    let restarted = CartStore::new(erp.clone(), CurrencyCode::new("USD"));
    let resumed = restarted.resume(name).await.unwrap();

    assert_eq!(resumed, cart);
    assert_converged(&erp, &restarted);
}

#[tokio::test]
async fn test_resume_submitted_quotation_drops_cart() {
    let (erp, store) = store();
    let name = store
        .add_item(draft("A", 2, five()))
        .await
        .unwrap()
        .name
        .unwrap();
    erp.submit_externally(&name);

    let result = store.revalidate().await;

    assert!(matches!(result, Err(CartError::NotDraft(n)) if n == name));
    assert!(store.quotation_name().is_none());

    let restarted = CartStore::new(erp.clone(), CurrencyCode::new("USD"));
    let result = restarted.resume(name).await;
    assert!(matches!(result, Err(CartError::NotDraft(_))));
    assert!(restarted.quotation_name().is_none());
}

#[tokio::test]
async fn test_resume_keeps_name_when_fetch_fails() {
    let (erp, store) = store();
    let name = store
        .add_item(draft("A", 1, five()))
        .await
        .unwrap()
        .name
        .unwrap();

    let restarted = CartStore::new(erp.clone(), CurrencyCode::new("USD"));
    erp.fail_next_fetches(1);
    assert!(restarted.resume(name.clone()).await.is_err());
    assert_eq!(restarted.quotation_name(), Some(name));

    let cart = restarted.revalidate().await.unwrap();
    assert_eq!(cart.line_count(), 1);
}

// =============================================================================
// Details and totals
// =============================================================================

#[tokio::test]
async fn test_update_details() {
    let (erp, store) = store();

    let result = store.update_details(ParentFields::default()).await;
    assert!(matches!(result, Err(CartError::NoActiveCart)));

    store.add_item(draft("A", 1, five())).await.unwrap();
    let cart = store
        .update_details(ParentFields {
            coupon_code: Some("SPRING".to_string()),
            notes: Some("Deliver to dock 4".to_string()),
        })
        .await
        .unwrap();

    assert_eq!(cart.coupon_code.as_deref(), Some("SPRING"));
    assert_eq!(cart.notes.as_deref(), Some("Deliver to dock 4"));
    assert_converged(&erp, &store);
}

#[tokio::test]
async fn test_discount_predicted_from_percentage() {
    let (erp, store) = store();
    erp.set_discount_percentage(Decimal::from(10));
    let cart = store.add_item(draft("A", 2, five())).await.unwrap();
    assert_eq!(cart.totals.discount_amount, Decimal::ONE);
    let line = line_name(&cart, 0);

    let pause = erp.pause_next_mutation();
    let task = tokio::spawn({
        let store = store.clone();
        async move { store.update_item(&line, Decimal::from(4)).await }
    });
    pause.entered().await;

    let predicted = store.snapshot().cart.totals;
    assert_eq!(predicted.net_total, Decimal::from(20));
    assert_eq!(predicted.discount_amount, Decimal::from(2));
    assert_eq!(predicted.grand_total, Decimal::from(18));

    pause.release();
    let cart = task.await.unwrap().unwrap();
    assert_eq!(cart.totals, predicted);
}

#[tokio::test]
async fn test_subscribers_see_settled_state() {
    let (_erp, store) = store();
    let mut snapshots = store.subscribe();

    store.add_item(draft("A", 1, five())).await.unwrap();

    assert!(snapshots.has_changed().unwrap());
    let latest = snapshots.borrow_and_update().clone();
    assert_eq!(latest, store.snapshot());
    assert_eq!(latest.phase, SyncPhase::Idle);
}
