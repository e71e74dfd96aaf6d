//! Cart synchronization behaviour against in-memory stores.
//!
//! All tests run on a paused clock; `sleep` advances virtual time and lets
//! due timers and deliveries run first.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use zenro_core::{Cart, ProductId, ProductSnapshot, Session, SlotKey, UserId};
use zenro_integration_tests::{Harness, cargo_pant, classic_tee, user};
use zenro_storefront::cart::{EngineConfig, HandoffPolicy, SyncErrorKind};
use zenro_storefront::stores::{LocalStore, MemoryCartStore, MemoryLocalStore};

const PAST_DEBOUNCE: Duration = Duration::from_millis(900);

#[tokio::test(start_paused = true)]
async fn test_lines_are_unique_per_product_and_size() {
    let h = Harness::new();
    let tee = classic_tee();

    for size in ["M", "L", "M", "M", "L"] {
        h.engine.add_item(&tee, Some(size), 1.0);
    }
    h.engine.add_item(&cargo_pant(), Some("M"), 2.5);

    let cart = h.engine.cart();
    let keys: Vec<_> = cart
        .lines()
        .iter()
        .map(|line| (line.product_id.as_str().to_owned(), line.size.clone(), line.quantity))
        .collect();
    assert_eq!(
        keys,
        vec![
            ("1".to_owned(), Some("M".to_owned()), 3),
            ("1".to_owned(), Some("L".to_owned()), 2),
            ("2".to_owned(), Some("M".to_owned()), 2),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_quantity_below_one_is_ignored() {
    let h = Harness::new();
    let tee = classic_tee();
    h.engine.add_item(&tee, Some("M"), 2.0);
    let before = h.engine.cart();

    for quantity in [0, -1, i64::MIN] {
        h.engine.update_quantity(&tee.id, Some("M"), quantity);
    }

    assert_eq!(h.engine.cart(), before);
    assert_eq!(h.engine.last_error(), None);
}

#[tokio::test(start_paused = true)]
async fn test_removing_a_missing_line_is_a_no_op() {
    let h = Harness::new();
    h.engine.add_item(&classic_tee(), Some("M"), 1.0);
    let before = h.engine.cart();

    h.engine.remove_item(&ProductId::new("1"), Some("XL"));
    h.engine.remove_item(&ProductId::new("404"), None);

    assert_eq!(h.engine.cart(), before);
}

#[tokio::test(start_paused = true)]
async fn test_later_session_wins_over_slower_hydration() {
    let h = Harness::new();
    let alice = UserId::new("alice");
    let bob = UserId::new("bob");
    h.remote.put_document(&alice, vec![classic_tee().to_line(Some("M"), 1, "")]);
    h.remote.put_document(&bob, vec![cargo_pant().to_line(Some("32"), 2, "")]);
    h.remote.set_delivery_delay(&alice, Duration::from_millis(500));

    h.engine.on_session_change(user("alice"));
    sleep(Duration::from_millis(100)).await;
    h.engine.on_session_change(user("bob"));
    h.engine.wait_for_session(&user("bob")).await;

    // Let alice's delayed delivery come due
    sleep(Duration::from_secs(1)).await;

    let cart = h.engine.cart();
    assert_eq!(cart.len(), 1);
    assert_eq!(cart.lines()[0].product_id, ProductId::new("2"));
    assert_eq!(h.engine.snapshot().session.user_id(), Some(&bob));
    assert_eq!(h.remote.write_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_rapid_mutations_produce_one_write() {
    let h = Harness::new();
    h.switch_to(user("u1")).await;
    let tee = classic_tee();

    h.engine.add_item(&tee, Some("M"), 1.0);
    for quantity in 2..=6 {
        sleep(Duration::from_millis(100)).await;
        h.engine.update_quantity(&tee.id, Some("M"), quantity);
    }
    assert_eq!(h.remote.write_count(), 0);

    sleep(PAST_DEBOUNCE).await;

    let writes = h.remote.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].1[0].quantity, 6);
}

#[tokio::test(start_paused = true)]
async fn test_clear_is_persisted_immediately() {
    let h = Harness::new();
    h.switch_to(user("u1")).await;
    h.engine.add_item(&classic_tee(), Some("M"), 3.0);

    let snapshot = h.engine.clear().await;

    assert_eq!(snapshot.count, 0);
    let document = h.remote.document(&UserId::new("u1")).unwrap();
    assert!(document.items.is_empty());
    assert_eq!(h.local.read(&SlotKey::User(UserId::new("u1"))), Some(Vec::new()));

    // The debounced write for the add never fires
    sleep(PAST_DEBOUNCE).await;
    assert_eq!(h.remote.write_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_clear_outlasts_a_write_already_in_flight() {
    let h = Harness::new();
    let u1 = UserId::new("u1");
    h.switch_to(user("u1")).await;
    h.remote.set_write_latency(Duration::from_millis(500));

    h.engine.add_item(&classic_tee(), Some("M"), 1.0);
    // The debounced flush has fired and is waiting on the store
    sleep(Duration::from_millis(850)).await;
    h.remote.set_write_latency(Duration::ZERO);

    let snapshot = h.engine.clear().await;
    assert_eq!(snapshot.count, 0);

    sleep(Duration::from_secs(1)).await;
    assert!(h.engine.cart().is_empty());
    assert!(h.remote.document(&u1).unwrap().items.is_empty());
    let writes = h.remote.writes();
    assert_eq!(writes.len(), 2);
    assert!(writes[1].1.is_empty());

    let reloaded = h.reload();
    reloaded.switch_to(user("u1")).await;
    assert!(reloaded.engine.cart().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_previous_user_changes_do_not_reach_active_user() {
    let h = Harness::new();
    let alice = UserId::new("alice");
    let bob = UserId::new("bob");
    h.remote.put_document(&alice, vec![classic_tee().to_line(Some("M"), 1, "")]);
    h.remote.put_document(&bob, vec![cargo_pant().to_line(Some("32"), 2, "")]);

    h.switch_to(user("alice")).await;
    assert_eq!(h.engine.cart_count(), 1);
    h.switch_to(user("bob")).await;
    let before = h.engine.cart();

    // Alice edits her cart on another device
    h.remote.put_document(&alice, vec![classic_tee().to_line(Some("L"), 5, "")]);
    sleep(Duration::from_secs(1)).await;

    assert_eq!(h.engine.cart(), before);
    assert_eq!(h.engine.snapshot().session.user_id(), Some(&bob));
    assert_eq!(h.remote.document(&bob).unwrap().items.len(), 1);
    assert_eq!(h.remote.write_count(), 0);
}

#[test]
fn test_negative_prices_are_rejected_on_read() {
    let product = serde_json::from_str::<ProductSnapshot>(r#"{"id":"1","name":"Tee","price":-500}"#);
    assert!(product.is_err());

    let stored = r#"[{"productId":"1","size":"M","quantity":1,"unitPrice":39500}]"#;
    let cart = serde_json::from_str::<Cart>(stored).unwrap();
    assert_eq!(cart.subtotal(), classic_tee().price);

    let tampered = stored.replace("39500", "-39500");
    assert!(serde_json::from_str::<Cart>(&tampered).is_err());
}

#[tokio::test(start_paused = true)]
async fn test_guest_cart_is_replaced_on_sign_in() {
    let h = Harness::new();
    h.engine.add_item(&classic_tee(), Some("M"), 1.0);
    h.engine.add_item(&cargo_pant(), Some("32"), 1.0);
    assert_eq!(h.engine.cart_count(), 2);

    h.switch_to(user("fresh")).await;

    assert!(h.engine.cart().is_empty());
    sleep(PAST_DEBOUNCE).await;
    assert_eq!(h.remote.write_count(), 0);

    // Still on this device for when the customer signs out
    h.switch_to(Session::Guest).await;
    assert_eq!(h.engine.cart_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_guest_cart_merges_when_configured() {
    let config = EngineConfig {
        handoff: HandoffPolicy::Merge,
        ..EngineConfig::default()
    };
    let h = Harness::with(Arc::new(MemoryLocalStore::new()), MemoryCartStore::new(), config);
    let member = UserId::new("member");
    h.remote.put_document(&member, vec![classic_tee().to_line(Some("M"), 1, "")]);

    h.engine.add_item(&classic_tee(), Some("M"), 1.0);
    h.engine.add_item(&cargo_pant(), Some("32"), 1.0);
    h.switch_to(user("member")).await;

    assert_eq!(h.engine.cart_count(), 3);
    sleep(PAST_DEBOUNCE).await;
    let document = h.remote.document(&member).unwrap();
    assert_eq!(document.items.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_hydration_failure_falls_back_to_user_slot() {
    let h = Harness::new();
    let u1 = UserId::new("u1");
    h.local
        .write(&SlotKey::User(u1.clone()), &[classic_tee().to_line(Some("L"), 2, "")]);
    h.remote.set_fail_reads(true);

    h.switch_to(user("u1")).await;

    assert_eq!(h.engine.cart_count(), 2);
    assert_eq!(h.engine.last_error(), Some(SyncErrorKind::RemoteHydrationFailed));
}

#[tokio::test(start_paused = true)]
async fn test_failed_write_keeps_cart_and_heals_on_next_mutation() {
    let h = Harness::new();
    h.switch_to(user("u1")).await;
    let tee = classic_tee();
    h.remote.set_fail_writes(true);

    h.engine.add_item(&tee, Some("M"), 1.0);
    sleep(PAST_DEBOUNCE).await;
    assert_eq!(h.engine.last_error(), Some(SyncErrorKind::RemoteWriteFailed));
    assert_eq!(h.engine.cart_count(), 1);

    h.remote.set_fail_writes(false);
    h.engine.update_quantity(&tee.id, Some("M"), 2);
    sleep(PAST_DEBOUNCE).await;

    assert_eq!(h.engine.last_error(), None);
    let document = h.remote.document(&UserId::new("u1")).unwrap();
    assert_eq!(document.items[0].quantity, 2);
}

#[tokio::test(start_paused = true)]
async fn test_sign_out_cancels_pending_write() {
    let h = Harness::new();
    h.switch_to(user("u1")).await;
    h.engine.add_item(&classic_tee(), Some("M"), 1.0);

    h.switch_to(Session::Guest).await;
    sleep(PAST_DEBOUNCE).await;

    assert_eq!(h.remote.write_count(), 0);
    assert!(h.engine.cart().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_ordering_scenario() {
    let h = Harness::new();
    let tee = classic_tee();

    // Guest adds one tee and reloads the page
    h.engine.add_item(&tee, Some("M"), 1.0);
    let h = h.reload();
    let cart = h.engine.cart();
    assert_eq!(cart.len(), 1);
    assert_eq!(cart.lines()[0].quantity, 1);
    assert_eq!(cart.lines()[0].unit_price, tee.price);

    // Signing in as a new customer shows their (empty) saved cart
    h.switch_to(user("new-customer")).await;
    assert!(h.engine.cart().is_empty());

    // Add again and click "increase quantity" three times
    h.engine.add_item(&tee, Some("M"), 1.0);
    for quantity in 2..=4 {
        sleep(Duration::from_millis(150)).await;
        h.engine.update_quantity(&tee.id, Some("M"), quantity);
    }
    sleep(PAST_DEBOUNCE).await;

    let writes = h.remote.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].0, UserId::new("new-customer"));
    assert_eq!(writes[0].1.len(), 1);
    assert_eq!(writes[0].1[0].quantity, 4);
}
