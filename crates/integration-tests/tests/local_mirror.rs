//! Reload behaviour over the file-backed local store.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use zenro_core::{SlotKey, UserId};
use zenro_integration_tests::{Harness, classic_tee, user};
use zenro_storefront::cart::EngineConfig;
use zenro_storefront::stores::{FileLocalStore, LocalStore, MemoryCartStore};

fn file_harness(dir: &tempfile::TempDir) -> Harness<FileLocalStore> {
    Harness::with(
        Arc::new(FileLocalStore::new(dir.path())),
        MemoryCartStore::new(),
        EngineConfig::default(),
    )
}

#[tokio::test(start_paused = true)]
async fn test_guest_cart_survives_reload_before_debounce() {
    let dir = tempfile::tempdir().unwrap();
    let h = file_harness(&dir);
    h.engine.add_item(&classic_tee(), Some("M"), 2.0);

    let reloaded = h.reload();

    assert_eq!(reloaded.engine.cart_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_user_mutations_are_mirrored_to_user_slot() {
    let dir = tempfile::tempdir().unwrap();
    let h = file_harness(&dir);
    h.switch_to(user("u1")).await;

    h.engine.add_item(&classic_tee(), None, 1.0);

    let mirrored = h.local.read(&SlotKey::User(UserId::new("u1"))).unwrap();
    assert_eq!(mirrored.len(), 1);
    assert_eq!(h.local.read(&SlotKey::Guest), None);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_slot_reads_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("cart-guest.json"), "{not json").unwrap();

    let h = file_harness(&dir);

    assert!(h.engine.cart().is_empty());
    assert_eq!(h.engine.last_error(), None);
}
