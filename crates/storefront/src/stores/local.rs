//! Local slot persistence.
//!
//! The local store plays the role of browser storage: a key-scoped cache
//! that survives reloads. Reads and writes are synchronous and never fail
//! from the caller's point of view.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, warn};

use zenro_core::{CartLine, SlotKey};

use crate::cart::SyncErrorKind;

/// Synchronous, best-effort slot storage.
pub trait LocalStore: Send + Sync {
    /// Read a slot. Missing or unparsable slots read as `None`.
    fn read(&self, slot: &SlotKey) -> Option<Vec<CartLine>>;

    /// Overwrite a slot. Failures are logged and swallowed.
    fn write(&self, slot: &SlotKey, lines: &[CartLine]);
}

/// Decode a slot payload, treating malformed data as absent.
fn decode(slot: &SlotKey, raw: &str) -> Option<Vec<CartLine>> {
    match serde_json::from_str::<Vec<CartLine>>(raw) {
        Ok(lines) => Some(lines),
        Err(e) => {
            debug!(
                %slot,
                kind = %SyncErrorKind::MalformedLocalPayload,
                error = %e,
                "Ignoring malformed local cart payload"
            );
            None
        }
    }
}

// =============================================================================
// File-backed store
// =============================================================================

/// Slot storage backed by one JSON file per slot under a directory.
///
/// Writes go to a temporary file first and are renamed into place, so a
/// crash mid-write leaves the previous contents intact.
#[derive(Debug, Clone)]
pub struct FileLocalStore {
    root: PathBuf,
}

impl FileLocalStore {
    /// Create a store rooted at `root`. The directory is created lazily.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory holding the slot files.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, slot: &SlotKey) -> PathBuf {
        let name = match slot {
            SlotKey::Guest => "cart-guest.json".to_owned(),
            SlotKey::User(id) => format!("cart-user-{}.json", file_safe(id.as_str())),
        };
        self.root.join(name)
    }

    fn try_write(&self, path: &Path, lines: &[CartLine]) -> std::io::Result<()> {
        let payload = serde_json::to_vec(lines)?;
        fs::create_dir_all(&self.root)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, payload)?;
        fs::rename(&tmp, path)
    }
}

/// Encode an identifier so it is safe as a file name component.
///
/// Alphanumerics, `-` and `_` pass through; everything else becomes `%XX`.
fn file_safe(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for byte in id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

impl LocalStore for FileLocalStore {
    fn read(&self, slot: &SlotKey) -> Option<Vec<CartLine>> {
        let path = self.path_for(slot);
        match fs::read_to_string(&path) {
            Ok(raw) => decode(slot, &raw),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                warn!(%slot, path = %path.display(), error = %e, "Failed to read local cart slot");
                None
            }
        }
    }

    fn write(&self, slot: &SlotKey, lines: &[CartLine]) {
        let path = self.path_for(slot);
        if let Err(e) = self.try_write(&path, lines) {
            warn!(%slot, path = %path.display(), error = %e, "Failed to write local cart slot");
        }
    }
}

// =============================================================================
// In-memory store
// =============================================================================

/// Slot storage held in memory.
///
/// Payloads are kept serialized so tests can plant malformed data with
/// [`MemoryLocalStore::insert_raw`].
#[derive(Debug, Default)]
pub struct MemoryLocalStore {
    slots: Mutex<HashMap<SlotKey, String>>,
    writes: Mutex<Vec<SlotKey>>,
}

impl MemoryLocalStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Plant a raw payload in a slot.
    pub fn insert_raw(&self, slot: SlotKey, raw: impl Into<String>) {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(slot, raw.into());
    }

    /// The slots written so far, in write order.
    #[must_use]
    pub fn writes(&self) -> Vec<SlotKey> {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl LocalStore for MemoryLocalStore {
    fn read(&self, slot: &SlotKey) -> Option<Vec<CartLine>> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.get(slot).and_then(|raw| decode(slot, raw))
    }

    fn write(&self, slot: &SlotKey, lines: &[CartLine]) {
        match serde_json::to_string(lines) {
            Ok(raw) => {
                self.slots
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(slot.clone(), raw);
                self.writes
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(slot.clone());
            }
            Err(e) => warn!(%slot, error = %e, "Failed to encode local cart slot"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use zenro_core::{Money, ProductSnapshot, UserId};

    fn line() -> CartLine {
        ProductSnapshot::new("1", "ZenRo Classic Tee", Money::from_units(39_500)).to_line(
            Some("M"),
            1,
            "/p.webp",
        )
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileLocalStore::new(dir.path().join("visitor"));

        assert_eq!(store.read(&SlotKey::Guest), None);
        store.write(&SlotKey::Guest, &[line()]);
        assert_eq!(store.read(&SlotKey::Guest), Some(vec![line()]));
    }

    #[test]
    fn test_file_store_slots_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileLocalStore::new(dir.path());
        let user = SlotKey::User(UserId::new("u1"));

        store.write(&user, &[line()]);
        assert_eq!(store.read(&SlotKey::Guest), None);
        assert_eq!(store.read(&user).unwrap().len(), 1);
    }

    #[test]
    fn test_file_store_malformed_payload_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileLocalStore::new(dir.path());
        fs::write(dir.path().join("cart-guest.json"), "{not json").unwrap();

        assert_eq!(store.read(&SlotKey::Guest), None);
    }

    #[test]
    fn test_file_store_write_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "file, not a directory").unwrap();

        let store = FileLocalStore::new(blocker.join("nested"));
        store.write(&SlotKey::Guest, &[line()]);
        assert_eq!(store.read(&SlotKey::Guest), None);
    }

    #[test]
    fn test_file_safe_names() {
        assert_eq!(file_safe("abc-DEF_1"), "abc-DEF_1");
        assert_eq!(file_safe("../etc"), "%2E%2E%2Fetc");
    }

    #[test]
    fn test_memory_store_malformed_payload() {
        let store = MemoryLocalStore::new();
        store.insert_raw(SlotKey::Guest, "[{\"quantity\": \"lots\"}]");
        assert_eq!(store.read(&SlotKey::Guest), None);
    }

    #[test]
    fn test_memory_store_records_writes() {
        let store = MemoryLocalStore::new();
        store.write(&SlotKey::Guest, &[]);
        store.write(&SlotKey::User(UserId::new("u1")), &[line()]);

        assert_eq!(
            store.writes(),
            vec![SlotKey::Guest, SlotKey::User(UserId::new("u1"))]
        );
        assert_eq!(store.read(&SlotKey::Guest), Some(vec![]));
    }
}
