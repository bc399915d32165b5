/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! # Storage
//!
//! The injectable key/value store the library persists cached tokens,
//! device credentials and user attributes into.
//!
//! **⚠️ Warning:** values passed to [`Storage::set_item`] may contain
//! access and refresh tokens. Implementations should write to a platform
//! secure-storage facility, not to plaintext files or unencrypted prefs.

use parking_lot::Mutex;
use std::collections::HashMap;

pub trait Storage: Send + Sync {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: String);
    fn remove_item(&self, key: &str);
    /// Remove every key previously written through this `Storage`.
    fn clear(&self);
}

/// A fallback in-memory [`Storage`] used when the host application has not
/// provided its own persistent implementation, and in tests.
#[derive(Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.lock().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: String) {
        self.items.lock().insert(key.to_string(), value);
    }

    fn remove_item(&self, key: &str) {
        self.items.lock().remove(key);
    }

    fn clear(&self) {
        self.items.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_round_trips() {
        let storage = MemoryStorage::new();
        storage.set_item("a", "1".into());
        assert_eq!(storage.get_item("a"), Some("1".into()));
    }

    #[test]
    fn remove_item_clears_a_single_key() {
        let storage = MemoryStorage::new();
        storage.set_item("a", "1".into());
        storage.set_item("b", "2".into());
        storage.remove_item("a");
        assert_eq!(storage.get_item("a"), None);
        assert_eq!(storage.get_item("b"), Some("2".into()));
    }

    #[test]
    fn clear_removes_everything() {
        let storage = MemoryStorage::new();
        storage.set_item("a", "1".into());
        storage.clear();
        assert_eq!(storage.get_item("a"), None);
    }
}
