//! Target persistence interface
//!
//! The durable key-value store that remembers the active target across
//! process restarts belongs to the embedding host (SharedPreferences,
//! UserDefaults, a settings file). The crate only talks to it through the
//! [`TargetStore`] trait; [`MemoryTargetStore`] is the built-in
//! implementation for hosts without durable storage and for tests.
//!
//! Writes are fire-and-forget: durability before the call returns is not
//! guaranteed, matching the eventual-consistency contract of mobile
//! preference stores.

use std::collections::HashMap;
use std::sync::RwLock;

/// Key under which the active remote/local URL is persisted
pub(crate) const KEY_SERVER_URL: &str = "server_url";

/// Key under which the active asset name is persisted
pub(crate) const KEY_ACTIVE_ASSET: &str = "active_asset";

/// Durable key-value storage for the active target
///
/// Implementations must be cheap to call and must tolerate unknown keys.
pub trait TargetStore: Send + Sync + 'static {
    /// Read a value, `None` if the key has never been set or was removed
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value, replacing any previous one
    fn set(&self, key: &str, value: &str);

    /// Remove a key; removing an absent key is a no-op
    fn remove(&self, key: &str);
}

/// In-memory [`TargetStore`]
///
/// Nothing survives a process restart, which makes every target effectively
/// ephemeral. Useful as a default and in tests.
#[derive(Debug, Default)]
pub struct MemoryTargetStore {
    values: RwLock<HashMap<String, String>>,
}

impl TargetStore for MemoryTargetStore {
    fn get(&self, key: &str) -> Option<String> {
        match self.values.read() {
            Ok(values) => values.get(key).cloned(),
            Err(_) => None,
        }
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut values) = self.values.write() {
            values.insert(key.to_string(), value.to_string());
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut values) = self.values.write() {
            values.remove(key);
        }
    }
}
