//! Shared key-value state store
//!
//! Path-addressed storage shared by every observer of one tester instance
//! (engine side and any number of control surfaces). It carries the state
//! that must look identical to all of them: the packed shuffle word and the
//! channel names.
//!
//! ```text
//! control surface ──lock()──► KvtGuard ──put()──► entries
//!                                 │
//!                              drop()  (lock released first)
//!                                 │
//!                                 ▼
//!                    KvtChange ──► every subscribe()d receiver
//! ```
//!
//! Access always goes through a scoped [`KvtGuard`]; dropping it releases the
//! lock on every exit path. Changes are published once per committed path,
//! after the lock is released, so a listener may lock the store again from
//! inside its handler.
//!
//! The audio thread never touches the store.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use crossbeam::channel::{self, Receiver, Sender};
use serde::{Deserialize, Serialize};

/// Path of the packed blind-test permutation
pub const SHUFFLE_INDICES_PATH: &str = "/shuffle_indices";

/// Path of a channel name (1-based channel number)
pub fn channel_name_path(channel: usize) -> String {
    format!("/channel/{}/name", channel)
}

/// Parse `/channel/<n>/name` into `n` (n > 0)
pub fn parse_channel_name_path(path: &str) -> Option<usize> {
    let rest = path.strip_prefix("/channel/")?;
    let number = rest.strip_suffix("/name")?;
    match number.parse::<usize>() {
        Ok(n) if n > 0 => Some(n),
        _ => None,
    }
}

/// A stored value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KvtValue {
    U32(u32),
    F32(f32),
    Str(String),
}

impl KvtValue {
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            KvtValue::U32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            KvtValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// Per-entry flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KvtFlags(u8);

impl KvtFlags {
    pub const NONE: KvtFlags = KvtFlags(0);
    /// Written by a control surface, to be received by the engine side
    pub const RX: KvtFlags = KvtFlags(1 << 0);
    /// Written by the engine side, to be transmitted to control surfaces
    pub const TX: KvtFlags = KvtFlags(1 << 1);
    /// Session-only; excluded from snapshots
    pub const PRIVATE: KvtFlags = KvtFlags(1 << 2);

    pub fn contains(&self, other: KvtFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for KvtFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        KvtFlags(self.0 | rhs.0)
    }
}

/// Notification of one committed change
#[derive(Debug, Clone, PartialEq)]
pub struct KvtChange {
    pub path: String,
    pub value: KvtValue,
    pub flags: KvtFlags,
}

#[derive(Debug, Clone)]
struct Entry {
    value: KvtValue,
    flags: KvtFlags,
}

/// The shared store
pub struct KvtStore {
    entries: Mutex<HashMap<String, Entry>>,
    available: AtomicBool,
    subscribers: Mutex<Vec<Sender<KvtChange>>>,
}

impl KvtStore {
    /// Create an empty, available store
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Mark the store (un)available, e.g. while a host has not attached it
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    /// Acquire the store lock.
    ///
    /// Returns `None` when the store is unavailable; callers must skip their
    /// access in that case.
    pub fn lock(&self) -> Option<KvtGuard<'_>> {
        if !self.is_available() {
            log::debug!("[KVT] Lock refused: store unavailable");
            return None;
        }
        match self.entries.lock() {
            Ok(entries) => Some(KvtGuard {
                store: self,
                entries: Some(entries),
                pending: Vec::new(),
            }),
            Err(e) => {
                log::warn!("[KVT] Store lock poisoned: {}", e);
                None
            }
        }
    }

    /// Receive every change committed from now on
    pub fn subscribe(&self) -> Receiver<KvtChange> {
        let (tx, rx) = channel::unbounded();
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }
        rx
    }

    /// Copy of all non-private entries, ordered by path
    pub fn snapshot(&self) -> BTreeMap<String, KvtValue> {
        self.lock()
            .map(|guard| guard.snapshot())
            .unwrap_or_default()
    }

    /// Put every entry of a snapshot back, notifying observers
    pub fn restore(&self, snapshot: &BTreeMap<String, KvtValue>) -> bool {
        match self.lock() {
            Some(mut guard) => {
                for (path, value) in snapshot {
                    guard.put(path, value.clone(), KvtFlags::NONE);
                }
                log::info!("[KVT] Restored {} entries", snapshot.len());
                true
            }
            None => false,
        }
    }

    fn publish(&self, changes: Vec<KvtChange>) {
        if changes.is_empty() {
            return;
        }
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.retain(|tx| changes.iter().all(|c| tx.send(c.clone()).is_ok()));
        }
    }
}

impl Default for KvtStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoped access to the store; releases the lock and publishes on drop
pub struct KvtGuard<'a> {
    store: &'a KvtStore,
    entries: Option<MutexGuard<'a, HashMap<String, Entry>>>,
    pending: Vec<KvtChange>,
}

impl<'a> KvtGuard<'a> {
    /// Write a value. Repeated puts to one path inside the same guard
    /// produce a single notification carrying the last value.
    pub fn put(&mut self, path: &str, value: KvtValue, flags: KvtFlags) {
        if let Some(entries) = self.entries.as_mut() {
            entries.insert(path.to_string(), Entry { value: value.clone(), flags });
        }
        match self.pending.iter_mut().find(|c| c.path == path) {
            Some(change) => {
                change.value = value;
                change.flags = flags;
            }
            None => self.pending.push(KvtChange {
                path: path.to_string(),
                value,
                flags,
            }),
        }
    }

    /// Read a value
    pub fn get(&self, path: &str) -> Option<&KvtValue> {
        self.entries.as_ref()?.get(path).map(|e| &e.value)
    }

    /// Read a `u32` value
    pub fn get_u32(&self, path: &str) -> Option<u32> {
        self.get(path).and_then(KvtValue::as_u32)
    }

    /// Read a string value
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(KvtValue::as_str)
    }

    fn snapshot(&self) -> BTreeMap<String, KvtValue> {
        self.entries
            .as_ref()
            .map(|entries| {
                entries
                    .iter()
                    .filter(|(_, e)| !e.flags.contains(KvtFlags::PRIVATE))
                    .map(|(k, e)| (k.clone(), e.value.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Release the lock now (same as dropping the guard)
    pub fn release(self) {}
}

impl Drop for KvtGuard<'_> {
    fn drop(&mut self) {
        // Unlock before notifying so handlers can re-enter the store
        drop(self.entries.take());
        let pending = std::mem::take(&mut self.pending);
        self.store.publish(pending);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get() {
        let store = KvtStore::new();
        {
            let mut kvt = store.lock().unwrap();
            kvt.put(SHUFFLE_INDICES_PATH, KvtValue::U32(0x98), KvtFlags::NONE);
            assert_eq!(kvt.get_u32(SHUFFLE_INDICES_PATH), Some(0x98));
            assert_eq!(kvt.get_str(SHUFFLE_INDICES_PATH), None);
        }
        let kvt = store.lock().unwrap();
        assert_eq!(kvt.get_u32(SHUFFLE_INDICES_PATH), Some(0x98));
    }

    #[test]
    fn test_notification_after_release() {
        let store = KvtStore::new();
        let rx = store.subscribe();

        let mut kvt = store.lock().unwrap();
        kvt.put("/channel/1/name", KvtValue::Str("Mix A".into()), KvtFlags::RX);
        assert!(rx.try_recv().is_err(), "nothing published while locked");
        kvt.release();

        let change = rx.try_recv().unwrap();
        assert_eq!(change.path, "/channel/1/name");
        assert_eq!(change.value.as_str(), Some("Mix A"));
        assert!(change.flags.contains(KvtFlags::RX));
    }

    #[test]
    fn test_one_notification_per_path() {
        let store = KvtStore::new();
        let rx = store.subscribe();
        {
            let mut kvt = store.lock().unwrap();
            kvt.put(SHUFFLE_INDICES_PATH, KvtValue::U32(1), KvtFlags::NONE);
            kvt.put(SHUFFLE_INDICES_PATH, KvtValue::U32(2), KvtFlags::NONE);
        }
        let changes: Vec<_> = rx.try_iter().collect();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].value, KvtValue::U32(2));
    }

    #[test]
    fn test_unavailable_store() {
        let store = KvtStore::new();
        store.set_available(false);
        assert!(store.lock().is_none());
        store.set_available(true);
        assert!(store.lock().is_some());
    }

    #[test]
    fn test_reentrant_lock_after_drop() {
        let store = KvtStore::new();
        {
            let mut kvt = store.lock().unwrap();
            kvt.put("/a", KvtValue::F32(1.0), KvtFlags::NONE);
        }
        assert!(store.lock().is_some());
    }

    #[test]
    fn test_snapshot_skips_private() {
        let store = KvtStore::new();
        {
            let mut kvt = store.lock().unwrap();
            kvt.put(SHUFFLE_INDICES_PATH, KvtValue::U32(0x9a), KvtFlags::NONE);
            kvt.put("/session", KvtValue::U32(7), KvtFlags::PRIVATE);
        }
        let snap = store.snapshot();
        assert_eq!(snap.len(), 1);

        let other = KvtStore::new();
        let rx = other.subscribe();
        assert!(other.restore(&snap));
        assert_eq!(rx.try_recv().unwrap().value, KvtValue::U32(0x9a));
    }

    #[test]
    fn test_channel_name_path() {
        assert_eq!(channel_name_path(3), "/channel/3/name");
        assert_eq!(parse_channel_name_path("/channel/3/name"), Some(3));
        assert_eq!(parse_channel_name_path("/channel/0/name"), None);
        assert_eq!(parse_channel_name_path("/channel/x/name"), None);
        assert_eq!(parse_channel_name_path("/channel/3/label"), None);
        assert_eq!(parse_channel_name_path("/shuffle_indices"), None);
    }
}
