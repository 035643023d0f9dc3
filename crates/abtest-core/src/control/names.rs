//! Editable channel labels, shared through the store at `/channel/<n>/name`

use crate::kvt::{self, KvtChange, KvtFlags, KvtGuard, KvtStore, KvtValue};

/// Label a group carries until renamed (1-based number)
pub fn default_name(channel: usize) -> String {
    format!("Channel {}", channel)
}

/// Local copy of every channel label with pending-write tracking
#[derive(Debug, Clone)]
pub struct ChannelNames {
    names: Vec<String>,
    dirty: Vec<bool>,
}

impl ChannelNames {
    pub fn new(count: usize) -> Self {
        Self {
            names: (1..=count).map(default_name).collect(),
            dirty: vec![false; count],
        }
    }

    /// Label of a 0-based channel
    pub fn get(&self, channel: usize) -> Option<&str> {
        self.names.get(channel).map(String::as_str)
    }

    /// All labels in channel order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Rename a channel locally; written to the store on the next `idle`
    pub fn set(&mut self, channel: usize, name: impl Into<String>) -> bool {
        let Some(slot) = self.names.get_mut(channel) else {
            return false;
        };
        let name = name.into();
        if *slot == name {
            return false;
        }
        *slot = name;
        self.dirty[channel] = true;
        true
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.iter().any(|&d| d)
    }

    /// Adopt every name already present in the store
    pub fn load(&mut self, guard: &KvtGuard<'_>) {
        for (i, name) in self.names.iter_mut().enumerate() {
            if let Some(stored) = guard.get_str(&kvt::channel_name_path(i + 1)) {
                *name = stored.to_string();
                self.dirty[i] = false;
            }
        }
    }

    /// Push pending renames to the store.
    ///
    /// Returns how many names were written; nothing is written (and the
    /// names stay pending) while the store is unavailable.
    pub fn idle(&mut self, store: &KvtStore) -> usize {
        if !self.is_dirty() {
            return 0;
        }
        let Some(mut guard) = store.lock() else {
            return 0;
        };

        let mut written = 0;
        for (i, (name, dirty)) in self.names.iter().zip(self.dirty.iter_mut()).enumerate() {
            if !*dirty {
                continue;
            }
            guard.put(
                &kvt::channel_name_path(i + 1),
                KvtValue::Str(name.clone()),
                KvtFlags::RX,
            );
            *dirty = false;
            written += 1;
        }
        written
    }

    /// Apply a store change; true if it renamed a channel
    pub fn kvt_changed(&mut self, change: &KvtChange) -> bool {
        let Some(n) = kvt::parse_channel_name_path(&change.path) else {
            return false;
        };
        let Some(name) = change.value.as_str() else {
            log::warn!("[NAMES] Ignoring non-string value at {}", change.path);
            return false;
        };
        match self.names.get_mut(n - 1) {
            Some(slot) if *slot != name => {
                *slot = name.to_string();
                self.dirty[n - 1] = false;
                true
            }
            _ => false,
        }
    }

    /// Restore default labels; they are pushed on the next `idle`
    pub fn reset(&mut self) {
        for (i, name) in self.names.iter_mut().enumerate() {
            *name = default_name(i + 1);
        }
        self.dirty.fill(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let names = ChannelNames::new(4);
        assert_eq!(names.get(0), Some("Channel 1"));
        assert_eq!(names.get(3), Some("Channel 4"));
        assert_eq!(names.get(4), None);
        assert!(!names.is_dirty());
    }

    #[test]
    fn test_rename_pushed_on_idle() {
        let store = KvtStore::new();
        let rx = store.subscribe();
        let mut names = ChannelNames::new(2);

        assert!(names.set(1, "Reference"));
        assert!(!names.set(1, "Reference"));
        assert_eq!(names.idle(&store), 1);
        assert_eq!(names.idle(&store), 0);

        let change = rx.try_recv().unwrap();
        assert_eq!(change.path, "/channel/2/name");
        assert_eq!(change.value.as_str(), Some("Reference"));
    }

    #[test]
    fn test_unavailable_store_keeps_pending() {
        let store = KvtStore::new();
        store.set_available(false);
        let mut names = ChannelNames::new(2);
        names.set(0, "A");
        assert_eq!(names.idle(&store), 0);
        assert!(names.is_dirty());

        store.set_available(true);
        assert_eq!(names.idle(&store), 1);
    }

    #[test]
    fn test_kvt_change_renames() {
        let mut names = ChannelNames::new(2);
        let change = KvtChange {
            path: kvt::channel_name_path(1),
            value: KvtValue::Str("Take 3".into()),
            flags: KvtFlags::RX,
        };
        assert!(names.kvt_changed(&change));
        assert_eq!(names.get(0), Some("Take 3"));

        let out_of_range = KvtChange {
            path: kvt::channel_name_path(5),
            ..change.clone()
        };
        assert!(!names.kvt_changed(&out_of_range));

        let wrong_type = KvtChange {
            value: KvtValue::U32(3),
            ..change
        };
        assert!(!names.kvt_changed(&wrong_type));
    }

    #[test]
    fn test_load_and_reset() {
        let store = KvtStore::new();
        {
            let mut kvt = store.lock().unwrap();
            kvt.put("/channel/2/name", KvtValue::Str("Master".into()), KvtFlags::NONE);
        }
        let mut names = ChannelNames::new(2);
        names.load(&store.lock().unwrap());
        assert_eq!(names.get(1), Some("Master"));

        names.reset();
        assert_eq!(names.get(1), Some("Channel 2"));
        assert_eq!(names.idle(&store), 2);
    }
}
