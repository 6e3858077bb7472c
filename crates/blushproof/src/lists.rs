//! Versioned category lists.
//!
//! The blushlist maps domain keys to categories and the searchterms list
//! maps query keys to categories. Both carry the version of the shipped list
//! they were last merged with.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::category::Category;
use crate::keys::Key;

/// A keyed category list tagged with the version it was merged from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionedList {
    /// Version of the shipped list last merged in. Empty before the first merge.
    pub version: String,
    /// Key to category.
    pub entries: BTreeMap<Key, Category>,
}

impl VersionedList {
    /// Create a list from a version and entries.
    #[must_use]
    pub fn new(version: impl Into<String>, entries: BTreeMap<Key, Category>) -> Self {
        Self {
            version: version.into(),
            entries,
        }
    }

    /// Merge a shipped list into this stored list.
    ///
    /// Same version: returned unchanged without touching the entries.
    /// Different version: every non-`user` entry is dropped, the shipped
    /// entries are laid over what remains (shipped wins on collision), and
    /// the version is taken from the shipped list. Merging twice gives the
    /// same result as merging once.
    #[must_use]
    pub fn merge(mut self, shipped: &VersionedList) -> VersionedList {
        if self.version == shipped.version {
            return self;
        }

        self.entries.retain(|_, category| category.is_user());
        for (key, category) in &shipped.entries {
            self.entries.insert(key.clone(), category.clone());
        }
        self.version.clone_from(&shipped.version);
        self
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the list has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// In-memory view of one persisted [`VersionedList`].
#[derive(Debug, Clone)]
pub struct ListStore {
    name: &'static str,
    list: VersionedList,
}

impl ListStore {
    /// Wrap a loaded list. `name` is the storage namespace, used in logs.
    #[must_use]
    pub fn load(name: &'static str, list: VersionedList) -> Self {
        debug!(
            list = name,
            version = %list.version,
            entries = list.len(),
            "Loaded list"
        );
        Self { name, list }
    }

    /// Merge the shipped list in. Returns `true` if the stored list changed
    /// and needs to be written back.
    pub fn merge_shipped(&mut self, shipped: &VersionedList) -> bool {
        if self.list.version == shipped.version {
            return false;
        }

        let from = self.list.version.clone();
        let stored = std::mem::take(&mut self.list);
        self.list = stored.merge(shipped);
        info!(
            list = self.name,
            from = %from,
            to = %self.list.version,
            entries = self.list.len(),
            "Merged shipped list"
        );
        true
    }

    /// Category recorded for `key`, if any.
    #[must_use]
    pub fn category_for(&self, key: &Key) -> Option<&Category> {
        self.list.entries.get(key)
    }

    /// Record `key` as a user entry, replacing any shipped category.
    pub fn set_user_entry(&mut self, key: Key) {
        self.list.entries.insert(key, Category::user());
    }

    /// Remove `key` entirely, returning the category it had.
    pub fn remove_entry(&mut self, key: &Key) -> Option<Category> {
        self.list.entries.remove(key)
    }

    /// Replace every key with `f(key)`. Used by key-mode migration.
    pub fn rekey(&mut self, f: impl Fn(&Key) -> Key) {
        let entries = std::mem::take(&mut self.list.entries);
        self.list.entries = entries.into_iter().map(|(k, c)| (f(&k), c)).collect();
    }

    /// The underlying list.
    #[must_use]
    pub fn list(&self) -> &VersionedList {
        &self.list
    }
}
