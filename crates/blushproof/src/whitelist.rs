//! Whitelisted domains and queries, and per-category approval counts.
//!
//! Two sources of excusal are kept side by side: a key excused on its own
//! (fine grained), and a whole category excused once the user has approved
//! [`CATEGORY_AMNESTY_THRESHOLD`] distinct keys in it (coarse grained).
//! Either one is enough. Neither removes anything from the lists.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::category::Category;
use crate::keys::Key;

/// Distinct approvals in one category after which the whole category is excused.
pub const CATEGORY_AMNESTY_THRESHOLD: u32 = 3;

/// Keys the user has excused from prompting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WhitelistRecord(BTreeMap<Key, bool>);

impl WhitelistRecord {
    /// Whether `key` is recorded as whitelisted.
    #[must_use]
    pub fn contains(&self, key: &Key) -> bool {
        self.0.get(key).copied().unwrap_or(false)
    }

    /// Record `key`. Returns `true` if it was not already recorded.
    pub fn insert(&mut self, key: Key) -> bool {
        !matches!(self.0.insert(key, true), Some(true))
    }

    /// Remove `key`. Returns `true` if it was recorded.
    pub fn remove(&mut self, key: &Key) -> bool {
        matches!(self.0.remove(key), Some(true))
    }

    /// Number of whitelisted keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.values().filter(|v| **v).count()
    }

    /// Whether nothing is whitelisted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn rekey(&mut self, f: &impl Fn(&Key) -> Key) {
        let entries = std::mem::take(&mut self.0);
        self.0 = entries.into_iter().map(|(k, v)| (f(&k), v)).collect();
    }
}

/// Approval counts per category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryCounter(BTreeMap<Category, u32>);

impl CategoryCounter {
    /// Approvals recorded for `category`.
    #[must_use]
    pub fn get(&self, category: &Category) -> u32 {
        self.0.get(category).copied().unwrap_or(0)
    }

    /// Iterate over categories and their counts.
    pub fn iter(&self) -> impl Iterator<Item = (&Category, u32)> {
        self.0.iter().map(|(c, n)| (c, *n))
    }

    fn increment(&mut self, category: &Category) -> u32 {
        let count = self.0.entry(category.clone()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }
}

/// In-memory whitelist state for domains and queries.
#[derive(Debug, Clone, Default)]
pub struct WhitelistStore {
    domains: WhitelistRecord,
    queries: WhitelistRecord,
    categories: CategoryCounter,
}

impl WhitelistStore {
    /// Assemble a store from loaded records.
    #[must_use]
    pub fn new(domains: WhitelistRecord, queries: WhitelistRecord, categories: CategoryCounter) -> Self {
        Self {
            domains,
            queries,
            categories,
        }
    }

    /// Whether a domain key is excused, either directly or because its
    /// `category` has reached amnesty.
    #[must_use]
    pub fn is_domain_whitelisted(&self, key: &Key, category: Option<&Category>) -> bool {
        self.domains.contains(key) || category.is_some_and(|c| self.is_category_whitelisted(c))
    }

    /// Whether a query key is excused, either directly or because its
    /// `category` has reached amnesty.
    #[must_use]
    pub fn is_query_whitelisted(&self, key: &Key, category: Option<&Category>) -> bool {
        self.queries.contains(key) || category.is_some_and(|c| self.is_category_whitelisted(c))
    }

    /// Whether `category` has been approved often enough to be excused as a
    /// whole. The `user` category never is.
    #[must_use]
    pub fn is_category_whitelisted(&self, category: &Category) -> bool {
        !category.is_user() && self.categories.get(category) >= CATEGORY_AMNESTY_THRESHOLD
    }

    /// Whitelist a domain key listed under `category`.
    ///
    /// The category count goes up only the first time a key is recorded, and
    /// never for `user`. Returns `true` if the key was newly recorded.
    pub fn whitelist_domain(&mut self, key: Key, category: Option<&Category>) -> bool {
        let newly = self.domains.insert(key);
        if newly {
            self.count(category);
        }
        newly
    }

    /// Whitelist a query key listed under `category`. Counting follows
    /// [`WhitelistStore::whitelist_domain`].
    pub fn whitelist_query(&mut self, key: Key, category: Option<&Category>) -> bool {
        let newly = self.queries.insert(key);
        if newly {
            self.count(category);
        }
        newly
    }

    /// Drop a domain key from the whitelist, e.g. when the user blushes a
    /// site they had excused. Returns `true` if it was there. Category counts
    /// are left alone.
    pub fn forget_user_entry(&mut self, key: &Key) -> bool {
        self.domains.remove(key)
    }

    /// Approvals recorded for `category`.
    #[must_use]
    pub fn category_count(&self, category: &Category) -> u32 {
        self.categories.get(category)
    }

    /// Whitelisted domain keys.
    #[must_use]
    pub fn domains(&self) -> &WhitelistRecord {
        &self.domains
    }

    /// Whitelisted query keys.
    #[must_use]
    pub fn queries(&self) -> &WhitelistRecord {
        &self.queries
    }

    /// Per-category approval counts.
    #[must_use]
    pub fn categories(&self) -> &CategoryCounter {
        &self.categories
    }

    /// Replace every domain and query key with `f(key)`.
    pub fn rekey(&mut self, f: impl Fn(&Key) -> Key) {
        self.domains.rekey(&f);
        self.queries.rekey(&f);
    }

    fn count(&mut self, category: Option<&Category>) {
        let Some(category) = category.filter(|c| !c.is_user()) else {
            return;
        };
        let count = self.categories.increment(category);
        debug!(%category, count, "Category approval recorded");
        if count == CATEGORY_AMNESTY_THRESHOLD {
            info!(%category, "Category reached amnesty");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> Key {
        Key::from_stored(s)
    }

    fn cat(s: &str) -> Category {
        Category::parse(s).unwrap()
    }

    #[test]
    fn test_whitelist_domain_records_key() {
        let mut store = WhitelistStore::default();
        let social = cat("social");

        assert!(!store.is_domain_whitelisted(&key("a"), Some(&social)));
        assert!(store.whitelist_domain(key("a"), Some(&social)));
        assert!(store.is_domain_whitelisted(&key("a"), Some(&social)));
        assert_eq!(store.category_count(&social), 1);
    }

    #[test]
    fn test_rewhitelisting_does_not_double_count() {
        let mut store = WhitelistStore::default();
        let social = cat("social");

        store.whitelist_domain(key("a"), Some(&social));
        assert!(!store.whitelist_domain(key("a"), Some(&social)));
        store.whitelist_domain(key("a"), Some(&social));

        assert_eq!(store.category_count(&social), 1);
        assert!(!store.is_category_whitelisted(&social));
    }

    #[test]
    fn test_category_amnesty_after_three_distinct_keys() {
        let mut store = WhitelistStore::default();
        let testing = cat("testing");

        store.whitelist_domain(key("a"), Some(&testing));
        store.whitelist_domain(key("b"), Some(&testing));
        assert!(!store.is_domain_whitelisted(&key("d"), Some(&testing)));

        store.whitelist_domain(key("c"), Some(&testing));
        assert!(store.is_category_whitelisted(&testing));
        assert!(store.is_domain_whitelisted(&key("d"), Some(&testing)));
        assert!(!store.is_domain_whitelisted(&key("d"), Some(&cat("other"))));
        assert!(!store.is_domain_whitelisted(&key("d"), None));
    }

    #[test]
    fn test_domain_and_query_approvals_share_category_count() {
        let mut store = WhitelistStore::default();
        let gambling = cat("gambling");

        store.whitelist_domain(key("casino"), Some(&gambling));
        store.whitelist_query(key("poker"), Some(&gambling));
        store.whitelist_query(key("slots"), Some(&gambling));

        assert!(store.is_category_whitelisted(&gambling));
        assert!(store.is_query_whitelisted(&key("roulette"), Some(&gambling)));
    }

    #[test]
    fn test_user_category_never_counts() {
        let mut store = WhitelistStore::default();
        let user = Category::user();

        for k in ["a", "b", "c", "d"] {
            store.whitelist_domain(key(k), Some(&user));
        }

        assert_eq!(store.category_count(&user), 0);
        assert!(!store.is_category_whitelisted(&user));
        assert!(!store.is_domain_whitelisted(&key("e"), Some(&user)));
    }

    #[test]
    fn test_user_category_never_whitelisted_even_with_stored_count() {
        let mut counts = BTreeMap::new();
        counts.insert(Category::user(), 10);
        let store = WhitelistStore::new(
            WhitelistRecord::default(),
            WhitelistRecord::default(),
            CategoryCounter(counts),
        );
        assert!(!store.is_category_whitelisted(&Category::user()));
    }

    #[test]
    fn test_whitelist_without_category_records_key_only() {
        let mut store = WhitelistStore::default();
        assert!(store.whitelist_query(key("q"), None));
        assert!(store.is_query_whitelisted(&key("q"), None));
        assert_eq!(store.categories().iter().count(), 0);
    }

    #[test]
    fn test_forget_user_entry() {
        let mut store = WhitelistStore::default();
        store.whitelist_domain(key("a"), Some(&cat("social")));

        assert!(store.forget_user_entry(&key("a")));
        assert!(!store.is_domain_whitelisted(&key("a"), None));
        assert!(!store.forget_user_entry(&key("a")));
    }

    #[test]
    fn test_amnesty_is_independent_of_individual_entries() {
        let mut store = WhitelistStore::default();
        let gaming = cat("gaming");
        for k in ["a", "b", "c"] {
            store.whitelist_domain(key(k), Some(&gaming));
        }
        store.forget_user_entry(&key("a"));

        // The category stays excused even after a contributing key is forgotten.
        assert!(store.is_domain_whitelisted(&key("a"), Some(&gaming)));
    }

    #[test]
    fn test_record_serializes_as_object_of_bools() {
        let mut record = WhitelistRecord::default();
        record.insert(key("example.com"));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json, serde_json::json!({"example.com": true}));
    }

    #[test]
    fn test_false_entries_are_not_whitelisted() {
        let record: WhitelistRecord =
            serde_json::from_value(serde_json::json!({"a": false, "b": true})).unwrap();
        assert!(!record.contains(&key("a")));
        assert!(record.contains(&key("b")));
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn test_rekey() {
        let mut store = WhitelistStore::default();
        store.whitelist_domain(key("a"), None);
        store.whitelist_query(key("q"), None);
        store.rekey(|k| Key::from_stored(k.as_str().to_uppercase()));
        assert!(store.domains().contains(&key("A")));
        assert!(store.queries().contains(&key("Q")));
    }
}
