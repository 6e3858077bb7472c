//! The categorizer: decides whether a navigation is blushy and whether the
//! user has already excused it.
//!
//! A [`Categorizer`] owns the in-memory lists and whitelists for one profile
//! and writes every change straight back to its [`KeyValueStore`]. Mutating
//! operations take `&mut self`; hosts that share one across threads wrap it
//! in a `Mutex`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::category::Category;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::keys::{Key, KeyDeriver, KeyMode};
use crate::lists::{ListStore, VersionedList};
use crate::shipped::{ListKind, ShippedLists};
use crate::storage::{load_record, namespace, to_value, KeyValueStore};
use crate::telemetry::{EventKind, EventSink};
use crate::whitelist::{CategoryCounter, WhitelistRecord, WhitelistStore};

/// Namespaces whose contents are keyed and so depend on the key mode.
const KEYED_NAMESPACES: &[&str] = &[
    namespace::BLUSHLIST,
    namespace::SEARCHTERMS,
    namespace::WHITELISTED_DOMAINS,
    namespace::WHITELISTED_QUERIES,
];

/// Outcome of [`Categorizer::decide`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// The host or the query is on a list.
    pub blushy: bool,
    /// Category of the match. The host's category wins over the query's.
    pub category: Option<Category>,
    /// The host or the query has been excused.
    pub excused: bool,
}

impl Decision {
    /// Whether the navigation should be stopped and the user asked.
    #[must_use]
    pub fn should_intercept(&self) -> bool {
        self.blushy && !self.excused
    }
}

/// The user's answer to the consent prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConsentChoice {
    /// Continue in a normal window and stop asking for this site.
    OpenNormal,
    /// Continue in a private window.
    OpenPrivate,
}

/// Summary of the categorizer's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorizerStats {
    /// Mode keys are derived in.
    pub key_mode: KeyMode,
    /// Version of the stored blushlist.
    pub blushlist_version: String,
    /// Entries in the blushlist.
    pub blushlist_entries: usize,
    /// Version of the stored searchterms list.
    pub searchterms_version: String,
    /// Entries in the searchterms list.
    pub searchterms_entries: usize,
    /// Individually whitelisted domains.
    pub whitelisted_domains: usize,
    /// Individually whitelisted queries.
    pub whitelisted_queries: usize,
    /// Approvals per category.
    pub category_counts: BTreeMap<String, u32>,
    /// Categories excused as a whole.
    pub whitelisted_categories: Vec<String>,
}

/// Categorization and consent state for one profile.
pub struct Categorizer<S: KeyValueStore> {
    store: S,
    deriver: KeyDeriver,
    blushlist: ListStore,
    searchterms: ListStore,
    whitelist: WhitelistStore,
    sink: Box<dyn EventSink>,
}

impl<S: KeyValueStore + fmt::Debug> fmt::Debug for Categorizer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Categorizer")
            .field("store", &self.store)
            .field("deriver", &self.deriver)
            .field("blushlist", &self.blushlist)
            .field("searchterms", &self.searchterms)
            .field("whitelist", &self.whitelist)
            .finish_non_exhaustive()
    }
}

impl<S: KeyValueStore> Categorizer<S> {
    /// Load state from `store` and bring it up to date.
    ///
    /// Checks the stored key mode against `config.keys.mode`, migrating a
    /// plain store to digest keys if asked to, then merges both lists with
    /// the shipped ones. Only namespaces that changed are written back, in
    /// one batch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyModeDowngrade`] if the store holds digest keys and
    /// plain keys were requested, or an error if the store fails.
    pub fn open(
        store: S,
        config: &Config,
        shipped: &ShippedLists,
        sink: impl EventSink + 'static,
    ) -> Result<Self> {
        let requested = config.keys.mode;
        let deriver = KeyDeriver::new(requested);
        let mut dirty: Vec<&'static str> = Vec::new();

        let stored_mode = Self::stored_key_mode(&store, requested)?;

        let mut blushlist = ListStore::load(
            namespace::BLUSHLIST,
            load_record::<VersionedList, _>(&store, namespace::BLUSHLIST)?,
        );
        let mut searchterms = ListStore::load(
            namespace::SEARCHTERMS,
            load_record::<VersionedList, _>(&store, namespace::SEARCHTERMS)?,
        );
        let mut whitelist = WhitelistStore::new(
            load_record::<WhitelistRecord, _>(&store, namespace::WHITELISTED_DOMAINS)?,
            load_record::<WhitelistRecord, _>(&store, namespace::WHITELISTED_QUERIES)?,
            load_record::<CategoryCounter, _>(&store, namespace::WHITELISTED_CATEGORIES)?,
        );

        match stored_mode {
            None => dirty.push(namespace::KEY_MODE),
            Some(stored) if stored == requested => {}
            Some(KeyMode::Plain) => {
                info!(from = %KeyMode::Plain, to = %requested, "Migrating stored keys");
                blushlist.rekey(Key::digest_of);
                searchterms.rekey(Key::digest_of);
                whitelist.rekey(Key::digest_of);
                dirty.extend_from_slice(KEYED_NAMESPACES);
                dirty.push(namespace::KEY_MODE);
            }
            Some(stored) => {
                return Err(Error::KeyModeDowngrade {
                    stored: stored.to_string(),
                    requested: requested.to_string(),
                });
            }
        }

        let shipped_blushlist = shipped.blushlist.derive(&deriver, ListKind::Blushlist)?;
        if blushlist.merge_shipped(&shipped_blushlist) {
            dirty.push(namespace::BLUSHLIST);
        }
        let shipped_searchterms = shipped.searchterms.derive(&deriver, ListKind::Searchterms)?;
        if searchterms.merge_shipped(&shipped_searchterms) {
            dirty.push(namespace::SEARCHTERMS);
        }

        dirty.sort_unstable();
        dirty.dedup();

        let mut categorizer = Self {
            store,
            deriver,
            blushlist,
            searchterms,
            whitelist,
            sink: Box::new(sink),
        };

        if !dirty.is_empty() {
            categorizer.persist(&dirty)?;
        }

        info!(
            mode = %requested,
            blushlist = categorizer.blushlist.list().len(),
            searchterms = categorizer.searchterms.list().len(),
            "Categorizer ready"
        );
        Ok(categorizer)
    }

    /// Key mode the store was written in.
    ///
    /// `None` for a fresh store. A store with data but no recorded mode
    /// predates key modes and holds plain keys. An unreadable record is
    /// taken to match `requested`.
    fn stored_key_mode(store: &S, requested: KeyMode) -> Result<Option<KeyMode>> {
        if let Some(value) = store.get(namespace::KEY_MODE)? {
            return match serde_json::from_value::<KeyMode>(value) {
                Ok(mode) => Ok(Some(mode)),
                Err(e) => {
                    warn!(error = %e, "Malformed key mode record, assuming {requested}");
                    Ok(Some(requested))
                }
            };
        }

        for ns in KEYED_NAMESPACES {
            if store.get(ns)?.is_some() {
                debug!(namespace = ns, "Found data without a key mode record");
                return Ok(Some(KeyMode::Plain));
            }
        }
        Ok(None)
    }

    /// Category of the host's base domain, if it is on the blushlist.
    ///
    /// # Errors
    ///
    /// Returns an error if the host is empty.
    pub fn category_for_host(&self, host: &str) -> Result<Option<Category>> {
        let key = self.deriver.key_for_domain(host)?;
        Ok(self.blushlist.category_for(&key).cloned())
    }

    /// Category of the query, if it is on the searchterms list. An empty
    /// query has no category.
    ///
    /// # Errors
    ///
    /// Returns an error if a key cannot be derived.
    pub fn category_for_query(&self, query: &str) -> Result<Option<Category>> {
        if query.is_empty() {
            return Ok(None);
        }
        let key = self.deriver.key_for_query(query)?;
        Ok(self.searchterms.category_for(&key).cloned())
    }

    /// Whether the host is excused, individually or by category amnesty.
    ///
    /// # Errors
    ///
    /// Returns an error if the host is empty.
    pub fn is_host_whitelisted(&self, host: &str) -> Result<bool> {
        let key = self.deriver.key_for_domain(host)?;
        let category = self.blushlist.category_for(&key);
        Ok(self.whitelist.is_domain_whitelisted(&key, category))
    }

    /// Whether the query is excused, individually or by category amnesty.
    /// An empty query never is.
    ///
    /// # Errors
    ///
    /// Returns an error if a key cannot be derived.
    pub fn is_query_whitelisted(&self, query: &str) -> Result<bool> {
        if query.is_empty() {
            return Ok(false);
        }
        let key = self.deriver.key_for_query(query)?;
        let category = self.searchterms.category_for(&key);
        Ok(self.whitelist.is_query_whitelisted(&key, category))
    }

    /// Put the host on the blushlist as a user entry and drop any whitelist
    /// entry it had.
    ///
    /// # Errors
    ///
    /// Returns an error if the host is empty or the store fails.
    pub fn add_to_blushlist(&mut self, host: &str) -> Result<()> {
        let key = self.deriver.key_for_domain(host)?;
        self.blushlist.set_user_entry(key.clone());
        self.whitelist.forget_user_entry(&key);
        self.persist(&[namespace::BLUSHLIST, namespace::WHITELISTED_DOMAINS])?;

        debug!("Site added to blushlist");
        self.sink.notify(EventKind::AddBlushlist);
        Ok(())
    }

    /// Excuse the host.
    ///
    /// A host the user blushed themselves is taken off the blushlist
    /// instead. Anything else is whitelisted and counts once toward its
    /// category. No event is reported; [`Categorizer::resolve_consent`]
    /// reports the whitelisting when it comes from the consent prompt.
    ///
    /// # Errors
    ///
    /// Returns an error if the host is empty or the store fails.
    pub fn whitelist_host(&mut self, host: &str) -> Result<()> {
        let key = self.deriver.key_for_domain(host)?;
        let category = self.blushlist.category_for(&key).cloned();

        if category.as_ref().is_some_and(Category::is_user) {
            self.blushlist.remove_entry(&key);
            self.persist(&[namespace::BLUSHLIST])?;
            debug!("User entry removed from blushlist");
            return Ok(());
        }

        if self.whitelist.whitelist_domain(key, category.as_ref()) {
            self.persist(&[
                namespace::WHITELISTED_DOMAINS,
                namespace::WHITELISTED_CATEGORIES,
            ])?;
        }
        Ok(())
    }

    /// Excuse the query. Counting follows [`Categorizer::whitelist_host`].
    ///
    /// # Errors
    ///
    /// Returns an error if the query is empty or the store fails.
    pub fn whitelist_query(&mut self, query: &str) -> Result<()> {
        let key = self.deriver.key_for_query(query)?;
        let category = self.searchterms.category_for(&key).cloned();

        if category.as_ref().is_some_and(Category::is_user) {
            self.searchterms.remove_entry(&key);
            self.persist(&[namespace::SEARCHTERMS])?;
            debug!("User entry removed from searchterms");
            return Ok(());
        }

        if self.whitelist.whitelist_query(key, category.as_ref()) {
            self.persist(&[
                namespace::WHITELISTED_QUERIES,
                namespace::WHITELISTED_CATEGORIES,
            ])?;
        }
        Ok(())
    }

    /// Decide what to do with a navigation to `host`, optionally carrying a
    /// search `query`. Reads in-memory state only.
    ///
    /// # Errors
    ///
    /// Returns an error if the host is empty.
    pub fn decide(&self, host: &str, query: Option<&str>) -> Result<Decision> {
        let query = query.unwrap_or_default();

        let host_category = self.category_for_host(host)?;
        let query_category = self.category_for_query(query)?;
        let host_excused = self.is_host_whitelisted(host)?;
        let query_excused = self.is_query_whitelisted(query)?;

        let blushy = host_category.is_some() || query_category.is_some();
        let excused = host_excused || query_excused;
        let by_host = host_category.is_some();
        let category = host_category.or(query_category);

        if blushy {
            let event = match (excused, by_host) {
                (false, true) => EventKind::BlushySite,
                (false, false) => EventKind::BlushyQuery,
                (true, _) if host_excused => EventKind::WhitelistedSite,
                (true, _) => EventKind::WhitelistedQuery,
            };
            self.sink.notify(event);
        }

        let decision = Decision {
            blushy,
            category,
            excused,
        };
        debug!(
            blushy,
            excused,
            category = decision.category.as_ref().map(Category::as_str),
            "Navigation decided"
        );
        Ok(decision)
    }

    /// Apply the user's answer to the consent prompt.
    ///
    /// `OpenNormal` whitelists the host if it is blushy and the query
    /// otherwise, reporting `whitelisted-site` or `whitelisted-query` after
    /// `open-normal`. A host the user blushed is un-blushed the same way.
    /// `OpenPrivate` changes nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the host is empty or the store fails.
    pub fn resolve_consent(
        &mut self,
        host: &str,
        query: Option<&str>,
        choice: ConsentChoice,
    ) -> Result<()> {
        match choice {
            ConsentChoice::OpenPrivate => {
                self.sink.notify(EventKind::OpenPrivate);
            }
            ConsentChoice::OpenNormal => {
                self.sink.notify(EventKind::OpenNormal);
                let query = query.unwrap_or_default();
                if self.category_for_host(host)?.is_some() {
                    self.whitelist_host(host)?;
                    self.sink.notify(EventKind::WhitelistedSite);
                } else if self.category_for_query(query)?.is_some() {
                    self.whitelist_query(query)?;
                    self.sink.notify(EventKind::WhitelistedQuery);
                }
            }
        }
        Ok(())
    }

    /// Forget a site: drop its user blushlist entry and its whitelist entry
    /// in one write. Shipped entries and category counts are kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the host is empty or the store fails.
    pub fn forget_site(&mut self, host: &str) -> Result<()> {
        let key = self.deriver.key_for_domain(host)?;
        if self.blushlist.category_for(&key).is_some_and(Category::is_user) {
            self.blushlist.remove_entry(&key);
        }
        self.whitelist.forget_user_entry(&key);
        self.persist(&[namespace::BLUSHLIST, namespace::WHITELISTED_DOMAINS])?;

        debug!("Site forgotten");
        self.sink.notify(EventKind::ForgetSite);
        Ok(())
    }

    /// Current list and whitelist sizes.
    #[must_use]
    pub fn stats(&self) -> CategorizerStats {
        let counts = self.whitelist.categories();
        CategorizerStats {
            key_mode: self.deriver.mode(),
            blushlist_version: self.blushlist.list().version.clone(),
            blushlist_entries: self.blushlist.list().len(),
            searchterms_version: self.searchterms.list().version.clone(),
            searchterms_entries: self.searchterms.list().len(),
            whitelisted_domains: self.whitelist.domains().len(),
            whitelisted_queries: self.whitelist.queries().len(),
            category_counts: counts
                .iter()
                .map(|(c, n)| (c.to_string(), n))
                .collect(),
            whitelisted_categories: counts
                .iter()
                .filter(|(c, _)| self.whitelist.is_category_whitelisted(c))
                .map(|(c, _)| c.to_string())
                .collect(),
        }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Give the store back, e.g. to reopen it with another configuration.
    #[must_use]
    pub fn into_store(self) -> S {
        self.store
    }

    fn persist(&mut self, namespaces: &[&'static str]) -> Result<()> {
        let entries = namespaces
            .iter()
            .map(|ns| Ok((*ns, self.value_for(ns)?)))
            .collect::<Result<Vec<_>>>()?;
        self.store.set_many(&entries)
    }

    fn value_for(&self, ns: &str) -> Result<Value> {
        match ns {
            namespace::BLUSHLIST => to_value(self.blushlist.list()),
            namespace::SEARCHTERMS => to_value(self.searchterms.list()),
            namespace::WHITELISTED_DOMAINS => to_value(self.whitelist.domains()),
            namespace::WHITELISTED_QUERIES => to_value(self.whitelist.queries()),
            namespace::WHITELISTED_CATEGORIES => to_value(self.whitelist.categories()),
            namespace::KEY_MODE => to_value(&self.deriver.mode()),
            other => Err(Error::internal(format!("unknown namespace: {other}"))),
        }
    }
}
