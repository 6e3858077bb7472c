//! Lists shipped with blushproof.
//!
//! Shipped lists are plaintext (`{"version": ..., "entries": {domain: category}}`)
//! and are turned into keyed [`VersionedList`]s at load time, so the same file
//! serves both key modes.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::category::Category;
use crate::config::ListsConfig;
use crate::error::{Error, Result};
use crate::keys::KeyDeriver;
use crate::lists::VersionedList;
use crate::storage::namespace;

const BUILTIN_BLUSHLIST: &str = include_str!("../data/blushlist.json");
const BUILTIN_SEARCHTERMS: &str = include_str!("../data/searchterms.json");

/// Which list a shipped file feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    /// Domains, keyed through their base domain.
    Blushlist,
    /// Search terms, keyed through their lowercased form.
    Searchterms,
}

impl ListKind {
    /// Storage namespace the list is persisted under.
    #[must_use]
    pub fn namespace(self) -> &'static str {
        match self {
            Self::Blushlist => namespace::BLUSHLIST,
            Self::Searchterms => namespace::SEARCHTERMS,
        }
    }
}

/// A plaintext list as distributed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippedList {
    /// Release version. Any change triggers a merge on next start.
    pub version: String,
    /// Plaintext domain or query to category.
    pub entries: BTreeMap<String, Category>,
}

impl ShippedList {
    /// Parse and validate a shipped list. `name` is used in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidList`] if the JSON is malformed, the version
    /// is empty, an entry is blank, or an entry is labelled `user` or with
    /// an invalid category.
    pub fn from_json(name: &str, text: &str) -> Result<Self> {
        #[derive(Deserialize)]
        struct Raw {
            version: String,
            entries: BTreeMap<String, String>,
        }

        let raw: Raw =
            serde_json::from_str(text).map_err(|e| Error::invalid_list(name, e.to_string()))?;

        if raw.version.trim().is_empty() {
            return Err(Error::invalid_list(name, "version is empty"));
        }

        let mut entries = BTreeMap::new();
        for (item, label) in raw.entries {
            if item.trim().is_empty() {
                return Err(Error::invalid_list(name, "entry is empty"));
            }
            let category = Category::parse(&label)
                .map_err(|_| Error::invalid_list(name, format!("invalid category '{label}' for '{item}'")))?;
            if category.is_user() {
                return Err(Error::invalid_list(
                    name,
                    format!("'{item}' uses the reserved user category"),
                ));
            }
            entries.insert(item, category);
        }

        Ok(Self {
            version: raw.version,
            entries,
        })
    }

    /// Read a shipped list from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid list.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let list = Self::from_json(&path.display().to_string(), &text)?;
        info!(path = %path.display(), version = %list.version, entries = list.len(), "Loaded list file");
        Ok(list)
    }

    /// The built-in blushlist.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded data is invalid.
    pub fn builtin_blushlist() -> Result<Self> {
        Self::from_json("builtin blushlist", BUILTIN_BLUSHLIST)
    }

    /// The built-in searchterms list.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded data is invalid.
    pub fn builtin_searchterms() -> Result<Self> {
        Self::from_json("builtin searchterms", BUILTIN_SEARCHTERMS)
    }

    /// Derive the keyed list for `kind` in the deriver's mode.
    ///
    /// Entries that collapse onto the same key (`a.example.com` and
    /// `b.example.com`) keep the category of the last one in order.
    ///
    /// # Errors
    ///
    /// Returns an error if a key cannot be derived.
    pub fn derive(&self, deriver: &KeyDeriver, kind: ListKind) -> Result<VersionedList> {
        let mut entries = BTreeMap::new();
        for (item, category) in &self.entries {
            let key = match kind {
                ListKind::Blushlist => deriver.key_for_domain(item)?,
                ListKind::Searchterms => deriver.key_for_query(item)?,
            };
            entries.insert(key, category.clone());
        }
        debug!(list = kind.namespace(), mode = %deriver.mode(), entries = entries.len(), "Derived keyed list");
        Ok(VersionedList::new(self.version.clone(), entries))
    }

    /// Serialize as pretty-printed JSON in the shipped format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
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

/// The pair of lists a categorizer is opened against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShippedLists {
    /// Domains.
    pub blushlist: ShippedList,
    /// Search terms.
    pub searchterms: ShippedList,
}

impl ShippedLists {
    /// Both built-in lists.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded data is invalid.
    pub fn builtin() -> Result<Self> {
        Ok(Self {
            blushlist: ShippedList::builtin_blushlist()?,
            searchterms: ShippedList::builtin_searchterms()?,
        })
    }

    /// Lists named in the configuration, falling back to the built-in ones.
    ///
    /// # Errors
    ///
    /// Returns an error if an override file cannot be read or is invalid.
    pub fn from_config(config: &ListsConfig) -> Result<Self> {
        let blushlist = match &config.blushlist_path {
            Some(path) => ShippedList::from_path(path)?,
            None => ShippedList::builtin_blushlist()?,
        };
        let searchterms = match &config.searchterms_path {
            Some(path) => ShippedList::from_path(path)?,
            None => ShippedList::builtin_searchterms()?,
        };
        Ok(Self {
            blushlist,
            searchterms,
        })
    }
}

/// Build a shipped list from newline-separated files, one category per file.
///
/// Lines are trimmed and lowercased. Blank lines and lines starting with `#`
/// are skipped. A line appearing under two categories keeps the later one.
///
/// # Errors
///
/// Returns [`Error::InvalidList`] if the version is empty or a category is `user`.
pub fn build_shipped_list<'a, I>(version: &str, inputs: I) -> Result<ShippedList>
where
    I: IntoIterator<Item = (&'a str, &'a Category)>,
{
    if version.trim().is_empty() {
        return Err(Error::invalid_list("make-list", "version is empty"));
    }

    let mut entries = BTreeMap::new();
    for (text, category) in inputs {
        if category.is_user() {
            return Err(Error::invalid_list(
                "make-list",
                "the user category cannot be shipped",
            ));
        }
        for line in text.lines() {
            let item = line.trim().to_lowercase();
            if item.is_empty() || item.starts_with('#') {
                continue;
            }
            entries.insert(item, category.clone());
        }
    }

    Ok(ShippedList {
        version: version.trim().to_string(),
        entries,
    })
}
