//! Storage key derivation for domains and search queries.
//!
//! A key is either the plaintext lookup string (base domain or lowercased
//! query) or a truncated SHA-256 digest of it. Digest keys keep the stored
//! lists from revealing which sites they cover if the profile is read off
//! disk. Truncation to 24 bytes keeps keys short while collisions stay out
//! of reach for a client-side list of a few thousand entries.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::base_domain;
use crate::error::{Error, Result};

/// Number of digest bytes kept in a digest key.
pub const DIGEST_KEY_BYTES: usize = 24;

/// How lookup keys are derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyMode {
    /// Keys are the plaintext base domain or lowercased query.
    Plain,
    /// Keys are the first 24 bytes of SHA-256 over the plaintext, hex encoded.
    #[default]
    Digest,
}

impl fmt::Display for KeyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain => write!(f, "plain"),
            Self::Digest => write!(f, "digest"),
        }
    }
}

/// A derived lookup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Key(String);

impl Key {
    /// Wrap an already-derived key, e.g. one read back from storage.
    #[must_use]
    pub fn from_stored(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The key as stored.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Digest a plaintext key. Used when migrating a plain store to digest
    /// mode; `digest_of(plain_key) == derive_digest(plaintext)`.
    #[must_use]
    pub fn digest_of(plain: &Key) -> Self {
        Self(digest_hex(&plain.0))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derives keys for domains and queries in a fixed [`KeyMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyDeriver {
    mode: KeyMode,
}

impl KeyDeriver {
    /// Create a deriver for the given mode.
    #[must_use]
    pub fn new(mode: KeyMode) -> Self {
        Self { mode }
    }

    /// The mode keys are derived in.
    #[must_use]
    pub fn mode(&self) -> KeyMode {
        self.mode
    }

    /// Key for a host, derived from its base domain.
    ///
    /// The host is trimmed, lowercased and stripped of a trailing root dot
    /// first, so hosts the suffix list cannot place (`LOCALHOST.`) key the
    /// same as their canonical form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyDerivation`] if the host is empty.
    pub fn key_for_domain(&self, host: &str) -> Result<Key> {
        let host = host.trim().trim_end_matches('.').to_lowercase();
        if host.is_empty() {
            return Err(Error::key_derivation("host is empty"));
        }
        Ok(self.derive(&base_domain(&host)))
    }

    /// Key for a search query, derived from its lowercased form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyDerivation`] if the query is empty.
    pub fn key_for_query(&self, query: &str) -> Result<Key> {
        if query.is_empty() {
            return Err(Error::key_derivation("query is empty"));
        }
        Ok(self.derive(&query.to_lowercase()))
    }

    fn derive(&self, plain: &str) -> Key {
        match self.mode {
            KeyMode::Plain => Key(plain.to_string()),
            KeyMode::Digest => Key(digest_hex(plain)),
        }
    }
}

fn digest_hex(plain: &str) -> String {
    let digest = Sha256::digest(plain.as_bytes());
    hex::encode(&digest[..DIGEST_KEY_BYTES])
}
