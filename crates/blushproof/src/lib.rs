//! `blushproof` - Decide when a navigation deserves a private window
//!
//! This library keeps the versioned blushlist and searchterms lists, the
//! user's whitelist with category amnesty, and the storage and telemetry
//! plumbing around them. [`Categorizer`] is the entry point.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod bloom;
pub mod categorizer;
pub mod category;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod keys;
pub mod lists;
pub mod logging;
pub mod shipped;
pub mod storage;
pub mod telemetry;
pub mod whitelist;

pub use bloom::BloomFilter;
pub use categorizer::{Categorizer, CategorizerStats, ConsentChoice, Decision};
pub use category::Category;
pub use config::Config;
pub use error::{Error, Result};
pub use keys::{Key, KeyDeriver, KeyMode};
pub use logging::init_logging;
pub use shipped::{build_shipped_list, ShippedList, ShippedLists};
pub use storage::{KeyValueStore, MemoryStore, SqliteStore};
pub use telemetry::{EventKind, EventSink};
