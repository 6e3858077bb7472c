//! Persistence for blushproof state.
//!
//! State is kept as a handful of JSON documents, one per namespace, behind
//! the synchronous [`KeyValueStore`] trait. [`SqliteStore`] is the on-disk
//! implementation; [`MemoryStore`] keeps everything in a `HashMap`.
//!
//! Typed records cross this boundary only through [`load_record`] and
//! [`to_value`], so anything malformed on disk degrades to an empty record
//! instead of an error.

pub mod migrations;
pub mod schema;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Namespace names used by the categorizer.
pub mod namespace {
    /// Domain key to category list.
    pub const BLUSHLIST: &str = "blushlist";
    /// Query key to category list.
    pub const SEARCHTERMS: &str = "searchterms";
    /// Whitelisted domain keys.
    pub const WHITELISTED_DOMAINS: &str = "whitelistedDomains";
    /// Whitelisted query keys.
    pub const WHITELISTED_QUERIES: &str = "whitelistedQueries";
    /// Per-category approval counts.
    pub const WHITELISTED_CATEGORIES: &str = "whitelistedCategories";
    /// Key mode the keyed namespaces were written in.
    pub const KEY_MODE: &str = "keyMode";

    /// Every namespace, in a fixed order.
    pub const ALL: &[&str] = &[
        BLUSHLIST,
        SEARCHTERMS,
        WHITELISTED_DOMAINS,
        WHITELISTED_QUERIES,
        WHITELISTED_CATEGORIES,
        KEY_MODE,
    ];
}

/// Synchronous namespace-to-JSON persistence.
pub trait KeyValueStore {
    /// Read the value stored under `namespace`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn get(&self, namespace: &str) -> Result<Option<Value>>;

    /// Replace the value stored under `namespace`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn set(&mut self, namespace: &str, value: &Value) -> Result<()>;

    /// Delete `namespace`. Returns `true` if it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn remove(&mut self, namespace: &str) -> Result<bool>;

    /// Write several namespaces so that either all or none are stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written; in that case
    /// no namespace was changed.
    fn set_many(&mut self, entries: &[(&str, Value)]) -> Result<()>;
}

/// Load a typed record from `namespace`.
///
/// Missing namespaces give `T::default()`. A value that does not match `T`
/// is logged and also treated as `T::default()`.
///
/// # Errors
///
/// Returns an error only if the store itself fails.
pub fn load_record<T, S>(store: &S, namespace: &str) -> Result<T>
where
    T: DeserializeOwned + Default,
    S: KeyValueStore + ?Sized,
{
    let Some(value) = store.get(namespace)? else {
        debug!(namespace, "Namespace empty, using default");
        return Ok(T::default());
    };

    match serde_json::from_value(value) {
        Ok(record) => Ok(record),
        Err(e) => {
            warn!(namespace, error = %e, "Malformed persisted record, starting empty");
            Ok(T::default())
        }
    }
}

/// Serialize a typed record for storage.
///
/// # Errors
///
/// Returns an error if the record cannot be represented as JSON.
pub fn to_value<T: Serialize>(record: &T) -> Result<Value> {
    Ok(serde_json::to_value(record)?)
}

/// `SQLite`-backed store.
#[derive(Debug)]
pub struct SqliteStore {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl SqliteStore {
    /// Open or create a store at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist
    /// and brings the schema up to date.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Names of the namespaces currently stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn namespaces(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT namespace FROM namespaces ORDER BY namespace")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }

    /// Size of the database file in bytes, or 0 for in-memory stores.
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        }
    }

    fn write(conn: &Connection, namespace: &str, value: &Value) -> Result<()> {
        let text = serde_json::to_string(value)?;
        conn.execute(
            r"
            INSERT INTO namespaces (namespace, value, updated_at)
            VALUES (?1, ?2, datetime('now'))
            ON CONFLICT(namespace) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            ",
            params![namespace, text],
        )?;
        Ok(())
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, namespace: &str) -> Result<Option<Value>> {
        let text: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM namespaces WHERE namespace = ?1",
                [namespace],
                |row| row.get(0),
            )
            .optional()?;

        Ok(text.and_then(|t| match serde_json::from_str(&t) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(namespace, error = %e, "Stored value is not valid JSON, ignoring it");
                None
            }
        }))
    }

    fn set(&mut self, namespace: &str, value: &Value) -> Result<()> {
        Self::write(&self.conn, namespace, value)?;
        debug!(namespace, "Namespace written");
        Ok(())
    }

    fn remove(&mut self, namespace: &str) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM namespaces WHERE namespace = ?1", [namespace])?;
        Ok(affected > 0)
    }

    fn set_many(&mut self, entries: &[(&str, Value)]) -> Result<()> {
        let tx = self.conn.transaction()?;
        for (namespace, value) in entries {
            Self::write(&tx, namespace, value)?;
        }
        tx.commit()?;
        debug!(count = entries.len(), "Namespaces written");
        Ok(())
    }
}

/// `HashMap`-backed store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, Value>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, namespace: &str) -> Result<Option<Value>> {
        Ok(self.values.get(namespace).cloned())
    }

    fn set(&mut self, namespace: &str, value: &Value) -> Result<()> {
        self.values.insert(namespace.to_string(), value.clone());
        Ok(())
    }

    fn remove(&mut self, namespace: &str) -> Result<bool> {
        Ok(self.values.remove(namespace).is_some())
    }

    fn set_many(&mut self, entries: &[(&str, Value)]) -> Result<()> {
        for (namespace, value) in entries {
            self.values.insert((*namespace).to_string(), value.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Record {
        version: String,
        count: u32,
    }

    fn create_test_storage() -> SqliteStore {
        SqliteStore::open_in_memory().expect("failed to create test storage")
    }

    fn temp_db_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("blushproof_{tag}_{}.db", std::process::id()))
    }

    fn cleanup(path: &Path) {
        let _ = std::fs::remove_file(path);
        let _ = std::fs::remove_file(path.with_extension("db-wal"));
        let _ = std::fs::remove_file(path.with_extension("db-shm"));
    }

    #[test]
    fn test_open_in_memory() {
        let storage = create_test_storage();
        assert_eq!(storage.path().to_string_lossy(), ":memory:");
        assert_eq!(storage.size_bytes(), 0);
    }

    #[test]
    fn test_set_and_get() {
        let mut storage = create_test_storage();
        storage.set("blushlist", &json!({"version": "1"})).unwrap();

        assert_eq!(
            storage.get("blushlist").unwrap(),
            Some(json!({"version": "1"}))
        );
        assert_eq!(storage.get("searchterms").unwrap(), None);
    }

    #[test]
    fn test_set_overwrites() {
        let mut storage = create_test_storage();
        storage.set("ns", &json!(1)).unwrap();
        storage.set("ns", &json!(2)).unwrap();

        assert_eq!(storage.get("ns").unwrap(), Some(json!(2)));
        assert_eq!(storage.namespaces().unwrap(), vec!["ns".to_string()]);
    }

    #[test]
    fn test_remove() {
        let mut storage = create_test_storage();
        storage.set("ns", &json!(true)).unwrap();

        assert!(storage.remove("ns").unwrap());
        assert!(!storage.remove("ns").unwrap());
        assert_eq!(storage.get("ns").unwrap(), None);
    }

    #[test]
    fn test_set_many_writes_all() {
        let mut storage = create_test_storage();
        storage
            .set_many(&[("a", json!(1)), ("b", json!({"x": true}))])
            .unwrap();

        assert_eq!(storage.get("a").unwrap(), Some(json!(1)));
        assert_eq!(storage.get("b").unwrap(), Some(json!({"x": true})));
    }

    #[test]
    fn test_set_many_failure_writes_nothing() {
        let mut storage = create_test_storage();
        storage.set("a", &json!(1)).unwrap();
        storage
            .conn
            .execute_batch(
                r"
                CREATE TRIGGER reject_broken BEFORE INSERT ON namespaces
                WHEN NEW.namespace = 'broken'
                BEGIN SELECT RAISE(ABORT, 'rejected'); END;
                ",
            )
            .unwrap();

        let result = storage.set_many(&[("a", json!(2)), ("b", json!(3)), ("broken", json!(4))]);

        assert!(matches!(result, Err(Error::DatabaseQuery(_))));
        assert_eq!(storage.get("a").unwrap(), Some(json!(1)));
        assert_eq!(storage.get("b").unwrap(), None);
        assert_eq!(storage.namespaces().unwrap(), vec!["a".to_string()]);
    }

    #[test]
    fn test_invalid_json_reads_as_missing() {
        let storage = create_test_storage();
        storage
            .conn
            .execute(
                "INSERT INTO namespaces (namespace, value) VALUES ('bad', '{not json')",
                [],
            )
            .unwrap();

        assert_eq!(storage.get("bad").unwrap(), None);
    }

    #[test]
    fn test_load_record_missing_is_default() {
        let storage = MemoryStore::new();
        let record: Record = load_record(&storage, "nothing").unwrap();
        assert_eq!(record, Record::default());
    }

    #[test]
    fn test_load_record_malformed_is_default() {
        let mut storage = MemoryStore::new();
        storage.set("rec", &json!(["not", "a", "record"])).unwrap();

        let record: Record = load_record(&storage, "rec").unwrap();
        assert_eq!(record, Record::default());
    }

    #[test]
    fn test_load_record_round_trip() {
        let mut storage = create_test_storage();
        let record = Record {
            version: "7".to_string(),
            count: 3,
        };
        storage.set("rec", &to_value(&record).unwrap()).unwrap();

        let loaded: Record = load_record(&storage, "rec").unwrap();
        assert_eq!(loaded, record);
    }

    #[test]
    fn test_memory_store() {
        let mut storage = MemoryStore::new();
        storage.set("a", &json!("x")).unwrap();
        storage.set_many(&[("b", json!(2)), ("a", json!("y"))]).unwrap();

        assert_eq!(storage.get("a").unwrap(), Some(json!("y")));
        assert_eq!(storage.get("b").unwrap(), Some(json!(2)));
        assert!(storage.remove("b").unwrap());
        assert_eq!(storage.get("b").unwrap(), None);
    }

    #[test]
    fn test_file_store_persists_across_reopen() {
        let db_path = temp_db_path("reopen");
        cleanup(&db_path);

        {
            let mut storage = SqliteStore::open(&db_path).unwrap();
            storage.set("blushlist", &json!({"version": "2"})).unwrap();
            assert_eq!(storage.path(), db_path);
            assert!(storage.size_bytes() > 0);
        }

        let storage = SqliteStore::open(&db_path).unwrap();
        assert_eq!(
            storage.get("blushlist").unwrap(),
            Some(json!({"version": "2"}))
        );

        drop(storage);
        cleanup(&db_path);
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let root = std::env::temp_dir().join(format!("blushproof_test_{}", std::process::id()));
        let nested_path = root.join("nested/db.sqlite");
        let _ = std::fs::remove_dir_all(&root);

        let storage = SqliteStore::open(&nested_path).unwrap();
        assert!(nested_path.exists());

        drop(storage);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn test_namespace_names_are_distinct() {
        let mut names = namespace::ALL.to_vec();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), namespace::ALL.len());
    }
}
