//! `SQLite` schema definitions for blushproof.

/// SQL statement to create the namespaces table.
///
/// Each row holds one persisted record (a list, a whitelist or the counters)
/// as a JSON document.
pub const CREATE_NAMESPACES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS namespaces (
    namespace TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[CREATE_NAMESPACES_TABLE, CREATE_METADATA_TABLE];
