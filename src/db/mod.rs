//! Database module - SQLite key-value storage for JSON documents

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};

/// Key-value document store backed by a single SQLite table
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Open a throwaway in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS documents (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    /// Read the raw document stored under `key`
    pub fn get_item(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM documents WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Store a document under `key`, replacing any previous value
    pub fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.set_items(&[(key, value.to_string())])
    }

    /// Store several documents in one transaction
    pub fn set_items(&self, items: &[(&str, String)]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        let now = chrono::Utc::now().to_rfc3339();
        for (key, value) in items {
            tx.execute(
                "INSERT INTO documents (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, now],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
impl Database {
    /// All stored keys, sorted
    pub(crate) fn keys(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT key FROM documents ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }

    /// Make every later write fail
    pub(crate) fn set_read_only(&self, read_only: bool) -> Result<()> {
        self.conn.pragma_update(None, "query_only", read_only)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_is_none() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_item("workout-plans").unwrap().is_none());
    }

    #[test]
    fn test_set_and_overwrite() {
        let db = Database::open_in_memory().unwrap();
        db.set_item("k", "[1]").unwrap();
        db.set_item("k", "[2]").unwrap();
        assert_eq!(db.get_item("k").unwrap().as_deref(), Some("[2]"));
        assert_eq!(db.keys().unwrap(), vec!["k".to_string()]);
    }

    #[test]
    fn test_set_items_writes_all() {
        let db = Database::open_in_memory().unwrap();
        db.set_items(&[("a", "1".to_string()), ("b", "2".to_string())])
            .unwrap();
        assert_eq!(db.keys().unwrap(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let db = Database::open_in_memory().unwrap();
        db.set_item("k", "1").unwrap();
        db.set_read_only(true).unwrap();
        assert!(db.set_item("k", "2").is_err());
        assert!(db.set_items(&[("k", "3".to_string())]).is_err());
        assert_eq!(db.get_item("k").unwrap().as_deref(), Some("1"));
    }
}
