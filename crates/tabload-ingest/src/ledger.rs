//! Content-hash deduplication ledger
//!
//! Guarantees a byte-identical file is ingested at most once for the
//! lifetime of the store. The check has two layers: the `already_imported`
//! pre-check short-circuits the common case, and the UNIQUE constraint on
//! `content_hash` is the authoritative guard at write time, independent of
//! the pre-check.

use crate::store::Store;
use chrono::Utc;
use rusqlite::params;
use tabload_common::{Result, TabloadError};
use tracing::debug;

/// Name of the ledger table inside the target store.
pub const LEDGER_TABLE: &str = "import_ledger";

/// Append-only registry of imported file contents.
pub struct DeduplicationLedger<'c> {
    store: &'c Store,
}

impl<'c> DeduplicationLedger<'c> {
    pub fn new(store: &'c Store) -> Self {
        Self { store }
    }

    /// Idempotent bootstrap of the ledger table.
    pub fn ensure_exists(&self) -> Result<()> {
        self.store.conn().execute(
            r#"
            CREATE TABLE IF NOT EXISTS import_ledger (
                source_file TEXT NOT NULL,
                content_hash TEXT NOT NULL UNIQUE,
                imported_at TIMESTAMP NOT NULL,
                row_count BIGINT NOT NULL,
                column_names TEXT NOT NULL
            )
            "#,
            [],
        )?;
        Ok(())
    }

    /// Has this content hash been registered before? Performed once per
    /// file, before any chunk work begins.
    pub fn already_imported(&self, content_hash: &str) -> Result<bool> {
        let count: i64 = self.store.conn().query_row(
            "SELECT COUNT(*) FROM import_ledger WHERE content_hash = ?1",
            [content_hash],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Insert a new ledger record. Fails with
    /// [`TabloadError::AlreadyImported`] if the hash is already present.
    pub fn register(
        &self,
        source_file: &str,
        content_hash: &str,
        row_count: u64,
        column_names: &[String],
    ) -> Result<()> {
        let columns_json = serde_json::to_string(column_names)?;
        let result = self.store.conn().execute(
            r#"
            INSERT INTO import_ledger (
                source_file, content_hash, imported_at, row_count, column_names
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                source_file,
                content_hash,
                Utc::now().to_rfc3339(),
                row_count as i64,
                columns_json,
            ],
        );

        match result {
            Ok(_) => {
                debug!(source = source_file, hash = content_hash, "Ledger record registered");
                Ok(())
            },
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(TabloadError::AlreadyImported)
            },
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MEMORY_STORE;

    fn columns() -> Vec<String> {
        vec!["name".to_string(), "club".to_string()]
    }

    #[test]
    fn test_bootstrap_is_idempotent() {
        let store = Store::open(MEMORY_STORE).unwrap();
        let ledger = DeduplicationLedger::new(&store);
        ledger.ensure_exists().unwrap();
        ledger.ensure_exists().unwrap();
        assert!(store.table_exists(LEDGER_TABLE).unwrap());
    }

    #[test]
    fn test_register_and_precheck() {
        let store = Store::open(MEMORY_STORE).unwrap();
        let ledger = DeduplicationLedger::new(&store);
        ledger.ensure_exists().unwrap();

        assert!(!ledger.already_imported("abc123").unwrap());
        ledger
            .register("stats.csv.processed", "abc123", 100, &columns())
            .unwrap();
        assert!(ledger.already_imported("abc123").unwrap());
    }

    #[test]
    fn test_duplicate_hash_is_rejected_at_write_time() {
        let store = Store::open(MEMORY_STORE).unwrap();
        let ledger = DeduplicationLedger::new(&store);
        ledger.ensure_exists().unwrap();

        ledger
            .register("first.csv.processed", "samehash", 10, &columns())
            .unwrap();
        // same content under a different name still violates the constraint
        let err = ledger
            .register("second.csv.processed", "samehash", 10, &columns())
            .unwrap_err();
        assert!(matches!(err, TabloadError::AlreadyImported));
    }

    #[test]
    fn test_distinct_hashes_coexist() {
        let store = Store::open(MEMORY_STORE).unwrap();
        let ledger = DeduplicationLedger::new(&store);
        ledger.ensure_exists().unwrap();

        ledger.register("a.csv.processed", "hash-a", 1, &columns()).unwrap();
        ledger.register("b.csv.processed", "hash-b", 2, &columns()).unwrap();
        assert_eq!(store.count_rows(LEDGER_TABLE).unwrap(), 2);
    }
}
