//! Embedded relational store access
//!
//! Thin wrapper over a [`rusqlite::Connection`] exposing the catalog
//! operations the ingestion engine needs. The connection is scoped to one
//! run: opened at run start, released on every exit path when the [`Store`]
//! drops.

use rusqlite::Connection;
use std::path::Path;
use tabload_common::Result;

/// Path sentinel for an in-memory store.
pub const MEMORY_STORE: &str = ":memory:";

/// One run-scoped store connection.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (creating if necessary) the store at `path`. The `:memory:`
    /// sentinel opens a private in-memory store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = if path.as_os_str() == MEMORY_STORE {
            Connection::open_in_memory()?
        } else {
            Connection::open(path)?
        };
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Catalog check: does `table` exist?
    pub fn table_exists(&self, table: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Catalog introspection: column names and declared types of `table`,
    /// in definition order.
    pub fn table_columns(&self, table: &str) -> Result<Vec<(String, String)>> {
        let sql = format!("PRAGMA table_info({})", quote_ident(table));
        let mut stmt = self.conn.prepare(&sql)?;
        let columns = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(columns)
    }

    /// Row-count aggregation over `table`.
    pub fn count_rows(&self, table: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

/// Quote an identifier for interpolation into DDL. Table and column names
/// come from configuration and CSV headers, never from row data.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
