//! Surrogate-key assignment
//!
//! Maps natural (multi-field) keys to stable surrogate integer ids. Ids are
//! drawn from a single monotonically increasing counter that survives
//! restarts; a mapping, once made, is never overwritten, so the same natural
//! key resolves to the same id in every chunk and every run.

use crate::dataset::Chunk;
use crate::store::{quote_ident, Store};
use rusqlite::OptionalExtension;
use tabload_common::{Result, TabloadError};
use tracing::debug;

/// Insert-if-absent registry of natural keys.
pub struct SurrogateKeyAssigner<'c> {
    store: &'c Store,
    registry_table: String,
    key_columns: Vec<String>,
}

impl<'c> SurrogateKeyAssigner<'c> {
    pub fn new(
        store: &'c Store,
        registry_table: impl Into<String>,
        key_columns: Vec<String>,
    ) -> Self {
        Self {
            store,
            registry_table: registry_table.into(),
            key_columns,
        }
    }

    pub fn registry_table(&self) -> &str {
        &self.registry_table
    }

    pub fn key_columns(&self) -> &[String] {
        &self.key_columns
    }

    /// Idempotent bootstrap of the registry table. AUTOINCREMENT keeps the
    /// id counter monotonic across restarts and never reuses a value, even
    /// after deletes.
    pub fn ensure_exists(&self) -> Result<()> {
        let key_defs: Vec<String> = self
            .key_columns
            .iter()
            .map(|col| format!("{} TEXT", quote_ident(col)))
            .collect();
        let unique_cols: Vec<String> =
            self.key_columns.iter().map(|col| quote_ident(col)).collect();

        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (\
             id INTEGER PRIMARY KEY AUTOINCREMENT, {}, UNIQUE({}))",
            quote_ident(&self.registry_table),
            key_defs.join(", "),
            unique_cols.join(", "),
        );
        self.store.conn().execute(&sql, [])?;
        Ok(())
    }

    /// Ensure a surrogate id exists for every row's natural key.
    ///
    /// Existing mappings are never touched; unseen key tuples get the next
    /// id from the shared counter. The chunk must carry every natural key
    /// column.
    pub fn resolve(&self, chunk: &Chunk<'_>) -> Result<()> {
        let key_indexes: Vec<usize> = self
            .key_columns
            .iter()
            .map(|col| {
                chunk
                    .headers()
                    .iter()
                    .position(|h| h == col)
                    .ok_or_else(|| {
                        TabloadError::Validation(format!(
                            "Natural key column '{col}' is missing from the dataset"
                        ))
                    })
            })
            .collect::<Result<_>>()?;

        let placeholders: Vec<String> =
            (1..=self.key_columns.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT OR IGNORE INTO {} ({}) VALUES ({})",
            quote_ident(&self.registry_table),
            self.key_columns
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", "),
            placeholders.join(", "),
        );

        let mut stmt = self.store.conn().prepare(&sql)?;
        let mut created = 0usize;
        for row in chunk.rows() {
            let key: Vec<&str> = key_indexes.iter().map(|&i| row[i].as_str()).collect();
            // a row with an empty key cell is unidentifiable; it gets no
            // registry entry and falls out at merge time
            if key.iter().any(|v| v.is_empty()) {
                continue;
            }
            created += stmt.execute(rusqlite::params_from_iter(key))?;
        }

        debug!(
            chunk = chunk.index,
            registry = %self.registry_table,
            created,
            "Surrogate keys resolved"
        );
        Ok(())
    }

    /// Look up the surrogate id for one natural key tuple.
    pub fn lookup(&self, key: &[&str]) -> Result<Option<i64>> {
        let conditions: Vec<String> = self
            .key_columns
            .iter()
            .enumerate()
            .map(|(i, col)| format!("{} = ?{}", quote_ident(col), i + 1))
            .collect();
        let sql = format!(
            "SELECT id FROM {} WHERE {}",
            quote_ident(&self.registry_table),
            conditions.join(" AND "),
        );
        let id = self
            .store
            .conn()
            .query_row(&sql, rusqlite::params_from_iter(key), |row| row.get(0))
            .optional()?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::TabularDataset;
    use crate::store::MEMORY_STORE;

    fn players(rows: &[&[&str]]) -> TabularDataset {
        TabularDataset::from_parts(
            vec!["player_name".into(), "club".into(), "goals".into()],
            rows.iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
    }

    fn assigner(store: &Store) -> SurrogateKeyAssigner<'_> {
        SurrogateKeyAssigner::new(
            store,
            "players",
            vec!["player_name".to_string(), "club".to_string()],
        )
    }

    #[test]
    fn test_assigns_one_id_per_distinct_key() {
        let store = Store::open(MEMORY_STORE).unwrap();
        let keys = assigner(&store);
        keys.ensure_exists().unwrap();

        let ds = players(&[
            &["arjen", "fcb", "10"],
            &["kevin", "mci", "8"],
            &["arjen", "fcb", "12"],
        ]);
        let chunks = ds.partition(100);
        keys.resolve(&chunks[0]).unwrap();

        assert_eq!(store.count_rows("players").unwrap(), 2);
        let arjen = keys.lookup(&["arjen", "fcb"]).unwrap().unwrap();
        let kevin = keys.lookup(&["kevin", "mci"]).unwrap().unwrap();
        assert_ne!(arjen, kevin);
    }

    #[test]
    fn test_existing_mapping_is_stable_across_chunks() {
        let store = Store::open(MEMORY_STORE).unwrap();
        let keys = assigner(&store);
        keys.ensure_exists().unwrap();

        let first = players(&[&["arjen", "fcb", "10"]]);
        keys.resolve(&first.partition(100)[0]).unwrap();
        let id_before = keys.lookup(&["arjen", "fcb"]).unwrap().unwrap();

        // same key again, plus a new one
        let second = players(&[&["arjen", "fcb", "99"], &["mo", "liv", "30"]]);
        keys.resolve(&second.partition(100)[0]).unwrap();

        let id_after = keys.lookup(&["arjen", "fcb"]).unwrap().unwrap();
        assert_eq!(id_before, id_after);
        assert!(keys.lookup(&["mo", "liv"]).unwrap().unwrap() > id_after);
    }

    #[test]
    fn test_same_name_different_club_gets_distinct_ids() {
        let store = Store::open(MEMORY_STORE).unwrap();
        let keys = assigner(&store);
        keys.ensure_exists().unwrap();

        let ds = players(&[&["silva", "mci", "5"], &["silva", "rma", "7"]]);
        keys.resolve(&ds.partition(100)[0]).unwrap();

        let a = keys.lookup(&["silva", "mci"]).unwrap().unwrap();
        let b = keys.lookup(&["silva", "rma"]).unwrap().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_missing_key_column_fails_resolution() {
        let store = Store::open(MEMORY_STORE).unwrap();
        let keys = assigner(&store);
        keys.ensure_exists().unwrap();

        let ds = TabularDataset::from_parts(
            vec!["player_name".into(), "goals".into()],
            vec![vec!["arjen".into(), "10".into()]],
        );
        let err = keys.resolve(&ds.partition(100)[0]).unwrap_err();
        assert!(matches!(err, TabloadError::Validation(_)));
    }
}
