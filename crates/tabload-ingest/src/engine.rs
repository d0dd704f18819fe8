//! Chunked ingestion engine
//!
//! Drives one ingestion run through its state machine:
//!
//! ```text
//! START -> DEDUP_CHECK -> SCHEMA_RESOLVE
//!       -> CHUNK_LOOP { VALIDATE -> RESOLVE_KEYS -> STAGE -> MERGE -> COMMIT_PROGRESS }
//!       -> DONE
//! ```
//!
//! with a FAILED terminal reached from any chunk whose retries are
//! exhausted. Chunks are processed strictly sequentially; the store
//! connection is scoped to the run and released on every exit path.

use crate::dataset::{Chunk, TabularDataset};
use crate::encoding;
use crate::keys::SurrogateKeyAssigner;
use crate::ledger::DeduplicationLedger;
use crate::progress::ProgressTracker;
use crate::schema::{SchemaDescriptor, SchemaReconciler};
use crate::store::{quote_ident, Store, MEMORY_STORE};
use encoding_rs::Encoding;
use std::path::PathBuf;
use tabload_common::report::IngestionReport;
use tabload_common::{checksum, Result, SemanticType, TabloadError};
use tracing::{debug, info, warn};

/// Module name used on report entries raised by the engine itself.
const MODULE: &str = "ingestion";

/// Extension marking a source file as belonging to this pipeline stage. The
/// preliminary duplicate-stripping pass emits `<name>.csv.processed`; raw
/// `.csv` files are never ingested directly.
const SOURCE_STAGE_EXTENSION: &str = "processed";

/// Expected extension of a file-based store.
const STORE_EXTENSION: &str = "sqlite3";

/// Name of the run-iteration-scoped staging table. Dropped and recreated for
/// every chunk, so nothing survives between chunks or across crashed runs.
const STAGING_TABLE: &str = "staging_chunk";

/// Configuration for one ingestion run.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Path to the stage-marked delimited source file.
    pub source: PathBuf,
    /// Path to the store file, or `:memory:`.
    pub store_path: PathBuf,
    /// Target table receiving the rows.
    pub table_name: String,
    /// Configured maximum chunk size (see chunk partition arithmetic).
    pub chunk_size: usize,
    /// Natural key columns identifying an entity across files and runs.
    pub natural_key: Vec<String>,
    /// Name of the surrogate id column added to the target table.
    pub surrogate_column: String,
    /// Name of the natural-key registry table.
    pub registry_table: String,
    /// Character encoding every text cell must be representable in.
    pub target_encoding: String,
    /// Columns removed from the dataset before any processing.
    pub drop_columns: Vec<String>,
    /// Attempts per chunk before the run is marked failed.
    pub max_retries: u32,
}

impl IngestConfig {
    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder::default()
    }
}

/// Builder for [`IngestConfig`].
#[derive(Debug, Default)]
pub struct IngestConfigBuilder {
    source: Option<PathBuf>,
    store_path: Option<PathBuf>,
    table_name: Option<String>,
    chunk_size: Option<usize>,
    natural_key: Vec<String>,
    surrogate_column: Option<String>,
    registry_table: Option<String>,
    target_encoding: Option<String>,
    drop_columns: Vec<String>,
    max_retries: Option<u32>,
}

impl IngestConfigBuilder {
    pub fn source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = Some(path.into());
        self
    }

    pub fn table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = Some(name.into());
        self
    }

    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = Some(size);
        self
    }

    pub fn natural_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.natural_key = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn surrogate_column(mut self, name: impl Into<String>) -> Self {
        self.surrogate_column = Some(name.into());
        self
    }

    pub fn registry_table(mut self, name: impl Into<String>) -> Self {
        self.registry_table = Some(name.into());
        self
    }

    pub fn target_encoding(mut self, label: impl Into<String>) -> Self {
        self.target_encoding = Some(label.into());
        self
    }

    pub fn drop_column(mut self, name: impl Into<String>) -> Self {
        self.drop_columns.push(name.into());
        self
    }

    pub fn max_retries(mut self, attempts: u32) -> Self {
        self.max_retries = Some(attempts);
        self
    }

    pub fn build(self) -> Result<IngestConfig> {
        let source = self
            .source
            .ok_or_else(|| TabloadError::Config("source path is required".into()))?;
        let store_path = self
            .store_path
            .ok_or_else(|| TabloadError::Config("store path is required".into()))?;
        let table_name = self
            .table_name
            .ok_or_else(|| TabloadError::Config("table name is required".into()))?;

        if self.natural_key.is_empty() {
            return Err(TabloadError::Config(
                "at least one natural key column is required".into(),
            ));
        }

        let chunk_size = self.chunk_size.unwrap_or(5000);
        if chunk_size == 0 {
            return Err(TabloadError::Config("chunk size must be positive".into()));
        }

        let max_retries = self.max_retries.unwrap_or(3);
        if max_retries == 0 {
            return Err(TabloadError::Config("max retries must be positive".into()));
        }

        let target_encoding = self.target_encoding.unwrap_or_else(|| "utf-8".to_string());
        // fail on unknown labels now, not in the middle of a run
        encoding::resolve(&target_encoding)?;

        Ok(IngestConfig {
            source,
            store_path,
            table_name,
            chunk_size,
            natural_key: self.natural_key,
            surrogate_column: self.surrogate_column.unwrap_or_else(|| "entity_id".to_string()),
            registry_table: self.registry_table.unwrap_or_else(|| "entities".to_string()),
            target_encoding,
            drop_columns: self.drop_columns,
            max_retries,
        })
    }
}

/// Successful terminal outcomes of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every chunk committed; the checkpoint was cleared.
    Completed,
    /// The file content was already registered; no chunk was processed.
    DuplicateImport,
}

/// Outcome of one chunk's validate/resolve/stage/merge unit.
enum ChunkOutcome {
    Merged { inserted: u64, skipped: u64 },
    /// The ledger rejected the file registration mid-merge: another pass
    /// over the same content already registered it. The chunk counts as
    /// committed without reinserting.
    DuplicateRegistration,
}

/// Identity of the file being ingested, registered in the ledger during the
/// first chunk's merge.
struct FileIdentity {
    source: String,
    content_hash: String,
    row_count: u64,
    column_names: Vec<String>,
}

/// Per-run collaborators, built once after DEDUP_CHECK.
struct RunContext<'a> {
    store: &'a Store,
    schema: SchemaDescriptor,
    encoding: &'static Encoding,
    keys: SurrogateKeyAssigner<'a>,
    ledger: DeduplicationLedger<'a>,
    identity: FileIdentity,
}

/// Orchestrator for one ingestion run.
pub struct ChunkIngestionEngine<'r> {
    config: IngestConfig,
    report: &'r mut IngestionReport,
}

impl<'r> ChunkIngestionEngine<'r> {
    pub fn new(config: IngestConfig, report: &'r mut IngestionReport) -> Self {
        Self { config, report }
    }

    /// Execute the run. The report carries counters and the full diagnostic
    /// trail on every exit path, success or failure.
    pub fn run(&mut self) -> Result<RunOutcome> {
        let result = self.run_inner();
        if let Err(ref err) = result {
            // chunk-scoped and validation failures were recorded where they
            // occurred; everything else is recorded here before propagating
            if !matches!(
                err,
                TabloadError::Validation(_)
                    | TabloadError::SchemaMismatch { .. }
                    | TabloadError::Encoding { .. }
                    | TabloadError::ExhaustedRetries { .. }
                    | TabloadError::AlreadyImported
            ) {
                self.report.push_error(MODULE, None, err.to_string(), None);
            }
        }
        self.report.finish();
        result
    }

    fn run_inner(&mut self) -> Result<RunOutcome> {
        info!(
            source = %self.config.source.display(),
            table = %self.config.table_name,
            "Starting ingestion run"
        );

        // START
        self.validate_source()?;
        self.validate_store_path()?;

        // Resume state lives outside the store and is read before the
        // connection opens.
        let tracker = ProgressTracker::for_source(&self.config.source);
        let resuming = tracker.exists();
        let resume_from = tracker.read()?;
        if resuming {
            info!(resume_from, "Checkpoint found; resuming interrupted run");
        }

        let content_hash = checksum::hash_file(&self.config.source)?;
        let store = Store::open(&self.config.store_path)?;
        let ledger = DeduplicationLedger::new(&store);
        ledger.ensure_exists()?;

        // DEDUP_CHECK: an outstanding checkpoint means the registration
        // belongs to this very run's earlier, interrupted pass.
        if ledger.already_imported(&content_hash)? && !resuming {
            info!(hash = %content_hash, "File content already imported; nothing to do");
            self.report.duplicate_import = true;
            tracker.clear()?;
            return Ok(RunOutcome::DuplicateImport);
        }

        // SCHEMA_RESOLVE
        let mut dataset = TabularDataset::from_path(&self.config.source)?;
        dataset.drop_columns(&self.config.drop_columns);

        let reconciler = SchemaReconciler::new(&store);
        let schema = reconciler.derive_schema(&self.config.table_name, &dataset)?;
        debug!(columns = schema.len(), "Expected schema resolved");

        let keys = SurrogateKeyAssigner::new(
            &store,
            &self.config.registry_table,
            self.config.natural_key.clone(),
        );
        keys.ensure_exists()?;

        let ctx = RunContext {
            store: &store,
            schema,
            encoding: encoding::resolve(&self.config.target_encoding)?,
            keys,
            ledger,
            identity: FileIdentity {
                source: self.config.source.display().to_string(),
                content_hash,
                row_count: dataset.row_count() as u64,
                column_names: dataset.headers().to_vec(),
            },
        };

        // CHUNK_LOOP
        let chunks = dataset.partition(self.config.chunk_size);
        self.report.total_chunks = chunks.len();
        self.report.total_rows = dataset.row_count() as u64;

        for chunk in &chunks {
            if chunk.index < resume_from {
                debug!(chunk = chunk.index, "Chunk committed by a previous run; skipping");
                self.report.successful_chunks += 1;
                continue;
            }

            info!(
                chunk = chunk.index + 1,
                total = chunks.len(),
                rows = chunk.len(),
                "Processing chunk"
            );
            self.ingest_chunk(&ctx, chunk)?;

            // COMMIT_PROGRESS, only after the merge fully succeeded
            tracker.write(chunk.index)?;
        }

        // DONE
        tracker.clear()?;
        info!(table = %self.config.table_name, "Ingestion completed");
        Ok(RunOutcome::Completed)
    }

    /// Run one chunk through validate/resolve/stage/merge, retrying the
    /// whole unit on transient failures.
    fn ingest_chunk(&mut self, ctx: &RunContext<'_>, chunk: &Chunk<'_>) -> Result<()> {
        let max_retries = self.config.max_retries;
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.process_chunk(ctx, chunk) {
                Ok(ChunkOutcome::Merged { inserted, skipped }) => {
                    self.report.inserted_rows += inserted;
                    self.report.skipped_rows += skipped;
                    self.report.successful_chunks += 1;
                    return Ok(());
                },
                Ok(ChunkOutcome::DuplicateRegistration) => {
                    info!(
                        chunk = chunk.index + 1,
                        "File registered by an earlier pass; chunk counted as committed"
                    );
                    self.report.skipped_rows += chunk.len() as u64;
                    self.report.successful_chunks += 1;
                    return Ok(());
                },
                Err(err) if err.is_transient() => {
                    warn!(
                        chunk = chunk.index + 1,
                        attempt,
                        error = %err,
                        "Chunk attempt failed"
                    );
                    if attempt >= max_retries {
                        self.report.push_error(
                            MODULE,
                            Some(chunk.index),
                            format!(
                                "Failed to insert chunk {} after {} attempts: {err}",
                                chunk.index + 1,
                                max_retries
                            ),
                            None,
                        );
                        self.report.failed_chunks += 1;
                        return Err(TabloadError::ExhaustedRetries {
                            chunk_index: chunk.index,
                            attempts: max_retries,
                        });
                    }
                    // immediate, stateless retry: the next attempt redoes
                    // validation, key resolution, staging, and merge
                },
                Err(err) => {
                    if !matches!(
                        err,
                        TabloadError::SchemaMismatch { .. } | TabloadError::Encoding { .. }
                    ) {
                        self.report.push_error(
                            MODULE,
                            Some(chunk.index),
                            err.to_string(),
                            chunk.row_sample(),
                        );
                    }
                    self.report.failed_chunks += 1;
                    return Err(err);
                },
            }
        }
    }

    fn process_chunk(&mut self, ctx: &RunContext<'_>, chunk: &Chunk<'_>) -> Result<ChunkOutcome> {
        // VALIDATE
        SchemaReconciler::new(ctx.store).validate(chunk, &ctx.schema, self.report)?;
        encoding::validate_chunk(chunk, &ctx.schema, ctx.encoding, self.report)?;

        // RESOLVE_KEYS
        ctx.keys.resolve(chunk)?;

        // STAGE
        self.stage_chunk(ctx, chunk)?;

        // MERGE
        self.merge_chunk(ctx, chunk)
    }

    /// Materialize the chunk into the staging table and attach surrogate
    /// ids via a lookup join on the natural key.
    fn stage_chunk(&self, ctx: &RunContext<'_>, chunk: &Chunk<'_>) -> Result<()> {
        let conn = ctx.store.conn();

        conn.execute(&format!("DROP TABLE IF EXISTS {STAGING_TABLE}"), [])?;

        let column_defs: Vec<String> = chunk
            .headers()
            .iter()
            .map(|col| {
                let ty = ctx.schema.get(col).unwrap_or(SemanticType::Text);
                format!("{} {}", quote_ident(col), ty.decl_sql())
            })
            .collect();
        conn.execute(
            &format!("CREATE TABLE {STAGING_TABLE} ({})", column_defs.join(", ")),
            [],
        )?;

        let column_list: Vec<String> =
            chunk.headers().iter().map(|c| quote_ident(c)).collect();
        let placeholders: Vec<String> =
            (1..=chunk.headers().len()).map(|i| format!("?{i}")).collect();
        let insert_sql = format!(
            "INSERT INTO {STAGING_TABLE} ({}) VALUES ({})",
            column_list.join(", "),
            placeholders.join(", "),
        );

        let mut stmt = conn.prepare(&insert_sql)?;
        for row in chunk.rows() {
            let values = row
                .iter()
                .map(|v| if v.is_empty() { None } else { Some(v.as_str()) });
            stmt.execute(rusqlite::params_from_iter(values))?;
        }

        let surrogate = quote_ident(&self.config.surrogate_column);
        conn.execute(
            &format!("ALTER TABLE {STAGING_TABLE} ADD COLUMN {surrogate} BIGINT"),
            [],
        )?;

        let conditions: Vec<String> = ctx
            .keys
            .key_columns()
            .iter()
            .map(|col| {
                let q = quote_ident(col);
                format!("r.{q} = {STAGING_TABLE}.{q}")
            })
            .collect();
        conn.execute(
            &format!(
                "UPDATE {STAGING_TABLE} SET {surrogate} = (SELECT r.id FROM {} r WHERE {})",
                quote_ident(ctx.keys.registry_table()),
                conditions.join(" AND "),
            ),
            [],
        )?;

        Ok(())
    }

    /// Create the target table on first contact, register the file identity
    /// on chunk 0, and move staged rows into the target.
    ///
    /// The whole step runs in one store transaction: a failed insert also
    /// rolls back the registration, so a later attempt (or a resumed run)
    /// never mistakes this attempt's registration for a completed import.
    fn merge_chunk(&self, ctx: &RunContext<'_>, chunk: &Chunk<'_>) -> Result<ChunkOutcome> {
        let conn = ctx.store.conn();
        let target = quote_ident(&self.config.table_name);

        let tx = conn.unchecked_transaction()?;

        if !ctx.store.table_exists(&self.config.table_name)? {
            // schema-defining step: staging structure, zero rows, surrogate
            // id declared primary key. Happens exactly once per table.
            let mut defs: Vec<String> = ctx
                .store
                .table_columns(STAGING_TABLE)?
                .into_iter()
                .map(|(name, decl)| {
                    if name == self.config.surrogate_column {
                        format!("{} BIGINT NOT NULL", quote_ident(&name))
                    } else {
                        format!("{} {}", quote_ident(&name), decl)
                    }
                })
                .collect();
            defs.push(format!(
                "PRIMARY KEY ({})",
                quote_ident(&self.config.surrogate_column)
            ));

            conn.execute(&format!("CREATE TABLE {target} ({})", defs.join(", ")), [])?;
            info!(table = %self.config.table_name, "Target table created");
        }

        if chunk.index == 0 {
            match ctx.ledger.register(
                &ctx.identity.source,
                &ctx.identity.content_hash,
                ctx.identity.row_count,
                &ctx.identity.column_names,
            ) {
                Ok(()) => {},
                Err(TabloadError::AlreadyImported) => {
                    // a crashed pass over the same content got its merge
                    // committed; dropping the transaction discards this
                    // attempt's work and the chunk counts as committed
                    drop(tx);
                    conn.execute(&format!("DROP TABLE IF EXISTS {STAGING_TABLE}"), [])?;
                    return Ok(ChunkOutcome::DuplicateRegistration);
                },
                Err(err) => return Err(err),
            }
        }

        let column_list: Vec<String> = ctx
            .store
            .table_columns(STAGING_TABLE)?
            .into_iter()
            .map(|(name, _)| quote_ident(&name))
            .collect();
        let column_list = column_list.join(", ");

        // Tolerating surrogate-key conflicts makes re-execution of the
        // checkpoint-boundary chunk after a crash a no-op instead of a
        // constraint failure.
        let inserted = conn.execute(
            &format!(
                "INSERT OR IGNORE INTO {target} ({column_list}) \
                 SELECT {column_list} FROM {STAGING_TABLE}"
            ),
            [],
        )? as u64;
        let skipped = chunk.len() as u64 - inserted;

        conn.execute(&format!("DROP TABLE {STAGING_TABLE}"), [])?;
        tx.commit()?;

        debug!(chunk = chunk.index, inserted, skipped, "Chunk merged");
        Ok(ChunkOutcome::Merged { inserted, skipped })
    }

    fn validate_source(&mut self) -> Result<()> {
        let source = self.config.source.clone();

        if !source.exists() {
            return Err(self.start_failure(format!("File {} not found", source.display())));
        }

        let stage_marked = source
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e == SOURCE_STAGE_EXTENSION)
            .unwrap_or(false);
        if !stage_marked {
            return Err(self.start_failure(format!(
                "File {} is not a processed dataset (expected a .{SOURCE_STAGE_EXTENSION} file)",
                source.display()
            )));
        }

        if std::fs::metadata(&source)?.len() == 0 {
            return Err(self.start_failure(format!(
                "File {} is an empty file",
                source.display()
            )));
        }

        Ok(())
    }

    fn validate_store_path(&mut self) -> Result<()> {
        let store_path = self.config.store_path.clone();
        if store_path.as_os_str() == MEMORY_STORE {
            return Ok(());
        }

        let store_marked = store_path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e == STORE_EXTENSION)
            .unwrap_or(false);
        if !store_marked {
            return Err(self.start_failure(format!(
                "Store file {} is not a .{STORE_EXTENSION} store",
                store_path.display()
            )));
        }

        Ok(())
    }

    /// Record a pre-chunk validation failure and turn it into the error that
    /// aborts the run before any chunk work.
    fn start_failure(&mut self, message: String) -> TabloadError {
        self.report.push_error(MODULE, None, message.clone(), None);
        TabloadError::Validation(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder_defaults() {
        let config = IngestConfig::builder()
            .source("data/stats.csv.processed")
            .store_path("data/stats.sqlite3")
            .table_name("stats")
            .natural_key(["player_name", "club"])
            .build()
            .unwrap();

        assert_eq!(config.chunk_size, 5000);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.target_encoding, "utf-8");
        assert_eq!(config.surrogate_column, "entity_id");
        assert_eq!(config.registry_table, "entities");
        assert!(config.drop_columns.is_empty());
    }

    #[test]
    fn test_config_builder_requires_core_fields() {
        let err = IngestConfig::builder()
            .store_path("x.sqlite3")
            .table_name("t")
            .natural_key(["k"])
            .build()
            .unwrap_err();
        assert!(matches!(err, TabloadError::Config(_)));

        let err = IngestConfig::builder()
            .source("x.csv.processed")
            .store_path("x.sqlite3")
            .table_name("t")
            .build()
            .unwrap_err();
        assert!(matches!(err, TabloadError::Config(_)));
    }

    #[test]
    fn test_config_builder_rejects_degenerate_values() {
        let base = || {
            IngestConfig::builder()
                .source("x.csv.processed")
                .store_path("x.sqlite3")
                .table_name("t")
                .natural_key(["k"])
        };

        assert!(base().chunk_size(0).build().is_err());
        assert!(base().max_retries(0).build().is_err());
        assert!(base().target_encoding("not-an-encoding").build().is_err());
        assert!(base().build().is_ok());
    }

    #[test]
    fn test_start_validation_records_report_errors() {
        let config = IngestConfig::builder()
            .source("/nonexistent/file.csv.processed")
            .store_path(MEMORY_STORE)
            .table_name("t")
            .natural_key(["k"])
            .build()
            .unwrap();

        let mut report = IngestionReport::new("/nonexistent/file.csv.processed", "t");
        let err = ChunkIngestionEngine::new(config, &mut report).run().unwrap_err();

        assert!(matches!(err, TabloadError::Validation(_)));
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].module, MODULE);
        assert_eq!(report.errors[0].chunk_index, None);
        assert!(report.finished_at.is_some());
    }

    #[test]
    fn test_store_extension_is_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("data.csv.processed");
        std::fs::write(&source, "a,b\n1,2\n").unwrap();

        let config = IngestConfig::builder()
            .source(&source)
            .store_path(dir.path().join("store.db"))
            .table_name("t")
            .natural_key(["a"])
            .build()
            .unwrap();

        let mut report = IngestionReport::new(source.display().to_string(), "t");
        let err = ChunkIngestionEngine::new(config, &mut report).run().unwrap_err();
        assert!(matches!(err, TabloadError::Validation(_)));
        assert!(report.errors[0].message.contains("sqlite3"));
    }
}
