//! tabload - resumable bulk loader for delimited datasets

use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use tabload_common::logging::{init_logging, LogConfig, LogLevel};
use tabload_common::report::IngestionReport;
use tabload_common::{checksum, TabloadError};
use tabload_ingest::ledger::LEDGER_TABLE;
use tabload_ingest::store::MEMORY_STORE;
use tabload_ingest::{
    ChunkIngestionEngine, DeduplicationLedger, IngestConfig, ProgressTracker, RunOutcome, Store,
};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "tabload")]
#[command(author, version, about = "Resumable bulk loader for delimited datasets")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Command {
    /// Ingest a processed dataset into the store
    Load {
        /// Path to the stage-marked source file (.processed)
        #[arg(short, long)]
        source: PathBuf,

        /// Path to the store file (.sqlite3), or :memory:
        #[arg(long)]
        store: PathBuf,

        /// Target table name (defaults to the source file name stem)
        #[arg(short, long)]
        table: Option<String>,

        /// Natural key column; repeat for multi-field keys
        #[arg(short = 'k', long = "key", required = true)]
        keys: Vec<String>,

        /// Maximum rows per chunk
        #[arg(long, default_value_t = 5000)]
        chunk_size: usize,

        /// Name of the surrogate id column on the target table
        #[arg(long, default_value = "entity_id")]
        surrogate_column: String,

        /// Name of the natural-key registry table
        #[arg(long, default_value = "entities")]
        registry: String,

        /// Target character encoding text cells must be representable in
        #[arg(long, default_value = "utf-8")]
        encoding: String,

        /// Column to remove before ingestion; repeatable
        #[arg(long = "drop-column")]
        drop_columns: Vec<String>,
    },

    /// Show checkpoint and ledger state for a source file
    Status {
        /// Path to the source file
        #[arg(short, long)]
        source: PathBuf,

        /// Path to the store file (.sqlite3)
        #[arg(long)]
        store: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("tabload")
        .build();
    init_logging(&log_config)?;

    match cli.command {
        Command::Load {
            source,
            store,
            table,
            keys,
            chunk_size,
            surrogate_column,
            registry,
            encoding,
            drop_columns,
        } => run_load(LoadArgs {
            source,
            store,
            table,
            keys,
            chunk_size,
            surrogate_column,
            registry,
            encoding,
            drop_columns,
        }),
        Command::Status { source, store } => run_status(&source, &store),
    }
}

struct LoadArgs {
    source: PathBuf,
    store: PathBuf,
    table: Option<String>,
    keys: Vec<String>,
    chunk_size: usize,
    surrogate_column: String,
    registry: String,
    encoding: String,
    drop_columns: Vec<String>,
}

fn run_load(args: LoadArgs) -> Result<()> {
    let table = match args.table {
        Some(table) => table,
        None => default_table_name(&args.source)?,
    };

    let mut builder = IngestConfig::builder()
        .source(&args.source)
        .store_path(&args.store)
        .table_name(&table)
        .chunk_size(args.chunk_size)
        .natural_key(args.keys)
        .surrogate_column(args.surrogate_column)
        .registry_table(args.registry)
        .target_encoding(args.encoding);
    for column in args.drop_columns {
        builder = builder.drop_column(column);
    }
    let config = builder.build()?;

    let mut report = IngestionReport::new(args.source.display().to_string(), table);
    let outcome = ChunkIngestionEngine::new(config, &mut report).run();
    report.log_summary();

    match outcome {
        Ok(RunOutcome::Completed) => {
            info!(rows = report.inserted_rows, "Load finished");
            Ok(())
        },
        Ok(RunOutcome::DuplicateImport) => {
            info!("Load skipped: file content already imported");
            Ok(())
        },
        Err(err) => {
            error!(error = %err, "Load failed");
            Err(err.into())
        },
    }
}

fn run_status(source: &Path, store_path: &Path) -> Result<()> {
    let tracker = ProgressTracker::for_source(source);
    if tracker.exists() {
        println!("checkpoint: chunk {} committed", tracker.read()?);
    } else {
        println!("checkpoint: none");
    }

    let hash = checksum::hash_file(source)?;
    println!("content hash: {hash}");

    if store_path.as_os_str() != MEMORY_STORE && !store_path.exists() {
        println!("imported: no (store {} does not exist)", store_path.display());
        return Ok(());
    }

    let store = Store::open(store_path)?;
    let imported = store.table_exists(LEDGER_TABLE)?
        && DeduplicationLedger::new(&store).already_imported(&hash)?;
    println!("imported: {}", if imported { "yes" } else { "no" });

    Ok(())
}

/// Table name derived from the source file name, up to its first dot:
/// `key_stats.csv.processed` loads into `key_stats`.
fn default_table_name(source: &Path) -> Result<String> {
    let name = source
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.split('.').next())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| {
            TabloadError::Config(format!(
                "Cannot derive a table name from {}",
                source.display()
            ))
        })?;
    Ok(name.to_string())
}
