//! Tabload Ingest Library
//!
//! Chunked, resumable ingestion of delimited tabular datasets into an
//! embedded relational store.
//!
//! The engine guarantees that a byte-identical source file is never ingested
//! twice, that interrupted runs resume from their last committed chunk, that
//! incoming data is schema- and encoding-validated before it reaches the
//! store, and that natural-key entities receive stable surrogate ids
//! reusable across files and runs.
//!
//! # Example
//!
//! ```no_run
//! use tabload_common::report::IngestionReport;
//! use tabload_ingest::{ChunkIngestionEngine, IngestConfig};
//!
//! fn main() -> tabload_common::Result<()> {
//!     let config = IngestConfig::builder()
//!         .source("./data/key_stats.csv.processed")
//!         .store_path("./data/stats.sqlite3")
//!         .table_name("key_stats")
//!         .natural_key(["player_name", "club"])
//!         .chunk_size(5000)
//!         .build()?;
//!
//!     let mut report = IngestionReport::new(
//!         "./data/key_stats.csv.processed",
//!         "key_stats",
//!     );
//!     let outcome = ChunkIngestionEngine::new(config, &mut report).run()?;
//!     report.log_summary();
//!     println!("{outcome:?}");
//!     Ok(())
//! }
//! ```

pub mod dataset;
pub mod encoding;
pub mod engine;
pub mod keys;
pub mod ledger;
pub mod progress;
pub mod schema;
pub mod store;

pub use dataset::{Chunk, TabularDataset};
pub use engine::{ChunkIngestionEngine, IngestConfig, RunOutcome};
pub use keys::SurrogateKeyAssigner;
pub use ledger::DeduplicationLedger;
pub use progress::ProgressTracker;
pub use schema::{SchemaDescriptor, SchemaReconciler};
pub use store::Store;
