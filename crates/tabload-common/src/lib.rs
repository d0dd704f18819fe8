//! Tabload Common Library
//!
//! Shared types, utilities, and error handling for the tabload workspace.
//!
//! # Overview
//!
//! This crate provides common functionality used across all tabload members:
//!
//! - **Error Handling**: the [`TabloadError`] taxonomy and [`Result`] alias
//! - **Checksums**: streaming file digests for import deduplication
//! - **Logging**: process-wide tracing initialization
//! - **Reporting**: the [`report::IngestionReport`] consumed by ingestion runs
//! - **Types**: the semantic column-type vocabulary shared by schema
//!   inference, catalog introspection, and DDL generation

pub mod checksum;
pub mod error;
pub mod logging;
pub mod report;
pub mod types;

// Re-export commonly used types
pub use error::{Result, TabloadError};
pub use types::SemanticType;
