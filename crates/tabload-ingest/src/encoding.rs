//! Target-encoding validation
//!
//! Before a chunk is staged, every cell destined for a text column must be
//! representable in the character encoding the target store is configured
//! for. The first unrepresentable cell rejects the chunk wholesale; no
//! partial insert of the remaining rows happens.

use crate::dataset::Chunk;
use crate::schema::SchemaDescriptor;
use encoding_rs::Encoding;
use tabload_common::report::IngestionReport;
use tabload_common::{Result, SemanticType, TabloadError};

/// Resolve an encoding label ("utf-8", "windows-1252", ...) to an encoding.
pub fn resolve(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.as_bytes())
        .ok_or_else(|| TabloadError::Config(format!("Unknown target encoding: {label}")))
}

/// Check that every text cell in the chunk is representable in `encoding`.
///
/// Cells under columns the expected schema types as text are checked, as are
/// cells under columns the schema does not know (they stage as text).
/// Numeric, boolean, and datetime cells are always representable and are
/// skipped. On the first unrepresentable cell an error entry with the
/// offending row sample is appended to the report and the chunk fails with
/// [`TabloadError::Encoding`].
pub fn validate_chunk(
    chunk: &Chunk<'_>,
    expected: &SchemaDescriptor,
    encoding: &'static Encoding,
    report: &mut IngestionReport,
) -> Result<()> {
    for (col_idx, column) in chunk.headers().iter().enumerate() {
        match expected.get(column) {
            Some(SemanticType::Text) | None => {},
            Some(_) => continue,
        }

        for (row_idx, row) in chunk.rows().iter().enumerate() {
            let value = &row[col_idx];
            if value.is_empty() {
                continue;
            }
            let (_, _, had_errors) = encoding.encode(value);
            if had_errors {
                report.push_error(
                    "encoding",
                    Some(chunk.index),
                    format!(
                        "Value '{value}' in column '{column}' cannot be encoded as {}",
                        encoding.name()
                    ),
                    chunk.rows().get(row_idx).map(|r| chunk.row_to_json(r)),
                );
                return Err(TabloadError::Encoding {
                    column: column.clone(),
                    encoding: encoding.name().to_string(),
                });
            }
        }
    }
    Ok(())
}
