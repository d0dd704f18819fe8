//! Schema derivation and chunk validation
//!
//! The expected schema comes from the target table when it already exists
//! (declared types mapped into the semantic vocabulary) and is inferred from
//! the dataset itself on first load. Chunks are validated against it by
//! semantic category only; declared widths and precisions never matter.

use crate::dataset::{Chunk, TabularDataset};
use crate::store::Store;
use chrono::{NaiveDate, NaiveDateTime};
use tabload_common::report::IngestionReport;
use tabload_common::{Result, SemanticType, TabloadError};
use tracing::debug;

/// Ordered column name → semantic type mapping for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDescriptor {
    columns: Vec<(String, SemanticType)>,
}

impl SchemaDescriptor {
    pub fn insert(&mut self, name: impl Into<String>, ty: SemanticType) {
        self.columns.push((name.into(), ty));
    }

    pub fn get(&self, name: &str) -> Option<SemanticType> {
        self.columns
            .iter()
            .find(|(col, _)| col == name)
            .map(|(_, ty)| *ty)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, SemanticType)> {
        self.columns.iter().map(|(name, ty)| (name.as_str(), *ty))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Derives the expected schema and flags incompatible chunks.
pub struct SchemaReconciler<'c> {
    store: &'c Store,
}

impl<'c> SchemaReconciler<'c> {
    pub fn new(store: &'c Store) -> Self {
        Self { store }
    }

    /// Produce the expected schema for `table`: read it from the catalog if
    /// the table exists, otherwise infer it from the dataset.
    pub fn derive_schema(
        &self,
        table: &str,
        dataset: &TabularDataset,
    ) -> Result<SchemaDescriptor> {
        if self.store.table_exists(table)? {
            let schema = self.schema_from_table(table)?;
            debug!(table, columns = schema.len(), "Schema read from existing table");
            Ok(schema)
        } else {
            let schema = infer_schema(dataset);
            debug!(table, columns = schema.len(), "Schema inferred from dataset");
            Ok(schema)
        }
    }

    fn schema_from_table(&self, table: &str) -> Result<SchemaDescriptor> {
        let mut schema = SchemaDescriptor::default();
        for (name, decl) in self.store.table_columns(table)? {
            schema.insert(name, SemanticType::from_decl(&decl));
        }
        Ok(schema)
    }

    /// Validate one chunk against the expected schema.
    ///
    /// Every column present in both the chunk and the schema must agree on
    /// semantic category. The first disagreement appends an error entry with
    /// an offending row sample to the report and fails with
    /// [`TabloadError::SchemaMismatch`]. Columns present only in the chunk
    /// are passed through unchecked and surfaced as schema warnings.
    pub fn validate(
        &self,
        chunk: &Chunk<'_>,
        expected: &SchemaDescriptor,
        report: &mut IngestionReport,
    ) -> Result<()> {
        for column in chunk.headers() {
            let Some(expected_ty) = expected.get(column) else {
                let warning = format!(
                    "Column '{column}' is not part of the expected schema and is passed through unchecked"
                );
                if !report.schema_warnings.contains(&warning) {
                    report.schema_warnings.push(warning);
                }
                continue;
            };

            let values = chunk
                .column_values(column)
                .unwrap_or_else(|| unreachable!("header columns always resolve"));
            let observed = infer_column_type(values);

            if !category_compatible(observed, expected_ty) {
                let sample = offending_row_sample(chunk, column, expected_ty);
                report.push_error(
                    "schema",
                    Some(chunk.index),
                    format!(
                        "The data type of column '{column}' in the chunk does not match \
                         the expected type. Expected: {expected_ty}, Obtained: {observed}"
                    ),
                    sample,
                );
                return Err(TabloadError::SchemaMismatch {
                    column: column.clone(),
                    expected: expected_ty,
                    actual: observed,
                });
            }
        }
        Ok(())
    }
}

/// Infer a full schema from the dataset, column by column.
pub fn infer_schema(dataset: &TabularDataset) -> SchemaDescriptor {
    let mut schema = SchemaDescriptor::default();
    for column in dataset.headers() {
        let ty = match dataset.column_values(column) {
            Some(values) => infer_column_type(values),
            None => SemanticType::Text,
        };
        schema.insert(column.clone(), ty);
    }
    schema
}

/// Infer the semantic type of one column from its values. Empty cells do not
/// vote; a column with no non-empty cells is text.
pub fn infer_column_type<'a>(values: impl Iterator<Item = &'a str>) -> SemanticType {
    let mut any = false;
    let mut all_integer = true;
    let mut all_float = true;
    let mut all_boolean = true;
    let mut all_datetime = true;

    for value in values {
        if value.is_empty() {
            continue;
        }
        any = true;
        all_integer = all_integer && parses_as(value, SemanticType::Integer);
        all_float = all_float && parses_as(value, SemanticType::Float);
        all_boolean = all_boolean && parses_as(value, SemanticType::Boolean);
        all_datetime = all_datetime && parses_as(value, SemanticType::Datetime);

        if !(all_integer || all_float || all_boolean || all_datetime) {
            return SemanticType::Text;
        }
    }

    if !any {
        SemanticType::Text
    } else if all_boolean {
        SemanticType::Boolean
    } else if all_integer {
        SemanticType::Integer
    } else if all_float {
        SemanticType::Float
    } else if all_datetime {
        SemanticType::Datetime
    } else {
        SemanticType::Text
    }
}

/// Does a single cell parse as the given semantic type? Empty cells are
/// NULLs and always pass.
pub fn parses_as(value: &str, ty: SemanticType) -> bool {
    if value.is_empty() {
        return true;
    }
    match ty {
        SemanticType::Integer => value.parse::<i64>().is_ok(),
        SemanticType::Float => value.parse::<f64>().is_ok(),
        SemanticType::Boolean => matches!(
            value.to_ascii_lowercase().as_str(),
            "true" | "false"
        ),
        SemanticType::Datetime => {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").is_ok()
                || NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S").is_ok()
                || NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
        },
        SemanticType::Text => true,
    }
}

/// Observed/expected categories agree. Text accepts anything, and a column
/// whose chunk happens to hold only whole numbers still satisfies a float
/// expectation.
fn category_compatible(observed: SemanticType, expected: SemanticType) -> bool {
    observed == expected
        || expected == SemanticType::Text
        || (expected == SemanticType::Float && observed == SemanticType::Integer)
}

/// First row whose cell in `column` fails to parse as the expected type,
/// falling back to the chunk's first row.
fn offending_row_sample(
    chunk: &Chunk<'_>,
    column: &str,
    expected: SemanticType,
) -> Option<serde_json::Value> {
    if let Some(values) = chunk.column_values(column) {
        for (i, value) in values.enumerate() {
            if !parses_as(value, expected) {
                return chunk.rows().get(i).map(|row| chunk.row_to_json(row));
            }
        }
    }
    chunk.row_sample()
}
