//! In-memory tabular dataset and chunk partitioning

use serde_json::{Map, Value};
use std::path::Path;
use tabload_common::Result;

/// A delimited dataset loaded into memory: a header row defining the column
/// set, and ordered data rows with one string cell per column.
#[derive(Debug, Clone)]
pub struct TabularDataset {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

/// A contiguous, 0-indexed subsequence of dataset rows, processed as one
/// atomic ingestion unit.
#[derive(Debug, Clone, Copy)]
pub struct Chunk<'a> {
    pub index: usize,
    headers: &'a [String],
    rows: &'a [Vec<String>],
}

impl TabularDataset {
    /// Load a CSV file with a header row.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new().from_path(path.as_ref())?;

        let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(String::from).collect());
        }

        Ok(Self { headers, rows })
    }

    #[cfg(test)]
    pub(crate) fn from_parts(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Values of one column across the whole dataset, if the column exists.
    pub fn column_values(&self, name: &str) -> Option<impl Iterator<Item = &str>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| row[idx].as_str()))
    }

    /// Remove the named columns from the header and every row. Names that
    /// are not present are ignored.
    pub fn drop_columns(&mut self, names: &[String]) {
        let keep: Vec<usize> = (0..self.headers.len())
            .filter(|&i| !names.contains(&self.headers[i]))
            .collect();
        if keep.len() == self.headers.len() {
            return;
        }

        self.headers = keep.iter().map(|&i| self.headers[i].clone()).collect();
        for row in &mut self.rows {
            *row = keep.iter().map(|&i| std::mem::take(&mut row[i])).collect();
        }
    }

    /// Partition the dataset into chunks.
    ///
    /// With R rows and a configured chunk size C: if R > C the dataset is
    /// split into exactly `floor(R / C)` groups, as evenly as possible (the
    /// first `R mod n` groups carry one extra row); otherwise a single chunk
    /// holds all rows. The group count, not C, is what downstream reporting
    /// sees as "total chunks".
    pub fn partition(&self, chunk_size: usize) -> Vec<Chunk<'_>> {
        let total = self.rows.len();
        let groups = if total > chunk_size {
            total / chunk_size
        } else {
            1
        };

        let base = total / groups;
        let extra = total % groups;

        let mut chunks = Vec::with_capacity(groups);
        let mut offset = 0;
        for index in 0..groups {
            let len = if index < extra { base + 1 } else { base };
            chunks.push(Chunk {
                index,
                headers: &self.headers,
                rows: &self.rows[offset..offset + len],
            });
            offset += len;
        }
        chunks
    }
}

impl<'a> Chunk<'a> {
    pub fn headers(&self) -> &'a [String] {
        self.headers
    }

    pub fn rows(&self) -> &'a [Vec<String>] {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one column across the chunk, if the column exists.
    pub fn column_values(&self, name: &str) -> Option<impl Iterator<Item = &'a str>> {
        let idx = self.headers.iter().position(|h| h == name)?;
        Some(self.rows.iter().map(move |row| row[idx].as_str()))
    }

    /// The chunk's first row as a JSON object, used as the offending-row
    /// sample on report entries.
    pub fn row_sample(&self) -> Option<Value> {
        self.rows.first().map(|row| self.row_to_json(row))
    }

    /// One row as a JSON object keyed by column name.
    pub fn row_to_json(&self, row: &[String]) -> Value {
        let map: Map<String, Value> = self
            .headers
            .iter()
            .zip(row.iter())
            .map(|(h, v)| (h.clone(), Value::String(v.clone())))
            .collect();
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset_with_rows(n: usize) -> TabularDataset {
        let rows = (0..n).map(|i| vec![i.to_string(), format!("name{i}")]).collect();
        TabularDataset::from_parts(vec!["id".into(), "name".into()], rows)
    }

    #[test]
    fn test_partition_exact_group_count() {
        // 10 rows, chunk size 3 -> floor(10/3) = 3 groups
        let ds = dataset_with_rows(10);
        let chunks = ds.partition(3);
        assert_eq!(chunks.len(), 3);

        // np.array_split sizing: 10 = 4 + 3 + 3
        let sizes: Vec<usize> = chunks.iter().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![4, 3, 3]);
    }

    #[test]
    fn test_partition_covers_all_rows_without_duplication() {
        let ds = dataset_with_rows(1000);
        let chunks = ds.partition(7);
        assert_eq!(chunks.len(), 1000 / 7);

        let mut seen = Vec::new();
        for chunk in &chunks {
            for row in chunk.rows() {
                seen.push(row[0].clone());
            }
        }
        let expected: Vec<String> = (0..1000).map(|i| i.to_string()).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_partition_small_dataset_single_chunk() {
        // R <= C -> one chunk with everything
        let ds = dataset_with_rows(5);
        let chunks = ds.partition(100);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 5);
        assert_eq!(chunks[0].index, 0);

        // boundary: R == C is still one chunk
        let ds = dataset_with_rows(100);
        assert_eq!(ds.partition(100).len(), 1);
    }

    #[test]
    fn test_partition_indices_are_sequential() {
        let ds = dataset_with_rows(50);
        let chunks = ds.partition(10);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
        }
    }

    #[test]
    fn test_drop_columns() {
        let mut ds = TabularDataset::from_parts(
            vec!["serial".into(), "id".into(), "name".into()],
            vec![vec!["1".into(), "10".into(), "a".into()]],
        );
        ds.drop_columns(&["serial".to_string(), "missing".to_string()]);

        assert_eq!(ds.headers(), &["id".to_string(), "name".to_string()]);
        let chunks = ds.partition(10);
        assert_eq!(chunks[0].rows()[0], vec!["10".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_row_sample_json() {
        let ds = dataset_with_rows(2);
        let chunks = ds.partition(10);
        let sample = chunks[0].row_sample().unwrap();
        assert_eq!(sample["id"], "0");
        assert_eq!(sample["name"], "name0");
    }

    #[test]
    fn test_column_values() {
        let ds = dataset_with_rows(3);
        let chunks = ds.partition(10);
        let names: Vec<&str> = chunks[0].column_values("name").unwrap().collect();
        assert_eq!(names, vec!["name0", "name1", "name2"]);
        assert!(chunks[0].column_values("nope").is_none());
    }
}
