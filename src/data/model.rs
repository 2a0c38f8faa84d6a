use std::collections::BTreeMap;

use anyhow::{bail, Result};
use serde::Serialize;

use crate::process::{Block, Reference, ResolveError};

// ---------------------------------------------------------------------------
// TagMetadata – one row of the metadata sidecar
// ---------------------------------------------------------------------------

/// What the metadata file says about one tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagMetadata {
    /// Model reference as written in the metadata file; may be empty.
    pub reference_string: String,
    /// The model variable(s) `reference_string` resolved to, when a model
    /// was supplied and resolution succeeded.
    pub reference: Option<Reference>,
    pub description: String,
    /// Units of the tag's column. Updated when columns are normalized.
    pub units: String,
}

/// Tag → metadata, ordered by tag.
pub type TagMap = BTreeMap<String, TagMetadata>;

// ---------------------------------------------------------------------------
// MeasurementTable – the time-indexed data
// ---------------------------------------------------------------------------

/// A time-indexed table of tag columns. Blank cells are `NaN`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementTable {
    /// Heading of the index column as it appeared in the file.
    pub index_name: String,
    /// Row labels (timestamps or point labels), one per row.
    pub index: Vec<String>,
    tags: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl MeasurementTable {
    pub fn new(index_name: impl Into<String>, index: Vec<String>) -> Self {
        MeasurementTable {
            index_name: index_name.into(),
            index,
            tags: Vec::new(),
            columns: Vec::new(),
        }
    }

    /// Append a column. Fails on a duplicate tag or a length mismatch.
    pub fn insert_column(&mut self, tag: impl Into<String>, values: Vec<f64>) -> Result<()> {
        let tag = tag.into();
        if self.tags.contains(&tag) {
            bail!("duplicate tag '{tag}'");
        }
        if values.len() != self.index.len() {
            bail!(
                "column '{tag}' has {} values but the table has {} rows",
                values.len(),
                self.index.len()
            );
        }
        self.tags.push(tag);
        self.columns.push(values);
        Ok(())
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Tags in column order.
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn column(&self, tag: &str) -> Option<&[f64]> {
        let i = self.tags.iter().position(|t| t == tag)?;
        Some(&self.columns[i])
    }

    pub fn column_mut(&mut self, tag: &str) -> Option<&mut Vec<f64>> {
        let i = self.tags.iter().position(|t| t == tag)?;
        Some(&mut self.columns[i])
    }

    /// Keep only the columns whose tag satisfies `keep`; returns the tags
    /// that were removed.
    pub fn retain_columns<F: Fn(&str) -> bool>(&mut self, keep: F) -> Vec<String> {
        let mut dropped = Vec::new();
        let mut tags = Vec::with_capacity(self.tags.len());
        let mut columns = Vec::with_capacity(self.columns.len());
        for (tag, col) in self.tags.drain(..).zip(self.columns.drain(..)) {
            if keep(&tag) {
                tags.push(tag);
                columns.push(col);
            } else {
                dropped.push(tag);
            }
        }
        self.tags = tags;
        self.columns = columns;
        dropped
    }

    /// One row as (tag, value) pairs.
    pub fn row(&self, row: usize) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.tags
            .iter()
            .zip(&self.columns)
            .filter_map(move |(tag, col)| col.get(row).map(|v| (tag.as_str(), *v)))
    }
}

// ---------------------------------------------------------------------------
// TaggedData – what the loader returns
// ---------------------------------------------------------------------------

/// A loaded measurement table together with its tag metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaggedData {
    pub table: MeasurementTable,
    pub metadata: TagMap,
}

impl TaggedData {
    /// Write row `row` of the table into every bound model variable.
    ///
    /// Tags without a resolved reference and blank (`NaN`) cells are
    /// skipped. Returns the number of variable entries written.
    pub fn bind_row(&self, model: &mut Block, row: usize) -> Result<usize, ResolveError> {
        let mut written = 0;
        for (tag, value) in self.table.row(row) {
            if value.is_nan() {
                continue;
            }
            let Some(reference) = self.metadata.get(tag).and_then(|md| md.reference.as_ref())
            else {
                continue;
            };
            written += model.set_value(reference, value)?;
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> MeasurementTable {
        let mut t = MeasurementTable::new("time", vec!["t0".into(), "t1".into()]);
        t.insert_column("A", vec![1.0, 2.0]).unwrap();
        t.insert_column("B", vec![3.0, f64::NAN]).unwrap();
        t.insert_column("C", vec![5.0, 6.0]).unwrap();
        t
    }

    #[test]
    fn insert_rejects_duplicates_and_ragged_columns() {
        let mut t = table();
        assert!(t.insert_column("A", vec![0.0, 0.0]).is_err());
        assert!(t.insert_column("D", vec![0.0]).is_err());
    }

    #[test]
    fn retain_reports_dropped_tags() {
        let mut t = table();
        let dropped = t.retain_columns(|tag| tag != "B");
        assert_eq!(dropped, vec!["B".to_string()]);
        assert_eq!(t.tags(), ["A".to_string(), "C".to_string()]);
        assert_eq!(t.column("C"), Some(&[5.0, 6.0][..]));
    }

    #[test]
    fn row_yields_tag_value_pairs() {
        let t = table();
        let row: Vec<(&str, f64)> = t.row(0).collect();
        assert_eq!(row, vec![("A", 1.0), ("B", 3.0), ("C", 5.0)]);
        assert_eq!(t.row(7).count(), 0);
    }
}
