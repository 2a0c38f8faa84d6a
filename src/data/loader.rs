use std::path::Path;

use anyhow::{bail, Context, Result};
use arrow::array::{Array, Float64Array};
use arrow::compute::{cast_with_options, CastOptions};
use arrow::datatypes::DataType;
use arrow::util::display::array_value_to_string;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use super::filter::{is_artifact_heading, retain_documented, tag_name};
use super::model::{MeasurementTable, TagMap, TagMetadata, TaggedData};
use crate::issues::{Issue, Outcome};
use crate::process::ModelResolver;
use crate::units::{Target, UnitNormalizer, UnitSystem};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Optional knobs for [`read_data`].
#[derive(Default)]
pub struct ReadOptions<'a> {
    /// Model to bind tag reference strings against.
    pub model: Option<&'a dyn ModelResolver>,
    /// Applied to every tag, in the data file and the metadata file alike.
    pub rename: Option<&'a dyn Fn(&str) -> String>,
    /// Convert every column to the base units of this system.
    pub unit_system: Option<UnitSystem>,
    /// Alias/ignore/gauge tables used for unit conversion.
    pub normalizer: UnitNormalizer,
}

/// Read a tag table and its metadata sidecar.
///
/// The data file's first row holds tags and its first column holds the row
/// index (timestamps or point labels). `.parquet` files are read through
/// arrow with the same layout; anything else is read as CSV.
///
/// The metadata file is a header-less CSV of
/// `tag, reference, description, units[, ignored...]`. Tags missing from
/// it are dropped from the table, so without a metadata file the returned
/// table has no columns.
///
/// File-level problems are errors. Per-tag problems (a unit the registry
/// does not know, a reference that does not resolve) are returned as
/// issues and leave the rest of the load untouched.
pub fn read_data(
    data_path: &Path,
    metadata_path: Option<&Path>,
    options: &ReadOptions<'_>,
) -> Result<Outcome<TaggedData>> {
    let raw = load_table(data_path)?;
    let mut table = build_table(raw, options.rename)
        .with_context(|| format!("building table from {}", data_path.display()))?;

    let mut metadata = match metadata_path {
        Some(path) if !path.as_os_str().is_empty() => read_metadata(path, options.rename)?,
        _ => TagMap::new(),
    };

    let mut issues = Vec::new();
    if let Some(model) = options.model {
        issues.extend(bind_references(&mut metadata, model));
    }

    let dropped = retain_documented(&mut table, &metadata);
    if !dropped.is_empty() {
        log::debug!("dropping {} undocumented tags: {dropped:?}", dropped.len());
    }

    if let Some(system) = options.unit_system {
        issues.extend(normalize_units(
            &mut table,
            &mut metadata,
            &options.normalizer,
            system,
        )?);
    }

    log::info!(
        "loaded {} rows x {} tags from {} ({} dropped, {} issues)",
        table.len(),
        table.tags().len(),
        data_path.display(),
        dropped.len(),
        issues.len()
    );

    Ok(Outcome {
        value: TaggedData { table, metadata },
        issues,
    })
}

// ---------------------------------------------------------------------------
// Table assembly
// ---------------------------------------------------------------------------

/// A data file as read, before headings are turned into tags.
#[derive(Debug)]
struct RawTable {
    index_name: String,
    index: Vec<String>,
    columns: Vec<(String, Vec<f64>)>,
}

fn load_table(path: &Path) -> Result<RawTable> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "parquet" | "pq" => load_parquet(path),
        _ => load_csv(path),
    }
}

fn build_table(raw: RawTable, rename: Option<&dyn Fn(&str) -> String>) -> Result<MeasurementTable> {
    let mut table = MeasurementTable::new(raw.index_name, raw.index);
    for (heading, values) in raw.columns {
        if is_artifact_heading(&heading) {
            log::debug!("skipping artifact column '{heading}'");
            continue;
        }
        table.insert_column(tag_name(&heading, rename), values)?;
    }
    Ok(table)
}

// ---------------------------------------------------------------------------
// CSV data loader
// ---------------------------------------------------------------------------

/// CSV layout: header row of tags, first column is the row index, other
/// cells are numbers or blank.
fn load_csv(path: &Path) -> Result<RawTable> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening data file {}", path.display()))?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let Some((index_name, headings)) = headers.split_first() else {
        bail!("data file {} has no header row", path.display());
    };

    let mut index = Vec::new();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); headings.len()];

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        index.push(record.get(0).unwrap_or("").trim().to_string());
        for (col, values) in columns.iter_mut().enumerate() {
            let cell = record.get(col + 1).unwrap_or("");
            values.push(parse_cell(cell).with_context(|| {
                format!("CSV row {row_no}, column '{}'", headings[col])
            })?);
        }
    }

    Ok(RawTable {
        index_name: index_name.trim().to_string(),
        index,
        columns: headings.iter().cloned().zip(columns).collect(),
    })
}

fn parse_cell(s: &str) -> Result<f64> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(f64::NAN);
    }
    s.parse::<f64>()
        .with_context(|| format!("'{s}' is not a number"))
}

// ---------------------------------------------------------------------------
// Parquet data loader
// ---------------------------------------------------------------------------

/// Parquet layout: first column is the row index (any type, rendered as
/// text), every other column must be castable to Float64. Nulls become
/// `NaN`; a value that does not cast (e.g. text) is an error.
fn load_parquet(path: &Path) -> Result<RawTable> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("opening parquet file {}", path.display()))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;

    let schema = builder.schema().clone();
    let Some((index_field, value_fields)) = schema.fields().split_first() else {
        bail!("parquet file {} has no columns", path.display());
    };

    let reader = builder.build().context("building parquet reader")?;
    let strict = CastOptions {
        safe: false,
        ..Default::default()
    };

    let mut index = Vec::new();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); value_fields.len()];

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;

        let index_col = batch.column(0);
        for row in 0..batch.num_rows() {
            let label = if index_col.is_null(row) {
                String::new()
            } else {
                array_value_to_string(index_col.as_ref(), row)
                    .with_context(|| format!("Row {row}: failed to read index"))?
            };
            index.push(label);
        }

        for (i, values) in columns.iter_mut().enumerate() {
            let field = &value_fields[i];
            let as_f64 = cast_with_options(batch.column(i + 1).as_ref(), &DataType::Float64, &strict)
                .with_context(|| format!("column '{}' is not numeric", field.name()))?;
            let arr = as_f64
                .as_any()
                .downcast_ref::<Float64Array>()
                .context("expected Float64Array after cast")?;
            values.extend(arr.iter().map(|v| v.unwrap_or(f64::NAN)));
        }
    }

    Ok(RawTable {
        index_name: index_field.name().trim().to_string(),
        index,
        columns: value_fields
            .iter()
            .map(|f| f.name().clone())
            .zip(columns)
            .collect(),
    })
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Parse the header-less metadata CSV into a [`TagMap`].
pub fn read_metadata(path: &Path, rename: Option<&dyn Fn(&str) -> String>) -> Result<TagMap> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("opening metadata file {}", path.display()))?;

    let mut metadata = TagMap::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("metadata row {row_no}"))?;
        if record.len() < 4 {
            bail!(
                "metadata row {row_no}: expected tag, reference, description and units, found {} columns",
                record.len()
            );
        }
        let tag = tag_name(&record[0], rename);
        let md = TagMetadata {
            reference_string: record[1].to_string(),
            reference: None,
            description: record[2].to_string(),
            units: record[3].to_string(),
        };
        if metadata.insert(tag.clone(), md).is_some() {
            log::debug!("metadata row {row_no} redefines tag '{tag}'");
        }
    }
    Ok(metadata)
}

/// Resolve every non-empty reference string against `model`. Failures are
/// returned as issues and leave `reference` empty.
fn bind_references(metadata: &mut TagMap, model: &dyn ModelResolver) -> Vec<Issue> {
    let mut issues = Vec::new();
    for (tag, md) in metadata.iter_mut() {
        if md.reference_string.is_empty() {
            continue;
        }
        match model.resolve_str(&md.reference_string) {
            Ok(reference) => md.reference = Some(reference),
            Err(cause) => {
                let issue = Issue::UnresolvedReference {
                    tag: tag.clone(),
                    reference: md.reference_string.clone(),
                    cause,
                };
                log::warn!("{issue}");
                issues.push(issue);
            }
        }
    }
    issues
}

// ---------------------------------------------------------------------------
// Unit normalization
// ---------------------------------------------------------------------------

/// Convert every column to the base units of `system`, updating each tag's
/// `units` to the label the normalizer reports.
fn normalize_units(
    table: &mut MeasurementTable,
    metadata: &mut TagMap,
    normalizer: &UnitNormalizer,
    system: UnitSystem,
) -> Result<Vec<Issue>> {
    let mut issues = Vec::new();
    let tags = table.tags().to_vec();
    for tag in tags {
        let (Some(md), Some(column)) = (metadata.get_mut(&tag), table.column_mut(&tag)) else {
            continue;
        };
        let values = std::mem::take(column);
        let outcome = normalizer
            .convert(values, &md.units, Target::System(system))
            .with_context(|| format!("converting tag '{tag}' from '{}'", md.units))?;
        let (converted, tag_issues) = outcome.into_parts();
        *column = converted.value;
        md.units = converted.units;
        issues.extend(tag_issues);
    }
    Ok(issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, name: &str, text: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn csv_cells_parse_blanks_as_nan() {
        let dir = tempfile::tempdir().unwrap();
        let data = write(dir.path(), "d.csv", "time,A,B\nt0,1.5,\nt1, 2 ,3\n");
        let raw = load_csv(&data).unwrap();
        assert_eq!(raw.index, vec!["t0", "t1"]);
        assert_eq!(raw.columns[0].1, vec![1.5, 2.0]);
        assert!(raw.columns[1].1[0].is_nan());
    }

    #[test]
    fn non_numeric_cell_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let data = write(dir.path(), "d.csv", "time,A\nt0,open\n");
        let err = load_csv(&data).unwrap_err();
        assert!(format!("{err:#}").contains("'open' is not a number"));
    }

    #[test]
    fn short_metadata_row_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let meta = write(dir.path(), "m.csv", "A,,flow\n");
        assert!(read_metadata(&meta, None).is_err());
    }

    #[test]
    fn metadata_fields_are_trimmed_and_extras_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let meta = write(
            dir.path(),
            "m.csv",
            " A , m.fs.x , Feed flow , GPM , extra, columns\nB,,Level,FT\n",
        );
        let md = read_metadata(&meta, None).unwrap();
        assert_eq!(md["A"].reference_string, "m.fs.x");
        assert_eq!(md["A"].description, "Feed flow");
        assert_eq!(md["A"].units, "GPM");
        assert_eq!(md["B"].reference_string, "");
    }

    #[test]
    fn artifact_columns_are_skipped_when_building() {
        let raw = RawTable {
            index_name: "time".into(),
            index: vec!["t0".into()],
            columns: vec![
                ("A".into(), vec![1.0]),
                ("Unnamed: 2".into(), vec![f64::NAN]),
                ("".into(), vec![f64::NAN]),
            ],
        };
        let table = build_table(raw, None).unwrap();
        assert_eq!(table.tags(), ["A".to_string()]);
    }

    #[test]
    fn colliding_tags_after_rename_are_fatal() {
        let raw = RawTable {
            index_name: "time".into(),
            index: vec!["t0".into()],
            columns: vec![("a".into(), vec![1.0]), ("A".into(), vec![2.0])],
        };
        let upper = |t: &str| t.to_uppercase();
        assert!(build_table(raw, Some(&upper)).is_err());
    }
}
