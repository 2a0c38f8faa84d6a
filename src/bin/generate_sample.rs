use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::print_batches;
use parquet::arrow::ArrowWriter;

use plant_data::process::{Block, ModelResolver, Var};
use plant_data::{read_data, ReadOptions, TaggedData, UnitSystem};

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// (heading, reference, description, units, mean, noise). Headings keep
/// the stray whitespace historian exports tend to have.
const TAGS: &[(&str, &str, &str, &str, f64, f64)] = &[
    (" FT-101", "m.fs.feed.flow", "Feed water flow", "GPM", 450.0, 5.0),
    ("PT-102 ", "m.fs.feed.pressure", "Feed pressure", "PSIG", 120.0, 1.5),
    ("TT-103", "m.fs.feed.temperature", "Feed temperature", "DEG F", 180.0, 0.8),
    ("LT-104", "", "Drum level", "PCT", 52.0, 2.0),
    // The sample model has no valve, so this reference is reported as an issue.
    ("ZT-105", "m.fs.feed.valve", "Valve position", "% OPEN", 35.0, 1.0),
];

/// A column the metadata does not describe; dropped on load.
const UNDOCUMENTED: &str = "XX-999";

const ROWS: usize = 48;

fn timestamp(i: usize) -> String {
    let minutes = i * 5;
    format!("2024-01-01 {:02}:{:02}:00", minutes / 60, minutes % 60)
}

fn main() -> Result<()> {
    env_logger::init();

    let mut rng = SimpleRng::new(42);
    let index: Vec<String> = (0..ROWS).map(timestamp).collect();
    let mut columns: Vec<(String, Vec<f64>)> = TAGS
        .iter()
        .map(|&(heading, _, _, _, mean, noise)| {
            let values = (0..ROWS).map(|_| rng.gauss(mean, noise)).collect();
            (heading.to_string(), values)
        })
        .collect();
    columns.push((
        UNDOCUMENTED.to_string(),
        (0..ROWS).map(|_| rng.gauss(0.0, 1.0)).collect(),
    ));

    write_csv(Path::new("sample_tags.csv"), &index, &columns)?;
    write_metadata(Path::new("sample_tags_meta.csv"))?;
    write_parquet(Path::new("sample_tags.parquet"), &index, &columns)?;
    println!("Wrote {ROWS} rows x {} tags to sample_tags.csv / .parquet", columns.len());

    let mut model = sample_model()?;
    let outcome = {
        let options = ReadOptions {
            model: Some(&model as &dyn ModelResolver),
            unit_system: Some(UnitSystem::Si),
            ..Default::default()
        };
        read_data(
            Path::new("sample_tags.parquet"),
            Some(Path::new("sample_tags_meta.csv")),
            &options,
        )?
    };
    for issue in &outcome.issues {
        println!("issue: {issue}");
    }

    let data = outcome.value;
    for (tag, md) in &data.metadata {
        println!("{tag:>8}  {:<18} {}", md.description, md.units);
    }
    print_batches(&[preview_batch(&data, 5)?])?;

    let written = data.bind_row(&mut model, 0)?;
    println!("Bound {written} model values from the first row");
    Ok(())
}

fn sample_model() -> Result<Block> {
    let mut m = Block::new("m");
    let feed = m.add_block("fs")?.add_block("feed")?;
    for name in ["flow", "pressure", "temperature"] {
        feed.add_var(name, Var::scalar(0.0))?;
    }
    Ok(m)
}

fn write_csv(path: &Path, index: &[String], columns: &[(String, Vec<f64>)]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).context("creating data CSV")?;
    let mut header = vec!["time".to_string()];
    header.extend(columns.iter().map(|(h, _)| h.clone()));
    // Trailing empty heading, as spreadsheet exports often leave behind.
    header.push(String::new());
    writer.write_record(&header)?;
    for (row, label) in index.iter().enumerate() {
        let mut record = vec![label.clone()];
        record.extend(columns.iter().map(|(_, v)| format!("{:.3}", v[row])));
        record.push(String::new());
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_metadata(path: &Path) -> Result<()> {
    let mut file = File::create(path).context("creating metadata CSV")?;
    for &(heading, reference, description, units, _, _) in TAGS {
        writeln!(file, "{},{reference},{description},{units}", heading.trim())?;
    }
    Ok(())
}

fn write_parquet(path: &Path, index: &[String], columns: &[(String, Vec<f64>)]) -> Result<()> {
    let mut fields = vec![Field::new("time", DataType::Utf8, false)];
    let mut arrays: Vec<ArrayRef> = vec![Arc::new(StringArray::from(index.to_vec()))];
    for (heading, values) in columns {
        fields.push(Field::new(heading, DataType::Float64, true));
        arrays.push(Arc::new(Float64Array::from(values.clone())));
    }
    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), arrays).context("building record batch")?;

    let file = File::create(path).context("creating parquet file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

/// First `rows` rows of the loaded table as a record batch, for printing.
fn preview_batch(data: &TaggedData, rows: usize) -> Result<RecordBatch> {
    let table = &data.table;
    let n = rows.min(table.len());
    let mut fields = vec![Field::new(&table.index_name, DataType::Utf8, false)];
    let mut arrays: Vec<ArrayRef> = vec![Arc::new(StringArray::from(table.index[..n].to_vec()))];
    for tag in table.tags() {
        if let Some(col) = table.column(tag) {
            fields.push(Field::new(tag, DataType::Float64, true));
            arrays.push(Arc::new(Float64Array::from(col[..n].to_vec())));
        }
    }
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}
