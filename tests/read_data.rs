use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use tempfile::TempDir;

use plant_data::process::{Block, IndexValue, ModelResolver, ResolveError, Var};
use plant_data::units::{Target, UnitNormalizer};
use plant_data::{read_data, Issue, ReadOptions, UnitSystem};

fn write(dir: &TempDir, name: &str, text: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, text).unwrap();
    path
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * b.abs().max(1.0)
}

const DATA: &str = "\
time,A,B,C,
2024-01-01 00:00,1.0,2.0,3.0,
2024-01-01 00:05,4.0,,6.0,
";

const META: &str = "\
A,m.fs.x,Flow A,GPM
C,,Level C,PCT
Z,,Not in data,FT
";

#[test]
fn undocumented_tags_are_dropped() {
    let dir = TempDir::new().unwrap();
    let data = write(&dir, "data.csv", DATA);
    let meta = write(&dir, "meta.csv", META);

    let out = read_data(&data, Some(&meta), &ReadOptions::default()).unwrap();
    assert!(out.is_clean());
    let tagged = out.value;

    assert_eq!(tagged.table.tags(), ["A".to_string(), "C".to_string()]);
    assert_eq!(tagged.table.index, vec!["2024-01-01 00:00", "2024-01-01 00:05"]);
    assert_eq!(tagged.table.column("A"), Some(&[1.0, 4.0][..]));
    // Metadata may describe tags the data does not have.
    assert!(tagged.metadata.contains_key("Z"));
    assert!(tagged.table.tags().iter().all(|t| tagged.metadata.contains_key(t)));
}

#[test]
fn whitespace_is_trimmed_on_both_sides() {
    let dir = TempDir::new().unwrap();
    let data = write(&dir, "data.csv", "time, A ,B\nt0,1,2\n");
    let meta = write(&dir, "meta.csv", "  A  ,,desc,FT\n");

    let tagged = read_data(&data, Some(&meta), &ReadOptions::default())
        .unwrap()
        .value;
    assert_eq!(tagged.table.tags(), ["A".to_string()]);
}

#[test]
fn rename_applies_to_data_and_metadata() {
    let dir = TempDir::new().unwrap();
    let data = write(&dir, "data.csv", DATA);
    let meta = write(&dir, "meta.csv", META);

    let prefix = |t: &str| format!("unit1.{}", t.to_lowercase());
    let options = ReadOptions {
        rename: Some(&prefix),
        ..Default::default()
    };
    let tagged = read_data(&data, Some(&meta), &options).unwrap().value;
    assert_eq!(
        tagged.table.tags(),
        ["unit1.a".to_string(), "unit1.c".to_string()]
    );
    assert!(tagged.metadata.contains_key("unit1.z"));
}

#[test]
fn unit_system_matches_the_normalizer() {
    let dir = TempDir::new().unwrap();
    let data = write(&dir, "data.csv", DATA);
    let meta = write(&dir, "meta.csv", META);

    let options = ReadOptions {
        unit_system: Some(UnitSystem::Si),
        ..Default::default()
    };
    let tagged = read_data(&data, Some(&meta), &options).unwrap().value;

    let normalizer = UnitNormalizer::default();
    for (tag, original_units, raw) in [("A", "GPM", vec![1.0, 4.0]), ("C", "PCT", vec![3.0, 6.0])] {
        let expected = normalizer
            .convert(raw, original_units, Target::System(UnitSystem::Si))
            .unwrap()
            .value;
        assert_eq!(tagged.metadata[tag].units, expected.units);
        let column = tagged.table.column(tag).unwrap();
        for (got, want) in column.iter().zip(&expected.value) {
            assert!(close(*got, *want));
        }
    }
    assert_eq!(tagged.metadata["A"].units, "meter ** 3 / second");
    assert_eq!(tagged.metadata["C"].units, "percent");
}

#[test]
fn unknown_units_surface_as_issues() {
    let dir = TempDir::new().unwrap();
    let data = write(&dir, "data.csv", "time,A,B\nt0,1,2\n");
    let meta = write(&dir, "meta.csv", "A,,,WIDGETS/HR\nB,,,FT\n");

    let options = ReadOptions {
        unit_system: Some(UnitSystem::Si),
        ..Default::default()
    };
    let out = read_data(&data, Some(&meta), &options).unwrap();
    assert_eq!(
        out.issues,
        vec![Issue::UndefinedUnit {
            unit: "WIDGETS/HR".to_string()
        }]
    );
    let tagged = out.value;
    assert_eq!(tagged.table.column("A"), Some(&[1.0][..]));
    assert_eq!(tagged.metadata["A"].units, "WIDGETS/HR");
    assert!(close(tagged.table.column("B").unwrap()[0], 2.0 * 0.3048));
    assert_eq!(tagged.metadata["B"].units, "meter");
}

#[test]
fn no_metadata_means_empty_result() {
    let dir = TempDir::new().unwrap();
    let data = write(&dir, "data.csv", DATA);

    let tagged = read_data(&data, None, &ReadOptions::default()).unwrap().value;
    assert!(tagged.metadata.is_empty());
    assert!(tagged.table.tags().is_empty());
}

#[test]
fn references_bind_and_failures_are_isolated() {
    let dir = TempDir::new().unwrap();
    let data = write(&dir, "data.csv", "time,A,B,C\nt0,1,2,3\nt1,4,5,\n");
    let meta = write(
        &dir,
        "meta.csv",
        "A,m.fs.flow,,FT\nB,m.fs.missing,,FT\nC,m.fs.temperature[:],,FT\n",
    );

    let mut model = Block::new("m");
    let fs_block = model.add_block("fs").unwrap();
    fs_block.add_var("flow", Var::scalar(0.0)).unwrap();
    fs_block
        .add_var(
            "temperature",
            Var::indexed([
                (vec![IndexValue::from(0)], 0.0),
                (vec![IndexValue::from(1)], 0.0),
            ])
            .unwrap(),
        )
        .unwrap();

    let out = {
        let options = ReadOptions {
            model: Some(&model as &dyn ModelResolver),
            ..Default::default()
        };
        read_data(&data, Some(&meta), &options).unwrap()
    };

    assert_eq!(out.issues.len(), 1);
    match &out.issues[0] {
        Issue::UnresolvedReference { tag, cause, .. } => {
            assert_eq!(tag, "B");
            assert_eq!(
                *cause,
                ResolveError::MissingComponent {
                    parent: "m.fs".into(),
                    name: "missing".into()
                }
            );
        }
        other => panic!("unexpected issue {other:?}"),
    }

    let tagged = out.value;
    assert!(tagged.metadata["A"].reference.is_some());
    assert!(tagged.metadata["B"].reference.is_none());
    assert_eq!(tagged.metadata["C"].reference.as_ref().unwrap().keys.len(), 2);
    // Data is still loaded for the tag whose reference failed.
    assert_eq!(tagged.table.column("B"), Some(&[2.0, 5.0][..]));

    // Row 1 has a blank C, so only A is written.
    assert_eq!(tagged.bind_row(&mut model, 1).unwrap(), 1);
    let flow = model.resolve_str("m.fs.flow").unwrap();
    assert_eq!(model.values(&flow).unwrap(), vec![4.0]);

    // Row 0 writes A plus both temperature entries.
    assert_eq!(tagged.bind_row(&mut model, 0).unwrap(), 3);
    let temps = model.resolve_str("m.fs.temperature").unwrap();
    assert_eq!(model.values(&temps).unwrap(), vec![3.0, 3.0]);
}

#[test]
fn empty_metadata_path_means_empty_result() {
    let dir = TempDir::new().unwrap();
    let data = write(&dir, "data.csv", DATA);

    let out = read_data(&data, Some(Path::new("")), &ReadOptions::default()).unwrap();
    assert!(out.is_clean());
    assert!(out.value.metadata.is_empty());
    assert!(out.value.table.tags().is_empty());
}

#[test]
fn unreadable_files_are_errors() {
    let dir = TempDir::new().unwrap();
    let data = write(&dir, "data.csv", DATA);
    let missing = dir.path().join("nope.csv");

    assert!(read_data(&missing, None, &ReadOptions::default()).is_err());
    assert!(read_data(&data, Some(&missing), &ReadOptions::default()).is_err());

    let ragged = write(&dir, "ragged.csv", "time,A\nt0,1,2\n");
    assert!(read_data(&ragged, None, &ReadOptions::default()).is_err());
}

fn write_parquet(path: &Path) {
    let schema = Arc::new(Schema::new(vec![
        Field::new("time", DataType::Utf8, false),
        Field::new(" A ", DataType::Float64, true),
        Field::new("B", DataType::Int64, false),
    ]));
    let arrays: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(vec!["t0", "t1"])),
        Arc::new(Float64Array::from(vec![Some(1.5), None])),
        Arc::new(Int64Array::from(vec![7, 8])),
    ];
    let batch = RecordBatch::try_new(schema.clone(), arrays).unwrap();
    let file = fs::File::create(path).unwrap();
    let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();
}

#[test]
fn parquet_data_files_load_like_csv() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data.parquet");
    write_parquet(&data);
    let meta = write(&dir, "meta.csv", "A,,,FT\nB,,,IN\n");

    let options = ReadOptions {
        unit_system: Some(UnitSystem::Si),
        ..Default::default()
    };
    let tagged = read_data(&data, Some(&meta), &options).unwrap().value;
    assert_eq!(tagged.table.index_name, "time");
    assert_eq!(tagged.table.index, vec!["t0", "t1"]);
    assert_eq!(tagged.table.tags(), ["A".to_string(), "B".to_string()]);

    let a = tagged.table.column("A").unwrap();
    assert!(close(a[0], 1.5 * 0.3048));
    assert!(a[1].is_nan());
    let b = tagged.table.column("B").unwrap();
    assert!(close(b[1], 8.0 * 0.0254));
}

#[test]
fn parquet_text_cells_are_errors() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data.parquet");
    let schema = Arc::new(Schema::new(vec![
        Field::new("time", DataType::Utf8, false),
        Field::new("A", DataType::Utf8, true),
    ]));
    let arrays: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(vec!["t0", "t1"])),
        Arc::new(StringArray::from(vec![Some("1.5"), Some("open")])),
    ];
    let batch = RecordBatch::try_new(schema.clone(), arrays).unwrap();
    let mut writer = ArrowWriter::try_new(fs::File::create(&data).unwrap(), schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();
    let meta = write(&dir, "meta.csv", "A,,,FT\n");

    let err = read_data(&data, Some(&meta), &ReadOptions::default()).unwrap_err();
    assert!(format!("{err:#}").contains("column 'A' is not numeric"));
}
