/// Data layer: tag tables, metadata, loading and column selection.
///
/// Architecture:
/// ```text
///  data .csv / .parquet        metadata .csv
///        │                          │
///        ▼                          ▼
///   ┌──────────┐             ┌──────────────┐
///   │  loader   │  headings   │ read_metadata │  tag → TagMetadata
///   └──────────┘  → tags      └──────────────┘
///        │                          │  ModelResolver (optional)
///        ▼                          ▼
///   ┌──────────┐
///   │  filter   │  drop artifact + undocumented columns
///   └──────────┘
///        │
///        ▼
///   UnitNormalizer (optional) → TaggedData { table, metadata }
/// ```

pub mod filter;
pub mod loader;
pub mod model;
