//! Tagged plant-data ingestion.
//!
//! * [`data`] reads a time-indexed tag table plus its metadata sidecar,
//!   drops undocumented tags, binds tags to model variables and
//!   normalizes units.
//! * [`units`] holds the unit registry and the alias-aware normalizer.
//! * [`process`] is the small process-model tree that tags bind to, along
//!   with the Henry's-law parameter correlation.
//! * [`issues`] is the non-fatal issue channel shared by all of the above.

pub mod data;
pub mod issues;
pub mod process;
pub mod units;

pub use data::loader::{read_data, ReadOptions};
pub use data::model::{MeasurementTable, TagMap, TagMetadata, TaggedData};
pub use issues::{Issue, Outcome};
pub use process::{Block, Reference, ReferencePath, ResolveError, Var};
pub use units::{Target, UnitError, UnitNormalizer, UnitSystem};
