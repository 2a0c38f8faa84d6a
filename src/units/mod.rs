//! Unit handling: a small unit registry and the alias-aware normalizer used
//! when loading plant data.
//!
//! ```text
//!   "PSIG" ──► alias table ──► "psig" ──► gauge table ──► "psi" (+1 atm)
//!                                              │
//!                                              ▼
//!                                     ┌──────────────┐
//!                                     │   registry    │  parse → Unit
//!                                     └──────────────┘
//!                                              │
//!                                              ▼
//!                              target unit / system base units
//! ```

use thiserror::Error;

pub mod normalize;
pub mod registry;
pub mod system;

pub use normalize::{Converted, Magnitude, NormalizerConfig, Target, UnitNormalizer};
pub use registry::{parse_unit, Dimension, Unit};
pub use system::UnitSystem;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum UnitError {
    #[error("unit '{0}' is not defined")]
    Undefined(String),
    #[error("cannot parse unit expression '{input}': {reason}")]
    Syntax { input: String, reason: String },
    #[error("offset unit used in compound expression '{0}'")]
    OffsetInCompound(String),
    #[error("cannot convert from '{from}' to '{to}'")]
    Incompatible { from: String, to: String },
    #[error("unknown unit system '{0}'")]
    UnknownSystem(String),
}
