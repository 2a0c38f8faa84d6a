//! Process-model side: the block/variable tree that data tags bind to, the
//! restricted reference-path resolver, and property correlations that
//! declare parameters on the tree.
//!
//! ```text
//!   "m.fs.boiler.T[0, 'Vap']"
//!        │
//!        ▼
//!   ┌──────────────┐
//!   │ ReferencePath │  identifiers, dots, literal subscripts only
//!   └──────────────┘
//!        │  ModelResolver::resolve
//!        ▼
//!   ┌──────────┐
//!   │ Reference │  owned path + selected index keys
//!   └──────────┘
//! ```

pub mod block;
pub mod henry;
pub mod path;

pub use block::{Block, Component, ModelError, ModelResolver, Reference, Var};
pub use henry::{ConstantHenry, HenryMethod, ParameterData, PropertyError};
pub use path::{IndexKey, IndexValue, ReferencePath, ResolveError, Selector, MODEL_ROOT};
