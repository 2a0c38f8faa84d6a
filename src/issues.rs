use std::fmt;

use crate::process::ResolveError;

/// A non-fatal problem encountered while loading or converting data.
///
/// Issues never abort an operation; they are collected alongside the result
/// so callers can inspect them (and every one is also logged at `warn`).
#[derive(Debug, Clone, PartialEq)]
pub enum Issue {
    /// The source unit string was not recognized; the value was passed
    /// through unconverted.
    UndefinedUnit { unit: String },
    /// A tag's reference string could not be bound to the model.
    UnresolvedReference {
        tag: String,
        reference: String,
        cause: ResolveError,
    },
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Issue::UndefinedUnit { unit } => {
                write!(f, "unit '{unit}' is not defined; no conversion")
            }
            Issue::UnresolvedReference {
                tag,
                reference,
                cause,
            } => write!(f, "tag '{tag}': reference '{reference}' not found ({cause})"),
        }
    }
}

/// A value together with the non-fatal issues raised while producing it.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    pub value: T,
    pub issues: Vec<Issue>,
}

impl<T> Outcome<T> {
    pub fn clean(value: T) -> Self {
        Outcome {
            value,
            issues: Vec::new(),
        }
    }

    pub fn with_issue(value: T, issue: Issue) -> Self {
        log::warn!("{issue}");
        Outcome {
            value,
            issues: vec![issue],
        }
    }

    /// Whether no issues were raised.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Split into the value and the issues.
    pub fn into_parts(self) -> (T, Vec<Issue>) {
        (self.value, self.issues)
    }
}
