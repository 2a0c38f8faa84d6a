use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Name the model is bound to in reference strings, as in `m.fs.unit.x`.
pub const MODEL_ROOT: &str = "m";

// ---------------------------------------------------------------------------
// IndexValue – one position of a variable index
// ---------------------------------------------------------------------------

/// A single index value: numbers (time points, stage numbers) or strings
/// (component and phase names).
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum IndexValue {
    Number(f64),
    Text(String),
}

// -- Manual Eq/Ord so index keys can live in a BTreeMap --

impl PartialEq for IndexValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for IndexValue {}

impl PartialOrd for IndexValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use IndexValue::*;
        match (self, other) {
            (Number(a), Number(b)) => a.total_cmp(b),
            (Text(a), Text(b)) => a.cmp(b),
            (Number(_), Text(_)) => std::cmp::Ordering::Less,
            (Text(_), Number(_)) => std::cmp::Ordering::Greater,
        }
    }
}

impl std::hash::Hash for IndexValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            IndexValue::Number(n) => n.to_bits().hash(state),
            IndexValue::Text(s) => s.hash(state),
        }
    }
}

impl fmt::Display for IndexValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexValue::Number(n) => write!(f, "{n}"),
            IndexValue::Text(s) => write!(f, "'{s}'"),
        }
    }
}

impl From<f64> for IndexValue {
    fn from(n: f64) -> Self {
        IndexValue::Number(n)
    }
}

impl From<i32> for IndexValue {
    fn from(n: i32) -> Self {
        IndexValue::Number(n as f64)
    }
}

impl From<i64> for IndexValue {
    fn from(n: i64) -> Self {
        IndexValue::Number(n as f64)
    }
}

impl From<&str> for IndexValue {
    fn from(s: &str) -> Self {
        IndexValue::Text(s.to_string())
    }
}

/// A full index into a variable; scalar variables use the empty key.
pub type IndexKey = Vec<IndexValue>;

/// One position of a subscript: a fixed value or the `:` wildcard.
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    Value(IndexValue),
    Any,
}

impl Selector {
    pub fn matches(&self, value: &IndexValue) -> bool {
        match self {
            Selector::Value(v) => v == value,
            Selector::Any => true,
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Value(v) => write!(f, "{v}"),
            Selector::Any => write!(f, ":"),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a reference string could not be bound to a model variable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    #[error("invalid reference at column {position}: {reason}")]
    Syntax { position: usize, reason: String },
    #[error("reference must start with 'm', found '{0}'")]
    UnknownRoot(String),
    #[error("'{parent}' has no component '{name}'")]
    MissingComponent { parent: String, name: String },
    #[error("'{0}' is not a block")]
    NotABlock(String),
    #[error("'{0}' is not a variable")]
    NotAVariable(String),
    #[error("'{path}' takes {expected} indices, got {found}")]
    IndexArity {
        path: String,
        expected: usize,
        found: usize,
    },
    #[error("'{path}' has no index matching [{subscript}]")]
    IndexNotFound { path: String, subscript: String },
}

// ---------------------------------------------------------------------------
// ReferencePath – parsed `m.a.b.x[...]`
// ---------------------------------------------------------------------------

/// A parsed reference string: dotted component names with an optional
/// subscript on the last one.
///
/// Only identifiers, dots, and subscripts made of numbers, quoted strings
/// and `:` are accepted, so parsing a reference can never run code.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferencePath {
    pub root: String,
    pub components: Vec<String>,
    pub subscript: Option<Vec<Selector>>,
}

impl ReferencePath {
    pub fn parse(text: &str) -> Result<ReferencePath, ResolveError> {
        let mut cursor = Cursor {
            chars: text.chars().collect(),
            pos: 0,
        };
        cursor.skip_ws();
        let root = cursor.identifier()?;
        let mut components = Vec::new();
        let mut subscript = None;

        loop {
            cursor.skip_ws();
            match cursor.peek() {
                None => break,
                Some('.') if subscript.is_none() => {
                    cursor.pos += 1;
                    cursor.skip_ws();
                    components.push(cursor.identifier()?);
                }
                Some('[') if subscript.is_none() && !components.is_empty() => {
                    cursor.pos += 1;
                    subscript = Some(cursor.selectors()?);
                }
                Some(_) if subscript.is_some() => {
                    return Err(cursor.error("subscripts are only allowed at the end"));
                }
                Some(c) => return Err(cursor.error(format!("unexpected '{c}'"))),
            }
        }

        Ok(ReferencePath {
            root,
            components,
            subscript,
        })
    }

    /// Dotted component path without root or subscript.
    pub fn dotted(&self) -> String {
        self.components.join(".")
    }
}

impl fmt::Display for ReferencePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)?;
        for c in &self.components {
            write!(f, ".{c}")?;
        }
        if let Some(sel) = &self.subscript {
            let parts: Vec<String> = sel.iter().map(ToString::to_string).collect();
            write!(f, "[{}]", parts.join(", "))?;
        }
        Ok(())
    }
}

struct Cursor {
    chars: Vec<char>,
    pos: usize,
}

impl Cursor {
    fn error(&self, reason: impl Into<String>) -> ResolveError {
        ResolveError::Syntax {
            position: self.pos,
            reason: reason.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn identifier(&mut self) -> Result<String, ResolveError> {
        let start = self.pos;
        match self.peek() {
            Some(c) if c.is_alphabetic() || c == '_' => self.pos += 1,
            _ => return Err(self.error("expected a name")),
        }
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            self.pos += 1;
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    // selectors := selector (',' selector)* ']'
    fn selectors(&mut self) -> Result<Vec<Selector>, ResolveError> {
        let mut out = Vec::new();
        loop {
            self.skip_ws();
            out.push(self.selector()?);
            self.skip_ws();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(']') => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some(c) => return Err(self.error(format!("unexpected '{c}' in subscript"))),
                None => return Err(self.error("unterminated subscript")),
            }
        }
    }

    fn selector(&mut self) -> Result<Selector, ResolveError> {
        match self.peek() {
            Some(':') => {
                self.pos += 1;
                Ok(Selector::Any)
            }
            Some(q @ ('\'' | '"')) => {
                self.pos += 1;
                let start = self.pos;
                while self.peek().is_some_and(|c| c != q) {
                    self.pos += 1;
                }
                if self.peek().is_none() {
                    return Err(self.error("unterminated string"));
                }
                let text: String = self.chars[start..self.pos].iter().collect();
                self.pos += 1;
                Ok(Selector::Value(IndexValue::Text(text)))
            }
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => {
                let start = self.pos;
                self.pos += 1;
                while self
                    .peek()
                    .is_some_and(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '+'))
                {
                    self.pos += 1;
                }
                let text: String = self.chars[start..self.pos].iter().collect();
                text.parse::<f64>()
                    .map(|n| Selector::Value(IndexValue::Number(n)))
                    .map_err(|_| ResolveError::Syntax {
                        position: start,
                        reason: format!("'{text}' is not a number"),
                    })
            }
            _ => Err(self.error("expected a number, a quoted string or ':'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dotted_path_with_subscript() {
        let path = ReferencePath::parse("m.fs.boiler.pressure[0, 'Vap', :]").unwrap();
        assert_eq!(path.root, "m");
        assert_eq!(path.components, vec!["fs", "boiler", "pressure"]);
        assert_eq!(
            path.subscript,
            Some(vec![
                Selector::Value(IndexValue::Number(0.0)),
                Selector::Value(IndexValue::Text("Vap".into())),
                Selector::Any,
            ])
        );
        assert_eq!(path.to_string(), "m.fs.boiler.pressure[0, 'Vap', :]");
    }

    #[test]
    fn rejects_anything_that_is_not_a_path() {
        for text in [
            "",
            "m.fs.x()",
            "__import__('os').system('ls')",
            "m.fs.x[0].y",
            "m.fs.x[t]",
            "m..x",
            "m.fs.x[0",
            "m + 1",
        ] {
            assert!(
                matches!(ReferencePath::parse(text), Err(ResolveError::Syntax { .. })),
                "accepted {text:?}"
            );
        }
    }

    #[test]
    fn numbers_compare_by_value() {
        assert_eq!(IndexValue::from(1), IndexValue::from(1.0));
        assert!(IndexValue::from(2.5) < IndexValue::from("a"));
    }
}
