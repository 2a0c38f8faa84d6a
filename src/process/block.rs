use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use super::path::{IndexKey, ReferencePath, ResolveError, Selector, MODEL_ROOT};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("block '{block}' already has a component named '{name}'")]
    DuplicateComponent { block: String, name: String },
    #[error("variable index keys must all have the same length")]
    MixedArity,
}

// ---------------------------------------------------------------------------
// Var
// ---------------------------------------------------------------------------

/// A model variable: one value per index key. Scalars have a single entry
/// under the empty key.
#[derive(Debug, Clone, PartialEq)]
pub struct Var {
    pub doc: String,
    arity: usize,
    values: BTreeMap<IndexKey, f64>,
}

impl Var {
    pub fn scalar(value: f64) -> Var {
        Var {
            doc: String::new(),
            arity: 0,
            values: BTreeMap::from([(IndexKey::new(), value)]),
        }
    }

    /// An indexed variable; every key must have the same length.
    pub fn indexed<I>(entries: I) -> Result<Var, ModelError>
    where
        I: IntoIterator<Item = (IndexKey, f64)>,
    {
        let values: BTreeMap<IndexKey, f64> = entries.into_iter().collect();
        let arity = values.keys().next().map_or(0, Vec::len);
        if values.keys().any(|k| k.len() != arity) {
            return Err(ModelError::MixedArity);
        }
        Ok(Var {
            doc: String::new(),
            arity,
            values,
        })
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Var {
        self.doc = doc.into();
        self
    }

    /// Number of positions in each index key (0 for scalars).
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Value of a scalar variable.
    pub fn value(&self) -> Option<f64> {
        self.values.get(&IndexKey::new()).copied()
    }

    pub fn get(&self, key: &IndexKey) -> Option<f64> {
        self.values.get(key).copied()
    }

    pub fn keys(&self) -> impl Iterator<Item = &IndexKey> {
        self.values.keys()
    }

    fn select(&self, selectors: &[Selector]) -> Vec<IndexKey> {
        self.values
            .keys()
            .filter(|key| key.iter().zip(selectors).all(|(v, s)| s.matches(v)))
            .cloned()
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Component {
    Block(Block),
    Var(Var),
}

/// A named container of sub-blocks and variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    name: String,
    components: BTreeMap<String, Component>,
}

/// An owned address of one or more variable entries inside a model,
/// produced by resolving a reference string.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reference {
    /// Components below the model root, ending with the variable name.
    pub path: Vec<String>,
    /// The selected index keys of that variable.
    pub keys: Vec<IndexKey>,
}

impl Block {
    pub fn new(name: impl Into<String>) -> Block {
        Block {
            name: name.into(),
            components: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn insert(&mut self, name: &str, component: Component) -> Result<&mut Component, ModelError> {
        if self.components.contains_key(name) {
            return Err(ModelError::DuplicateComponent {
                block: self.name.clone(),
                name: name.to_string(),
            });
        }
        Ok(self.components.entry(name.to_string()).or_insert(component))
    }

    /// Add an empty sub-block and return it.
    pub fn add_block(&mut self, name: &str) -> Result<&mut Block, ModelError> {
        match self.insert(name, Component::Block(Block::new(name)))? {
            Component::Block(b) => Ok(b),
            Component::Var(_) => unreachable!("just inserted a block"),
        }
    }

    pub fn add_var(&mut self, name: &str, var: Var) -> Result<&mut Var, ModelError> {
        match self.insert(name, Component::Var(var))? {
            Component::Var(v) => Ok(v),
            Component::Block(_) => unreachable!("just inserted a var"),
        }
    }

    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components.get(name)
    }

    pub fn block(&self, name: &str) -> Option<&Block> {
        match self.components.get(name) {
            Some(Component::Block(b)) => Some(b),
            _ => None,
        }
    }

    pub fn block_mut(&mut self, name: &str) -> Option<&mut Block> {
        match self.components.get_mut(name) {
            Some(Component::Block(b)) => Some(b),
            _ => None,
        }
    }

    pub fn var(&self, name: &str) -> Option<&Var> {
        match self.components.get(name) {
            Some(Component::Var(v)) => Some(v),
            _ => None,
        }
    }

    /// Walk `path` down through sub-blocks to the named variable.
    fn lookup_var(&self, path: &[String]) -> Result<&Var, ResolveError> {
        let (var_name, blocks) = path
            .split_last()
            .ok_or_else(|| ResolveError::NotAVariable(MODEL_ROOT.to_string()))?;
        let mut block = self;
        let mut walked = MODEL_ROOT.to_string();
        for name in blocks {
            block = match block.components.get(name) {
                Some(Component::Block(b)) => b,
                Some(Component::Var(_)) => {
                    return Err(ResolveError::NotABlock(format!("{walked}.{name}")))
                }
                None => {
                    return Err(ResolveError::MissingComponent {
                        parent: walked,
                        name: name.clone(),
                    })
                }
            };
            walked = format!("{walked}.{name}");
        }
        match block.components.get(var_name) {
            Some(Component::Var(v)) => Ok(v),
            Some(Component::Block(_)) => Err(ResolveError::NotAVariable(format!("{walked}.{var_name}"))),
            None => Err(ResolveError::MissingComponent {
                parent: walked,
                name: var_name.clone(),
            }),
        }
    }

    fn lookup_var_mut(&mut self, path: &[String]) -> Option<&mut Var> {
        let (var_name, blocks) = path.split_last()?;
        let mut block = self;
        for name in blocks {
            block = block.block_mut(name)?;
        }
        match block.components.get_mut(var_name) {
            Some(Component::Var(v)) => Some(v),
            _ => None,
        }
    }

    /// Read the values addressed by a reference, in key order.
    pub fn values(&self, reference: &Reference) -> Result<Vec<f64>, ResolveError> {
        let var = self.lookup_var(&reference.path)?;
        reference
            .keys
            .iter()
            .map(|k| {
                var.get(k).ok_or_else(|| ResolveError::IndexNotFound {
                    path: reference.path.join("."),
                    subscript: k.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "),
                })
            })
            .collect()
    }

    /// Assign `value` to every entry a reference addresses. Returns how many
    /// entries were written.
    pub fn set_value(&mut self, reference: &Reference, value: f64) -> Result<usize, ResolveError> {
        // Validate first so the error names the failing component.
        self.lookup_var(&reference.path)?;
        let var = self
            .lookup_var_mut(&reference.path)
            .ok_or_else(|| ResolveError::NotAVariable(reference.path.join(".")))?;
        let mut written = 0;
        for key in &reference.keys {
            if let Some(slot) = var.values.get_mut(key) {
                *slot = value;
                written += 1;
            }
        }
        Ok(written)
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Something reference strings can be resolved against.
pub trait ModelResolver {
    fn resolve(&self, path: &ReferencePath) -> Result<Reference, ResolveError>;

    /// Parse and resolve in one step.
    fn resolve_str(&self, text: &str) -> Result<Reference, ResolveError> {
        self.resolve(&ReferencePath::parse(text)?)
    }
}

impl ModelResolver for Block {
    fn resolve(&self, path: &ReferencePath) -> Result<Reference, ResolveError> {
        if path.root != MODEL_ROOT {
            return Err(ResolveError::UnknownRoot(path.root.clone()));
        }
        let var = self.lookup_var(&path.components)?;
        let keys = match &path.subscript {
            None => var.keys().cloned().collect(),
            Some(selectors) => {
                if selectors.len() != var.arity() {
                    return Err(ResolveError::IndexArity {
                        path: format!("{MODEL_ROOT}.{}", path.dotted()),
                        expected: var.arity(),
                        found: selectors.len(),
                    });
                }
                let keys = var.select(selectors);
                if keys.is_empty() {
                    return Err(ResolveError::IndexNotFound {
                        path: format!("{MODEL_ROOT}.{}", path.dotted()),
                        subscript: selectors
                            .iter()
                            .map(ToString::to_string)
                            .collect::<Vec<_>>()
                            .join(", "),
                    });
                }
                keys
            }
        };
        Ok(Reference {
            path: path.components.clone(),
            keys,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::path::IndexValue;

    fn flowsheet() -> Block {
        let mut m = Block::new("m");
        let fs = m.add_block("fs").unwrap();
        let boiler = fs.add_block("boiler").unwrap();
        boiler.add_var("duty", Var::scalar(5.0)).unwrap();
        boiler
            .add_var(
                "temperature",
                Var::indexed([
                    (vec![IndexValue::from(0), IndexValue::from("Liq")], 300.0),
                    (vec![IndexValue::from(0), IndexValue::from("Vap")], 310.0),
                    (vec![IndexValue::from(1), IndexValue::from("Liq")], 301.0),
                ])
                .unwrap(),
            )
            .unwrap();
        m
    }

    #[test]
    fn resolves_scalar_and_sliced_references() {
        let m = flowsheet();
        let duty = m.resolve_str("m.fs.boiler.duty").unwrap();
        assert_eq!(m.values(&duty).unwrap(), vec![5.0]);

        let liquid = m.resolve_str("m.fs.boiler.temperature[:, 'Liq']").unwrap();
        assert_eq!(m.values(&liquid).unwrap(), vec![300.0, 301.0]);

        let all = m.resolve_str("m.fs.boiler.temperature").unwrap();
        assert_eq!(all.keys.len(), 3);
    }

    #[test]
    fn resolution_failures_are_typed() {
        let m = flowsheet();
        assert_eq!(
            m.resolve_str("m.fs.turbine.power"),
            Err(ResolveError::MissingComponent {
                parent: "m.fs".into(),
                name: "turbine".into()
            })
        );
        assert_eq!(
            m.resolve_str("model.fs.boiler.duty"),
            Err(ResolveError::UnknownRoot("model".into()))
        );
        assert_eq!(
            m.resolve_str("m.fs.boiler"),
            Err(ResolveError::NotAVariable("m.fs.boiler".into()))
        );
        assert_eq!(
            m.resolve_str("m.fs.boiler.duty.x"),
            Err(ResolveError::NotABlock("m.fs.boiler.duty".into()))
        );
        assert!(matches!(
            m.resolve_str("m.fs.boiler.temperature[0]"),
            Err(ResolveError::IndexArity { expected: 2, found: 1, .. })
        ));
        assert!(matches!(
            m.resolve_str("m.fs.boiler.temperature[5, 'Liq']"),
            Err(ResolveError::IndexNotFound { .. })
        ));
    }

    #[test]
    fn set_value_writes_every_selected_entry() {
        let mut m = flowsheet();
        let reference = m.resolve_str("m.fs.boiler.temperature[0, :]").unwrap();
        assert_eq!(m.set_value(&reference, 350.0).unwrap(), 2);
        let all = m.resolve_str("m.fs.boiler.temperature").unwrap();
        assert_eq!(m.values(&all).unwrap(), vec![350.0, 350.0, 301.0]);
    }

    #[test]
    fn duplicate_components_are_rejected() {
        let mut m = Block::new("m");
        m.add_var("x", Var::scalar(1.0)).unwrap();
        assert_eq!(
            m.add_block("x").unwrap_err(),
            ModelError::DuplicateComponent {
                block: "m".into(),
                name: "x".into()
            }
        );
    }
}
