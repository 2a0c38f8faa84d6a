//! Fugacity of Henry's-law components.
//!
//! Only the mole-fraction basis is supported.

use std::collections::BTreeMap;

use thiserror::Error;

use super::block::{Block, ModelError, Var};

/// Per-component parameter data: parameter name → phase → value, e.g.
/// `parameter_data["henry_ref"]["Liq"]`.
pub type ParameterData = BTreeMap<String, BTreeMap<String, f64>>;

/// Key of the reference Henry coefficient in [`ParameterData`].
pub const HENRY_REF: &str = "henry_ref";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PropertyError {
    #[error("component '{component}' has no '{parameter}' data for phase '{phase}'")]
    MissingParameter {
        component: String,
        parameter: String,
        phase: String,
    },
    #[error("parameter block has no component '{0}'")]
    UnknownComponent(String),
    #[error("component '{component}' has no parameter '{name}'; were parameters built?")]
    ParameterNotBuilt { component: String, name: String },
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Name of the Henry coefficient variable for a phase.
pub fn henry_parameter_name(phase: &str) -> String {
    format!("{HENRY_REF}_{phase}")
}

/// A Henry's-law correlation: declares its parameters on a component block
/// and hands back the expression for the Henry coefficient.
pub trait HenryMethod {
    fn build_parameters(
        component: &mut Block,
        parameter_data: &ParameterData,
        phase: &str,
    ) -> Result<(), PropertyError>;

    fn return_expression<'a>(
        params: &'a Block,
        phase: &str,
        component: &str,
        temperature: Option<f64>,
    ) -> Result<&'a Var, PropertyError>;
}

/// Temperature-independent Henry coefficient.
pub struct ConstantHenry;

impl HenryMethod for ConstantHenry {
    fn build_parameters(
        component: &mut Block,
        parameter_data: &ParameterData,
        phase: &str,
    ) -> Result<(), PropertyError> {
        let value = parameter_data
            .get(HENRY_REF)
            .and_then(|by_phase| by_phase.get(phase))
            .copied()
            .ok_or_else(|| PropertyError::MissingParameter {
                component: component.name().to_string(),
                parameter: HENRY_REF.to_string(),
                phase: phase.to_string(),
            })?;

        let name = henry_parameter_name(phase);
        log::debug!("{}: adding {name} = {value}", component.name());
        component.add_var(
            &name,
            Var::scalar(value).with_doc(format!(
                "Henry coefficient (mole fraction basis) at reference state for phase {phase}"
            )),
        )?;
        Ok(())
    }

    fn return_expression<'a>(
        params: &'a Block,
        phase: &str,
        component: &str,
        _temperature: Option<f64>,
    ) -> Result<&'a Var, PropertyError> {
        let cobj = params
            .block(component)
            .ok_or_else(|| PropertyError::UnknownComponent(component.to_string()))?;
        let name = henry_parameter_name(phase);
        cobj.var(&name)
            .ok_or_else(|| PropertyError::ParameterNotBuilt {
                component: component.to_string(),
                name,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn co2_data() -> ParameterData {
        BTreeMap::from([(
            HENRY_REF.to_string(),
            BTreeMap::from([("Liq".to_string(), 1.6e8)]),
        )])
    }

    #[test]
    fn builds_and_returns_reference_coefficient() {
        let mut params = Block::new("params");
        let co2 = params.add_block("CO2").unwrap();
        ConstantHenry::build_parameters(co2, &co2_data(), "Liq").unwrap();

        let h = ConstantHenry::return_expression(&params, "Liq", "CO2", Some(350.0)).unwrap();
        assert_eq!(h.value(), Some(1.6e8));
        assert!(h.doc.contains("phase Liq"));

        // Temperature does not matter.
        let cold = ConstantHenry::return_expression(&params, "Liq", "CO2", Some(250.0)).unwrap();
        assert_eq!(cold.value(), h.value());
    }

    #[test]
    fn missing_phase_data_is_reported() {
        let mut co2 = Block::new("CO2");
        assert_eq!(
            ConstantHenry::build_parameters(&mut co2, &co2_data(), "Vap"),
            Err(PropertyError::MissingParameter {
                component: "CO2".into(),
                parameter: HENRY_REF.into(),
                phase: "Vap".into(),
            })
        );
    }

    #[test]
    fn building_twice_is_a_duplicate() {
        let mut co2 = Block::new("CO2");
        ConstantHenry::build_parameters(&mut co2, &co2_data(), "Liq").unwrap();
        assert!(matches!(
            ConstantHenry::build_parameters(&mut co2, &co2_data(), "Liq"),
            Err(PropertyError::Model(ModelError::DuplicateComponent { .. }))
        ));
    }

    #[test]
    fn expression_before_build_is_an_error() {
        let mut params = Block::new("params");
        params.add_block("CO2").unwrap();
        assert!(matches!(
            ConstantHenry::return_expression(&params, "Liq", "CO2", None),
            Err(PropertyError::ParameterNotBuilt { .. })
        ));
        assert_eq!(
            ConstantHenry::return_expression(&params, "Liq", "N2", None).unwrap_err(),
            PropertyError::UnknownComponent("N2".into())
        );
    }
}
