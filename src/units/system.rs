use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::registry::{Dimension, Term, Unit, BASE_QUANTITIES};
use super::UnitError;

/// A coherent set of base units that quantities can be normalized to.
///
/// `US` and `imperial` only replace length and mass (yard and pound); the
/// other base quantities stay SI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum UnitSystem {
    Si,
    #[default]
    Mks,
    Cgs,
    Us,
    Imperial,
}

impl UnitSystem {
    pub fn name(self) -> &'static str {
        match self {
            UnitSystem::Si => "SI",
            UnitSystem::Mks => "mks",
            UnitSystem::Cgs => "cgs",
            UnitSystem::Us => "US",
            UnitSystem::Imperial => "imperial",
        }
    }

    /// Base unit name and SI factor for each base quantity.
    fn base_units(self) -> [(&'static str, f64); BASE_QUANTITIES] {
        let (length, mass) = match self {
            UnitSystem::Si | UnitSystem::Mks => (("meter", 1.0), ("kilogram", 1.0)),
            UnitSystem::Cgs => (("centimeter", 1e-2), ("gram", 1e-3)),
            UnitSystem::Us | UnitSystem::Imperial => (("yard", 0.9144), ("pound", 0.45359237)),
        };
        [
            length,
            mass,
            ("second", 1.0),
            ("ampere", 1.0),
            ("kelvin", 1.0),
            ("mole", 1.0),
            ("candela", 1.0),
            ("radian", 1.0),
        ]
    }

    /// The unit of this system with the given dimension.
    pub fn base_unit(self, dim: Dimension) -> Unit {
        let terms = self
            .base_units()
            .into_iter()
            .enumerate()
            .filter(|(axis, _)| dim.0[*axis] != 0)
            .map(|(axis, (name, factor))| {
                let mut axis_dim = Dimension::NONE;
                axis_dim.0[axis] = 1;
                Term::base(name, factor, axis_dim, dim.0[axis])
            })
            .collect();
        Unit::from_terms(terms)
    }
}

impl fmt::Display for UnitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for UnitSystem {
    type Err = UnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "si" => Ok(UnitSystem::Si),
            "mks" => Ok(UnitSystem::Mks),
            "cgs" => Ok(UnitSystem::Cgs),
            "us" => Ok(UnitSystem::Us),
            "imperial" => Ok(UnitSystem::Imperial),
            _ => Err(UnitError::UnknownSystem(s.to_string())),
        }
    }
}

impl TryFrom<String> for UnitSystem {
    type Error = UnitError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<UnitSystem> for String {
    fn from(system: UnitSystem) -> Self {
        system.name().to_string()
    }
}
