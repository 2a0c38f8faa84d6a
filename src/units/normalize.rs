use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::registry::{self, parse_unit, Unit, PRESSURE};
use super::system::UnitSystem;
use super::UnitError;
use crate::issues::{Issue, Outcome};

// ---------------------------------------------------------------------------
// Built-in tables
// ---------------------------------------------------------------------------

/// Unit spellings found in plant historians that the registry does not
/// understand, mapped to ones it does.
pub const UNIT_ALIASES: &[(&str, &str)] = &[
    // Pressure
    ("PSI", "psi"),
    ("PSIA", "psi"),
    ("psia", "psi"),
    ("PSIG", "psig"),
    ("INWC", "in water"),
    ("IN WC", "in water"),
    ("IN/WC", "in water"),
    ("\" H2O", "in water"),
    ("INHG", "in hg"),
    ("IN HG", "in hg"),
    ("IN/HG", "in hg"),
    ("HGA", "in hg"),
    ("IN HGA", "in hg"),
    // Fraction
    ("PCT", "percent"),
    ("pct", "percent"),
    ("PERCT", "percent"),
    ("PERCT.", "percent"),
    ("PCNT", "percent"),
    ("PPM", "ppm"),
    ("PPB", "ppb"),
    ("% OPEN", "percent open"),
    ("% CLSD", "percent closed"),
    ("% CLOSED", "percent closed"),
    // Length
    ("IN", "in"),
    ("INS", "in"),
    ("INCHES", "in"),
    ("Inches", "in"),
    ("FT", "ft"),
    ("FEET", "ft"),
    ("FOOT", "ft"),
    ("Feet", "ft"),
    ("MILS", "minch"),
    // Speed
    ("MPH", "mile/hr"),
    ("IPS", "in/s"),
    // Volume
    ("KGAL", "kgal"),
    // Volumetric flow
    ("GPM", "gal/min"),
    ("gpm", "gal/min"),
    ("CFM", "ft^3/min"),
    ("KCFM", "ft^3/mmin"),
    // Standard conditions are not tracked; SCFM is treated as plain CFM.
    ("SCFM", "ft^3/min"),
    ("KSCFM", "ft^3/mmin"),
    // Angle
    ("DEG", "deg"),
    // Angular speed
    ("RPM", "rpm"),
    // Frequency
    ("HZ", "hz"),
    // Temperature
    ("DEG F", "degF"),
    ("Deg F", "degF"),
    ("deg F", "degF"),
    ("DEG C", "degC"),
    ("Deg C", "degC"),
    ("deg C", "degC"),
    ("DEGF", "degF"),
    ("DegF", "degF"),
    ("DEGC", "degC"),
    ("DegC", "degC"),
    // Temperature difference
    ("DELTA DEG F", "delta_degF"),
    ("DETLA Deg F", "delta_degF"),
    ("DETLA deg F", "delta_degF"),
    ("DETLA DEG C", "delta_degC"),
    ("DETLA Deg C", "delta_degC"),
    ("DELTA deg C", "delta_degC"),
    ("DELTA DEGF", "delta_degF"),
    ("DELTA DegF", "delta_degF"),
    ("DELTA degF", "delta_degF"),
    ("DELTA DEGC", "delta_degC"),
    ("DELTA DegC", "delta_degC"),
    ("DELTA degC", "delta_degC"),
    ("Delta DEG F", "delta_degF"),
    ("Delta Deg F", "delta_degF"),
    ("Delta deg F", "delta_degF"),
    ("Delta DEG C", "delta_degC"),
    ("Delta Deg C", "delta_degC"),
    ("Delta deg C", "delta_degC"),
    ("Delta DEGF", "delta_degF"),
    ("Delta DegF", "delta_degF"),
    ("Delta degF", "delta_degF"),
    ("Delta DEGC", "delta_degC"),
    ("Delta DegC", "delta_degC"),
    ("Delta degC", "delta_degC"),
    ("delta DEG F", "delta_degF"),
    ("delta Deg F", "delta_degF"),
    ("delta deg F", "delta_degF"),
    ("delta DEG C", "delta_degC"),
    ("delta Deg C", "delta_degC"),
    ("delta deg C", "delta_degC"),
    ("delta DEGF", "delta_degF"),
    ("delta DegF", "delta_degF"),
    ("delta degF", "delta_degF"),
    ("delta DEGC", "delta_degC"),
    ("delta DegC", "delta_degC"),
    ("delta degC", "delta_degC"),
    // Energy
    ("MBTU", "kbtu"),
    // Mass
    ("MLB", "klb"),
    ("K LB", "klb"),
    ("K LBS", "klb"),
    ("lb.", "lb"),
    // Mass flow
    ("TPH", "ton/hr"),
    ("tph", "ton/hr"),
    ("KLB/HR", "klb/hr"),
    ("KPPH", "klb/hr"),
    // Current
    ("AMP", "amp"),
    ("AMPS", "amp"),
    ("Amps", "amp"),
    ("Amp", "amp"),
    ("AMP AC", "amp"),
    // pH
    ("PH", "pH"),
    // Volt-amp reactive
    ("VARS", "VAR"),
    ("MVARS", "MVAR"),
];

/// Gauge pressure units and the absolute unit they are measured in.
pub const GAUGE_PRESSURES: &[(&str, &str)] = &[("psig", "psi")];

/// Units that are passed through without conversion.
pub const IGNORE_UNITS: &[&str] = &[
    "percent",
    "ppm",
    "ppb",
    "pH",
    "VAR",
    "MVAR",
    "H2O",
    "percent open",
    "percent closed",
];

fn table_lookup<'a>(table: &'a [(&'a str, &'a str)], key: &str) -> Option<&'a str> {
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Caller overrides layered on top of the built-in tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Source-unit spellings mapped to registry strings; consulted before
    /// [`UNIT_ALIASES`].
    pub unit_string_map: HashMap<String, String>,
    /// Extra pass-through units.
    pub ignore_units: Vec<String>,
    /// Gauge unit → absolute unit; consulted before [`GAUGE_PRESSURES`].
    pub gauge_pressures: HashMap<String, String>,
    /// Atmospheric pressure in atm added to gauge readings.
    pub atm: f64,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            unit_string_map: HashMap::new(),
            ignore_units: Vec::new(),
            gauge_pressures: HashMap::new(),
            atm: 1.0,
        }
    }
}

impl NormalizerConfig {
    /// Read a config from a JSON file; missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading normalizer config {}", path.display()))?;
        serde_json::from_str(&text).context("parsing normalizer config")
    }
}

// ---------------------------------------------------------------------------
// Magnitudes
// ---------------------------------------------------------------------------

/// Something whose numbers can be converted elementwise: a scalar or a
/// column.
pub trait Magnitude {
    fn map_values<F: Fn(f64) -> f64>(self, f: F) -> Self;
}

impl Magnitude for f64 {
    fn map_values<F: Fn(f64) -> f64>(self, f: F) -> Self {
        f(self)
    }
}

impl Magnitude for Vec<f64> {
    fn map_values<F: Fn(f64) -> f64>(mut self, f: F) -> Self {
        for v in &mut self {
            *v = f(*v);
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

/// What to convert to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Target<'a> {
    /// A specific unit expression.
    Unit(&'a str),
    /// The base units of a unit system.
    System(UnitSystem),
    /// The base units of the default (mks) system.
    Base,
}

/// A converted magnitude and the unit string it is now expressed in.
#[derive(Debug, Clone, PartialEq)]
pub struct Converted<M> {
    pub value: M,
    pub units: String,
}

/// Converts values given in free-form plant unit strings.
#[derive(Debug, Clone, Default)]
pub struct UnitNormalizer {
    config: NormalizerConfig,
}

impl UnitNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Map a source unit string through the caller map, then the built-in
    /// aliases.
    pub fn resolve_alias(&self, unit: &str) -> String {
        if let Some(mapped) = self.config.unit_string_map.get(unit) {
            return mapped.clone();
        }
        table_lookup(UNIT_ALIASES, unit).unwrap_or(unit).to_string()
    }

    /// The absolute-pressure unit for a gauge unit, if `unit` is one.
    pub fn gauge_absolute(&self, unit: &str) -> Option<String> {
        self.config
            .gauge_pressures
            .get(unit)
            .cloned()
            .or_else(|| table_lookup(GAUGE_PRESSURES, unit).map(str::to_string))
    }

    pub fn is_ignored(&self, unit: &str) -> bool {
        IGNORE_UNITS.contains(&unit) || self.config.ignore_units.iter().any(|u| u == unit)
    }

    /// Convert `value` from the plant unit string `from` to `target`.
    ///
    /// An unrecognized source unit is not an error: the value comes back
    /// unchanged, labelled with the resolved unit string, and an
    /// [`Issue::UndefinedUnit`] is attached. Errors are reserved for a bad
    /// explicit target.
    pub fn convert<M: Magnitude>(
        &self,
        value: M,
        from: &str,
        target: Target<'_>,
    ) -> Result<Outcome<Converted<M>>, UnitError> {
        let mut resolved = self.resolve_alias(from);
        let gauge = match self.gauge_absolute(&resolved) {
            Some(absolute) => {
                resolved = absolute;
                true
            }
            None => false,
        };

        if self.is_ignored(&resolved) {
            return Ok(Outcome::clean(Converted {
                value,
                units: resolved,
            }));
        }

        let source = match parse_unit(&resolved) {
            Ok(unit) => unit,
            Err(err) => {
                log::debug!("source unit '{resolved}' rejected: {err}");
                return Ok(Outcome::with_issue(
                    Converted {
                        value,
                        units: resolved.clone(),
                    },
                    Issue::UndefinedUnit { unit: resolved },
                ));
            }
        };

        let dest = match target {
            Target::Unit(s) => parse_unit(s)?,
            Target::System(system) => system.base_unit(source.dimension()),
            Target::Base => UnitSystem::default().base_unit(source.dimension()),
        };
        if source.dimension() != dest.dimension() {
            return Err(UnitError::Incompatible {
                from: resolved,
                to: dest.to_string(),
            });
        }

        let atm_offset = if gauge {
            self.atmospheric_offset(&dest)?
        } else {
            0.0
        };

        let converted = value.map_values(|x| dest.from_si(source.to_si(x)) + atm_offset);
        Ok(Outcome::clean(Converted {
            value: converted,
            units: dest.to_string(),
        }))
    }

    /// The configured atmospheric pressure expressed in `dest`.
    fn atmospheric_offset(&self, dest: &Unit) -> Result<f64, UnitError> {
        if dest.dimension() != PRESSURE {
            return Err(UnitError::Incompatible {
                from: "atmosphere".to_string(),
                to: dest.to_string(),
            });
        }
        let atm = parse_unit("atm")?;
        registry::convert(self.config.atm, &atm, dest)
    }
}
