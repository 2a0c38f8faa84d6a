use std::f64::consts::PI;
use std::fmt;

use super::UnitError;

// ---------------------------------------------------------------------------
// Dimension – exponents over the base quantities
// ---------------------------------------------------------------------------

/// Number of base quantities tracked by [`Dimension`].
pub const BASE_QUANTITIES: usize = 8;

/// Names of the base quantities, in [`Dimension`] axis order.
pub const BASE_QUANTITY_NAMES: [&str; BASE_QUANTITIES] = [
    "length",
    "mass",
    "time",
    "current",
    "temperature",
    "substance",
    "luminosity",
    "angle",
];

/// Exponents of length, mass, time, current, temperature, amount of
/// substance, luminous intensity and plane angle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Dimension(pub [i32; BASE_QUANTITIES]);

impl Dimension {
    pub const NONE: Dimension = Dimension([0; BASE_QUANTITIES]);

    pub fn is_dimensionless(&self) -> bool {
        *self == Dimension::NONE
    }

    fn scaled(self, n: i32) -> Dimension {
        let mut out = self.0;
        for e in &mut out {
            *e = e.saturating_mul(n);
        }
        Dimension(out)
    }

    fn plus(self, other: Dimension) -> Dimension {
        let mut out = self.0;
        for (e, o) in out.iter_mut().zip(other.0) {
            *e = e.saturating_add(o);
        }
        Dimension(out)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_dimensionless() {
            return write!(f, "dimensionless");
        }
        let parts: Vec<String> = self
            .0
            .iter()
            .zip(BASE_QUANTITY_NAMES)
            .filter(|(e, _)| **e != 0)
            .map(|(e, name)| {
                if *e == 1 {
                    format!("[{name}]")
                } else {
                    format!("[{name}] ** {e}")
                }
            })
            .collect();
        write!(f, "{}", parts.join(" * "))
    }
}

const fn dim(l: i32, m: i32, t: i32, i: i32, th: i32, n: i32, j: i32, a: i32) -> Dimension {
    Dimension([l, m, t, i, th, n, j, a])
}

const LENGTH: Dimension = dim(1, 0, 0, 0, 0, 0, 0, 0);
const AREA: Dimension = dim(2, 0, 0, 0, 0, 0, 0, 0);
const VOLUME: Dimension = dim(3, 0, 0, 0, 0, 0, 0, 0);
const MASS: Dimension = dim(0, 1, 0, 0, 0, 0, 0, 0);
const TIME: Dimension = dim(0, 0, 1, 0, 0, 0, 0, 0);
const CURRENT: Dimension = dim(0, 0, 0, 1, 0, 0, 0, 0);
const TEMPERATURE: Dimension = dim(0, 0, 0, 0, 1, 0, 0, 0);
const SUBSTANCE: Dimension = dim(0, 0, 0, 0, 0, 1, 0, 0);
const LUMINOSITY: Dimension = dim(0, 0, 0, 0, 0, 0, 1, 0);
const ANGLE: Dimension = dim(0, 0, 0, 0, 0, 0, 0, 1);
const FREQUENCY: Dimension = dim(0, 0, -1, 0, 0, 0, 0, 0);
const ANGULAR_SPEED: Dimension = dim(0, 0, -1, 0, 0, 0, 0, 1);
const SPEED: Dimension = dim(1, 0, -1, 0, 0, 0, 0, 0);
const FORCE: Dimension = dim(1, 1, -2, 0, 0, 0, 0, 0);
pub(crate) const PRESSURE: Dimension = dim(-1, 1, -2, 0, 0, 0, 0, 0);
const ENERGY: Dimension = dim(2, 1, -2, 0, 0, 0, 0, 0);
const POWER: Dimension = dim(2, 1, -3, 0, 0, 0, 0, 0);
const VOLTAGE: Dimension = dim(2, 1, -3, -1, 0, 0, 0, 0);
const RESISTANCE: Dimension = dim(2, 1, -3, -2, 0, 0, 0, 0);

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

/// A named unit: `value_si = value * factor + offset`.
#[derive(Debug)]
struct UnitDef {
    name: &'static str,
    aliases: &'static [&'static str],
    factor: f64,
    offset: f64,
    dim: Dimension,
    prefixable: bool,
}

const fn unit(
    name: &'static str,
    aliases: &'static [&'static str],
    factor: f64,
    dim: Dimension,
    prefixable: bool,
) -> UnitDef {
    UnitDef {
        name,
        aliases,
        factor,
        offset: 0.0,
        dim,
        prefixable,
    }
}

const fn offset_unit(
    name: &'static str,
    aliases: &'static [&'static str],
    factor: f64,
    offset: f64,
) -> UnitDef {
    UnitDef {
        name,
        aliases,
        factor,
        offset,
        dim: TEMPERATURE,
        prefixable: false,
    }
}

const STANDARD_GRAVITY: f64 = 9.80665;
const INCH: f64 = 0.0254;
const POUND: f64 = 0.45359237;

static DEFINITIONS: &[UnitDef] = &[
    // Length
    unit("meter", &["m", "metre"], 1.0, LENGTH, true),
    unit("inch", &["in", "inches"], INCH, LENGTH, true),
    unit("foot", &["ft", "feet"], 0.3048, LENGTH, false),
    unit("yard", &["yd"], 0.9144, LENGTH, false),
    unit("mile", &["mi"], 1609.344, LENGTH, false),
    // Area / volume
    unit("hectare", &["ha"], 1.0e4, AREA, false),
    unit("liter", &["L", "l", "litre"], 1.0e-3, VOLUME, true),
    unit("gallon", &["gal"], 3.785411784e-3, VOLUME, true),
    unit("barrel", &["bbl"], 0.158987294928, VOLUME, false),
    // Mass
    unit("gram", &["g"], 1.0e-3, MASS, true),
    unit("pound", &["lb", "lbs", "lbm"], POUND, MASS, true),
    unit("ton", &["short_ton"], 2000.0 * POUND, MASS, false),
    unit("tonne", &["t", "metric_ton"], 1000.0, MASS, false),
    // Time
    unit("second", &["s", "sec"], 1.0, TIME, true),
    unit("minute", &["min"], 60.0, TIME, true),
    unit("hour", &["hr", "h"], 3600.0, TIME, false),
    unit("day", &["d"], 86400.0, TIME, false),
    // Current
    unit("ampere", &["A", "amp", "amps"], 1.0, CURRENT, true),
    // Temperature
    unit("kelvin", &["K"], 1.0, TEMPERATURE, true),
    offset_unit("degree_Celsius", &["degC", "celsius"], 1.0, 273.15),
    offset_unit(
        "degree_Fahrenheit",
        &["degF", "fahrenheit"],
        5.0 / 9.0,
        459.67 * 5.0 / 9.0,
    ),
    unit("degree_Rankine", &["degR", "rankine"], 5.0 / 9.0, TEMPERATURE, false),
    unit("delta_degree_Celsius", &["delta_degC"], 1.0, TEMPERATURE, false),
    unit("delta_degree_Fahrenheit", &["delta_degF"], 5.0 / 9.0, TEMPERATURE, false),
    // Substance / luminosity
    unit("mole", &["mol"], 1.0, SUBSTANCE, true),
    unit("candela", &["cd"], 1.0, LUMINOSITY, true),
    // Angle
    unit("radian", &["rad"], 1.0, ANGLE, true),
    unit("degree", &["deg"], PI / 180.0, ANGLE, false),
    unit("revolution", &["rev", "turn"], 2.0 * PI, ANGLE, false),
    unit("revolutions_per_minute", &["rpm"], 2.0 * PI / 60.0, ANGULAR_SPEED, false),
    // Frequency / speed
    unit("hertz", &["Hz", "hz"], 1.0, FREQUENCY, true),
    unit("mile_per_hour", &["mph"], 1609.344 / 3600.0, SPEED, false),
    unit("knot", &["kt"], 1852.0 / 3600.0, SPEED, false),
    // Force
    unit("newton", &["N"], 1.0, FORCE, true),
    unit("pound_force", &["lbf"], POUND * STANDARD_GRAVITY, FORCE, true),
    // Pressure
    unit("pascal", &["Pa"], 1.0, PRESSURE, true),
    unit("bar", &[], 1.0e5, PRESSURE, true),
    unit("atmosphere", &["atm"], 101_325.0, PRESSURE, false),
    unit(
        "pound_force_per_square_inch",
        &["psi"],
        POUND * STANDARD_GRAVITY / (INCH * INCH),
        PRESSURE,
        true,
    ),
    unit(
        "inch_H2O_39F",
        &["in water", "inH2O", "inch_H2O"],
        INCH * 999.972 * STANDARD_GRAVITY,
        PRESSURE,
        false,
    ),
    unit(
        "inch_Hg",
        &["in hg", "inHg"],
        INCH * 13_595.1 * STANDARD_GRAVITY,
        PRESSURE,
        false,
    ),
    unit("millimeter_Hg", &["mmHg"], 133.322387415, PRESSURE, false),
    unit("torr", &["Torr"], 101_325.0 / 760.0, PRESSURE, false),
    // Energy / power
    unit("joule", &["J"], 1.0, ENERGY, true),
    unit("calorie", &["cal"], 4.184, ENERGY, true),
    unit("british_thermal_unit", &["btu", "Btu", "BTU"], 1055.05585262, ENERGY, true),
    unit("watt_hour", &["Wh"], 3600.0, ENERGY, true),
    unit("watt", &["W"], 1.0, POWER, true),
    unit("horsepower", &["hp"], 745.69987158227022, POWER, false),
    // Electrical
    unit("volt", &["V"], 1.0, VOLTAGE, true),
    unit("ohm", &["Ω"], 1.0, RESISTANCE, true),
    // Dimensionless
    unit("percent", &["%"], 0.01, Dimension::NONE, false),
    unit("parts_per_million", &["ppm"], 1.0e-6, Dimension::NONE, false),
    unit("parts_per_billion", &["ppb"], 1.0e-9, Dimension::NONE, false),
];

struct Prefix {
    name: &'static str,
    symbols: &'static [&'static str],
    factor: f64,
}

static PREFIXES: &[Prefix] = &[
    Prefix { name: "yotta", symbols: &["Y"], factor: 1e24 },
    Prefix { name: "zetta", symbols: &["Z"], factor: 1e21 },
    Prefix { name: "exa", symbols: &["E"], factor: 1e18 },
    Prefix { name: "peta", symbols: &["P"], factor: 1e15 },
    Prefix { name: "tera", symbols: &["T"], factor: 1e12 },
    Prefix { name: "giga", symbols: &["G"], factor: 1e9 },
    Prefix { name: "mega", symbols: &["M"], factor: 1e6 },
    Prefix { name: "kilo", symbols: &["k"], factor: 1e3 },
    Prefix { name: "hecto", symbols: &["h"], factor: 1e2 },
    Prefix { name: "deca", symbols: &["da"], factor: 1e1 },
    Prefix { name: "deci", symbols: &["d"], factor: 1e-1 },
    Prefix { name: "centi", symbols: &["c"], factor: 1e-2 },
    Prefix { name: "milli", symbols: &["m"], factor: 1e-3 },
    Prefix { name: "micro", symbols: &["u", "µ"], factor: 1e-6 },
    Prefix { name: "nano", symbols: &["n"], factor: 1e-9 },
    Prefix { name: "pico", symbols: &["p"], factor: 1e-12 },
    Prefix { name: "femto", symbols: &["f"], factor: 1e-15 },
    Prefix { name: "atto", symbols: &["a"], factor: 1e-18 },
];

fn find_definition(name: &str) -> Option<&'static UnitDef> {
    DEFINITIONS
        .iter()
        .find(|d| d.name == name || d.aliases.contains(&name))
}

/// Look up a single (possibly prefixed) unit name.
fn lookup(name: &str) -> Option<Term> {
    if let Some(def) = find_definition(name) {
        return Some(Term::from_def(def, None));
    }
    for prefix in PREFIXES {
        let candidates = std::iter::once(prefix.name).chain(prefix.symbols.iter().copied());
        for p in candidates {
            let Some(rest) = name.strip_prefix(p) else {
                continue;
            };
            if rest.is_empty() {
                continue;
            }
            if let Some(def) = find_definition(rest).filter(|d| d.prefixable) {
                return Some(Term::from_def(def, Some(prefix)));
            }
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Term / Unit
// ---------------------------------------------------------------------------

/// Largest exponent magnitude a term may reach while parsing.
pub const MAX_EXPONENT: i32 = 1024;

/// One named factor of a unit expression, raised to an integer power.
#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    name: String,
    factor: f64,
    offset: f64,
    dim: Dimension,
    exponent: i32,
}

impl Term {
    fn from_def(def: &UnitDef, prefix: Option<&Prefix>) -> Term {
        let (name, scale) = match prefix {
            Some(p) => (format!("{}{}", p.name, def.name), p.factor),
            None => (def.name.to_string(), 1.0),
        };
        Term {
            name,
            factor: def.factor * scale,
            offset: def.offset,
            dim: def.dim,
            exponent: 1,
        }
    }

    /// A base unit of some unit system.
    pub(crate) fn base(name: &str, factor: f64, dim: Dimension, exponent: i32) -> Term {
        Term {
            name: name.to_string(),
            factor,
            offset: 0.0,
            dim,
            exponent,
        }
    }
}

fn bounded(e: i32) -> Option<i32> {
    (e.abs() <= MAX_EXPONENT).then_some(e)
}

/// A parsed unit expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    scale: f64,
    terms: Vec<Term>,
}

impl Unit {
    pub fn dimensionless() -> Unit {
        Unit {
            scale: 1.0,
            terms: Vec::new(),
        }
    }

    /// Terms must have distinct names.
    pub(crate) fn from_terms(mut terms: Vec<Term>) -> Unit {
        terms.retain(|t| t.exponent != 0);
        Unit { scale: 1.0, terms }
    }

    /// `None` once an exponent leaves `±MAX_EXPONENT`.
    fn push(&mut self, term: Term) -> Option<()> {
        if let Some(existing) = self.terms.iter_mut().find(|t| t.name == term.name) {
            existing.exponent = bounded(existing.exponent.checked_add(term.exponent)?)?;
        } else {
            bounded(term.exponent)?;
            self.terms.push(term);
        }
        self.terms.retain(|t| t.exponent != 0);
        Some(())
    }

    fn mul(mut self, other: Unit) -> Option<Unit> {
        self.scale *= other.scale;
        for t in other.terms {
            self.push(t)?;
        }
        Some(self)
    }

    fn powi(mut self, n: i32) -> Option<Unit> {
        self.scale = self.scale.powi(n);
        for t in &mut self.terms {
            t.exponent = bounded(t.exponent.checked_mul(n)?)?;
        }
        self.terms.retain(|t| t.exponent != 0);
        Some(self)
    }

    /// Multiplier from this unit to the coherent SI unit of its dimension.
    pub fn factor(&self) -> f64 {
        self.terms
            .iter()
            .fold(self.scale, |acc, t| acc * t.factor.powi(t.exponent))
    }

    /// Additive offset to SI; non-zero only for a lone offset unit such as
    /// `degC`.
    pub fn offset(&self) -> f64 {
        match self.terms.as_slice() {
            [t] if t.exponent == 1 && self.scale == 1.0 => t.offset,
            _ => 0.0,
        }
    }

    pub fn dimension(&self) -> Dimension {
        self.terms
            .iter()
            .fold(Dimension::NONE, |acc, t| acc.plus(t.dim.scaled(t.exponent)))
    }

    fn has_misplaced_offset(&self) -> bool {
        let offset_terms = self.terms.iter().filter(|t| t.offset != 0.0).count();
        offset_terms > 0
            && !(self.terms.len() == 1 && self.terms[0].exponent == 1 && self.scale == 1.0)
    }

    /// Convert a magnitude expressed in `self` into SI.
    pub fn to_si(&self, x: f64) -> f64 {
        x * self.factor() + self.offset()
    }

    /// Convert an SI magnitude into `self`.
    pub fn from_si(&self, x: f64) -> f64 {
        (x - self.offset()) / self.factor()
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn power(name: &str, e: i32) -> String {
            if e == 1 {
                name.to_string()
            } else {
                format!("{name} ** {e}")
            }
        }

        let num: Vec<String> = self
            .terms
            .iter()
            .filter(|t| t.exponent > 0)
            .map(|t| power(&t.name, t.exponent))
            .collect();
        let den: Vec<String> = self
            .terms
            .iter()
            .filter(|t| t.exponent < 0)
            .map(|t| power(&t.name, -t.exponent))
            .collect();

        if num.is_empty() && den.is_empty() {
            return if self.scale == 1.0 {
                write!(f, "dimensionless")
            } else {
                write!(f, "{}", self.scale)
            };
        }

        let mut out = String::new();
        if self.scale != 1.0 {
            out.push_str(&self.scale.to_string());
            if !num.is_empty() {
                out.push_str(" * ");
            }
        }
        if num.is_empty() {
            if self.scale == 1.0 {
                out.push('1');
            }
        } else {
            out.push_str(&num.join(" * "));
        }
        for d in den {
            out.push_str(" / ");
            out.push_str(&d);
        }
        write!(f, "{out}")
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Name(String),
    Number(f64),
    Mul,
    Div,
    Pow,
    Minus,
    LParen,
    RParen,
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '%' || c == 'µ' || c == 'Ω'
}

fn tokenize(input: &str) -> Result<Vec<Token>, UnitError> {
    let syntax = |reason: String| UnitError::Syntax {
        input: input.to_string(),
        reason,
    };
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            _ if c.is_whitespace() => i += 1,
            '*' if chars.get(i + 1) == Some(&'*') => {
                tokens.push(Token::Pow);
                i += 2;
            }
            '*' | '·' => {
                tokens.push(Token::Mul);
                i += 1;
            }
            '^' => {
                tokens.push(Token::Pow);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Div);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            _ if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                // Exponent part, only when followed by a digit (so "2e" is
                // not swallowed).
                if i + 1 < chars.len()
                    && (chars[i] == 'e' || chars[i] == 'E')
                    && (chars[i + 1].is_ascii_digit()
                        || (matches!(chars[i + 1], '+' | '-')
                            && chars.get(i + 2).is_some_and(|d| d.is_ascii_digit())))
                {
                    i += 2;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| syntax(format!("'{text}' is not a number")))?;
                tokens.push(Token::Number(value));
            }
            _ if is_name_start(c) => {
                let start = i;
                i += 1;
                if c != '%' {
                    while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                        i += 1;
                    }
                }
                tokens.push(Token::Name(chars[start..i].iter().collect()));
            }
            other => return Err(syntax(format!("unexpected character '{other}'"))),
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn syntax(&self, reason: impl Into<String>) -> UnitError {
        UnitError::Syntax {
            input: self.input.to_string(),
            reason: reason.into(),
        }
    }

    fn checked(&self, unit: Option<Unit>) -> Result<Unit, UnitError> {
        unit.ok_or_else(|| self.syntax("exponent out of range"))
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    // product := power (('*' | '/' | <juxtaposition>) power)*
    fn product(&mut self) -> Result<Unit, UnitError> {
        let mut acc = self.power()?;
        loop {
            match self.peek() {
                Some(Token::Mul) => {
                    self.pos += 1;
                    let rhs = self.power()?;
                    acc = self.checked(acc.mul(rhs))?;
                }
                Some(Token::Div) => {
                    self.pos += 1;
                    let rhs = self.power()?;
                    let inverse = self.checked(rhs.powi(-1))?;
                    acc = self.checked(acc.mul(inverse))?;
                }
                Some(Token::Name(_) | Token::Number(_) | Token::LParen) => {
                    let rhs = self.power()?;
                    acc = self.checked(acc.mul(rhs))?;
                }
                _ => return Ok(acc),
            }
        }
    }

    // power := atom (('**' | '^') '-'? integer)?
    fn power(&mut self) -> Result<Unit, UnitError> {
        let base = self.atom()?;
        if self.peek() != Some(&Token::Pow) {
            return Ok(base);
        }
        self.pos += 1;
        let negative = if self.peek() == Some(&Token::Minus) {
            self.pos += 1;
            true
        } else {
            false
        };
        match self.next() {
            Some(Token::Number(n)) if n.fract() == 0.0 => {
                if n.abs() > MAX_EXPONENT as f64 {
                    return Err(self.syntax("exponent out of range"));
                }
                let n = n as i32;
                self.checked(base.powi(if negative { -n } else { n }))
            }
            _ => Err(self.syntax("exponent must be an integer")),
        }
    }

    fn atom(&mut self) -> Result<Unit, UnitError> {
        match self.next() {
            Some(Token::Name(name)) => lookup(&name)
                .map(|t| Unit::from_terms(vec![t]))
                .ok_or(UnitError::Undefined(name)),
            Some(Token::Number(n)) => Ok(Unit {
                scale: n,
                terms: Vec::new(),
            }),
            Some(Token::LParen) => {
                let inner = self.product()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(self.syntax("missing ')'")),
                }
            }
            Some(tok) => Err(self.syntax(format!("unexpected {tok:?}"))),
            None => Err(self.syntax("unexpected end of expression")),
        }
    }
}

/// Parse a unit expression such as `"ft^3/min"` or `"kg * m / s ** 2"`.
///
/// Whole-string registry names (including multi-word ones like
/// `"in water"`) are matched before the expression grammar. An empty string
/// is dimensionless.
pub fn parse_unit(input: &str) -> Result<Unit, UnitError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(Unit::dimensionless());
    }
    if let Some(term) = lookup(trimmed) {
        return Ok(Unit::from_terms(vec![term]));
    }

    let mut parser = Parser {
        input: trimmed,
        tokens: tokenize(trimmed)?,
        pos: 0,
    };
    let unit = parser.product()?;
    if parser.pos < parser.tokens.len() {
        return Err(parser.syntax("trailing input"));
    }
    if unit.has_misplaced_offset() {
        return Err(UnitError::OffsetInCompound(trimmed.to_string()));
    }
    Ok(unit)
}

/// Convert `x` from one unit to another of the same dimension.
pub fn convert(x: f64, from: &Unit, to: &Unit) -> Result<f64, UnitError> {
    if from.dimension() != to.dimension() {
        return Err(UnitError::Incompatible {
            from: from.to_string(),
            to: to.to_string(),
        });
    }
    Ok(to.from_si(from.to_si(x)))
}
