//! Unit conversion table
//!
//! A fixed set of unit tokens grouped by physical dimension. Every unit is a
//! linear map onto its dimension's base unit (`base = value * scale + offset`),
//! so conversion is only ever defined between units of the same dimension.

use crate::health::types::DataType;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Physical dimension of a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Count,
    RatePerMinute,
    Mass,
    Length,
    Temperature,
    Pressure,
    Concentration,
    Percent,
    Energy,
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dimension::Count => write!(f, "count"),
            Dimension::RatePerMinute => write!(f, "rate-per-minute"),
            Dimension::Mass => write!(f, "mass"),
            Dimension::Length => write!(f, "length"),
            Dimension::Temperature => write!(f, "temperature"),
            Dimension::Pressure => write!(f, "pressure"),
            Dimension::Concentration => write!(f, "concentration"),
            Dimension::Percent => write!(f, "percent"),
            Dimension::Energy => write!(f, "energy"),
        }
    }
}

/// A concrete unit: canonical token, dimension and its mapping onto the base unit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitDescriptor {
    /// Canonical spelling used in output
    pub token: &'static str,
    pub dimension: Dimension,
    scale: f64,
    offset: f64,
}

impl UnitDescriptor {
    const fn linear(token: &'static str, dimension: Dimension, scale: f64) -> Self {
        Self {
            token,
            dimension,
            scale,
            offset: 0.0,
        }
    }

    fn to_base(&self, value: f64) -> f64 {
        value * self.scale + self.offset
    }

    fn from_base(&self, value: f64) -> f64 {
        (value - self.offset) / self.scale
    }
}

impl std::fmt::Display for UnitDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token)
    }
}

pub const COUNT: UnitDescriptor = UnitDescriptor::linear("count", Dimension::Count, 1.0);

pub const BEATS_PER_MINUTE: UnitDescriptor =
    UnitDescriptor::linear("count/min", Dimension::RatePerMinute, 1.0);

pub const KILOGRAM: UnitDescriptor = UnitDescriptor::linear("kg", Dimension::Mass, 1.0);
pub const GRAM: UnitDescriptor = UnitDescriptor::linear("g", Dimension::Mass, 0.001);
pub const POUND: UnitDescriptor = UnitDescriptor::linear("lb", Dimension::Mass, 0.453_592_37);

pub const METER: UnitDescriptor = UnitDescriptor::linear("m", Dimension::Length, 1.0);
pub const CENTIMETER: UnitDescriptor = UnitDescriptor::linear("cm", Dimension::Length, 0.01);
pub const KILOMETER: UnitDescriptor = UnitDescriptor::linear("km", Dimension::Length, 1000.0);
pub const FOOT: UnitDescriptor = UnitDescriptor::linear("ft", Dimension::Length, 0.3048);
pub const INCH: UnitDescriptor = UnitDescriptor::linear("in", Dimension::Length, 0.0254);
pub const MILE: UnitDescriptor = UnitDescriptor::linear("mi", Dimension::Length, 1609.344);

pub const CELSIUS: UnitDescriptor = UnitDescriptor::linear("degC", Dimension::Temperature, 1.0);
pub const FAHRENHEIT: UnitDescriptor = UnitDescriptor {
    token: "degF",
    dimension: Dimension::Temperature,
    scale: 5.0 / 9.0,
    offset: -160.0 / 9.0,
};

pub const MILLIMETER_OF_MERCURY: UnitDescriptor =
    UnitDescriptor::linear("mmHg", Dimension::Pressure, 1.0);

pub const MILLIGRAMS_PER_DECILITER: UnitDescriptor =
    UnitDescriptor::linear("mg/dL", Dimension::Concentration, 1.0);
/// Blood glucose molar mass is 180.15588 g/mol
pub const MILLIMOLES_PER_LITER: UnitDescriptor =
    UnitDescriptor::linear("mmol/L", Dimension::Concentration, 18.015_588);

pub const PERCENT: UnitDescriptor = UnitDescriptor::linear("%", Dimension::Percent, 1.0);

pub const KILOCALORIE: UnitDescriptor = UnitDescriptor::linear("kcal", Dimension::Energy, 1.0);
pub const CALORIE: UnitDescriptor = UnitDescriptor::linear("cal", Dimension::Energy, 0.001);

/// Every unit in the table, grouped by dimension
pub const ALL_UNITS: &[UnitDescriptor] = &[
    COUNT,
    BEATS_PER_MINUTE,
    KILOGRAM,
    GRAM,
    POUND,
    METER,
    CENTIMETER,
    KILOMETER,
    FOOT,
    INCH,
    MILE,
    CELSIUS,
    FAHRENHEIT,
    MILLIMETER_OF_MERCURY,
    MILLIGRAMS_PER_DECILITER,
    MILLIMOLES_PER_LITER,
    PERCENT,
    KILOCALORIE,
    CALORIE,
];

/// Accepted spellings, matched case-insensitively
const TOKENS: &[(&str, UnitDescriptor)] = &[
    ("count", COUNT),
    ("count/min", BEATS_PER_MINUTE),
    ("bpm", BEATS_PER_MINUTE),
    ("kg", KILOGRAM),
    ("g", GRAM),
    ("lb", POUND),
    ("lbs", POUND),
    ("m", METER),
    ("cm", CENTIMETER),
    ("km", KILOMETER),
    ("ft", FOOT),
    ("in", INCH),
    ("mi", MILE),
    ("c", CELSIUS),
    ("celsius", CELSIUS),
    ("degc", CELSIUS),
    ("f", FAHRENHEIT),
    ("fahrenheit", FAHRENHEIT),
    ("degf", FAHRENHEIT),
    ("mmhg", MILLIMETER_OF_MERCURY),
    ("mg/dl", MILLIGRAMS_PER_DECILITER),
    ("mmol/l", MILLIMOLES_PER_LITER),
    ("%", PERCENT),
    ("percent", PERCENT),
    ("kcal", KILOCALORIE),
    ("cal", CALORIE),
];

/// Unit lookup and conversion errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UnitError {
    /// Token not in the table, or not valid for the data type's dimension
    #[error("unknown unit '{token}' for {data_type}")]
    UnknownUnit { token: String, data_type: String },

    /// The data type has no measurement unit at all
    #[error("{0} has no measurement unit")]
    Unitless(String),

    /// Conversion requested across dimensions
    #[error("cannot convert {from} ({from_dimension}) to {to} ({to_dimension})")]
    DimensionMismatch {
        from: &'static str,
        from_dimension: Dimension,
        to: &'static str,
        to_dimension: Dimension,
    },
}

/// Look up a unit by any accepted spelling
pub fn lookup(token: &str) -> Option<UnitDescriptor> {
    let token = token.trim().to_lowercase();
    TOKENS
        .iter()
        .find(|(spelling, _)| *spelling == token)
        .map(|(_, unit)| *unit)
}

/// Resolve a unit token for a data type
///
/// The token must belong to the same dimension as the type's default unit.
pub fn unit_for(token: &str, data_type: &DataType) -> Result<UnitDescriptor, UnitError> {
    let default = data_type
        .default_unit
        .ok_or_else(|| UnitError::Unitless(data_type.id.to_string()))?;

    match lookup(token) {
        Some(unit) if unit.dimension == default.dimension => Ok(unit),
        _ => Err(UnitError::UnknownUnit {
            token: token.to_string(),
            data_type: data_type.id.to_string(),
        }),
    }
}

/// Resolve an optional override, falling back to the type's default unit
pub fn resolve(token: Option<&str>, data_type: &DataType) -> Result<UnitDescriptor, UnitError> {
    match token {
        Some(token) => unit_for(token, data_type),
        None => data_type
            .default_unit
            .ok_or_else(|| UnitError::Unitless(data_type.id.to_string())),
    }
}

/// Convert a value between two units of the same dimension
pub fn convert(value: f64, from: UnitDescriptor, to: UnitDescriptor) -> Result<f64, UnitError> {
    if from.dimension != to.dimension {
        return Err(UnitError::DimensionMismatch {
            from: from.token,
            from_dimension: from.dimension,
            to: to.token,
            to_dimension: to.dimension,
        });
    }
    if from == to {
        return Ok(value);
    }
    Ok(to.from_base(from.to_base(value)))
}

/// All units sharing a dimension
pub fn units_in(dimension: Dimension) -> impl Iterator<Item = UnitDescriptor> {
    ALL_UNITS
        .iter()
        .copied()
        .filter(move |unit| unit.dimension == dimension)
}
