//! Physical quantities and their resolution onto the simulation grid.
//!
//! Device geometry is specified in physical units (e.g. a 200 nm waveguide on
//! a 50 nm grid). Every such feature must land exactly on the grid before
//! rasterisation, so [`resolve`] converts a [`Quantity`] into an integer
//! number of grid cells and refuses values that are not an integral multiple
//! of the resolution.

use std::fmt;
use std::ops::{Div, Mul, Neg};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Quantisation tolerance, as a fraction of one resolution unit.
pub const RESOLUTION_TOLERANCE: f64 = 1e-4;

/// Errors from unit handling and grid resolution.
#[derive(Debug, Error, PartialEq)]
pub enum UnitsError {
    #[error("Cannot neatly resolve quantity ({value}) at given resolution ({resolution})")]
    Resolution { value: Quantity, resolution: Quantity },

    #[error("Incompatible unit dimensions: {lhs:?} and {rhs:?}")]
    IncompatibleDimensions { lhs: Dimension, rhs: Dimension },
}

/// The physical dimension of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dimension {
    Length,
    Frequency,
}

/// Supported units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    #[serde(rename = "nm")]
    Nanometre,
    #[serde(rename = "um")]
    Micrometre,
    #[serde(rename = "m")]
    Metre,
    #[serde(rename = "Hz")]
    Hertz,
    #[serde(rename = "THz")]
    Terahertz,
}

impl Unit {
    pub fn dimension(self) -> Dimension {
        match self {
            Unit::Nanometre | Unit::Micrometre | Unit::Metre => Dimension::Length,
            Unit::Hertz | Unit::Terahertz => Dimension::Frequency,
        }
    }

    /// Multiplier converting a value in this unit to SI.
    pub fn si_scale(self) -> f64 {
        match self {
            Unit::Nanometre => 1e-9,
            Unit::Micrometre => 1e-6,
            Unit::Metre => 1.0,
            Unit::Hertz => 1.0,
            Unit::Terahertz => 1e12,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Unit::Nanometre => "nm",
            Unit::Micrometre => "um",
            Unit::Metre => "m",
            Unit::Hertz => "Hz",
            Unit::Terahertz => "THz",
        }
    }
}

/// A scalar value carrying a unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub value: f64,
    pub unit: Unit,
}

impl Quantity {
    pub fn new(value: f64, unit: Unit) -> Self {
        Self { value, unit }
    }

    pub fn nm(value: f64) -> Self {
        Self::new(value, Unit::Nanometre)
    }

    pub fn um(value: f64) -> Self {
        Self::new(value, Unit::Micrometre)
    }

    pub fn m(value: f64) -> Self {
        Self::new(value, Unit::Metre)
    }

    pub fn dimension(&self) -> Dimension {
        self.unit.dimension()
    }

    /// Value in SI units (metres or hertz).
    pub fn to_si(&self) -> f64 {
        self.value * self.unit.si_scale()
    }

    /// Value expressed in another unit of the same dimension.
    pub fn to_value(&self, unit: Unit) -> Result<f64, UnitsError> {
        check_compatible(self, &Quantity::new(1.0, unit))?;
        Ok(self.to_si() / unit.si_scale())
    }

    /// Dimensionless ratio `self / other`.
    pub fn ratio(&self, other: &Quantity) -> Result<f64, UnitsError> {
        check_compatible(self, other)?;
        Ok(self.to_si() / other.to_si())
    }

    /// Checked addition across units of the same dimension. The result keeps
    /// the unit of `self`.
    pub fn checked_add(&self, other: &Quantity) -> Result<Quantity, UnitsError> {
        let rhs = other.to_value(self.unit)?;
        Ok(Quantity::new(self.value + rhs, self.unit))
    }

    /// Checked subtraction across units of the same dimension.
    pub fn checked_sub(&self, other: &Quantity) -> Result<Quantity, UnitsError> {
        let rhs = other.to_value(self.unit)?;
        Ok(Quantity::new(self.value - rhs, self.unit))
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit.symbol())
    }
}

impl Mul<f64> for Quantity {
    type Output = Quantity;

    fn mul(self, rhs: f64) -> Quantity {
        Quantity::new(self.value * rhs, self.unit)
    }
}

impl Mul<Quantity> for f64 {
    type Output = Quantity;

    fn mul(self, rhs: Quantity) -> Quantity {
        rhs * self
    }
}

impl Div<f64> for Quantity {
    type Output = Quantity;

    fn div(self, rhs: f64) -> Quantity {
        Quantity::new(self.value / rhs, self.unit)
    }
}

impl Neg for Quantity {
    type Output = Quantity;

    fn neg(self) -> Quantity {
        Quantity::new(-self.value, self.unit)
    }
}

fn check_compatible(v: &Quantity, resolution: &Quantity) -> Result<(), UnitsError> {
    if v.dimension() != resolution.dimension() {
        return Err(UnitsError::IncompatibleDimensions {
            lhs: v.dimension(),
            rhs: resolution.dimension(),
        });
    }
    Ok(())
}

/// Resolve `v` to an integer number of grid units at `resolution`.
///
/// `v` resolves to the integer `q` if it lies within
/// `RESOLUTION_TOLERANCE * resolution` of `q * resolution`.
///
/// # Errors
/// * [`UnitsError::Resolution`] if `v` is not an integral multiple of `resolution`.
/// * [`UnitsError::IncompatibleDimensions`] if the two quantities differ in dimension.
pub fn resolve(v: Quantity, resolution: Quantity) -> Result<i64, UnitsError> {
    resolve_with_tolerance(v, resolution, RESOLUTION_TOLERANCE)
}

/// [`resolve`] with an explicit tolerance.
pub fn resolve_with_tolerance(
    v: Quantity,
    resolution: Quantity,
    tolerance: f64,
) -> Result<i64, UnitsError> {
    resolve_or_none(v, resolution, tolerance)?
        .ok_or(UnitsError::Resolution { value: v, resolution })
}

/// Resolve `v`, returning `Ok(None)` when it does not fall on the grid.
pub fn resolve_or_none(
    v: Quantity,
    resolution: Quantity,
    tolerance: f64,
) -> Result<Option<i64>, UnitsError> {
    let count = v.ratio(&resolution)?;
    let rounded = count.round();
    if (count - rounded).abs() < tolerance {
        Ok(Some(rounded as i64))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_exact_multiples() {
        let resolution = Quantity::nm(25.0);
        for k in -40..=40 {
            let v = Quantity::nm(25.0 * k as f64);
            assert_eq!(resolve(v, resolution), Ok(k));
        }
    }

    #[test]
    fn test_resolve_across_units() {
        assert_eq!(resolve(Quantity::um(1.0), Quantity::nm(50.0)), Ok(20));
        assert_eq!(resolve(Quantity::nm(750.0), Quantity::um(0.05)), Ok(15));
    }

    #[test]
    fn test_resolve_within_tolerance() {
        let resolution = Quantity::nm(50.0);
        // 1e-6 of a grid cell off: still resolves
        assert_eq!(resolve(Quantity::nm(200.0 + 50e-6), resolution), Ok(4));
    }

    #[test]
    fn test_resolve_rejects_off_grid() {
        let resolution = Quantity::nm(50.0);
        let err = resolve(Quantity::nm(210.0), resolution).unwrap_err();
        assert!(matches!(err, UnitsError::Resolution { .. }));
    }

    #[test]
    fn test_resolve_rejects_incompatible_dimensions() {
        let f = Quantity::new(200.0, Unit::Terahertz);
        let err = resolve(f, Quantity::nm(50.0)).unwrap_err();
        assert_eq!(
            err,
            UnitsError::IncompatibleDimensions {
                lhs: Dimension::Frequency,
                rhs: Dimension::Length,
            }
        );
    }

    #[test]
    fn test_quantity_arithmetic() {
        let a = Quantity::nm(750.0).checked_add(&Quantity::um(1.0)).unwrap();
        assert_eq!(a.unit, Unit::Nanometre);
        assert!((a.value - 1750.0).abs() < 1e-9);
        let b = Quantity::um(1.0).checked_sub(&Quantity::nm(250.0)).unwrap();
        assert_eq!(b.unit, Unit::Micrometre);
        assert!((b.value - 0.75).abs() < 1e-12);
        let half = Quantity::nm(200.0) / 2.0;
        assert_eq!(half, Quantity::nm(100.0));
        assert_eq!(2.0 * Quantity::nm(20.0), Quantity::nm(40.0));
        assert!(matches!(
            Quantity::nm(1.0).checked_add(&Quantity::new(1.0, Unit::Hertz)),
            Err(UnitsError::IncompatibleDimensions { .. })
        ));
        assert!(Quantity::nm(1.0).checked_sub(&Quantity::new(1.0, Unit::Hertz)).is_err());
    }
}
