//! Differentiable array primitives.
//!
//! Each primitive pairs a forward map with a hand-written vector-Jacobian
//! product. Gradients flow only through the design variable: the background
//! arrays and box coordinates are fixed parameters.

use ndarray::{s, Array2, ArrayView2};
use thiserror::Error;

use crate::types::BoxCoords;

/// Precondition failures of [`insert_design_variable`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InlayError {
    #[error("Design variable of shape {design:?} does not fit into destination of shape {destination:?}")]
    DoesNotFit {
        design: (usize, usize),
        destination: (usize, usize),
    },

    #[error("All box coordinates must be positive, got {0:?}")]
    NonPositiveCoordinate(BoxCoords),

    #[error("The min x value ({x_min}) must be less than the max x value ({x_max})")]
    XOrder { x_min: usize, x_max: usize },

    #[error("The min y value ({y_min}) must be less than the max y value ({y_max})")]
    YOrder { y_min: usize, y_max: usize },

    #[error("Box {coords:?} extends outside of destination of shape {destination:?}")]
    OutsideDestination {
        coords: BoxCoords,
        destination: (usize, usize),
    },

    #[error("Design variable of shape {design:?} does not match the box shape {region:?}")]
    ShapeMismatch {
        design: (usize, usize),
        region: (usize, usize),
    },
}

fn check_preconditions(
    design: (usize, usize),
    destination: (usize, usize),
    coords: &BoxCoords,
) -> Result<(), InlayError> {
    if design.0 > destination.0 || design.1 > destination.1 {
        return Err(InlayError::DoesNotFit { design, destination });
    }
    let BoxCoords { x_min, y_min, x_max, y_max } = *coords;
    if [x_min, y_min, x_max, y_max].contains(&0) {
        return Err(InlayError::NonPositiveCoordinate(*coords));
    }
    if x_min >= x_max {
        return Err(InlayError::XOrder { x_min, x_max });
    }
    if y_min >= y_max {
        return Err(InlayError::YOrder { y_min, y_max });
    }
    if x_max >= destination.0 || y_max >= destination.1 {
        return Err(InlayError::OutsideDestination {
            coords: *coords,
            destination,
        });
    }
    if design != coords.shape() {
        return Err(InlayError::ShapeMismatch {
            design,
            region: coords.shape(),
        });
    }
    Ok(())
}

/// Copy `destination` and overwrite the box `coords` with `design_var`.
///
/// # Arguments
/// * `design_var` - Values to insert, shaped like the box.
/// * `destination` - Background array; left untouched.
/// * `coords` - Target box, strictly inside `destination`.
pub fn insert_design_variable(
    design_var: ArrayView2<f64>,
    destination: ArrayView2<f64>,
    coords: &BoxCoords,
) -> Result<Array2<f64>, InlayError> {
    check_preconditions(design_var.dim(), destination.dim(), coords)?;
    let mut out = destination.to_owned();
    out.slice_mut(s![coords.x_min..coords.x_max, coords.y_min..coords.y_max])
        .assign(&design_var);
    Ok(out)
}

/// A map with a vector-Jacobian product with respect to its one
/// differentiable input.
pub trait Vjp {
    /// Pull a cotangent on the output back to the differentiable input.
    fn vjp(&self, cotangent: ArrayView2<f64>) -> Array2<f64>;
}

/// [`insert_design_variable`] bound to a fixed box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DesignInlay {
    pub coords: BoxCoords,
}

impl DesignInlay {
    pub fn new(coords: BoxCoords) -> Self {
        Self { coords }
    }

    pub fn forward(
        &self,
        design_var: ArrayView2<f64>,
        background: ArrayView2<f64>,
    ) -> Result<Array2<f64>, InlayError> {
        insert_design_variable(design_var, background, &self.coords)
    }
}

impl Vjp for DesignInlay {
    /// Restriction of the cotangent to the box; nothing reaches the background.
    fn vjp(&self, cotangent: ArrayView2<f64>) -> Array2<f64> {
        let c = &self.coords;
        cotangent
            .slice(s![c.x_min..c.x_max, c.y_min..c.y_max])
            .to_owned()
    }
}

/// Density to permittivity, $\epsilon = \epsilon_{clad} + (\epsilon_{slab} - \epsilon_{clad}) \rho$.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffinePermittivity {
    pub cladding: f64,
    pub slab: f64,
}

impl AffinePermittivity {
    pub fn new(cladding: f64, slab: f64) -> Self {
        Self { cladding, slab }
    }

    pub fn forward(&self, density: ArrayView2<f64>) -> Array2<f64> {
        density.mapv(|rho| self.cladding + (self.slab - self.cladding) * rho)
    }
}

impl Vjp for AffinePermittivity {
    fn vjp(&self, cotangent: ArrayView2<f64>) -> Array2<f64> {
        cotangent.mapv(|g| g * (self.slab - self.cladding))
    }
}
