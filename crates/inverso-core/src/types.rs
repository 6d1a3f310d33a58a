//! Core types shared across the Inverso framework.
//!
//! Arrays describing one simulation (permittivity, density, field components)
//! are all indexed `[x, y]` in grid units and share the domain shape.

use ndarray::{Array1, Array2, Array3, Array4, Axis};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// Axis of [`SimulationOutput::sparams`] running over wavelengths.
pub const SPARAMS_FREQ_AXIS: Axis = Axis(0);
/// Axis of [`SimulationOutput::fields`] running over wavelengths.
pub const FIELDS_FREQ_AXIS: Axis = Axis(0);
/// Axis of [`SimulationOutput::fields`] running over excited ports.
pub const FIELDS_INPUT_PORT_AXIS: Axis = Axis(1);

/// A signed, axis-aligned propagation direction in the device plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "+x")]
    XPos,
    #[serde(rename = "-x")]
    XNeg,
    #[serde(rename = "+y")]
    YPos,
    #[serde(rename = "-y")]
    YNeg,
}

impl Direction {
    /// +1 or -1.
    pub fn sign(self) -> i32 {
        match self {
            Direction::XPos | Direction::YPos => 1,
            Direction::XNeg | Direction::YNeg => -1,
        }
    }

    pub fn is_along_x(self) -> bool {
        matches!(self, Direction::XPos | Direction::XNeg)
    }

    pub fn is_along_y(self) -> bool {
        !self.is_along_x()
    }

    /// Index of the [`VectorField`] component along this direction's axis.
    pub fn index(self) -> usize {
        if self.is_along_x() {
            0
        } else {
            1
        }
    }
}

/// An ordered triple of field components sampled at a common set of points.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorField {
    pub x: Array1<Complex64>,
    pub y: Array1<Complex64>,
    pub z: Array1<Complex64>,
}

impl VectorField {
    /// # Panics
    /// Panics if the components differ in length.
    pub fn new(x: Array1<Complex64>, y: Array1<Complex64>, z: Array1<Complex64>) -> Self {
        assert!(
            x.len() == y.len() && y.len() == z.len(),
            "VectorField components must share a length"
        );
        Self { x, y, z }
    }

    /// Only the x-component is non-zero.
    pub fn x_only(x: Array1<Complex64>) -> Self {
        let n = x.len();
        Self::new(x, Array1::zeros(n), Array1::zeros(n))
    }

    /// Only the y-component is non-zero.
    pub fn y_only(y: Array1<Complex64>) -> Self {
        let n = y.len();
        Self::new(Array1::zeros(n), y, Array1::zeros(n))
    }

    /// Only the z-component is non-zero.
    pub fn z_only(z: Array1<Complex64>) -> Self {
        let n = z.len();
        Self::new(Array1::zeros(n), Array1::zeros(n), z)
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Component by index (0 = x, 1 = y, 2 = z).
    pub fn component(&self, index: usize) -> &Array1<Complex64> {
        match index {
            0 => &self.x,
            1 => &self.y,
            2 => &self.z,
            _ => panic!("VectorField component index {index} out of range"),
        }
    }

    /// Element-wise complex conjugate of every component.
    pub fn conj(&self) -> Self {
        Self {
            x: self.x.mapv(|c| c.conj()),
            y: self.y.mapv(|c| c.conj()),
            z: self.z.mapv(|c| c.conj()),
        }
    }
}

/// A rectangle in grid coordinates, `[x_min, x_max) x [y_min, y_max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxCoords {
    pub x_min: usize,
    pub y_min: usize,
    pub x_max: usize,
    pub y_max: usize,
}

impl BoxCoords {
    pub fn new(x_min: usize, y_min: usize, x_max: usize, y_max: usize) -> Self {
        Self { x_min, y_min, x_max, y_max }
    }

    /// Extent of the box in cells. Saturates to zero for inverted boxes.
    pub fn shape(&self) -> (usize, usize) {
        (
            self.x_max.saturating_sub(self.x_min),
            self.y_max.saturating_sub(self.y_min),
        )
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.x_min && x < self.x_max && y >= self.y_min && y < self.y_max
    }
}

/// Scattering parameters and fields from one `simulate` call.
#[derive(Debug, Clone)]
pub struct SimulationOutput {
    /// Free-space wavelengths (nm), in the order they were simulated.
    pub wavelengths_nm: Vec<f64>,
    /// Excited port indices, in caller order.
    pub excite_port_idxs: Vec<usize>,
    /// Complex S-parameters, shape (wavelength, excited port, measured port).
    pub sparams: Array3<Complex64>,
    /// Steady-state Ez, shape (wavelength, excited port, nx, ny).
    pub fields: Array4<Complex64>,
}

impl SimulationOutput {
    /// Transmission/reflection in dB, $20 \log_{10} |S|$.
    pub fn sparams_db(&self) -> Array3<f64> {
        self.sparams.mapv(power_db)
    }

    /// Ez for one (wavelength slot, excitation slot) pair.
    pub fn field(&self, wavelength_slot: usize, excite_slot: usize) -> Array2<Complex64> {
        self.fields
            .index_axis(FIELDS_INPUT_PORT_AXIS, excite_slot)
            .index_axis(FIELDS_FREQ_AXIS, wavelength_slot)
            .to_owned()
    }

    /// S-parameters at one wavelength slot, shape (excited port, measured port).
    pub fn sparam_matrix(&self, wavelength_slot: usize) -> Array2<Complex64> {
        self.sparams
            .index_axis(SPARAMS_FREQ_AXIS, wavelength_slot)
            .to_owned()
    }
}

/// Power ratio of a complex amplitude in dB.
pub fn power_db(x: Complex64) -> f64 {
    20.0 * x.norm().log10()
}
