//! Mirror symmetry of the design region.
//!
//! A mirrored design variable covers half of the design region; the other
//! half is its reflection. The adjoint of the expansion folds the two halves
//! of a cotangent back onto the free half.

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

/// Mirror plane of the design region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mirror {
    /// Reflect along x: the free half is the lower-x half.
    X,
    /// Reflect along y: the free half is the lower-y half.
    Y,
}

impl Mirror {
    fn axis(self) -> usize {
        match self {
            Mirror::X => 0,
            Mirror::Y => 1,
        }
    }

    /// Shape of the free half of a region of shape `full`.
    pub fn half_shape(self, full: (usize, usize)) -> (usize, usize) {
        match self {
            Mirror::X => (full.0 / 2, full.1),
            Mirror::Y => (full.0, full.1 / 2),
        }
    }

    /// Whether a region of shape `full` splits evenly.
    pub fn divides(self, full: (usize, usize)) -> bool {
        let n = if self.axis() == 0 { full.0 } else { full.1 };
        n % 2 == 0
    }

    /// Reflect `half` to fill the whole region.
    pub fn expand(self, half: ArrayView2<f64>) -> Array2<f64> {
        let (hx, hy) = half.dim();
        match self {
            Mirror::X => Array2::from_shape_fn((2 * hx, hy), |(i, j)| half[[i.min(2 * hx - 1 - i), j]]),
            Mirror::Y => Array2::from_shape_fn((hx, 2 * hy), |(i, j)| half[[i, j.min(2 * hy - 1 - j)]]),
        }
    }

    /// Adjoint of [`Mirror::expand`].
    pub fn fold(self, full: ArrayView2<f64>) -> Array2<f64> {
        let (nx, ny) = full.dim();
        let (hx, hy) = self.half_shape((nx, ny));
        match self {
            Mirror::X => Array2::from_shape_fn((hx, hy), |(i, j)| full[[i, j]] + full[[nx - 1 - i, j]]),
            Mirror::Y => Array2::from_shape_fn((hx, hy), |(i, j)| full[[i, j]] + full[[i, ny - 1 - j]]),
        }
    }
}
