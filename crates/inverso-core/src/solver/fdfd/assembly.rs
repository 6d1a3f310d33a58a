//! Sparse operator assembly for the Ez formulation.
//!
//! The system solved is
//! $$ \left[ \partial_x \tfrac{1}{s_x} \partial_x \tfrac{1}{s_x}
//!    + \partial_y \tfrac{1}{s_y} \partial_y \tfrac{1}{s_y}
//!    + k_0^2 \epsilon_r \right] E_z = j \omega \mu_0 J_z $$
//! discretised on a uniform grid with zero field beyond the outer walls.
//! Cell `(i, j)` maps to row `i * ny + j`.

use ndarray::{Array1, Array2, ArrayView2};
use num_complex::Complex64;

use super::pml::StretchFactors;

/// A square sparse matrix held as unique `(row, col, value)` entries.
#[derive(Debug, Clone)]
pub struct SystemMatrix {
    pub dim: usize,
    pub triplets: Vec<(usize, usize, Complex64)>,
}

impl SystemMatrix {
    /// Sparse matrix-vector product.
    pub fn apply(&self, x: &Array1<Complex64>) -> Array1<Complex64> {
        let mut y = Array1::<Complex64>::zeros(self.dim);
        for &(row, col, value) in &self.triplets {
            y[row] += value * x[col];
        }
        y
    }
}

/// Assemble the five-point operator.
///
/// # Arguments
/// * `epsilon_r` - Relative permittivity, shape (nx, ny).
/// * `k0` - Free-space wavenumber (rad/m).
/// * `dl` - Grid spacing (m).
/// * `sx`, `sy` - PML stretch factors along each axis.
pub fn assemble_operator(
    epsilon_r: ArrayView2<f64>,
    k0: f64,
    dl: f64,
    sx: &StretchFactors,
    sy: &StretchFactors,
) -> SystemMatrix {
    let (nx, ny) = epsilon_r.dim();
    let inv_dl2 = 1.0 / (dl * dl);
    let mut triplets = Vec::with_capacity(5 * nx * ny);

    for i in 0..nx {
        for j in 0..ny {
            let row = i * ny + j;

            let west = inv_dl2 / (sx.centre[i] * sx.face[i]);
            let east = inv_dl2 / (sx.centre[i] * sx.face[i + 1]);
            let south = inv_dl2 / (sy.centre[j] * sy.face[j]);
            let north = inv_dl2 / (sy.centre[j] * sy.face[j + 1]);

            let diagonal = Complex64::new(k0 * k0 * epsilon_r[[i, j]], 0.0) - west - east - south - north;
            triplets.push((row, row, diagonal));

            if i > 0 {
                triplets.push((row, row - ny, west));
            }
            if i + 1 < nx {
                triplets.push((row, row + ny, east));
            }
            if j > 0 {
                triplets.push((row, row - 1, south));
            }
            if j + 1 < ny {
                triplets.push((row, row + 1, north));
            }
        }
    }

    SystemMatrix {
        dim: nx * ny,
        triplets,
    }
}

/// Backward difference along x, $(E_{i} - E_{i-1}) / (s_{i-1/2} \Delta)$.
pub fn backward_diff_x(field: &Array2<Complex64>, dl: f64, sx: &StretchFactors) -> Array2<Complex64> {
    let (nx, ny) = field.dim();
    Array2::from_shape_fn((nx, ny), |(i, j)| {
        let prev = if i > 0 { field[[i - 1, j]] } else { Complex64::new(0.0, 0.0) };
        (field[[i, j]] - prev) / (sx.face[i] * dl)
    })
}

/// Backward difference along y, $(E_{j} - E_{j-1}) / (s_{j-1/2} \Delta)$.
pub fn backward_diff_y(field: &Array2<Complex64>, dl: f64, sy: &StretchFactors) -> Array2<Complex64> {
    let (nx, ny) = field.dim();
    Array2::from_shape_fn((nx, ny), |(i, j)| {
        let prev = if j > 0 { field[[i, j - 1]] } else { Complex64::new(0.0, 0.0) };
        (field[[i, j]] - prev) / (sy.face[j] * dl)
    })
}
