//! Stretched-coordinate perfectly matched layers.
//!
//! Inside the PML the spatial derivative along an axis is divided by
//! $s(l) = 1 - j\sigma(l) / (\omega \epsilon_0)$, where $l$ is the depth into
//! the layer and $\sigma$ grows polynomially towards the outer wall:
//!
//! $$ \sigma(l) = \sigma_{\max} (l / d)^m, \qquad
//!    \sigma_{\max} = -\frac{(m + 1) \ln R}{2 \eta_0 d} $$
//!
//! With the $e^{+j\omega t}$ convention an outgoing $e^{-jkx}$ wave decays
//! inside the layer. Factors are evaluated at cell centres (forward
//! differences) and at cell faces (backward differences); both sets are
//! mirror-symmetric about the domain centre.

use ndarray::Array1;
use num_complex::Complex64;

use crate::constants::{EPSILON_0, ETA_0};

/// Polynomial conductivity profile of the absorbing layer.
#[derive(Debug, Clone, Copy)]
pub struct PmlGrading {
    /// Polynomial order $m$.
    pub order: f64,
    /// Natural log of the target normal-incidence reflection.
    pub ln_reflection: f64,
}

impl Default for PmlGrading {
    fn default() -> Self {
        Self {
            order: 3.0,
            ln_reflection: -30.0,
        }
    }
}

impl PmlGrading {
    fn sigma(&self, depth: f64, thickness: f64) -> f64 {
        let sigma_max = -(self.order + 1.0) * self.ln_reflection / (2.0 * ETA_0 * thickness);
        sigma_max * (depth / thickness).powf(self.order)
    }

    fn s_value(&self, depth: f64, thickness: f64, omega: f64) -> Complex64 {
        Complex64::new(1.0, -self.sigma(depth, thickness) / (omega * EPSILON_0))
    }
}

/// Stretch factors along one axis of `n` cells with `npml` absorbing cells
/// at each end.
#[derive(Debug, Clone)]
pub struct StretchFactors {
    /// At cell centres `i`, length `n`.
    pub centre: Array1<Complex64>,
    /// At faces `i - 1/2`, length `n + 1`.
    pub face: Array1<Complex64>,
}

impl StretchFactors {
    pub fn new(n: usize, npml: usize, dl: f64, omega: f64, grading: &PmlGrading) -> Self {
        if npml == 0 {
            return Self {
                centre: Array1::from_elem(n, Complex64::new(1.0, 0.0)),
                face: Array1::from_elem(n + 1, Complex64::new(1.0, 0.0)),
            };
        }

        let thickness = npml as f64 * dl;
        let lower = npml as f64 - 0.5;
        let upper = n as f64 - npml as f64 - 0.5;
        let factor = |position: f64| {
            let depth = if position < lower {
                lower - position
            } else if position > upper {
                position - upper
            } else {
                return Complex64::new(1.0, 0.0);
            };
            grading.s_value(depth * dl, thickness, omega)
        };

        Self {
            centre: Array1::from_iter((0..n).map(|i| factor(i as f64))),
            face: Array1::from_iter((0..=n).map(|i| factor(i as f64 - 0.5))),
        }
    }
}
