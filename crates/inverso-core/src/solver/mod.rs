//! Field solver abstraction and implementations.
//!
//! The [`FieldSolver`] trait is the seam between the device-simulation
//! engine and the Maxwell solver: given a frequency, grid spacing,
//! permittivity and PML widths, and a complex current source, a solver
//! returns the steady-state TM fields. The FDFD solver is the bundled
//! implementation; any other frequency-domain method can plug in through the
//! same trait.

pub mod fdfd;

use ndarray::{Array2, ArrayView2};
use num_complex::Complex64;
use thiserror::Error;

/// Errors that can occur during a field solve.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("Solver failed to converge (relative residual {residual:.2e} exceeds {tolerance:.2e})")]
    ConvergenceFailure { residual: f64, tolerance: f64 },

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Invalid frequency: omega = {0}")]
    InvalidFrequency(f64),

    #[error("Linear algebra error: {0}")]
    LinAlgError(String),
}

/// Everything a solver needs besides the source.
#[derive(Debug, Clone, Copy)]
pub struct FieldProblem<'a> {
    /// Angular frequency (rad/s).
    pub omega: f64,
    /// Grid spacing (m), equal along x and y.
    pub dl: f64,
    /// Relative permittivity, shape (nx, ny).
    pub epsilon_r: ArrayView2<'a, f64>,
    /// PML thickness in cells along x and y.
    pub npml: [usize; 2],
}

/// Steady-state TM field components, each shaped like the domain.
#[derive(Debug, Clone)]
pub struct FieldSolution {
    pub hx: Array2<Complex64>,
    pub hy: Array2<Complex64>,
    pub ez: Array2<Complex64>,
}

/// The core trait every frequency-domain field solver implements.
///
/// Implementations must be shareable across worker threads: the simulation
/// driver calls `solve` concurrently for different (port, wavelength) pairs.
pub trait FieldSolver: Send + Sync {
    /// Solve for the fields radiated by the out-of-plane current `source`.
    fn solve(
        &self,
        problem: &FieldProblem<'_>,
        source: ArrayView2<'_, Complex64>,
    ) -> Result<FieldSolution, SolverError>;

    /// Human-readable name of the solver method.
    fn method_name(&self) -> &str;
}
