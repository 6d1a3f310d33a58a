//! Finite-difference frequency-domain solver for TM (Ez) fields.
//!
//! Discretises the 2-D Helmholtz equation on the uniform grid of the
//! permittivity array, terminates it with stretched-coordinate PMLs, and
//! solves the resulting sparse complex system directly. The magnetic field
//! follows from Faraday's law:
//! $$ H_x = -\frac{\partial_y E_z}{j\omega\mu_0}, \qquad
//!    H_y = \frac{\partial_x E_z}{j\omega\mu_0} $$

pub mod assembly;
pub mod direct;
pub mod pml;

use ndarray::{Array1, Array2, ArrayView2};
use num_complex::Complex64;

use super::{FieldProblem, FieldSolution, FieldSolver, SolverError};
use crate::constants::{C_0, MU_0};
use pml::{PmlGrading, StretchFactors};

/// FDFD solver for the Ez polarisation.
#[derive(Debug, Clone)]
pub struct FdfdEz {
    /// Conductivity grading inside the PML.
    pub grading: PmlGrading,
    /// Largest relative residual accepted from the linear solve.
    pub residual_tolerance: f64,
}

impl Default for FdfdEz {
    fn default() -> Self {
        Self {
            grading: PmlGrading::default(),
            residual_tolerance: 1e-6,
        }
    }
}

impl FdfdEz {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_residual_tolerance(mut self, tolerance: f64) -> Self {
        self.residual_tolerance = tolerance;
        self
    }

    fn validate(problem: &FieldProblem<'_>, source: &ArrayView2<'_, Complex64>) -> Result<(), SolverError> {
        if !(problem.omega.is_finite() && problem.omega > 0.0) {
            return Err(SolverError::InvalidFrequency(problem.omega));
        }
        if !(problem.dl.is_finite() && problem.dl > 0.0) {
            return Err(SolverError::InvalidGeometry(format!(
                "grid spacing must be positive, got {}",
                problem.dl
            )));
        }
        let (nx, ny) = problem.epsilon_r.dim();
        if nx == 0 || ny == 0 {
            return Err(SolverError::InvalidGeometry("empty permittivity array".into()));
        }
        if source.dim() != (nx, ny) {
            return Err(SolverError::InvalidGeometry(format!(
                "source shape {:?} does not match permittivity shape {:?}",
                source.dim(),
                (nx, ny)
            )));
        }
        let [px, py] = problem.npml;
        if 2 * px >= nx || 2 * py >= ny {
            return Err(SolverError::InvalidGeometry(format!(
                "PML of {:?} cells leaves no interior in a {}x{} domain",
                problem.npml, nx, ny
            )));
        }
        Ok(())
    }
}

impl FieldSolver for FdfdEz {
    fn solve(
        &self,
        problem: &FieldProblem<'_>,
        source: ArrayView2<'_, Complex64>,
    ) -> Result<FieldSolution, SolverError> {
        Self::validate(problem, &source)?;

        let (nx, ny) = problem.epsilon_r.dim();
        let omega = problem.omega;
        let dl = problem.dl;
        let k0 = omega / C_0;

        log::debug!(
            "FDFD Ez solve: {}x{} cells, omega = {:.4e} rad/s, npml = {:?}",
            nx,
            ny,
            omega,
            problem.npml
        );

        let sx = StretchFactors::new(nx, problem.npml[0], dl, omega, &self.grading);
        let sy = StretchFactors::new(ny, problem.npml[1], dl, omega, &self.grading);

        let matrix = assembly::assemble_operator(problem.epsilon_r, k0, dl, &sx, &sy);
        let j_omega_mu = Complex64::new(0.0, omega * MU_0);
        let rhs: Array1<Complex64> = source.iter().map(|&j| j_omega_mu * j).collect();

        let solution = direct::solve_sparse(&matrix, &rhs, self.residual_tolerance)?;
        let ez = Array2::from_shape_vec((nx, ny), solution.to_vec())
            .map_err(|e| SolverError::LinAlgError(e.to_string()))?;

        let hx = assembly::backward_diff_y(&ez, dl, &sy).mapv(|d| -d / j_omega_mu);
        let hy = assembly::backward_diff_x(&ez, dl, &sx).mapv(|d| d / j_omega_mu);

        Ok(FieldSolution { hx, hy, ez })
    }

    fn method_name(&self) -> &str {
        "FDFD (Ez)"
    }
}
