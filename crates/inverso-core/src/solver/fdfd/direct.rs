//! Direct sparse solve of the FDFD system.
//!
//! Factorises the operator with `faer`'s sparse LU and checks the relative
//! residual $\|A x - b\| / \|b\|$ of the result.

use faer::complex_native::c64;
use faer::linalg::solvers::SpSolver;
use faer::sparse::SparseColMat;
use ndarray::Array1;
use num_complex::Complex64;

use super::assembly::SystemMatrix;
use crate::solver::SolverError;

fn l2_norm(v: &Array1<Complex64>) -> f64 {
    v.iter().map(|c| c.norm_sqr()).sum::<f64>().sqrt()
}

/// Solve `matrix * x = rhs` by sparse LU.
///
/// # Arguments
/// * `matrix` - Assembled system with unique entries.
/// * `rhs` - Right-hand side of length `matrix.dim`.
/// * `tolerance` - Largest acceptable relative residual.
pub fn solve_sparse(
    matrix: &SystemMatrix,
    rhs: &Array1<Complex64>,
    tolerance: f64,
) -> Result<Array1<Complex64>, SolverError> {
    let dim = matrix.dim;
    if rhs.len() != dim {
        return Err(SolverError::LinAlgError(format!(
            "right-hand side has length {} but the system has {} unknowns",
            rhs.len(),
            dim
        )));
    }

    let rhs_norm = l2_norm(rhs);
    if rhs_norm == 0.0 {
        return Ok(Array1::zeros(dim));
    }

    let entries: Vec<(usize, usize, c64)> = matrix
        .triplets
        .iter()
        .map(|&(row, col, v)| (row, col, c64::new(v.re, v.im)))
        .collect();
    let sparse = SparseColMat::<usize, c64>::try_new_from_triplets(dim, dim, &entries)
        .map_err(|e| SolverError::LinAlgError(format!("sparse assembly failed: {e:?}")))?;
    let lu = sparse
        .sp_lu()
        .map_err(|e| SolverError::LinAlgError(format!("sparse LU failed: {e:?}")))?;

    let faer_rhs = faer::Col::<c64>::from_fn(dim, |i| c64::new(rhs[i].re, rhs[i].im));
    let faer_sol = lu.solve(&faer_rhs);

    let solution = Array1::from_iter((0..dim).map(|i| {
        let c = faer_sol[i];
        Complex64::new(c.re, c.im)
    }));

    let residual = l2_norm(&(matrix.apply(&solution) - rhs)) / rhs_norm;
    if !residual.is_finite() || residual > tolerance {
        return Err(SolverError::ConvergenceFailure { residual, tolerance });
    }
    log::trace!("sparse LU residual {:.3e} on {} unknowns", residual, dim);

    Ok(solution)
}
