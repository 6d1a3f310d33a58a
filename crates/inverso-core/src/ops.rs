//! Algebra on [`VectorField`]s: cross products and overlap integrals.
//!
//! The overlap integral
//! $$ \int (\mathbf{a}^* \times \mathbf{b}) \cdot \hat{\mathbf{n}} \, dS $$
//! is evaluated as a plain sum over the sample points; the grid spacing
//! cancels in every ratio built from it.

use num_complex::Complex64;

use crate::types::{Direction, VectorField};

/// Point-wise cross product $\mathbf{a} \times \mathbf{b}$.
pub fn cross(a: &VectorField, b: &VectorField) -> VectorField {
    VectorField::new(
        &a.y * &b.z - &a.z * &b.y,
        &a.z * &b.x - &a.x * &b.z,
        &a.x * &b.y - &a.y * &b.x,
    )
}

/// Discrete overlap integral of two fields through a slice with the given normal.
///
/// The first argument is conjugated, the second is not.
pub fn overlap(a: &VectorField, b: &VectorField, normal: Direction) -> Complex64 {
    cross(&a.conj(), b).component(normal.index()).sum()
}
