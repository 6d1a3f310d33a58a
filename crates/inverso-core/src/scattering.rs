//! Forward/backward wave amplitudes at a port.
//!
//! Only the Ez polarisation is handled. The simulated fields are projected
//! onto the port's mode at a monitor line displaced from the port by its
//! signed offset. Ez and the transverse H live half a cell apart on the Yee
//! grid, so Ez is averaged over the two cells straddling the monitor line
//! before the projection.

use ndarray::{Array1, ArrayView2};
use num_complex::Complex64;
use thiserror::Error;

use crate::modes::{sample, ModeError, Port};
use crate::ops::overlap;
use crate::solver::FieldSolution;
use crate::types::VectorField;

#[derive(Debug, Error)]
pub enum ScatteringError {
    #[error("Monitor line of port at ({x}, {y}) with offset {offset} falls outside the {nx}x{ny} domain")]
    SampleOutOfDomain {
        x: usize,
        y: usize,
        offset: isize,
        nx: usize,
        ny: usize,
    },

    #[error(transparent)]
    Mode(#[from] ModeError),

    #[error("Port mode has zero normalisation")]
    ZeroNormalization,
}

fn shift(coord: usize, by: isize) -> Option<usize> {
    coord.checked_add_signed(by)
}

/// Amplitudes `(s_plus, s_minus)` of the waves travelling along and against
/// the port direction.
///
/// The port mode is always computed on the background permittivity so that
/// the extraction does not depend on the design.
///
/// # Arguments
/// * `omega` - Angular frequency (rad/s).
/// * `dl` - Grid spacing (m).
/// * `port` - The port to measure at.
/// * `fields` - Simulated fields over the full domain.
/// * `epsilon_r_bg` - Background relative permittivity.
pub fn calculate_amplitudes(
    omega: f64,
    dl: f64,
    port: &dyn Port,
    fields: &FieldSolution,
    epsilon_r_bg: ArrayView2<f64>,
) -> Result<(Complex64, Complex64), ScatteringError> {
    let slice = port.slice();
    let coords = port.coords();
    let (nx, ny) = fields.ez.dim();
    let offset = port.signed_offset();
    let out_of_domain = || ScatteringError::SampleOutOfDomain {
        x: slice.x,
        y: slice.y,
        offset,
        nx,
        ny,
    };

    let eps_slice = sample(&epsilon_r_bg, &coords).ok_or(ModeError::SliceOutOfDomain {
        x: slice.x,
        y: slice.y,
        width: slice.width,
    })?;
    let mode = port.field_profiles(eps_slice.view(), omega, dl)?;

    let along_x = port.direction().is_along_x();
    let mut monitor = Vec::with_capacity(coords.len());
    let mut behind = Vec::with_capacity(coords.len());
    for &(x, y) in &coords {
        let (mx, my) = if along_x {
            (shift(x, offset), Some(y))
        } else {
            (Some(x), shift(y, offset))
        };
        let (mx, my) = mx.zip(my).ok_or_else(out_of_domain)?;
        let prev = if along_x {
            mx.checked_sub(1).map(|px| (px, my))
        } else {
            my.checked_sub(1).map(|py| (mx, py))
        };
        monitor.push((mx, my));
        behind.push(prev.ok_or_else(out_of_domain)?);
    }

    let ez_now = sample(&fields.ez.view(), &monitor).ok_or_else(out_of_domain)?;
    let ez_prev = sample(&fields.ez.view(), &behind).ok_or_else(out_of_domain)?;
    let e_yee: Array1<Complex64> = (&ez_now + &ez_prev) * 0.5;

    let (h, hm) = if along_x {
        let hy = sample(&fields.hy.view(), &monitor).ok_or_else(out_of_domain)?;
        (VectorField::y_only(hy), VectorField::y_only(mode.h.clone()))
    } else {
        let hx = sample(&fields.hx.view(), &monitor).ok_or_else(out_of_domain)?;
        (VectorField::x_only(hx), VectorField::x_only(mode.h.mapv(|v| -v)))
    };
    let e = VectorField::z_only(e_yee);
    let em = VectorField::z_only(mode.e.clone());

    let dir = port.direction();
    let overlap1 = overlap(&em, &h, dir);
    let overlap2 = overlap(&hm, &e, dir);
    let normalization = overlap(&em, &hm, dir);
    if normalization.norm() == 0.0 {
        return Err(ScatteringError::ZeroNormalization);
    }

    // exp(+j omega t - j k z) phase convention
    let denom = 2.0 * (2.0 * normalization).sqrt();
    let (s_plus, s_minus) = if dir.sign() > 0 {
        ((overlap1 + overlap2) / denom, (overlap1 - overlap2) / denom)
    } else {
        ((overlap1 - overlap2) / denom, (overlap1 + overlap2) / denom)
    };

    Ok((s_plus, s_minus))
}
