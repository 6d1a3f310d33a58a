//! Waveguide ports and the transverse eigenmode solver.
//!
//! A port is a line of grid cells cutting across a waveguide. Exciting a port
//! injects its mode profile as a current source; measuring at a port projects
//! the simulated field onto the same profile. Only the polarisation with E out
//! of the device plane (Ez) is handled.
//!
//! ```text
//!   .______________________________.
//!   |             :                |      y
//!   |  cladding   :  port slice    |      ^
//!   |#############:################|      |
//!   |### core ####:---> direction  |      .---> x
//!   |#############:################|
//!   |             :                |
//!   .______________________________.
//! ```

use std::fmt::Debug;

use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use num_complex::Complex64;
use thiserror::Error;

use crate::constants::{C_0, MU_0};
use crate::types::Direction;

/// Errors from port construction and mode solving.
#[derive(Debug, Error)]
pub enum ModeError {
    #[error("Odd values for the port width are currently not supported (got {0})")]
    OddWidth(usize),

    #[error("Port slice centred at ({x}, {y}) with width {width} extends below the domain origin")]
    SliceOutOfDomain { x: usize, y: usize, width: usize },

    #[error("Mode order must be at least 1 (the fundamental mode)")]
    InvalidOrder,

    #[error("Requested mode order {order} but the slice only supports {available} modes")]
    OrderExceedsModes { order: usize, available: usize },

    #[error("Cannot solve modes of an empty permittivity slice")]
    EmptySlice,

    #[error("Profile of length {got} does not match port width {expected}")]
    ProfileLength { got: usize, expected: usize },

    #[error("Eigenmode solver failed to converge on a slice of {0} cells")]
    NoConvergence(usize),
}

/// Transverse mode profile at a port.
#[derive(Debug, Clone)]
pub struct ModeProfile {
    /// Electric field (Ez) across the slice.
    pub e: Array1<Complex64>,
    /// Transverse magnetic field across the slice.
    pub h: Array1<Complex64>,
    /// Propagation constant (rad/m).
    pub beta: f64,
}

impl ModeProfile {
    /// Effective index $\beta / k_0$. Guided modes have `n_eff > 1` relative
    /// to a vacuum light line.
    pub fn effective_index(&self, omega: f64) -> f64 {
        self.beta / (omega / C_0)
    }
}

/// Solve for the waveguide mode of a given transverse order on a 1-D slice.
///
/// Solves the eigenproblem
/// $$ \left[ \partial_t^2 + \epsilon_r k_0^2 \right] E = \beta^2 E $$
/// with a periodic second-difference operator across the slice,
/// then returns the `order`-th mode (1 = fundamental) with
/// $H = \beta / (\mu_0 \omega) E$.
///
/// Modes above the light line are returned as well; callers decide whether
/// `beta / k0 > 1`.
///
/// # Arguments
/// * `epsilon_r` - Relative permittivity along the slice.
/// * `omega` - Angular frequency (rad/s).
/// * `dl` - Grid spacing (m).
/// * `order` - Transverse mode order, starting at 1.
pub fn solve_modes(
    epsilon_r: ArrayView1<f64>,
    omega: f64,
    dl: f64,
    order: usize,
) -> Result<ModeProfile, ModeError> {
    let n = epsilon_r.len();
    if n == 0 {
        return Err(ModeError::EmptySlice);
    }
    if order == 0 {
        return Err(ModeError::InvalidOrder);
    }
    if order > n {
        return Err(ModeError::OrderExceedsModes { order, available: n });
    }

    let k0 = omega / C_0;
    let inv_dl2 = 1.0 / (dl * dl);

    // Periodic second difference: the slice wraps around at its ends.
    let mut operator = DMatrix::<f64>::zeros(n, n);
    for i in 0..n {
        operator[(i, i)] += epsilon_r[i] * k0 * k0 - 2.0 * inv_dl2;
        operator[(i, (i + 1) % n)] += inv_dl2;
        operator[(i, (i + n - 1) % n)] += inv_dl2;
    }

    let eigen = SymmetricEigen::try_new(operator, f64::EPSILON, 0)
        .ok_or(ModeError::NoConvergence(n))?;

    // Right-most `order` eigenvalues. The decomposition makes no ordering
    // promise, so rank explicitly.
    let mut ranked: Vec<usize> = (0..n).collect();
    ranked.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));
    ranked.truncate(order);

    let mut candidates: Vec<(usize, f64)> = ranked
        .into_iter()
        .map(|idx| {
            let beta = Complex64::new(eigen.eigenvalues[idx], 0.0).sqrt().re;
            (idx, beta)
        })
        .collect();
    candidates.sort_by(|a, b| a.1.total_cmp(&b.1));
    let (idx, beta) = candidates[0];

    let column = eigen.eigenvectors.column(idx);
    let pivot = column
        .iter()
        .copied()
        .fold(0.0_f64, |acc, v| if v.abs() > acc.abs() { v } else { acc });
    let sign = if pivot < 0.0 { -1.0 } else { 1.0 };

    let e = Array1::from_iter(column.iter().map(|&v| Complex64::new(sign * v, 0.0)));
    let h = e.mapv(|v| v * (beta / omega / MU_0));

    if beta < k0 {
        log::debug!(
            "mode order {} on {}-cell slice is not guided (n_eff = {:.4})",
            order,
            n,
            beta / k0
        );
    }

    Ok(ModeProfile { e, h, beta })
}

/// Location and orientation of a port: a line of `width` cells centred on
/// `(x, y)`, normal to `dir`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortSlice {
    /// Slice centre, x (grid cells).
    pub x: usize,
    /// Slice centre, y (grid cells).
    pub y: usize,
    /// Transverse width (grid cells). Always even.
    pub width: usize,
    /// Propagation direction into the device.
    pub dir: Direction,
    /// Distance (grid cells) from the source line to the line where
    /// forward and backward amplitudes are decomposed.
    pub offset: usize,
}

impl PortSlice {
    pub fn new(
        x: usize,
        y: usize,
        width: usize,
        dir: Direction,
        offset: usize,
    ) -> Result<Self, ModeError> {
        if width % 2 == 1 {
            return Err(ModeError::OddWidth(width));
        }
        let centre = if dir.is_along_x() { y } else { x };
        if centre < width / 2 {
            return Err(ModeError::SliceOutOfDomain { x, y, width });
        }
        Ok(Self { x, y, width, dir, offset })
    }

    /// Grid coordinates `(x, y)` of every cell in the slice.
    ///
    /// The slice covers `[c - width/2, c + width/2)` along the transverse axis.
    pub fn coords(&self) -> Vec<(usize, usize)> {
        // TODO: odd widths need a rounding rule before this split can accept them
        let half = self.width / 2;
        if self.dir.is_along_x() {
            (self.y - half..self.y + half).map(|y| (self.x, y)).collect()
        } else {
            (self.x - half..self.x + half).map(|x| (x, self.y)).collect()
        }
    }

    /// `offset * sign(dir)`.
    pub fn signed_offset(&self) -> isize {
        self.offset as isize * self.dir.sign() as isize
    }
}

/// Extract the values of a 2-D array along a set of coordinates.
pub(crate) fn sample<T: Copy>(array: &ArrayView2<T>, coords: &[(usize, usize)]) -> Option<Array1<T>> {
    coords
        .iter()
        .map(|&(x, y)| array.get([x, y]).copied())
        .collect::<Option<Vec<T>>>()
        .map(Array1::from)
}

/// A device port.
///
/// Implementations differ only in how the transverse profiles are obtained;
/// geometry, offsets and source construction are shared.
pub trait Port: Debug + Send + Sync {
    /// Where the port sits.
    fn slice(&self) -> &PortSlice;

    /// Electric/magnetic profiles and propagation constant of the port mode
    /// on the given permittivity slice.
    fn field_profiles(
        &self,
        epsilon_r: ArrayView1<f64>,
        omega: f64,
        dl: f64,
    ) -> Result<ModeProfile, ModeError>;

    fn coords(&self) -> Vec<(usize, usize)> {
        self.slice().coords()
    }

    fn signed_offset(&self) -> isize {
        self.slice().signed_offset()
    }

    fn direction(&self) -> Direction {
        self.slice().dir
    }

    /// A complex source array shaped like `epsilon_r`: zero everywhere except
    /// on the port slice, which carries the mode's electric field.
    fn source_field(
        &self,
        omega: f64,
        dl: f64,
        epsilon_r: ArrayView2<f64>,
    ) -> Result<Array2<Complex64>, ModeError> {
        let coords = self.coords();
        let slice = self.slice();
        let eps_slice = sample(&epsilon_r, &coords).ok_or(ModeError::SliceOutOfDomain {
            x: slice.x,
            y: slice.y,
            width: slice.width,
        })?;
        let profile = self.field_profiles(eps_slice.view(), omega, dl)?;

        let mut source = Array2::<Complex64>::zeros(epsilon_r.raw_dim());
        for (&(x, y), &value) in coords.iter().zip(profile.e.iter()) {
            source[[x, y]] = value;
        }
        Ok(source)
    }
}

/// A port measuring a guided mode of a given transverse order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaveguidePort {
    pub slice: PortSlice,
    /// Transverse order; the fundamental mode is `order = 1`. Callers may
    /// change this to measure a mode other than the one excited.
    pub order: usize,
}

impl WaveguidePort {
    pub fn new(
        x: usize,
        y: usize,
        width: usize,
        order: usize,
        dir: Direction,
        offset: usize,
    ) -> Result<Self, ModeError> {
        if order == 0 {
            return Err(ModeError::InvalidOrder);
        }
        Ok(Self {
            slice: PortSlice::new(x, y, width, dir, offset)?,
            order,
        })
    }

    /// The same port measuring a different mode order.
    pub fn with_order(mut self, order: usize) -> Self {
        self.order = order;
        self
    }
}

impl Port for WaveguidePort {
    fn slice(&self) -> &PortSlice {
        &self.slice
    }

    fn field_profiles(
        &self,
        epsilon_r: ArrayView1<f64>,
        omega: f64,
        dl: f64,
    ) -> Result<ModeProfile, ModeError> {
        solve_modes(epsilon_r, omega, dl, self.order)
    }
}

/// A port with a prescribed profile, independent of the local permittivity.
#[derive(Debug, Clone)]
pub struct ProfilePort {
    pub slice: PortSlice,
    pub profile: ModeProfile,
}

impl ProfilePort {
    pub fn new(slice: PortSlice, profile: ModeProfile) -> Result<Self, ModeError> {
        for len in [profile.e.len(), profile.h.len()] {
            if len != slice.width {
                return Err(ModeError::ProfileLength { got: len, expected: slice.width });
            }
        }
        Ok(Self { slice, profile })
    }
}

impl Port for ProfilePort {
    fn slice(&self) -> &PortSlice {
        &self.slice
    }

    fn field_profiles(
        &self,
        _epsilon_r: ArrayView1<f64>,
        _omega: f64,
        _dl: f64,
    ) -> Result<ModeProfile, ModeError> {
        Ok(self.profile.clone())
    }
}
