//! Snapping layouts onto the simulation grid.
//!
//! Every physical length must land on a whole number of cells at the grid
//! resolution (see [`inverso_core::units::resolve`]). Cell `(i, j)` covers
//! `[i dl, (i + 1) dl) x [j dl, (j + 1) dl)`.

use inverso_core::units::{resolve, Quantity};
use inverso_core::BoxCoords;
use ndarray::{s, Array2};

use crate::layout::LayoutError;
use crate::primitives::{Rect, Shape};

/// A uniform square grid over the domain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    /// Number of cells along x and y.
    pub shape: (usize, usize),
    /// Cell size (nm).
    pub resolution: f64,
}

impl Grid {
    /// # Arguments
    /// * `extent` - Domain size along x and y (nm).
    /// * `resolution` - Cell size (nm).
    pub fn new(extent: [f64; 2], resolution: f64) -> Result<Self, LayoutError> {
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(LayoutError::InvalidResolution(resolution));
        }
        let grid = Self {
            shape: (0, 0),
            resolution,
        };
        let nx = grid.cells(extent[0], "domain extent along x")?;
        let ny = grid.cells(extent[1], "domain extent along y")?;
        if nx == 0 || ny == 0 {
            return Err(LayoutError::EmptyDomain);
        }
        Ok(Self {
            shape: (nx, ny),
            resolution,
        })
    }

    /// Grid spacing (m).
    pub fn dl(&self) -> f64 {
        self.resolution * 1e-9
    }

    /// Signed number of cells spanned by `length` (nm).
    pub fn resolve(&self, length: f64) -> Result<i64, LayoutError> {
        Ok(resolve(Quantity::nm(length), Quantity::nm(self.resolution))?)
    }

    /// Number of cells spanned by a non-negative `length` (nm).
    pub fn cells(&self, length: f64, what: &'static str) -> Result<usize, LayoutError> {
        let n = self.resolve(length)?;
        usize::try_from(n).map_err(|_| LayoutError::Negative { what, value: length })
    }

    /// Cells covered by `rect`, clipped to the domain. `None` if nothing
    /// of the rectangle lies inside.
    pub fn cell_box(&self, rect: &Rect) -> Result<Option<BoxCoords>, LayoutError> {
        let (lo, hi) = rect.corners();
        let clip = |v: i64, n: usize| v.clamp(0, n as i64) as usize;
        let x_min = clip(self.resolve(lo[0])?, self.shape.0);
        let x_max = clip(self.resolve(hi[0])?, self.shape.0);
        let y_min = clip(self.resolve(lo[1])?, self.shape.1);
        let y_max = clip(self.resolve(hi[1])?, self.shape.1);
        if x_min >= x_max || y_min >= y_max {
            return Ok(None);
        }
        Ok(Some(BoxCoords::new(x_min, y_min, x_max, y_max)))
    }

    /// Domain size (nm).
    pub fn extent(&self) -> [f64; 2] {
        [
            self.shape.0 as f64 * self.resolution,
            self.shape.1 as f64 * self.resolution,
        ]
    }
}

/// Rasterise slab shapes into a density map: 1 inside any shape, 0 elsewhere.
///
/// A shape with a negative size, including a waveguide whose span runs
/// backwards, is rejected with [`LayoutError::Negative`].
///
/// # Arguments
/// * `shapes` - Slab features; overlaps are allowed.
/// * `grid` - Target grid.
pub fn rasterise(shapes: &[Shape], grid: &Grid) -> Result<Array2<f64>, LayoutError> {
    let mut density = Array2::<f64>::zeros(grid.shape);
    for shape in shapes {
        let bounds = shape.bounds(grid.extent());
        if let Some(&value) = bounds.size.iter().find(|&&v| v < 0.0) {
            return Err(LayoutError::Negative { what: "shape size", value });
        }
        match grid.cell_box(&bounds)? {
            Some(b) => density
                .slice_mut(s![b.x_min..b.x_max, b.y_min..b.y_max])
                .fill(1.0),
            None => log::warn!("shape {:?} lies entirely outside the domain", shape),
        }
    }
    Ok(density)
}
