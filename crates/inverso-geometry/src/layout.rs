//! Rectangle-layout device models.
//!
//! A [`LayoutSpec`] describes a device in physical units: slab shapes on a
//! cladding background, one rectangular design region, ports and output
//! wavelengths. [`LayoutModel`] snaps it onto the grid and implements
//! [`DeviceModel`] so it can be simulated directly.

use inverso_core::modes::{ModeError, Port, WaveguidePort};
use inverso_core::units::UnitsError;
use inverso_core::{BoxCoords, DeviceModel, Direction};
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::discretise::{rasterise, Grid};
use crate::primitives::{Rect, Shape};
use crate::transform::Mirror;

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error(transparent)]
    Units(#[from] UnitsError),

    #[error(transparent)]
    Mode(#[from] ModeError),

    #[error("Grid resolution must be positive, got {0} nm")]
    InvalidResolution(f64),

    #[error("Domain has no cells")]
    EmptyDomain,

    #[error("{what} must not be negative, got {value} nm")]
    Negative { what: &'static str, value: f64 },

    #[error("PML of {pml} cells leaves no interior in a {nx}x{ny} domain")]
    PmlTooWide { pml: usize, nx: usize, ny: usize },

    #[error("Invalid {which} permittivity {value}")]
    InvalidPermittivity { which: &'static str, value: f64 },

    #[error("At least one output wavelength is required")]
    NoWavelengths,

    #[error("Design region {0:?} must lie strictly inside the domain")]
    DesignRegionOutside(BoxCoords),

    #[error("Design region of shape {shape:?} cannot be split evenly by a {mirror:?} mirror")]
    UnevenSymmetry { shape: (usize, usize), mirror: Mirror },

    #[error("Port {index} at cells ({x}, {y}) lies outside the domain")]
    PortOutsideDomain { index: usize, x: usize, y: usize },
}

/// A port in physical units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortSpec {
    /// Centre of the port line (nm).
    pub centre: [f64; 2],
    /// Transverse width of the port line (nm).
    pub width: f64,
    /// Direction pointing into the device.
    pub direction: Direction,
    /// Distance from the port line to the monitor line (nm).
    #[serde(default)]
    pub monitor_offset: f64,
    /// Mode order, 1 = fundamental.
    #[serde(default = "default_order")]
    pub order: usize,
}

fn default_order() -> usize {
    1
}

/// A planar device described in physical units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutSpec {
    /// Domain size along x and y (nm).
    pub extent: [f64; 2],
    /// Grid cell size (nm).
    pub resolution: f64,
    /// PML thickness on every edge (nm).
    pub pml_width: f64,
    pub cladding_permittivity: f64,
    pub slab_permittivity: f64,
    /// Default output wavelengths (nm).
    pub wavelengths: Vec<f64>,
    pub design_region: Rect,
    /// Optional mirror symmetry imposed on the design variable.
    #[serde(default)]
    pub design_symmetry: Option<Mirror>,
    /// Fixed slab features of the background.
    #[serde(default)]
    pub shapes: Vec<Shape>,
    pub ports: Vec<PortSpec>,
}

/// A [`LayoutSpec`] resolved onto its grid.
#[derive(Debug)]
pub struct LayoutModel {
    spec: LayoutSpec,
    grid: Grid,
    pml_cells: usize,
    density_bg: Array2<f64>,
    design_region: BoxCoords,
    ports: Vec<Box<dyn Port>>,
}

impl LayoutModel {
    pub fn new(spec: LayoutSpec) -> Result<Self, LayoutError> {
        let grid = Grid::new(spec.extent, spec.resolution)?;
        let (nx, ny) = grid.shape;

        let pml_cells = grid.cells(spec.pml_width, "PML width")?;
        if 2 * pml_cells >= nx || 2 * pml_cells >= ny {
            return Err(LayoutError::PmlTooWide { pml: pml_cells, nx, ny });
        }

        for (which, value) in [
            ("cladding", spec.cladding_permittivity),
            ("slab", spec.slab_permittivity),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(LayoutError::InvalidPermittivity { which, value });
            }
        }
        if spec.wavelengths.is_empty() {
            return Err(LayoutError::NoWavelengths);
        }

        let density_bg = rasterise(&spec.shapes, &grid)?;

        let design_region = Self::resolve_design_region(&spec, &grid)?;
        if let Some(mirror) = spec.design_symmetry {
            if !mirror.divides(design_region.shape()) {
                return Err(LayoutError::UnevenSymmetry {
                    shape: design_region.shape(),
                    mirror,
                });
            }
        }

        let ports = spec
            .ports
            .iter()
            .enumerate()
            .map(|(index, port)| Self::resolve_port(index, port, &grid))
            .collect::<Result<Vec<_>, _>>()?;

        log::debug!(
            "layout resolved: {}x{} cells at {} nm, {} ports, design region {:?}",
            nx,
            ny,
            spec.resolution,
            ports.len(),
            design_region
        );

        Ok(Self {
            spec,
            grid,
            pml_cells,
            density_bg,
            design_region,
            ports,
        })
    }

    fn resolve_design_region(spec: &LayoutSpec, grid: &Grid) -> Result<BoxCoords, LayoutError> {
        let (lo, hi) = spec.design_region.corners();
        let (nx, ny) = grid.shape;
        let x_min = grid.cells(lo[0], "design region x_min")?;
        let y_min = grid.cells(lo[1], "design region y_min")?;
        let x_max = grid.cells(hi[0], "design region x_max")?;
        let y_max = grid.cells(hi[1], "design region y_max")?;
        let coords = BoxCoords::new(x_min, y_min, x_max, y_max);
        if x_min == 0 || y_min == 0 || x_min >= x_max || y_min >= y_max || x_max >= nx || y_max >= ny {
            return Err(LayoutError::DesignRegionOutside(coords));
        }
        Ok(coords)
    }

    fn resolve_port(index: usize, port: &PortSpec, grid: &Grid) -> Result<Box<dyn Port>, LayoutError> {
        let x = grid.cells(port.centre[0], "port centre x")?;
        let y = grid.cells(port.centre[1], "port centre y")?;
        let width = grid.cells(port.width, "port width")?;
        let offset = grid.cells(port.monitor_offset, "port monitor offset")?;
        let resolved = WaveguidePort::new(x, y, width, port.order, port.direction, offset)?;

        let (nx, ny) = grid.shape;
        if resolved.coords().iter().any(|&(cx, cy)| cx >= nx || cy >= ny) {
            return Err(LayoutError::PortOutsideDomain { index, x, y });
        }
        Ok(Box::new(resolved))
    }

    pub fn spec(&self) -> &LayoutSpec {
        &self.spec
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }
}

impl DeviceModel for LayoutModel {
    fn shape(&self) -> (usize, usize) {
        self.grid.shape
    }

    fn design_region_coords(&self) -> BoxCoords {
        self.design_region
    }

    fn slab_permittivity(&self) -> f64 {
        self.spec.slab_permittivity
    }

    fn cladding_permittivity(&self) -> f64 {
        self.spec.cladding_permittivity
    }

    fn density_bg(&self) -> ArrayView2<'_, f64> {
        self.density_bg.view()
    }

    fn dl(&self) -> f64 {
        self.grid.dl()
    }

    fn pml_width(&self) -> usize {
        self.pml_cells
    }

    fn ports(&self) -> &[Box<dyn Port>] {
        &self.ports
    }

    fn output_wavelengths(&self) -> &[f64] {
        &self.spec.wavelengths
    }

    fn design_variable_shape(&self) -> (usize, usize) {
        let region = self.design_region_shape();
        match self.spec.design_symmetry {
            Some(mirror) => mirror.half_shape(region),
            None => region,
        }
    }

    fn transform_design_variable(&self, design_variable: ArrayView2<f64>) -> Array2<f64> {
        match self.spec.design_symmetry {
            Some(mirror) => mirror.expand(design_variable),
            None => design_variable.to_owned(),
        }
    }

    fn transform_design_variable_vjp(
        &self,
        _design_variable: ArrayView2<f64>,
        cotangent: ArrayView2<f64>,
    ) -> Array2<f64> {
        match self.spec.design_symmetry {
            Some(mirror) => mirror.fold(cotangent),
            None => cotangent.to_owned(),
        }
    }
}
