//! # Inverso Geometry
//!
//! Planar device layouts for the Inverso framework. This crate provides:
//!
//! - **Primitives** ([`primitives`]): rectangles and straight waveguides in
//!   nanometres.
//! - **Discretisation** ([`discretise`]): snapping lengths onto the grid and
//!   rasterising shapes into a density map.
//! - **Transformations** ([`transform`]): mirror symmetry of the design
//!   variable and its adjoint.
//! - **Layouts** ([`layout`]): a serialisable device description and the
//!   [`LayoutModel`] that simulates it.

pub mod discretise;
pub mod layout;
pub mod primitives;
pub mod transform;

pub use layout::{LayoutError, LayoutModel, LayoutSpec, PortSpec};
