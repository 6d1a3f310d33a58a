//! # Inverso Core
//!
//! The numerical engine of the Inverso framework. This crate evaluates planar
//! photonic devices (splitters, converters, bends, multiplexers) described as
//! a rasterised permittivity map with waveguide ports and a rectangular design
//! region, and produces scattering parameters and steady-state fields.
//!
//! ## Architecture
//!
//! Field solves go through the [`solver::FieldSolver`] trait so the
//! orchestration code never depends on a particular Maxwell solver. The
//! default implementation is a finite-difference frequency-domain solver for
//! the TM polarisation ([`solver::fdfd::FdfdEz`]).
//!
//! ## Modules
//!
//! - [`units`]: Physical quantities and snapping onto the simulation grid.
//! - [`types`]: Directions, vector fields, box coordinates, result containers.
//! - [`ops`]: Cross products and overlap integrals of vector fields.
//! - [`modes`]: Waveguide eigenmode solver and port definitions.
//! - [`scattering`]: Forward/backward mode amplitude extraction.
//! - [`primitives`]: Design-variable inlay and its gradient rule.
//! - [`model`]: Device model trait and the multi-port simulation driver.
//! - [`solver`]: Field solver trait and the FDFD implementation.

pub mod constants;
pub mod model;
pub mod modes;
pub mod ops;
pub mod primitives;
pub mod scattering;
pub mod solver;
pub mod types;
pub mod units;

pub use model::{simulate, DeviceModel, ModelError, SimulateOptions};
pub use modes::{solve_modes, ModeError, ModeProfile, Port, PortSlice, ProfilePort, WaveguidePort};
pub use solver::{FieldProblem, FieldSolution, FieldSolver, SolverError};
pub use types::{BoxCoords, Direction, SimulationOutput, VectorField};
