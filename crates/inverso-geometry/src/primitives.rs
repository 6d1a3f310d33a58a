//! Rectangular layout primitives.
//!
//! Every feature of a planar device layout is an axis-aligned rectangle of
//! slab material on a cladding background. Positions are measured in
//! nanometres from the lower-left corner of the domain.

use serde::{Deserialize, Serialize};

/// An in-plane axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineAxis {
    X,
    Y,
}

/// A layout feature filled with slab material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Shape {
    Rect(Rect),
    Waveguide(Waveguide),
}

/// An axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Centre position (nm).
    pub centre: [f64; 2],
    /// Full side lengths along x and y (nm).
    pub size: [f64; 2],
}

/// A straight waveguide running along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waveguide {
    /// Propagation axis.
    pub axis: LineAxis,
    /// Transverse position of the waveguide centre line (nm).
    pub centre: f64,
    /// Core width (nm).
    pub width: f64,
    /// Start and end along the propagation axis (nm). Spans the whole
    /// domain when omitted.
    #[serde(default)]
    pub span: Option<[f64; 2]>,
}

impl Rect {
    pub fn new(centre: [f64; 2], size: [f64; 2]) -> Self {
        Self { centre, size }
    }

    /// Rectangle from its lower and upper corners (nm).
    pub fn from_corners(lower: [f64; 2], upper: [f64; 2]) -> Self {
        Self {
            centre: [0.5 * (lower[0] + upper[0]), 0.5 * (lower[1] + upper[1])],
            size: [upper[0] - lower[0], upper[1] - lower[1]],
        }
    }

    /// Lower and upper corners (nm).
    pub fn corners(&self) -> ([f64; 2], [f64; 2]) {
        (
            [self.centre[0] - 0.5 * self.size[0], self.centre[1] - 0.5 * self.size[1]],
            [self.centre[0] + 0.5 * self.size[0], self.centre[1] + 0.5 * self.size[1]],
        )
    }
}

impl Shape {
    /// Bounding rectangle of the shape in a domain of size `extent` (nm).
    pub fn bounds(&self, extent: [f64; 2]) -> Rect {
        match self {
            Shape::Rect(r) => *r,
            Shape::Waveguide(w) => {
                let along = match w.axis {
                    LineAxis::X => 0,
                    LineAxis::Y => 1,
                };
                let [start, end] = w.span.unwrap_or([0.0, extent[along]]);
                let lo = w.centre - 0.5 * w.width;
                let hi = w.centre + 0.5 * w.width;
                match w.axis {
                    LineAxis::X => Rect::from_corners([start, lo], [end, hi]),
                    LineAxis::Y => Rect::from_corners([lo, start], [hi, end]),
                }
            }
        }
    }
}
