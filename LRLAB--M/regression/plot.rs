//! Geometry the chart layer draws: line segments and residual markers.

use serde::Serialize;

use crate::{
    config::Bounds,
    point::{LineParams, Point, PointSet},
};

/// Straight segment between two chart coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LineSegment {
    /// Left end.
    pub start: Point,
    /// Right end.
    pub end: Point,
}

/// Prediction error at one observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Residual {
    /// The observation.
    pub point: Point,
    /// Model output at `point.x`.
    pub predicted: f64,
    /// `predicted - point.y`.
    pub residual: f64,
}

/// The line over `x_range`.
#[must_use]
pub fn line_segment(params: LineParams, x_range: Bounds) -> LineSegment {
    LineSegment {
        start: Point::new(x_range.min, params.predict(x_range.min)),
        end: Point::new(x_range.max, params.predict(x_range.max)),
    }
}

/// Residual of every point, in insertion order.
#[must_use]
pub fn residuals(params: LineParams, points: &PointSet) -> Vec<Residual> {
    points
        .iter()
        .map(|&point| {
            let predicted = params.predict(point.x);
            Residual {
                point,
                predicted,
                residual: predicted - point.y,
            }
        })
        .collect()
}
