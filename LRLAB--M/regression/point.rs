use serde::{Deserialize, Serialize};

/// Single observation on the plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Feature value.
    pub x: f64,
    /// Target value.
    pub y: f64,
}

impl Point {
    /// Creates a point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Returns true when both coordinates are finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Seed data shown when the sandbox opens.
pub const SEED_POINTS: [(f64, f64); 8] = [
    (10.0, 15.0),
    (20.0, 30.0),
    (30.0, 28.0),
    (40.0, 45.0),
    (50.0, 55.0),
    (60.0, 65.0),
    (70.0, 62.0),
    (80.0, 85.0),
];

/// Insertion-ordered collection of points. Duplicates are allowed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PointSet {
    points: Vec<Point>,
}

impl PointSet {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self { points: Vec::new() }
    }

    /// The default seed set.
    #[must_use]
    pub fn seed() -> Self {
        SEED_POINTS.iter().copied().map(Point::from).collect()
    }

    /// Appends a point.
    pub fn push(&mut self, point: Point) {
        self.points.push(point);
    }

    /// Removes the first point equal to `point`; returns whether one was found.
    pub fn remove(&mut self, point: &Point) -> bool {
        match self.points.iter().position(|p| p == point) {
            Some(idx) => {
                self.points.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Removes every point.
    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// Number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns true when the set holds no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Iterates in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Point> {
        self.points.iter()
    }

    /// Borrowed view of the points.
    #[must_use]
    pub fn as_slice(&self) -> &[Point] {
        &self.points
    }
}

impl FromIterator<Point> for PointSet {
    fn from_iter<I: IntoIterator<Item = Point>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a PointSet {
    type Item = &'a Point;
    type IntoIter = std::slice::Iter<'a, Point>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

/// Slope and intercept of the line `y = slope * x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LineParams {
    /// Slope (w).
    pub slope: f64,
    /// Intercept (b).
    pub intercept: f64,
}

impl LineParams {
    /// The flat line through the origin.
    pub const ZERO: Self = Self::new(0.0, 0.0);

    /// Creates a parameter pair.
    #[must_use]
    pub const fn new(slope: f64, intercept: f64) -> Self {
        Self { slope, intercept }
    }

    /// Predicted y at `x`.
    #[must_use]
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }

    /// Returns true when both parameters are finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.slope.is_finite() && self.intercept.is_finite()
    }
}
