use crate::point::{LineParams, PointSet};

/// Halved mean squared error of `params` over `points`: Σ(ŷ − y)² / 2N.
///
/// An empty set has zero loss.
#[must_use]
pub fn mean_squared_error(params: LineParams, points: &PointSet) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    let sum = points
        .iter()
        .map(|p| (params.predict(p.x) - p.y).powi(2))
        .sum::<f64>();
    sum / (2.0 * points.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::Point;

    #[test]
    fn empty_set_has_zero_loss() {
        let loss = mean_squared_error(LineParams::new(3.0, -7.0), &PointSet::new());
        assert_eq!(loss, 0.0);
    }

    #[test]
    fn zero_only_when_every_point_is_on_the_line() {
        let line = LineParams::new(2.0, 1.0);
        let on_line: PointSet = (0..5)
            .map(|i| Point::new(f64::from(i), line.predict(f64::from(i))))
            .collect();
        assert_eq!(mean_squared_error(line, &on_line), 0.0);

        let mut off_line = on_line.clone();
        off_line.push(Point::new(10.0, 0.0));
        assert!(mean_squared_error(line, &off_line) > 0.0);
    }

    #[test]
    fn matches_hand_computed_value() {
        let points: PointSet = [Point::new(20.0, 30.0), Point::new(50.0, 50.0), Point::new(80.0, 70.0)]
            .into_iter()
            .collect();
        // residuals at (0.5, 10): -10, -15, -20 -> (100 + 225 + 400) / 6
        let loss = mean_squared_error(LineParams::new(0.5, 10.0), &points);
        assert!((loss - 725.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn never_negative_on_seed_data() {
        let seed = PointSet::seed();
        for slope in [-2.0, -0.3, 0.0, 0.9, 3.0] {
            for intercept in [-20.0, 0.0, 45.0, 100.0] {
                assert!(mean_squared_error(LineParams::new(slope, intercept), &seed) >= 0.0);
            }
        }
    }
}
