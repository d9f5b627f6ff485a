use serde::Serialize;

use crate::point::{LineParams, PointSet};

/// Partial derivatives of the halved MSE with respect to slope and intercept.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Gradients {
    /// Mean of `error * x`.
    pub slope: f64,
    /// Mean of `error`.
    pub intercept: f64,
}

/// Full-batch gradients at `params`, or `None` for an empty set.
#[must_use]
pub fn gradients(params: LineParams, points: &PointSet) -> Option<Gradients> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (d_slope, d_intercept) = points.iter().fold((0.0, 0.0), |(ds, di), p| {
        let error = params.predict(p.x) - p.y;
        (ds + error * p.x, di + error)
    });
    Some(Gradients {
        slope: d_slope / n,
        intercept: d_intercept / n,
    })
}

/// One batch gradient-descent update. Returns `params` unchanged for an empty set.
#[must_use]
pub fn gradient_step(params: LineParams, points: &PointSet, learning_rate: f64) -> LineParams {
    gradients(params, points).map_or(params, |grad| {
        LineParams::new(
            params.slope - learning_rate * grad.slope,
            params.intercept - learning_rate * grad.intercept,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{fit::best_fit, loss::mean_squared_error, point::Point};

    #[test]
    fn empty_set_is_a_no_op() {
        let start = LineParams::new(0.7, -3.0);
        assert_eq!(gradient_step(start, &PointSet::new(), 0.1), start);
        assert!(gradients(start, &PointSet::new()).is_none());
    }

    #[test]
    fn single_step_matches_hand_computation() {
        let points: PointSet = [Point::new(1.0, 2.0), Point::new(2.0, 3.0)].into_iter().collect();
        // errors at (0,0): -2, -3; d_slope = (-2 - 6)/2 = -4; d_intercept = -2.5
        let next = gradient_step(LineParams::ZERO, &points, 0.1);
        assert!((next.slope - 0.4).abs() < 1e-12);
        assert!((next.intercept - 0.25).abs() < 1e-12);
    }

    #[test]
    fn gradients_vanish_at_the_least_squares_line() {
        let seed = PointSet::seed();
        let grad = gradients(best_fit(&seed), &seed).unwrap();
        assert!(grad.slope.abs() < 1e-9);
        assert!(grad.intercept.abs() < 1e-9);
    }

    #[test]
    fn descent_on_seed_data_is_monotone_and_approaches_optimum() {
        let seed = PointSet::seed();
        let optimum = mean_squared_error(best_fit(&seed), &seed);
        let mut params = LineParams::ZERO;
        let mut previous = mean_squared_error(params, &seed);
        for _ in 0..200_000 {
            params = gradient_step(params, &seed, 0.0001);
            let loss = mean_squared_error(params, &seed);
            assert!(loss <= previous + 1e-12);
            previous = loss;
        }
        assert!(previous >= optimum - 1e-9);
        assert!(previous - optimum < 0.01, "loss {previous} optimum {optimum}");
    }
}
