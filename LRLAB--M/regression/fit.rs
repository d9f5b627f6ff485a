use crate::point::{LineParams, PointSet};

/// Ordinary least squares line, or `None` when it is undefined.
///
/// Undefined means fewer than two points, or zero spread in x (the
/// normal-equation denominator is exactly zero).
#[must_use]
pub fn try_best_fit(points: &PointSet) -> Option<LineParams> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let (sum_x, sum_y, sum_xy, sum_xx) = points.iter().fold(
        (0.0, 0.0, 0.0, 0.0),
        |(sx, sy, sxy, sxx), p| (sx + p.x, sy + p.y, sxy + p.x * p.y, sxx + p.x * p.x),
    );
    let denominator = n * sum_xx - sum_x * sum_x;
    if denominator == 0.0 {
        return None;
    }
    let slope = (n * sum_xy - sum_x * sum_y) / denominator;
    let intercept = (sum_y - slope * sum_x) / n;
    let fit = LineParams::new(slope, intercept);
    fit.is_finite().then_some(fit)
}

/// Ordinary least squares line, reporting `(0, 0)` when undefined.
#[must_use]
pub fn best_fit(points: &PointSet) -> LineParams {
    try_best_fit(points).unwrap_or(LineParams::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loss::mean_squared_error;
    use crate::point::Point;

    fn closed_form(points: &PointSet) -> (f64, f64) {
        let n = points.len() as f64;
        let sx: f64 = points.iter().map(|p| p.x).sum();
        let sy: f64 = points.iter().map(|p| p.y).sum();
        let sxy: f64 = points.iter().map(|p| p.x * p.y).sum();
        let sxx: f64 = points.iter().map(|p| p.x * p.x).sum();
        let slope = (n * sxy - sx * sy) / (n * sxx - sx * sx);
        (slope, (sy - slope * sx) / n)
    }

    #[test]
    fn degenerate_sets_report_zero_line() {
        assert_eq!(best_fit(&PointSet::new()), LineParams::ZERO);
        let single: PointSet = [Point::new(4.0, 9.0)].into_iter().collect();
        assert_eq!(best_fit(&single), LineParams::ZERO);
        let vertical: PointSet = [Point::new(3.0, 1.0), Point::new(3.0, 8.0), Point::new(3.0, 2.0)]
            .into_iter()
            .collect();
        assert_eq!(best_fit(&vertical), LineParams::ZERO);
        assert!(try_best_fit(&vertical).is_none());
    }

    #[test]
    fn seed_fit_matches_formula() {
        let seed = PointSet::seed();
        let fit = best_fit(&seed);
        let (slope, intercept) = closed_form(&seed);
        assert!((fit.slope - slope).abs() < 1e-12);
        assert!((fit.intercept - intercept).abs() < 1e-9);
        // n=8, Σx=360, Σy=385, Σxy=21180, Σx²=20400
        assert!((fit.slope - 30_840.0 / 33_600.0).abs() < 1e-12);
    }

    #[test]
    fn seed_fit_is_a_local_minimum() {
        let seed = PointSet::seed();
        let fit = best_fit(&seed);
        let at_fit = mean_squared_error(fit, &seed);
        for (ds, di) in [(1e-3, 0.0), (-1e-3, 0.0), (0.0, 1e-2), (0.0, -1e-2), (1e-3, -1e-2)] {
            let nudged = LineParams::new(fit.slope + ds, fit.intercept + di);
            assert!(at_fit <= mean_squared_error(nudged, &seed));
        }
    }

    #[test]
    fn exact_line_is_recovered() {
        let points: PointSet = [Point::new(0.0, 1.0), Point::new(2.0, 5.0)].into_iter().collect();
        let fit = try_best_fit(&points).unwrap();
        assert!((fit.slope - 2.0).abs() < 1e-12);
        assert!((fit.intercept - 1.0).abs() < 1e-12);
    }
}
