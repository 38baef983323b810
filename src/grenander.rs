//! Grenander estimator: least concave majorant (LCM) of an empirical CDF on `[0, 1]`.
//!
//! The LCM is piecewise linear with non-increasing slopes, i.e. the slopes form a
//! non-increasing density estimate for the p-values of one stratum. The ECDF is
//! scaled by the stratum's declared size, so a censored list (only small
//! p-values observed) still yields a proper CDF: the unobserved mass sits between
//! the largest observed p-value and 1.

/// Piecewise-linear concave CDF estimate on `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Grenander {
    /// Hull knots `(x, F(x))`, `x` strictly increasing, ending at `(1, 1)`.
    knots: Vec<(f64, f64)>,
}

/// One linear piece of the estimate, from the previous knot to `(x, y)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub x: f64,
    pub y: f64,
    pub dx: f64,
    pub dy: f64,
    /// Density on this piece (`dy / dx`).
    pub slope: f64,
}

impl Grenander {
    /// Fit to ascending p-values out of `total` hypotheses (`total >= sorted.len()`).
    ///
    /// Hypotheses beyond `sorted.len()` are unobserved; they are only known to
    /// have p-values somewhere in `[0, 1]`.
    pub fn fit(sorted: &[f64], total: f64) -> Self {
        debug_assert!(sorted.windows(2).all(|w| w[0] <= w[1]));
        let mut points: Vec<(f64, f64)> = Vec::with_capacity(sorted.len() + 2);
        points.push((0.0, 0.0));
        if total > 0.0 {
            for (k, &p) in sorted.iter().enumerate() {
                let y = ((k + 1) as f64 / total).min(1.0);
                match points.last_mut() {
                    // Ties (and p = 0) collapse onto one point at the top of the jump.
                    Some(last) if last.0 == p => last.1 = y,
                    _ => points.push((p, y)),
                }
            }
        }
        match points.last_mut() {
            Some(last) if last.0 >= 1.0 => *last = (1.0, 1.0),
            _ => points.push((1.0, 1.0)),
        }

        let mut hull: Vec<(f64, f64)> = Vec::with_capacity(points.len());
        for p in points {
            while hull.len() >= 2 {
                let a = hull[hull.len() - 2];
                let b = hull[hull.len() - 1];
                // Drop `b` unless it lies strictly above the chord a→p.
                let cross = (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0);
                if cross >= 0.0 {
                    hull.pop();
                } else {
                    break;
                }
            }
            hull.push(p);
        }
        Self { knots: hull }
    }

    /// Estimated CDF at `t = 0` (mass of p-values exactly equal to 0).
    pub fn mass_at_zero(&self) -> f64 {
        self.knots.first().map_or(0.0, |k| k.1)
    }

    pub fn knots(&self) -> &[(f64, f64)] {
        &self.knots
    }

    /// Linear pieces in order of increasing `x` (decreasing slope).
    pub fn segments(&self) -> impl Iterator<Item = Segment> + '_ {
        self.knots.windows(2).map(|w| {
            let (x0, y0) = w[0];
            let (x1, y1) = w[1];
            let dx = x1 - x0;
            let dy = y1 - y0;
            Segment {
                x: x1,
                y: y1,
                dx,
                dy,
                slope: dy / dx,
            }
        })
    }

    /// Estimated CDF at `t` (clamped to `[0, 1]`).
    pub fn cdf(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        let i = self.knots.partition_point(|k| k.0 <= t);
        if i == 0 {
            return self.mass_at_zero();
        }
        if i == self.knots.len() {
            return self.knots[i - 1].1;
        }
        let (x0, y0) = self.knots[i - 1];
        let (x1, y1) = self.knots[i];
        y0 + (y1 - y0) * (t - x0) / (x1 - x0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn no_observations_is_uniform() {
        let g = Grenander::fit(&[], 10.0);
        assert_eq!(g.knots(), &[(0.0, 0.0), (1.0, 1.0)]);
        assert!((g.cdf(0.3) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn concentrated_small_pvalues_give_steep_first_piece() {
        let p = [0.001, 0.002, 0.003, 0.004, 0.5, 0.9];
        let g = Grenander::fit(&p, 6.0);
        let first = g.segments().next().unwrap();
        assert!(first.slope > 100.0, "slope={}", first.slope);
        let slopes: Vec<f64> = g.segments().map(|s| s.slope).collect();
        for w in slopes.windows(2) {
            assert!(w[0] >= w[1] - 1e-9, "slopes must not increase: {slopes:?}");
        }
        assert_eq!(g.knots().last(), Some(&(1.0, 1.0)));
    }

    #[test]
    fn censored_fit_puts_missing_mass_after_last_observation() {
        // 4 observed out of 100: the other 96 spread over (0.004, 1].
        let g = Grenander::fit(&[0.001, 0.002, 0.003, 0.004], 100.0);
        assert!((g.cdf(0.004) - 0.04).abs() < 1e-12);
        assert!((g.cdf(1.0) - 1.0).abs() < 1e-12);
        let last = g.segments().last().unwrap();
        assert!(last.slope < 1.0 && last.slope > 0.9, "slope={}", last.slope);
    }

    #[test]
    fn zero_pvalues_are_a_point_mass() {
        let g = Grenander::fit(&[0.0, 0.0, 0.5], 4.0);
        assert!((g.mass_at_zero() - 0.5).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn majorant_is_concave_and_dominates_ecdf(
            mut p in proptest::collection::vec(0.0f64..=1.0, 0..100),
            extra in 0usize..50,
        ) {
            p.sort_by(|a, b| a.total_cmp(b));
            let total = (p.len() + extra) as f64;
            let g = Grenander::fit(&p, total);
            let mut prev = f64::INFINITY;
            for s in g.segments() {
                prop_assert!(s.dx > 0.0);
                prop_assert!(s.slope >= 0.0);
                prop_assert!(s.slope <= prev + 1e-9);
                prev = s.slope;
            }
            for (k, &x) in p.iter().enumerate() {
                let ecdf = (k + 1) as f64 / total;
                prop_assert!(g.cdf(x) >= ecdf - 1e-9, "x={} F={} ecdf={}", x, g.cdf(x), ecdf);
            }
        }
    }
}
