//! Null-proportion (pi0) estimation for a stratum.

/// Storey's estimator of the proportion of true nulls among `total` hypotheses.
///
/// `pi0 = (#{p > lambda} + 1) / (total * (1 - lambda))`, clamped to `(0, 1]`.
///
/// Only p-values `<= lambda` need to be observed: hypotheses filtered out of a
/// censored list count as `p > lambda` through `total`. Callers guarantee
/// `lambda` is in `(0, 1)` and `total >= observed.len()`. `total` may be
/// fractional (a fold's share of a censored stratum).
pub fn storey_pi0(observed: &[f64], total: f64, lambda: f64) -> f64 {
    if total <= 0.0 {
        return 1.0;
    }
    let below = observed.iter().filter(|&&p| p <= lambda).count() as f64;
    let above = (total - below).max(0.0);
    let pi0 = (above + 1.0) / (total * (1.0 - lambda));
    pi0.min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_pvalues_give_pi0_near_one() {
        let p: Vec<f64> = (1..=1000).map(|i| i as f64 / 1000.0).collect();
        let pi0 = storey_pi0(&p, 1000.0, 0.5);
        assert!((pi0 - 1.0).abs() < 0.01, "pi0={pi0}");
    }

    #[test]
    fn strong_signal_lowers_pi0() {
        let mut p: Vec<f64> = (1..=500).map(|i| i as f64 / 500.0).collect();
        p.extend(std::iter::repeat(1e-6).take(500));
        let pi0 = storey_pi0(&p, 1000.0, 0.5);
        assert!(pi0 < 0.6, "pi0={pi0}");
        assert!(pi0 > 0.0);
    }

    #[test]
    fn censored_hypotheses_count_as_above_lambda() {
        // Only 10 small p-values observed out of 100 declared.
        let p = vec![0.01; 10];
        let full = storey_pi0(&p, 100.0, 0.5);
        // 90 above lambda + 1, over 50.
        assert!((full - 1.0).abs() < 1e-12);
    }

    #[test]
    fn empty_stratum_is_all_null() {
        assert_eq!(storey_pi0(&[], 0.0, 0.5), 1.0);
    }
}
