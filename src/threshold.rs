//! Benjamini–Hochberg and Bonferroni thresholds, rejections and adjusted p-values.
//!
//! All entry points take a `total_tests` count that may exceed the number of
//! p-values supplied. That is how censored lists (only small p-values kept) are
//! adjusted for the right multiplicity: the missing tests are known to exist
//! even though their p-values were never observed.
//!
//! Inputs may be weighted p-values (`p / w`), so values above 1 and `+inf` are
//! accepted; `+inf` is never rejected. `NaN` marks a missing value: it is
//! skipped, never rejected, and comes back as `NaN` from the adjust functions.
//!
//! The BH threshold and [`bh_adjust`] evaluate the step-up quantity
//! `(total / rank) * p` with the same helper, so `p <= threshold` selects exactly
//! the hypotheses whose adjusted p-value is `<= alpha`, bit for bit.

use crate::error::{InvalidInputError, Result};

/// Which error rate the procedure controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AdjustmentType {
    /// Benjamini–Hochberg step-up (false discovery rate).
    #[default]
    Bh,
    /// Bonferroni single-step (family-wise error rate).
    Bonferroni,
}

/// A rejection threshold and the number of hypotheses it rejects.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Threshold {
    /// Largest rejected (weighted) p-value, or 0 when nothing is rejected.
    pub value: f64,
    /// Number of rejected hypotheses.
    pub rejections: usize,
}

impl Threshold {
    /// No rejections.
    pub const NONE: Threshold = Threshold {
        value: 0.0,
        rejections: 0,
    };

    /// Whether a (weighted) p-value is rejected at this threshold.
    #[must_use]
    pub fn rejects(&self, p: f64) -> bool {
        self.rejections > 0 && !p.is_nan() && p <= self.value
    }
}

/// BH step-up quantity for the `rank`-th smallest of `total` p-values.
#[inline]
fn bh_scaled(p: f64, total: f64, rank: usize) -> f64 {
    (total / rank as f64) * p
}

/// Indices of non-missing values, sorted by value (stable).
fn sorted_active(pvals: &[f64]) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..pvals.len()).filter(|&i| !pvals[i].is_nan()).collect();
    idx.sort_by(|&a, &b| pvals[a].total_cmp(&pvals[b]));
    idx
}

fn validate(pvals: &[f64], total_tests: u64) -> Result<usize> {
    let mut observed = 0usize;
    for (index, &value) in pvals.iter().enumerate() {
        if value.is_nan() {
            continue;
        }
        if value < 0.0 {
            return Err(InvalidInputError::PValueOutOfRange { index, value });
        }
        observed += 1;
    }
    if (observed as u64) > total_tests {
        return Err(InvalidInputError::TotalBelowObserved {
            total: total_tests,
            observed: observed as u64,
        });
    }
    Ok(observed)
}

pub(crate) fn validate_alpha(alpha: f64) -> Result<()> {
    if alpha > 0.0 && alpha < 1.0 {
        Ok(())
    } else {
        Err(InvalidInputError::AlphaOutOfRange(alpha))
    }
}

/// BH rejection threshold at level `alpha` over `total_tests` hypotheses.
///
/// `t = max{ p_(j) : (total/j) * p_(j) <= alpha }`, or 0 if no rank qualifies.
///
/// ```rust
/// use ihw::bh_threshold;
///
/// let t = bh_threshold(&[0.01, 0.04, 0.03, 0.005], 0.05, 4).unwrap();
/// assert_eq!(t.rejections, 4);
/// assert_eq!(t.value, 0.04);
///
/// // The same p-values as the survivors of a filter over 100 tests.
/// let t = bh_threshold(&[0.01, 0.04, 0.03, 0.005], 0.05, 100).unwrap();
/// assert_eq!(t.rejections, 0);
/// ```
pub fn bh_threshold(pvals: &[f64], alpha: f64, total_tests: u64) -> Result<Threshold> {
    validate_alpha(alpha)?;
    validate(pvals, total_tests)?;
    let order = sorted_active(pvals);
    let total = total_tests as f64;
    let mut out = Threshold::NONE;
    for (k, &i) in order.iter().enumerate() {
        let rank = k + 1;
        if bh_scaled(pvals[i], total, rank) <= alpha {
            out = Threshold {
                value: pvals[i],
                rejections: rank,
            };
        }
    }
    Ok(out)
}

/// BH adjusted p-values, as `p.adjust(p, "BH", n = total_tests)`.
pub fn bh_adjust(pvals: &[f64], total_tests: u64) -> Result<Vec<f64>> {
    validate(pvals, total_tests)?;
    let order = sorted_active(pvals);
    let total = total_tests as f64;
    let mut adj = vec![f64::NAN; pvals.len()];
    let mut running = f64::INFINITY;
    for (k, &i) in order.iter().enumerate().rev() {
        running = running.min(bh_scaled(pvals[i], total, k + 1));
        adj[i] = running.min(1.0);
    }
    Ok(adj)
}

/// Bonferroni rejections at level `alpha` over `total_tests` hypotheses.
///
/// The nominal cut is `alpha / total_tests`; the rule applied is
/// `total_tests * p <= alpha`, the same expression [`bonferroni_adjust`] uses.
/// The returned `value` is the largest p-value that passes.
pub fn bonferroni_threshold(pvals: &[f64], alpha: f64, total_tests: u64) -> Result<Threshold> {
    validate_alpha(alpha)?;
    validate(pvals, total_tests)?;
    let total = total_tests as f64;
    let mut out = Threshold::NONE;
    for &p in pvals.iter().filter(|p| !p.is_nan()) {
        if total * p <= alpha {
            out.rejections += 1;
            out.value = out.value.max(p);
        }
    }
    Ok(out)
}

/// Bonferroni adjusted p-values: `min(1, total_tests * p)`.
pub fn bonferroni_adjust(pvals: &[f64], total_tests: u64) -> Result<Vec<f64>> {
    validate(pvals, total_tests)?;
    let total = total_tests as f64;
    Ok(pvals
        .iter()
        .map(|&p| if p.is_nan() { p } else { (total * p).min(1.0) })
        .collect())
}

/// Threshold for the chosen adjustment.
pub fn threshold(
    kind: AdjustmentType,
    pvals: &[f64],
    alpha: f64,
    total_tests: u64,
) -> Result<Threshold> {
    match kind {
        AdjustmentType::Bh => bh_threshold(pvals, alpha, total_tests),
        AdjustmentType::Bonferroni => bonferroni_threshold(pvals, alpha, total_tests),
    }
}

/// Adjusted p-values for the chosen adjustment.
pub fn adjust(kind: AdjustmentType, pvals: &[f64], total_tests: u64) -> Result<Vec<f64>> {
    match kind {
        AdjustmentType::Bh => bh_adjust(pvals, total_tests),
        AdjustmentType::Bonferroni => bonferroni_adjust(pvals, total_tests),
    }
}

/// Indices rejected by `t`, in input order.
#[must_use]
pub fn rejected_indices(pvals: &[f64], t: &Threshold) -> Vec<usize> {
    (0..pvals.len()).filter(|&i| t.rejects(pvals[i])).collect()
}
