//! Per-stratum weight learning for one training split.
//!
//! The optimizer maps training p-values (grouped by stratum) to one threshold
//! per stratum; [`thresholds_to_weights`] turns thresholds into weights whose
//! size-weighted mean over the receiving cells is exactly 1. That normalization
//! is what keeps the weighted BH / Bonferroni procedure valid, whatever the
//! thresholds were.

use crate::error::Result;
use crate::grenander::Grenander;
use crate::null_proportion::storey_pi0;
use crate::threshold::{threshold, validate_alpha, AdjustmentType};

/// How per-stratum thresholds are learned from training p-values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WeightOptimizer {
    /// Closed form: each stratum's threshold is its largest p-value at or
    /// below the pooled (unweighted) rejection threshold.
    ClosedForm,
    /// Grenander density estimate per stratum plus an exact search over the
    /// common density level that maximizes expected discoveries subject to
    /// the error-rate constraint.
    #[default]
    Grenander,
}

/// Training data for one split.
#[derive(Debug, Clone, Default)]
pub struct TrainingSet {
    /// Observed p-values per stratum, ascending.
    pub pvalues: Vec<Vec<f64>>,
    /// Declared hypothesis count per stratum (observed plus filtered).
    pub sizes: Vec<f64>,
}

impl TrainingSet {
    /// Build from per-stratum p-value lists (sorted here) and declared sizes.
    pub fn new(mut pvalues: Vec<Vec<f64>>, sizes: Vec<f64>) -> Self {
        debug_assert_eq!(pvalues.len(), sizes.len());
        for v in &mut pvalues {
            v.sort_by(|a, b| a.total_cmp(b));
        }
        Self { pvalues, sizes }
    }

    pub fn nbins(&self) -> usize {
        self.sizes.len()
    }

    pub fn total(&self) -> f64 {
        self.sizes.iter().sum()
    }
}

/// Settings shared by every fit in one run.
#[derive(Debug, Clone, Copy)]
pub struct FitSettings {
    pub optimizer: WeightOptimizer,
    pub adjustment: AdjustmentType,
    pub alpha: f64,
    /// Storey level when null-proportion adjustment is on.
    pub null_proportion_level: Option<f64>,
}

/// Weights for one column of the weight matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightFit {
    pub weights: Vec<f64>,
    /// No stratum had a positive threshold; weights fell back to 1.
    pub degenerate: bool,
}

/// Learn one threshold per stratum from `training`.
///
/// Fails only if `settings.alpha` is outside `(0, 1)`.
pub fn fit_thresholds(training: &TrainingSet, settings: &FitSettings) -> Result<Vec<f64>> {
    match settings.optimizer {
        WeightOptimizer::ClosedForm => closed_form_thresholds(training, settings),
        WeightOptimizer::Grenander => {
            validate_alpha(settings.alpha)?;
            Ok(grenander_thresholds(training, settings))
        }
    }
}

fn closed_form_thresholds(training: &TrainingSet, settings: &FitSettings) -> Result<Vec<f64>> {
    let pooled: Vec<f64> = training.pvalues.iter().flatten().copied().collect();
    // Declared sizes can be fractional for a fold; the pooled count is rounded
    // up so it never falls below the observed count.
    let total = training.total().ceil().max(pooled.len() as f64) as u64;
    let t = threshold(settings.adjustment, &pooled, settings.alpha, total)?;
    Ok(training
        .pvalues
        .iter()
        .map(|ps| {
            ps.iter()
                .copied()
                .filter(|&p| t.rejects(p))
                .fold(0.0, f64::max)
        })
        .collect())
}

/// One hull piece in the global path.
struct PathStep {
    stratum: usize,
    x: f64,
    dx: f64,
    dy: f64,
    /// Density divided by the stratum's null proportion.
    key: f64,
}

/// Grenander thresholds by a greedy walk down the common density level.
///
/// With concave CDF estimates `F_s`, the optimum of
/// `max Σ m_s F_s(t_s)` subject to the error-rate constraint puts every `t_s`
/// where `f_s(t_s) / pi0_s` equals a common level. Walking hull pieces in
/// decreasing `slope / pi0` order and stopping part-way through the first
/// piece that would break the constraint reaches that optimum exactly.
///
/// - BH: `Σ pi0_s m_s t_s <= alpha * Σ m_s F_s(t_s)`
/// - Bonferroni: `Σ m_s t_s <= alpha`
fn grenander_thresholds(training: &TrainingSet, settings: &FitSettings) -> Vec<f64> {
    let nbins = training.nbins();
    let mut thresholds = vec![0.0; nbins];
    let mut steps: Vec<PathStep> = Vec::new();
    let mut pi0 = vec![1.0; nbins];
    // p-values equal to 0 are discoveries at any threshold.
    let mut discoveries = 0.0;

    for s in 0..nbins {
        let m = training.sizes[s];
        if m <= 0.0 {
            continue;
        }
        let ps = &training.pvalues[s];
        // pi0 only enters the FDR constraint; Bonferroni has no use for it.
        if let (Some(level), AdjustmentType::Bh) =
            (settings.null_proportion_level, settings.adjustment)
        {
            pi0[s] = storey_pi0(ps, m, level);
        }
        let g = Grenander::fit(ps, m);
        discoveries += m * g.mass_at_zero();
        steps.extend(
            g.segments()
                .filter(|seg| seg.slope > 0.0)
                .map(|seg| PathStep {
                    stratum: s,
                    x: seg.x,
                    dx: seg.dx,
                    dy: seg.dy,
                    key: seg.slope / pi0[s],
                }),
        );
    }

    // Within one stratum the keys already decrease, so a stable sort keeps each
    // stratum's pieces in x order.
    steps.sort_by(|a, b| b.key.total_cmp(&a.key));

    let alpha = settings.alpha;
    let mut false_disc = 0.0;
    let mut budget = 0.0;
    for step in &steps {
        let m = training.sizes[step.stratum];
        // Constraint slack now, and how fast a full step would consume it.
        let (slack, rate) = match settings.adjustment {
            AdjustmentType::Bh => (
                alpha * discoveries - false_disc,
                pi0[step.stratum] * m * step.dx - alpha * m * step.dy,
            ),
            AdjustmentType::Bonferroni => (alpha - budget, m * step.dx),
        };
        let frac = if rate <= 0.0 {
            1.0
        } else {
            (slack.max(0.0) / rate).min(1.0)
        };
        if frac <= 0.0 {
            break;
        }
        let x0 = step.x - step.dx;
        thresholds[step.stratum] = if frac >= 1.0 {
            step.x
        } else {
            x0 + frac * step.dx
        };
        false_disc += pi0[step.stratum] * m * step.dx * frac;
        budget += m * step.dx * frac;
        discoveries += m * step.dy * frac;
        if frac < 1.0 {
            break;
        }
    }
    thresholds
}

/// Normalize thresholds into weights for cells of the given declared sizes.
///
/// `w_s = t_s * (Σ m) / (Σ t_s' * m_s')`, so `Σ m_s * w_s = Σ m_s`.
/// - Size-0 strata get weight 0.
/// - If every positive-size stratum has the same threshold, all of them get
///   exactly 1 (no rounding drift, so one stratum reduces to unweighted BH).
/// - If no positive-size stratum has a positive threshold, every weight is 1
///   and the fit is flagged as degenerate.
#[must_use]
pub fn thresholds_to_weights(thresholds: &[f64], sizes: &[f64]) -> WeightFit {
    debug_assert_eq!(thresholds.len(), sizes.len());
    let mut first: Option<f64> = None;
    let mut uniform = true;
    for (&t, &m) in thresholds.iter().zip(sizes) {
        if m > 0.0 {
            match first {
                None => first = Some(t),
                Some(f) if f != t => uniform = false,
                Some(_) => {}
            }
        }
    }

    let total: f64 = sizes.iter().sum();
    let denom: f64 = thresholds.iter().zip(sizes).map(|(&t, &m)| t * m).sum();
    if !(denom > 0.0 && denom.is_finite()) {
        return WeightFit {
            weights: vec![1.0; thresholds.len()],
            degenerate: true,
        };
    }

    let weights = thresholds
        .iter()
        .zip(sizes)
        .map(|(&t, &m)| {
            if m <= 0.0 {
                0.0
            } else if uniform {
                1.0
            } else {
                t * total / denom
            }
        })
        .collect();
    WeightFit {
        weights,
        degenerate: false,
    }
}
