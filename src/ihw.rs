//! The weighting pipeline: stratify, assign folds, cross-fit weights, then run
//! the weighted multiple-testing procedure once over all hypotheses.

use std::collections::BTreeMap;

use crate::crossfit::{cross_fit, CrossFitInput};
use crate::error::{InvalidInputError, Result};
use crate::folds::{assign_folds, validate_folds};
use crate::optimizer::{FitSettings, WeightOptimizer};
use crate::result::{CellMatrix, IhwResult, IhwWarning};
use crate::stratify::{
    dense_labels, distinct_levels, stratify, Covariate, Stratification, TiesPolicy,
};
use crate::threshold::{adjust, threshold, AdjustmentType, Threshold};
use crate::utils::suggested_nbins;

/// Declared hypothesis count per stratum label (for censored input).
pub type GroupCounts = BTreeMap<usize, u64>;

/// Configuration for [`ihw`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IhwConfig {
    /// Strata for a numeric covariate. `None` picks [`suggested_nbins`] of the
    /// observed count; either way it is capped at the observed count. Ignored
    /// for a categorical covariate.
    pub nbins: Option<usize>,
    /// Cross-fitting folds. `1` learns and applies weights on the same data.
    pub nfolds: usize,
    pub adjustment: AdjustmentType,
    /// Total hypotheses per stratum when only a subset of p-values was kept.
    ///
    /// Requires a categorical covariate whose labels are the keys of this map
    /// (see [`crate::groups_by_filter`]). Keys with no observed hypothesis
    /// still become strata.
    pub m_groups: Option<GroupCounts>,
    /// Seed for random tie-breaking and fold assignment.
    pub seed: u64,
    /// Fold label per hypothesis, in `[0, nfolds)`. Overrides random folds.
    pub folds: Option<Vec<usize>>,
    pub ties: TiesPolicy,
    pub optimizer: WeightOptimizer,
    /// Scale each stratum's FDR constraint by a Storey null-proportion estimate.
    pub null_proportion: bool,
    /// Storey `lambda`, in `(0, 1)`.
    pub null_proportion_level: f64,
    /// Without `m_groups`, warn when every observed p-value is below this.
    pub filter_warning_level: f64,
}

impl Default for IhwConfig {
    fn default() -> Self {
        Self {
            nbins: None,
            nfolds: 5,
            adjustment: AdjustmentType::Bh,
            m_groups: None,
            seed: 1,
            folds: None,
            ties: TiesPolicy::Random,
            optimizer: WeightOptimizer::Grenander,
            null_proportion: false,
            null_proportion_level: 0.5,
            filter_warning_level: 0.5,
        }
    }
}

fn validate(pvalues: &[f64], covariate: &Covariate, alpha: f64, cfg: &IhwConfig) -> Result<()> {
    if !(alpha > 0.0 && alpha < 1.0) {
        return Err(InvalidInputError::AlphaOutOfRange(alpha));
    }
    if cfg.nfolds == 0 {
        return Err(InvalidInputError::InvalidFoldCount);
    }
    if cfg.nbins == Some(0) {
        return Err(InvalidInputError::InvalidBinCount);
    }
    if covariate.len() != pvalues.len() {
        return Err(InvalidInputError::LengthMismatch {
            expected: pvalues.len(),
            actual: covariate.len(),
        });
    }
    if let Some((index, &value)) = pvalues
        .iter()
        .enumerate()
        .find(|(_, p)| !p.is_nan() && !(0.0..=1.0).contains(*p))
    {
        return Err(InvalidInputError::PValueOutOfRange { index, value });
    }
    if let Covariate::Numeric(x) = covariate {
        // Rows with a missing p-value are dropped, so their covariate is never read.
        if let Some((index, &value)) = x
            .iter()
            .enumerate()
            .find(|&(i, v)| !pvalues[i].is_nan() && !v.is_finite())
        {
            return Err(InvalidInputError::NonFiniteCovariate { index, value });
        }
        if cfg.m_groups.is_some() {
            return Err(InvalidInputError::GroupCountsWithNumericCovariate);
        }
    }
    if let Some(folds) = &cfg.folds {
        if folds.len() != pvalues.len() {
            return Err(InvalidInputError::LengthMismatch {
                expected: pvalues.len(),
                actual: folds.len(),
            });
        }
        validate_folds(folds, cfg.nfolds)?;
    }
    if cfg.null_proportion && !(cfg.null_proportion_level > 0.0 && cfg.null_proportion_level < 1.0)
    {
        return Err(InvalidInputError::NullProportionLevel(
            cfg.null_proportion_level,
        ));
    }
    Ok(())
}

/// Declared size per stratum: `m_groups` if given, else the observed counts.
/// `levels[s]` is the label stratum `s` has in `m_groups`.
fn declared_sizes(
    observed: &[u64],
    levels: &[usize],
    m_groups: Option<&GroupCounts>,
) -> Result<Vec<u64>> {
    let Some(groups) = m_groups else {
        return Ok(observed.to_vec());
    };
    observed
        .iter()
        .zip(levels)
        .map(|(&obs, &stratum)| match groups.get(&stratum) {
            None if obs > 0 => Err(InvalidInputError::MissingGroupCount { stratum }),
            None => Ok(0),
            Some(&declared) if declared < obs => Err(InvalidInputError::GroupCountTooSmall {
                stratum,
                declared,
                observed: obs,
            }),
            Some(&declared) => Ok(declared),
        })
        .collect()
}

/// Weighted p-value: `+inf` for weight 0 (even when `p = 0`), else `p / w`.
fn weighted(p: f64, w: f64) -> f64 {
    if w <= 0.0 {
        f64::INFINITY
    } else if p == 0.0 {
        0.0
    } else {
        p / w
    }
}

fn log_warnings(warnings: &[IhwWarning]) {
    for w in warnings {
        match w {
            IhwWarning::NumericDegeneracy { fold } => {
                tracing::warn!(fold, "no stratum had a positive threshold; fold uses unit weights")
            }
            IhwWarning::PossiblyFiltered { max_pvalue } => tracing::warn!(
                max_pvalue,
                "all p-values are small; if the list was filtered, pass m_groups"
            ),
            IhwWarning::NoCrossFitting => {
                tracing::warn!("nfolds = 1: weights are learned on the p-values they weight")
            }
        }
    }
}

/// Independent hypothesis weighting.
///
/// Bins hypotheses by `covariate`, learns one weight per `(stratum, fold)` cell
/// from the other folds, and runs weighted BH (or Bonferroni) at level `alpha`.
/// Missing p-values (`NaN`) are carried through positionally and take no part.
///
/// With more than one stratum the learned weights depend on `alpha`, so raising
/// `alpha` can occasionally lower the rejection count. Monotonicity in `alpha`
/// only holds for a single stratum (plain BH / Bonferroni) or fixed weights.
///
/// # Example
///
/// ```rust
/// use ihw::{ihw, Covariate, IhwConfig};
///
/// let p: Vec<f64> = (1..=200).map(|i| i as f64 / 200.0).collect();
/// let x: Vec<f64> = (0..200).map(|i| (i % 7) as f64).collect();
/// let cfg = IhwConfig { nbins: Some(2), nfolds: 2, ..IhwConfig::default() };
/// let res = ihw(&p, Covariate::Numeric(x), 0.1, &cfg).unwrap();
/// assert_eq!(res.adj_pvalues().len(), 200);
/// let n = res.adj_pvalues().iter().filter(|&&a| a <= 0.1).count();
/// assert_eq!(n, res.rejections());
/// ```
pub fn ihw(
    pvalues: &[f64],
    covariate: Covariate,
    alpha: f64,
    config: &IhwConfig,
) -> Result<IhwResult> {
    validate(pvalues, &covariate, alpha, config)?;
    let k = config.nfolds;
    let len = pvalues.len();
    let active: Vec<usize> = (0..len).filter(|&i| !pvalues[i].is_nan()).collect();
    let declared_total: u64 = config
        .m_groups
        .as_ref()
        .map_or(0, |g| g.values().sum());

    if active.is_empty() {
        tracing::debug!(len, "no observed p-values");
        return Ok(IhwResult {
            pvalues: pvalues.to_vec(),
            covariate,
            strata: vec![None; len],
            folds: vec![None; len],
            weights: vec![f64::NAN; len],
            weighted_pvalues: vec![f64::NAN; len],
            adj_pvalues: vec![f64::NAN; len],
            rejections: 0,
            threshold: Threshold::NONE,
            alpha,
            adjustment: config.adjustment,
            weight_matrix: CellMatrix::filled(0, k, 1.0),
            cell_sizes: CellMatrix::filled(0, k, 0.0),
            breaks: Vec::new(),
            levels: Vec::new(),
            total_tests: declared_total,
            warnings: Vec::new(),
        });
    }

    let p_active: Vec<f64> = active.iter().map(|&i| pvalues[i]).collect();
    let nbins = config
        .nbins
        .unwrap_or_else(|| suggested_nbins(active.len()))
        .min(active.len());
    let Stratification {
        labels,
        levels,
        mut breaks,
        ..
    } = stratify(&covariate.select(&active), nbins, config.ties, config.seed)?;
    // Declared-only labels become (unobserved) strata of their own.
    let (labels, levels) = match &config.m_groups {
        Some(groups) => {
            let merged = distinct_levels(levels.iter().chain(groups.keys()).copied());
            let raw: Vec<usize> = labels.iter().map(|&s| levels[s]).collect();
            (dense_labels(&raw, &merged), merged)
        }
        None => (labels, levels),
    };
    let n = levels.len();

    let mut observed = vec![0u64; n];
    for &s in &labels {
        observed[s] += 1;
    }
    let sizes = declared_sizes(&observed, &levels, config.m_groups.as_ref())?;
    let total_tests: u64 = sizes.iter().sum();
    breaks.resize(n, None);

    let mut warnings = Vec::new();
    if config.m_groups.is_none() {
        let max_pvalue = p_active.iter().copied().fold(0.0, f64::max);
        if max_pvalue < config.filter_warning_level {
            warnings.push(IhwWarning::PossiblyFiltered { max_pvalue });
        }
    }

    let folds: Vec<usize> = match &config.folds {
        Some(user) => active.iter().map(|&i| user[i]).collect(),
        None => assign_folds(active.len(), k, config.seed)?,
    };

    let group_sizes: Vec<f64> = sizes.iter().map(|&m| m as f64).collect();
    let settings = FitSettings {
        optimizer: config.optimizer,
        adjustment: config.adjustment,
        alpha,
        null_proportion_level: config
            .null_proportion
            .then_some(config.null_proportion_level),
    };
    let fit = cross_fit(
        &CrossFitInput {
            pvalues: &p_active,
            strata: &labels,
            folds: &folds,
            nbins: n,
            nfolds: k,
            group_sizes: &group_sizes,
        },
        &settings,
    )?;
    warnings.extend(
        fit.degenerate_folds
            .iter()
            .map(|&fold| IhwWarning::NumericDegeneracy { fold }),
    );
    if k == 1 {
        warnings.push(IhwWarning::NoCrossFitting);
    }

    let w_active: Vec<f64> = labels
        .iter()
        .zip(&folds)
        .map(|(&s, &f)| fit.weights.get(s, f).unwrap_or(0.0))
        .collect();
    let q_active: Vec<f64> = p_active
        .iter()
        .zip(&w_active)
        .map(|(&p, &w)| weighted(p, w))
        .collect();
    let t = threshold(config.adjustment, &q_active, alpha, total_tests)?;
    let adj_active = adjust(config.adjustment, &q_active, total_tests)?;
    let rejections = adj_active.iter().filter(|&&a| a <= alpha).count();
    debug_assert_eq!(rejections, t.rejections);
    tracing::debug!(
        observed = active.len(),
        total_tests,
        nbins = n,
        nfolds = k,
        rejections,
        threshold = t.value,
        "weighted pass done"
    );
    log_warnings(&warnings);

    let mut strata = vec![None; len];
    let mut fold_of = vec![None; len];
    let mut weights = vec![f64::NAN; len];
    let mut weighted_pvalues = vec![f64::NAN; len];
    let mut adj_pvalues = vec![f64::NAN; len];
    for (j, &i) in active.iter().enumerate() {
        strata[i] = Some(labels[j]);
        fold_of[i] = Some(folds[j]);
        weights[i] = w_active[j];
        weighted_pvalues[i] = q_active[j];
        adj_pvalues[i] = adj_active[j];
    }

    Ok(IhwResult {
        pvalues: pvalues.to_vec(),
        covariate,
        strata,
        folds: fold_of,
        weights,
        weighted_pvalues,
        adj_pvalues,
        rejections,
        threshold: t,
        alpha,
        adjustment: config.adjustment,
        weight_matrix: fit.weights,
        cell_sizes: fit.cell_sizes,
        breaks,
        levels,
        total_tests,
        warnings,
    })
}
