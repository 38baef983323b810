//! Covariate stratification.
//!
//! A numeric covariate is cut into `nbins` groups of (nearly) equal size by its
//! fractional rank: hypothesis `i` with rank `r_i` among `m` lands in stratum
//! `ceil(r_i * nbins / m) - 1`. A categorical covariate is already a grouping;
//! its distinct labels are renumbered `0..n` in ascending order.
//!
//! Ranks are kept as doubled integers (average ranks are half-integers), so the
//! bin boundaries are computed exactly and never move by a rounding error.

use rand::seq::SliceRandom;

use crate::error::{InvalidInputError, Result};
use crate::stable_hash::{stream_rng, STREAM_TIES};

/// How tied covariate values are ranked before binning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TiesPolicy {
    /// Random order among ties, drawn from the call's seed.
    #[default]
    Random,
    /// Earlier index ranks lower.
    First,
    /// Later index ranks lower.
    Last,
    /// Every tie gets the mean of the ranks it spans.
    Average,
    /// Every tie gets the lowest rank it spans.
    Min,
    /// Every tie gets the highest rank it spans.
    Max,
}

/// Covariate attached to each hypothesis.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Covariate {
    /// Continuous covariate, binned by rank.
    Numeric(#[cfg_attr(feature = "serde", serde(with = "crate::float_serde"))] Vec<f64>),
    /// Pre-computed stratum labels. Any `usize` values; each distinct label is
    /// one stratum.
    Categorical(Vec<usize>),
}

/// One hypothesis' covariate value.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CovariateValue {
    Numeric(#[cfg_attr(feature = "serde", serde(with = "crate::float_serde::scalar"))] f64),
    Categorical(usize),
}

impl Covariate {
    pub fn len(&self) -> usize {
        match self {
            Covariate::Numeric(v) => v.len(),
            Covariate::Categorical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at index `i`, if in range.
    pub fn get(&self, i: usize) -> Option<CovariateValue> {
        match self {
            Covariate::Numeric(v) => v.get(i).copied().map(CovariateValue::Numeric),
            Covariate::Categorical(v) => v.get(i).copied().map(CovariateValue::Categorical),
        }
    }

    /// The covariate restricted to `idx`, in that order.
    pub(crate) fn select(&self, idx: &[usize]) -> Covariate {
        match self {
            Covariate::Numeric(v) => Covariate::Numeric(idx.iter().map(|&i| v[i]).collect()),
            Covariate::Categorical(v) => {
                Covariate::Categorical(idx.iter().map(|&i| v[i]).collect())
            }
        }
    }
}

/// Stratum assignment for a set of hypotheses.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Stratification {
    /// 0-based stratum per hypothesis.
    pub labels: Vec<usize>,
    /// Number of strata (labels are all below this).
    pub nbins: usize,
    /// Caller-facing label of each stratum: `0..nbins` for a numeric
    /// covariate, the sorted distinct input labels for a categorical one.
    pub levels: Vec<usize>,
    /// Largest covariate value in each numeric stratum (`None` for an empty
    /// stratum, or for every stratum of a categorical covariate).
    pub breaks: Vec<Option<f64>>,
}

/// Assign each hypothesis to a stratum.
///
/// - `Numeric`: rank-based equal-size binning into `nbins` strata. `nbins`
///   may not exceed the number of values (or 1 for an empty covariate).
/// - `Categorical`: each distinct label becomes one stratum, in ascending
///   label order; `levels` maps strata back to labels and `nbins` is ignored.
///
/// `seed` only matters for [`TiesPolicy::Random`]; the generator is local to
/// this call.
pub fn stratify(
    covariate: &Covariate,
    nbins: usize,
    ties: TiesPolicy,
    seed: u64,
) -> Result<Stratification> {
    match covariate {
        Covariate::Numeric(x) => {
            let limit = x.len().max(1);
            if nbins > limit {
                return Err(InvalidInputError::TooManyBins { nbins, limit });
            }
            let labels = groups_by_filter(x, nbins, ties, seed)?;
            let mut breaks: Vec<Option<f64>> = vec![None; nbins];
            for (&s, &v) in labels.iter().zip(x.iter()) {
                let b = &mut breaks[s];
                *b = Some(b.map_or(v, |cur| cur.max(v)));
            }
            Ok(Stratification {
                labels,
                nbins,
                levels: (0..nbins).collect(),
                breaks,
            })
        }
        Covariate::Categorical(raw) => {
            let levels = distinct_levels(raw.iter().copied());
            Ok(Stratification {
                labels: dense_labels(raw, &levels),
                nbins: levels.len(),
                breaks: vec![None; levels.len()],
                levels,
            })
        }
    }
}

/// Sorted distinct labels.
pub(crate) fn distinct_levels(labels: impl IntoIterator<Item = usize>) -> Vec<usize> {
    let mut levels: Vec<usize> = labels.into_iter().collect();
    levels.sort_unstable();
    levels.dedup();
    levels
}

/// Position of each label in `levels` (which must contain every label).
pub(crate) fn dense_labels(labels: &[usize], levels: &[usize]) -> Vec<usize> {
    labels
        .iter()
        .map(|l| levels.binary_search(l).unwrap_or(0))
        .collect()
}

/// Bin a numeric covariate into `nbins` equal-size strata (0-based labels).
///
/// This is the stand-alone form of [`stratify`], meant for pre-binning the full
/// covariate vector before p-values are filtered, so that per-stratum totals
/// (`m_groups`) can be counted.
///
/// # Example
///
/// ```rust
/// use ihw::{groups_by_filter, TiesPolicy};
///
/// let x = [0.3, 0.1, 0.4, 0.2];
/// let g = groups_by_filter(&x, 2, TiesPolicy::First, 0).unwrap();
/// assert_eq!(g, vec![1, 0, 1, 0]);
/// ```
pub fn groups_by_filter(
    covariate: &[f64],
    nbins: usize,
    ties: TiesPolicy,
    seed: u64,
) -> Result<Vec<usize>> {
    if nbins == 0 {
        return Err(InvalidInputError::InvalidBinCount);
    }
    if let Some((index, &value)) = covariate.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(InvalidInputError::NonFiniteCovariate { index, value });
    }
    let m = covariate.len();
    if m == 0 {
        return Ok(Vec::new());
    }

    let ranks2 = doubled_ranks(covariate, ties, seed);
    let denom = 2 * m as u64;
    let nb = nbins as u64;
    Ok(ranks2
        .into_iter()
        .map(|r2| {
            // ceil(r * nbins / m) with r = r2 / 2; r >= 1 so the result is >= 1.
            let label1 = (r2 * nb).div_ceil(denom);
            (label1 as usize).clamp(1, nbins) - 1
        })
        .collect())
}

/// Twice the 1-based rank of each value under `ties`.
fn doubled_ranks(x: &[f64], ties: TiesPolicy, seed: u64) -> Vec<u64> {
    let m = x.len();
    let mut order: Vec<usize> = (0..m).collect();
    // Stable sort: equal values keep index order, which is what `First` needs.
    order.sort_by(|&a, &b| x[a].total_cmp(&x[b]));

    let mut rng = match ties {
        TiesPolicy::Random => Some(stream_rng(seed, STREAM_TIES)),
        _ => None,
    };

    let mut out = vec![0u64; m];
    let mut start = 0usize;
    while start < m {
        let mut end = start + 1;
        while end < m && x[order[end]] == x[order[start]] {
            end += 1;
        }
        let group = &mut order[start..end];
        // Ranks spanned by this run of ties: start+1 ..= end.
        let lo = start as u64 + 1;
        let hi = end as u64;
        match ties {
            TiesPolicy::First => {
                for (k, &i) in group.iter().enumerate() {
                    out[i] = 2 * (lo + k as u64);
                }
            }
            TiesPolicy::Last => {
                for (k, &i) in group.iter().rev().enumerate() {
                    out[i] = 2 * (lo + k as u64);
                }
            }
            TiesPolicy::Random => {
                if let Some(r) = rng.as_mut() {
                    if group.len() > 1 {
                        group.shuffle(r);
                    }
                }
                for (k, &i) in group.iter().enumerate() {
                    out[i] = 2 * (lo + k as u64);
                }
            }
            TiesPolicy::Average => {
                for &i in group.iter() {
                    out[i] = lo + hi;
                }
            }
            TiesPolicy::Min => {
                for &i in group.iter() {
                    out[i] = 2 * lo;
                }
            }
            TiesPolicy::Max => {
                for &i in group.iter() {
                    out[i] = 2 * hi;
                }
            }
        }
        start = end;
    }
    out
}
