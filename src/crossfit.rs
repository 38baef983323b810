//! K-fold cross-fitting of the weight matrix.
//!
//! Column `f` of the weight matrix is learned from every fold except `f` and is
//! only ever applied to hypotheses in fold `f`, so no p-value influences its own
//! weight. With a single fold there is nothing to hold out: weights are learned
//! and applied on the full data.
//!
//! Declared (censored) counts are split per fold: fold `f` of stratum `s` holds
//! its observed hypotheses plus `1/k` of the stratum's unobserved ones; the
//! training side holds the rest.

use crate::error::Result;
use crate::optimizer::{fit_thresholds, thresholds_to_weights, FitSettings, TrainingSet};
use crate::result::CellMatrix;

/// Active hypotheses with their cell coordinates.
#[derive(Debug, Clone, Copy)]
pub struct CrossFitInput<'a> {
    /// Observed p-values (no missing values).
    pub pvalues: &'a [f64],
    pub strata: &'a [usize],
    pub folds: &'a [usize],
    pub nbins: usize,
    pub nfolds: usize,
    /// Declared hypothesis count per stratum (`>=` observed count).
    pub group_sizes: &'a [f64],
}

/// Output of cross-fitting.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossFit {
    pub weights: CellMatrix,
    /// Declared size of each `(stratum, fold)` cell.
    pub cell_sizes: CellMatrix,
    /// Folds whose weights fell back to 1.
    pub degenerate_folds: Vec<usize>,
}

struct FoldFit {
    weights: Vec<f64>,
    holdout_sizes: Vec<f64>,
    degenerate: bool,
}

/// Observed p-values per `(stratum, fold)` cell.
struct Cells {
    pvalues: Vec<Vec<Vec<f64>>>,
}

impl Cells {
    fn build(input: &CrossFitInput<'_>) -> Self {
        let mut pvalues = vec![vec![Vec::new(); input.nfolds]; input.nbins];
        for ((&p, &s), &f) in input.pvalues.iter().zip(input.strata).zip(input.folds) {
            pvalues[s][f].push(p);
        }
        Self { pvalues }
    }

    fn observed(&self, s: usize) -> usize {
        self.pvalues[s].iter().map(Vec::len).sum()
    }
}

fn fit_fold(
    cells: &Cells,
    input: &CrossFitInput<'_>,
    settings: &FitSettings,
    f: usize,
) -> Result<FoldFit> {
    let k = input.nfolds;
    let mut train_p = Vec::with_capacity(input.nbins);
    let mut train_sizes = Vec::with_capacity(input.nbins);
    let mut holdout_sizes = Vec::with_capacity(input.nbins);

    for s in 0..input.nbins {
        let declared = input.group_sizes[s];
        if k == 1 {
            train_p.push(cells.pvalues[s][0].clone());
            train_sizes.push(declared);
            holdout_sizes.push(declared);
            continue;
        }
        let unobserved = declared - cells.observed(s) as f64;
        let holdout = cells.pvalues[s][f].len() as f64 + unobserved / k as f64;
        let mut ps = Vec::new();
        for (g, cell) in cells.pvalues[s].iter().enumerate() {
            if g != f {
                ps.extend_from_slice(cell);
            }
        }
        train_p.push(ps);
        train_sizes.push((declared - holdout).max(0.0));
        holdout_sizes.push(holdout);
    }

    let training = TrainingSet::new(train_p, train_sizes);
    let thresholds = fit_thresholds(&training, settings)?;
    let fit = thresholds_to_weights(&thresholds, &holdout_sizes);
    tracing::debug!(
        fold = f,
        training = training.total(),
        holdout = holdout_sizes.iter().sum::<f64>(),
        degenerate = fit.degenerate,
        "fitted fold weights"
    );
    Ok(FoldFit {
        weights: fit.weights,
        holdout_sizes,
        degenerate: fit.degenerate,
    })
}

/// Learn the `nbins × nfolds` weight matrix.
pub fn cross_fit(input: &CrossFitInput<'_>, settings: &FitSettings) -> Result<CrossFit> {
    debug_assert_eq!(input.pvalues.len(), input.strata.len());
    debug_assert_eq!(input.pvalues.len(), input.folds.len());
    debug_assert_eq!(input.group_sizes.len(), input.nbins);
    let cells = Cells::build(input);

    #[cfg(feature = "parallel")]
    let fits: Vec<FoldFit> = {
        use rayon::prelude::*;
        (0..input.nfolds)
            .into_par_iter()
            .map(|f| fit_fold(&cells, input, settings, f))
            .collect::<Result<_>>()?
    };
    #[cfg(not(feature = "parallel"))]
    let fits: Vec<FoldFit> = (0..input.nfolds)
        .map(|f| fit_fold(&cells, input, settings, f))
        .collect::<Result<_>>()?;

    let degenerate_folds = fits
        .iter()
        .enumerate()
        .filter(|(_, fit)| fit.degenerate)
        .map(|(f, _)| f)
        .collect();
    let weight_cols: Vec<Vec<f64>> = fits.iter().map(|fit| fit.weights.clone()).collect();
    let size_cols: Vec<Vec<f64>> = fits.into_iter().map(|fit| fit.holdout_sizes).collect();
    Ok(CrossFit {
        weights: CellMatrix::from_columns(input.nbins, &weight_cols),
        cell_sizes: CellMatrix::from_columns(input.nbins, &size_cols),
        degenerate_folds,
    })
}
