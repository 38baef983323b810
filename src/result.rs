//! Result types: the stratum × fold matrices and the immutable run snapshot.

use crate::stratify::{Covariate, CovariateValue};
use crate::threshold::{AdjustmentType, Threshold};

/// Dense `nbins × nfolds` matrix indexed by `(stratum, fold)`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellMatrix {
    nbins: usize,
    nfolds: usize,
    /// Row-major: `data[stratum * nfolds + fold]`.
    data: Vec<f64>,
}

impl CellMatrix {
    pub fn filled(nbins: usize, nfolds: usize, value: f64) -> Self {
        Self {
            nbins,
            nfolds,
            data: vec![value; nbins * nfolds],
        }
    }

    /// Assemble from one column per fold (each of length `nbins`).
    pub fn from_columns(nbins: usize, columns: &[Vec<f64>]) -> Self {
        let nfolds = columns.len();
        let mut m = Self::filled(nbins, nfolds, 0.0);
        for (f, col) in columns.iter().enumerate() {
            debug_assert_eq!(col.len(), nbins);
            for (s, &v) in col.iter().enumerate() {
                m.data[s * nfolds + f] = v;
            }
        }
        m
    }

    pub fn nbins(&self) -> usize {
        self.nbins
    }

    pub fn nfolds(&self) -> usize {
        self.nfolds
    }

    /// Value for `(stratum, fold)`; `None` when out of range.
    pub fn get(&self, stratum: usize, fold: usize) -> Option<f64> {
        if stratum < self.nbins && fold < self.nfolds {
            Some(self.data[stratum * self.nfolds + fold])
        } else {
            None
        }
    }

    /// One row (all folds of a stratum).
    pub fn row(&self, stratum: usize) -> &[f64] {
        &self.data[stratum * self.nfolds..(stratum + 1) * self.nfolds]
    }

    /// One column (all strata of a fold).
    pub fn column(&self, fold: usize) -> Vec<f64> {
        (0..self.nbins).map(|s| self.data[s * self.nfolds + fold]).collect()
    }

    /// Rows as nested vectors.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        (0..self.nbins).map(|s| self.row(s).to_vec()).collect()
    }

    /// `Σ self[s, f] * other[s, f]`.
    pub fn dot(&self, other: &CellMatrix) -> f64 {
        self.data.iter().zip(&other.data).map(|(a, b)| a * b).sum()
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }
}

/// Recoverable condition noticed during a run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IhwWarning {
    /// No stratum got a positive threshold when fitting for this fold; its
    /// weights fell back to 1 (unweighted procedure on that fold).
    NumericDegeneracy { fold: usize },
    /// `m_groups` was not given, yet every observed p-value is small; the input
    /// may be a filtered list, which needs `m_groups` to be adjusted correctly.
    PossiblyFiltered { max_pvalue: f64 },
    /// One fold: weights were learned on the same p-values they are applied to.
    NoCrossFitting,
}

/// One hypothesis in [`IhwResult::as_table`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TableRow {
    #[cfg_attr(feature = "serde", serde(with = "crate::float_serde::scalar"))]
    pub pvalue: f64,
    pub covariate: CovariateValue,
    /// Stratum label (the input label for a categorical covariate, see
    /// [`IhwResult::levels`]); `None` for a missing p-value.
    pub stratum: Option<usize>,
    pub fold: Option<usize>,
    #[cfg_attr(feature = "serde", serde(with = "crate::float_serde::scalar"))]
    pub weight: f64,
    #[cfg_attr(feature = "serde", serde(with = "crate::float_serde::scalar"))]
    pub weighted_pvalue: f64,
    #[cfg_attr(feature = "serde", serde(with = "crate::float_serde::scalar"))]
    pub adj_pvalue: f64,
}

/// Immutable snapshot of one weighting run.
///
/// Per-hypothesis vectors have the input length; hypotheses with a missing
/// (`NaN`) p-value carry `NaN` weight, weighted and adjusted p-value, and no
/// stratum or fold.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IhwResult {
    #[cfg_attr(feature = "serde", serde(with = "crate::float_serde"))]
    pub(crate) pvalues: Vec<f64>,
    pub(crate) covariate: Covariate,
    pub(crate) strata: Vec<Option<usize>>,
    pub(crate) folds: Vec<Option<usize>>,
    #[cfg_attr(feature = "serde", serde(with = "crate::float_serde"))]
    pub(crate) weights: Vec<f64>,
    #[cfg_attr(feature = "serde", serde(with = "crate::float_serde"))]
    pub(crate) weighted_pvalues: Vec<f64>,
    #[cfg_attr(feature = "serde", serde(with = "crate::float_serde"))]
    pub(crate) adj_pvalues: Vec<f64>,
    pub(crate) rejections: usize,
    pub(crate) threshold: Threshold,
    pub(crate) alpha: f64,
    pub(crate) adjustment: AdjustmentType,
    pub(crate) weight_matrix: CellMatrix,
    pub(crate) cell_sizes: CellMatrix,
    pub(crate) breaks: Vec<Option<f64>>,
    pub(crate) levels: Vec<usize>,
    pub(crate) total_tests: u64,
    pub(crate) warnings: Vec<IhwWarning>,
}

impl IhwResult {
    /// Number of hypotheses with adjusted p-value `<= alpha`.
    pub fn rejections(&self) -> usize {
        self.rejections
    }

    pub fn adj_pvalues(&self) -> &[f64] {
        &self.adj_pvalues
    }

    /// Per-hypothesis weights.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Weight per `(stratum, fold)` cell.
    pub fn weight_matrix(&self) -> &CellMatrix {
        &self.weight_matrix
    }

    /// `p / w` per hypothesis (`+inf` for weight 0).
    pub fn weighted_pvalues(&self) -> &[f64] {
        &self.weighted_pvalues
    }

    pub fn pvalues(&self) -> &[f64] {
        &self.pvalues
    }

    pub fn covariate(&self) -> &Covariate {
        &self.covariate
    }

    /// Stratum index per hypothesis (a row of [`Self::weight_matrix`]).
    pub fn strata(&self) -> &[Option<usize>] {
        &self.strata
    }

    pub fn folds(&self) -> &[Option<usize>] {
        &self.folds
    }

    /// Rejection flag per hypothesis.
    pub fn rejected_hypotheses(&self) -> Vec<bool> {
        self.adj_pvalues.iter().map(|&a| a <= self.alpha).collect()
    }

    /// Threshold on the weighted p-value scale from the final pass.
    pub fn threshold(&self) -> Threshold {
        self.threshold
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn adjustment(&self) -> AdjustmentType {
        self.adjustment
    }

    pub fn nbins(&self) -> usize {
        self.weight_matrix.nbins()
    }

    pub fn nfolds(&self) -> usize {
        self.weight_matrix.nfolds()
    }

    /// Largest covariate value per numeric stratum.
    pub fn stratification_breaks(&self) -> &[Option<f64>] {
        &self.breaks
    }

    /// Caller-facing label of each stratum index in [`Self::strata`].
    ///
    /// `0..nbins` for a numeric covariate. For a categorical covariate these
    /// are the sorted distinct labels (together with any `m_groups` keys), so
    /// `levels()[s]` is the input label of stratum `s`.
    pub fn levels(&self) -> &[usize] {
        &self.levels
    }

    /// Declared hypothesis count per `(stratum, fold)` cell. For censored input
    /// the filtered hypotheses of a stratum are split evenly across folds.
    pub fn cell_sizes(&self) -> &CellMatrix {
        &self.cell_sizes
    }

    /// Multiplicity used by the final pass (`Σ m_groups`, or the observed count).
    pub fn total_tests(&self) -> u64 {
        self.total_tests
    }

    pub fn warnings(&self) -> &[IhwWarning] {
        &self.warnings
    }

    /// Size-weighted mean weight over all cells (1 for every valid run).
    pub fn mean_weight(&self) -> f64 {
        let total = self.cell_sizes.sum();
        if total <= 0.0 {
            return 1.0;
        }
        self.weight_matrix.dot(&self.cell_sizes) / total
    }

    /// One row per hypothesis.
    pub fn as_table(&self) -> Vec<TableRow> {
        (0..self.pvalues.len())
            .map(|i| TableRow {
                pvalue: self.pvalues[i],
                covariate: self
                    .covariate
                    .get(i)
                    .unwrap_or(CovariateValue::Numeric(f64::NAN)),
                stratum: self.strata[i].map(|s| self.levels[s]),
                fold: self.folds[i],
                weight: self.weights[i],
                weighted_pvalue: self.weighted_pvalues[i],
                adj_pvalue: self.adj_pvalues[i],
            })
            .collect()
    }
}
