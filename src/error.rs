//! Error type for invalid configuration or input shapes.
//!
//! Every variant is raised before any computation happens: a call either fails
//! fast with one of these or returns a complete [`crate::IhwResult`]. Numeric edge
//! cases inside the optimizer are not errors; they surface as
//! [`crate::IhwWarning`]s on the result.

use thiserror::Error;

/// Invalid input to one of the crate's entry points.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidInputError {
    /// Two vectors that must align element-wise have different lengths.
    #[error("length mismatch: expected {expected} values, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// Significance level outside the open interval `(0, 1)`.
    #[error("alpha must lie in (0, 1), got {0}")]
    AlphaOutOfRange(f64),

    /// Requested zero bins.
    #[error("nbins must be at least 1")]
    InvalidBinCount,

    /// More numeric strata than values to put in them.
    #[error("nbins = {nbins} exceeds the {limit} values being binned")]
    TooManyBins { nbins: usize, limit: usize },

    /// Requested zero folds.
    #[error("nfolds must be at least 1")]
    InvalidFoldCount,

    /// A p-value outside `[0, 1]` (missing values are `NaN` and are allowed).
    #[error("p-value at index {index} is outside [0, 1]: {value}")]
    PValueOutOfRange { index: usize, value: f64 },

    /// A numeric covariate that is `NaN` or infinite.
    #[error("covariate at index {index} is not finite: {value}")]
    NonFiniteCovariate { index: usize, value: f64 },

    /// A user-supplied fold label outside `[0, nfolds)`.
    #[error("fold label at index {index} is {label}, expected a value below {nfolds}")]
    InvalidFoldLabel {
        index: usize,
        label: usize,
        nfolds: usize,
    },

    /// `m_groups` was supplied but has no entry for an observed stratum label.
    #[error("m_groups has no entry for stratum {stratum}")]
    MissingGroupCount { stratum: usize },

    /// `m_groups[stratum]` is smaller than the number of observed hypotheses in it.
    #[error("m_groups[{stratum}] = {declared} is below the {observed} observed hypotheses")]
    GroupCountTooSmall {
        stratum: usize,
        declared: u64,
        observed: u64,
    },

    /// `m_groups` counts hypotheses per stratum label, so the strata must be
    /// given as labels; a numeric covariate re-binned on a filtered subset would
    /// not line up with them.
    #[error("m_groups requires a categorical covariate (pre-binned with groups_by_filter)")]
    GroupCountsWithNumericCovariate,

    /// A declared total test count below the number of observed p-values.
    #[error("total test count {total} is below the {observed} observed p-values")]
    TotalBelowObserved { total: u64, observed: u64 },

    /// Storey null-proportion level outside `(0, 1)`.
    #[error("null proportion level must lie in (0, 1), got {0}")]
    NullProportionLevel(f64),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, InvalidInputError>;
