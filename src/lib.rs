//! `ihw`: independent hypothesis weighting for multiple testing.
//!
//! Given `m` p-values and a covariate per hypothesis that is informative about
//! power but independent of the p-value under the null, IHW learns a weight per
//! covariate stratum and runs weighted Benjamini–Hochberg (or Bonferroni). Power
//! moves toward strata where signals are common; the error rate stays controlled
//! because weights average to 1 and are never learned from the p-values they are
//! applied to (k-fold cross-fitting).
//!
//! **Pipeline** ([`ihw`]):
//! 1. [`stratify`]: rank-based equal-size bins of a numeric covariate, or
//!    caller-provided labels ([`Covariate::Categorical`]).
//! 2. [`assign_folds`]: seeded random fold labels (or [`IhwConfig::folds`]).
//! 3. [`cross_fit`]: per fold, fit thresholds on the other folds
//!    ([`WeightOptimizer`]) and normalize them into weights
//!    ([`thresholds_to_weights`]).
//! 4. Weighted p-values `p / w`, then one [`threshold`] / [`adjust`] pass over
//!    the declared number of tests.
//!
//! **Censored input**: when only small p-values were kept, bin the full
//! covariate with [`groups_by_filter`], count hypotheses per stratum, and pass
//! the counts as [`IhwConfig::m_groups`] together with the labels of the kept
//! subset.
//!
//! **Determinism**: all randomness comes from per-call generators derived from
//! [`IhwConfig::seed`]; the same inputs give bit-identical results.
//!
//! ```rust
//! use ihw::{ihw, Covariate, IhwConfig};
//!
//! let p = vec![0.001, 0.2, 0.03, 0.8, 0.004, 0.5];
//! let x = vec![5.0, 1.0, 4.0, 0.5, 6.0, 2.0];
//! let cfg = IhwConfig { nbins: Some(1), nfolds: 1, ..IhwConfig::default() };
//! let res = ihw(&p, Covariate::Numeric(x), 0.1, &cfg).unwrap();
//! assert_eq!(res.rejections(), 3);
//! ```
#![forbid(unsafe_code)]

mod error;
pub use error::*;

mod stable_hash;
pub use stable_hash::*;

mod utils;
pub use utils::*;

mod threshold;
pub use threshold::*;

mod stratify;
pub use stratify::*;

mod folds;
pub use folds::*;

mod grenander;
pub use grenander::*;

mod null_proportion;
pub use null_proportion::*;

mod optimizer;
pub use optimizer::*;

mod crossfit;
pub use crossfit::*;

mod result;
pub use result::*;

#[cfg(feature = "serde")]
mod float_serde;

mod ihw;
pub use crate::ihw::{ihw, GroupCounts, IhwConfig};
