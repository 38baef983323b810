//! Random fold assignment for cross-fitting.

use rand::Rng;

use crate::error::{InvalidInputError, Result};
use crate::stable_hash::{stream_rng, STREAM_FOLDS};

/// Assign `m` hypotheses to `k` folds uniformly at random (labels in `[0, k)`).
///
/// Each label is an independent uniform draw, so folds are independent of the
/// covariate and of the stratum. The generator is built from `seed` for this call
/// only.
pub fn assign_folds(m: usize, k: usize, seed: u64) -> Result<Vec<usize>> {
    if k == 0 {
        return Err(InvalidInputError::InvalidFoldCount);
    }
    if k == 1 {
        return Ok(vec![0; m]);
    }
    let mut rng = stream_rng(seed, STREAM_FOLDS);
    Ok((0..m).map(|_| rng.random_range(0..k)).collect())
}

/// Check caller-supplied fold labels.
pub(crate) fn validate_folds(folds: &[usize], k: usize) -> Result<()> {
    if k == 0 {
        return Err(InvalidInputError::InvalidFoldCount);
    }
    match folds.iter().enumerate().find(|(_, &f)| f >= k) {
        Some((index, &label)) => Err(InvalidInputError::InvalidFoldLabel {
            index,
            label,
            nfolds: k,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_in_range_and_cover_all_folds() {
        let f = assign_folds(10_000, 5, 1).unwrap();
        let mut counts = [0usize; 5];
        for &x in &f {
            counts[x] += 1;
        }
        for &c in &counts {
            // 2000 expected; binomial sd ~40.
            assert!((1700..2300).contains(&c), "counts={counts:?}");
        }
    }

    #[test]
    fn deterministic_given_seed() {
        assert_eq!(assign_folds(500, 4, 7).unwrap(), assign_folds(500, 4, 7).unwrap());
        assert_ne!(assign_folds(500, 4, 7).unwrap(), assign_folds(500, 4, 8).unwrap());
    }

    #[test]
    fn single_fold_is_all_zero() {
        assert_eq!(assign_folds(3, 1, 0).unwrap(), vec![0, 0, 0]);
    }

    #[test]
    fn zero_folds_is_rejected() {
        assert_eq!(assign_folds(3, 0, 0), Err(InvalidInputError::InvalidFoldCount));
    }

    #[test]
    fn user_folds_are_validated() {
        assert!(validate_folds(&[0, 1, 2], 3).is_ok());
        assert_eq!(
            validate_folds(&[0, 3], 3),
            Err(InvalidInputError::InvalidFoldLabel {
                index: 1,
                label: 3,
                nfolds: 3
            })
        );
    }

    #[test]
    fn folds_do_not_track_covariate_order() {
        // Split 0..m into two halves by index (a stand-in for strata sorted by
        // covariate); each half should see every fold at about the same rate.
        let f = assign_folds(4000, 2, 3).unwrap();
        let first_half = f[..2000].iter().filter(|&&x| x == 0).count();
        let second_half = f[2000..].iter().filter(|&&x| x == 0).count();
        assert!((first_half as i64 - second_half as i64).abs() < 200);
    }
}
