//! Deterministic seed derivation for scoped random streams.
//!
//! Every random draw in this crate comes from a `StdRng` built inside the call that
//! needs it. One caller seed feeds several independent streams (tie-breaking during
//! stratification, fold assignment), so each stream gets its own seed derived from
//! the caller seed and a stream label. Not cryptographic.
//!
//! The hash is the usual stable-hash pairing: 64-bit FNV-1a (Fowler, Noll & Vo)
//! over the label, then the SplitMix64 output finalizer (Steele, Lea & Flood,
//! "Fast splittable pseudorandom number generators", OOPSLA 2014) on the seed
//! mixed with that digest. Both are public-domain constructions; the constants
//! below are their published ones.

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Stream label for random tie-breaking in the stratifier.
pub(crate) const STREAM_TIES: &str = "ihw/ties";
/// Stream label for fold assignment.
pub(crate) const STREAM_FOLDS: &str = "ihw/folds";

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0100_0000_01b3;

/// Seed of the `(seed, label)` stream; identical on every platform.
#[must_use]
pub fn stream_seed(seed: u64, label: &str) -> u64 {
    let digest = label
        .bytes()
        .fold(FNV_OFFSET_BASIS, |h, b| (h ^ u64::from(b)).wrapping_mul(FNV_PRIME));
    splitmix64(seed ^ digest)
}

/// A fresh generator for the `(seed, label)` stream.
pub(crate) fn stream_rng(seed: u64, label: &str) -> StdRng {
    StdRng::seed_from_u64(stream_seed(seed, label))
}

#[inline]
fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn streams_are_separated_by_label() {
        assert_ne!(stream_seed(1, STREAM_TIES), stream_seed(1, STREAM_FOLDS));
        assert_eq!(stream_seed(7, STREAM_FOLDS), stream_seed(7, STREAM_FOLDS));
    }

    #[test]
    fn matches_published_vectors() {
        // FNV-1a("a") = 0xaf63dc4c8601ec8c; SplitMix64's first output from 0.
        assert_eq!(stream_seed(0xaf63_dc4c_8601_ec8c, "a"), 0xe220_a839_7b1d_cdaf);
        assert_eq!(stream_seed(0, ""), splitmix64(FNV_OFFSET_BASIS));
    }

    #[test]
    fn stream_rng_is_reproducible() {
        let a: Vec<u32> = {
            let mut r = stream_rng(42, STREAM_FOLDS);
            (0..8).map(|_| r.random()).collect()
        };
        let b: Vec<u32> = {
            let mut r = stream_rng(42, STREAM_FOLDS);
            (0..8).map(|_| r.random()).collect()
        };
        assert_eq!(a, b);
    }
}
