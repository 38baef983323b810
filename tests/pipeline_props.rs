//! Property tests for the full weighting pipeline on small random inputs.

use ihw::{
    bh_adjust, ihw, AdjustmentType, Covariate, GroupCounts, IhwConfig, TiesPolicy,
    WeightOptimizer,
};
use proptest::prelude::*;

fn same(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

fn arb_pvalue() -> impl Strategy<Value = f64> {
    prop_oneof![
        6 => 0.0f64..=1.0,
        2 => 0.0f64..0.01,
        1 => Just(f64::NAN),
        1 => Just(0.0),
        1 => Just(1.0),
    ]
}

fn arb_case() -> impl Strategy<Value = (Vec<f64>, Vec<f64>)> {
    (1usize..120).prop_flat_map(|m| {
        (
            proptest::collection::vec(arb_pvalue(), m),
            proptest::collection::vec(prop_oneof![-5.0f64..5.0, Just(0.0)], m),
        )
    })
}

fn arb_optimizer() -> impl Strategy<Value = WeightOptimizer> {
    prop_oneof![Just(WeightOptimizer::ClosedForm), Just(WeightOptimizer::Grenander)]
}

fn arb_adjustment() -> impl Strategy<Value = AdjustmentType> {
    prop_oneof![Just(AdjustmentType::Bh), Just(AdjustmentType::Bonferroni)]
}

// ---------------------------------------------------------------------------
// Invariants of every run
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn rejections_match_adjusted_pvalues(
        (p, x) in arb_case(),
        nbins in 1usize..6,
        nfolds in 1usize..4,
        alpha in 0.01f64..0.5,
        seed in any::<u64>(),
        optimizer in arb_optimizer(),
        adjustment in arb_adjustment(),
    ) {
        let cfg = IhwConfig {
            nbins: Some(nbins),
            nfolds,
            seed,
            optimizer,
            adjustment,
            ..IhwConfig::default()
        };
        let res = ihw(&p, Covariate::Numeric(x), alpha, &cfg).unwrap();
        let n = res.adj_pvalues().iter().filter(|&&a| a <= alpha).count();
        prop_assert_eq!(n, res.rejections());
        prop_assert_eq!(n, res.threshold().rejections);
        prop_assert_eq!(res.adj_pvalues().len(), p.len());
    }

    #[test]
    fn weights_average_to_one(
        (p, x) in arb_case(),
        nbins in 1usize..6,
        nfolds in 1usize..4,
        seed in any::<u64>(),
        optimizer in arb_optimizer(),
    ) {
        let cfg = IhwConfig {
            nbins: Some(nbins),
            nfolds,
            seed,
            optimizer,
            ..IhwConfig::default()
        };
        let res = ihw(&p, Covariate::Numeric(x), 0.1, &cfg).unwrap();
        prop_assert!((res.mean_weight() - 1.0).abs() < 1e-9, "mean={}", res.mean_weight());

        let observed = p.iter().filter(|v| !v.is_nan()).count();
        for (i, &w) in res.weights().iter().enumerate() {
            if p[i].is_nan() {
                prop_assert!(w.is_nan());
            } else {
                prop_assert!(w >= 0.0 && w.is_finite());
            }
        }
        prop_assert_eq!(res.total_tests(), observed as u64);
    }

    #[test]
    fn single_stratum_is_bh(
        (p, x) in arb_case(),
        nfolds in 1usize..4,
        seed in any::<u64>(),
        optimizer in arb_optimizer(),
    ) {
        let cfg = IhwConfig {
            nbins: Some(1),
            nfolds,
            seed,
            optimizer,
            ..IhwConfig::default()
        };
        let res = ihw(&p, Covariate::Numeric(x), 0.1, &cfg).unwrap();
        let observed = p.iter().filter(|v| !v.is_nan()).count() as u64;
        let bh = bh_adjust(&p, observed).unwrap();
        for i in 0..p.len() {
            prop_assert!(same(res.adj_pvalues()[i], bh[i]), "i={} ihw={} bh={}", i, res.adj_pvalues()[i], bh[i]);
        }
    }

    #[test]
    fn single_stratum_is_monotone_in_alpha(
        (p, x) in arb_case(),
        nfolds in 1usize..4,
        a1 in 0.01f64..0.4,
        da in 0.0f64..0.4,
    ) {
        let cfg = IhwConfig {
            nbins: Some(1),
            nfolds,
            ..IhwConfig::default()
        };
        let lo = ihw(&p, Covariate::Numeric(x.clone()), a1, &cfg).unwrap();
        let hi = ihw(&p, Covariate::Numeric(x), a1 + da, &cfg).unwrap();
        prop_assert!(hi.rejections() >= lo.rejections());
    }

    #[test]
    fn same_seed_is_bit_identical(
        (p, x) in arb_case(),
        nbins in 1usize..6,
        nfolds in 1usize..4,
        seed in any::<u64>(),
    ) {
        let cfg = IhwConfig {
            nbins: Some(nbins),
            nfolds,
            seed,
            ..IhwConfig::default()
        };
        let a = ihw(&p, Covariate::Numeric(x.clone()), 0.1, &cfg).unwrap();
        let b = ihw(&p, Covariate::Numeric(x), 0.1, &cfg).unwrap();
        prop_assert_eq!(a.rejections(), b.rejections());
        prop_assert_eq!(a.weight_matrix(), b.weight_matrix());
        prop_assert_eq!(a.folds(), b.folds());
        let bits = |v: &[f64]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        prop_assert_eq!(bits(a.weights()), bits(b.weights()));
        prop_assert_eq!(bits(a.adj_pvalues()), bits(b.adj_pvalues()));
    }

    #[test]
    fn missing_pvalues_are_carried_through(
        (p, x) in arb_case(),
        nbins in 1usize..6,
        ties in prop_oneof![Just(TiesPolicy::Random), Just(TiesPolicy::First), Just(TiesPolicy::Average)],
    ) {
        let cfg = IhwConfig {
            nbins: Some(nbins),
            nfolds: 2,
            ties,
            ..IhwConfig::default()
        };
        let res = ihw(&p, Covariate::Numeric(x), 0.1, &cfg).unwrap();
        for i in 0..p.len() {
            let missing = p[i].is_nan();
            prop_assert_eq!(res.adj_pvalues()[i].is_nan(), missing);
            prop_assert_eq!(res.weighted_pvalues()[i].is_nan(), missing);
            prop_assert_eq!(res.strata()[i].is_none(), missing);
            prop_assert_eq!(res.folds()[i].is_none(), missing);
        }
    }

    #[test]
    fn declared_totals_never_add_rejections(
        (p, _) in arb_case(),
        extra in proptest::collection::vec(0u64..50, 3),
    ) {
        // Three categorical strata; pad each with unobserved hypotheses.
        let labels: Vec<usize> = (0..p.len()).map(|i| i % 3).collect();
        let mut observed = [0u64; 3];
        for (i, &l) in labels.iter().enumerate() {
            if !p[i].is_nan() {
                observed[l] += 1;
            }
        }
        let groups: GroupCounts = (0..3).map(|s| (s, observed[s] + extra[s])).collect();
        let cfg = IhwConfig {
            nfolds: 1,
            ..IhwConfig::default()
        };
        let plain = ihw(&p, Covariate::Categorical(labels.clone()), 0.1, &cfg).unwrap();
        let padded_cfg = IhwConfig {
            m_groups: Some(groups),
            ..cfg
        };
        let padded = ihw(&p, Covariate::Categorical(labels), 0.1, &padded_cfg).unwrap();
        let total: u64 = observed.iter().sum::<u64>() + extra.iter().sum::<u64>();
        prop_assert_eq!(padded.total_tests(), total);
        let n = padded.adj_pvalues().iter().filter(|&&a| a <= 0.1).count();
        prop_assert_eq!(n, padded.rejections());
        prop_assert!((padded.mean_weight() - 1.0).abs() < 1e-9);
        prop_assert!(plain.rejections() <= p.len());
    }
}

// ---------------------------------------------------------------------------
// Configuration and errors
// ---------------------------------------------------------------------------

#[test]
fn default_config() {
    let cfg = IhwConfig::default();
    assert_eq!(cfg.nbins, None);
    assert_eq!(cfg.nfolds, 5);
    assert_eq!(cfg.adjustment, AdjustmentType::Bh);
    assert_eq!(cfg.seed, 1);
    assert_eq!(cfg.optimizer, WeightOptimizer::Grenander);
    assert_eq!(cfg.ties, TiesPolicy::Random);
}

#[test]
fn auto_bins_follow_the_observed_count() {
    let m = 40_000;
    let p: Vec<f64> = (0..m).map(|i| (i as f64 + 0.5) / m as f64).collect();
    let x: Vec<f64> = (0..m).map(|i| ((i * 31) % 977) as f64).collect();
    let res = ihw(&p, Covariate::Numeric(x), 0.1, &IhwConfig::default()).unwrap();
    assert_eq!(res.nbins(), ihw::suggested_nbins(m));
    assert_eq!(res.nbins(), 20);
}

#[test]
fn null_proportion_level_is_validated() {
    let cfg = IhwConfig {
        null_proportion: true,
        null_proportion_level: 1.0,
        ..IhwConfig::default()
    };
    assert_eq!(
        ihw(&[0.1], Covariate::Numeric(vec![1.0]), 0.1, &cfg).unwrap_err(),
        ihw::InvalidInputError::NullProportionLevel(1.0)
    );
}

#[test]
fn categorical_strata_use_their_own_labels() {
    let p = vec![0.001, 0.5, 0.002, 0.7, 0.003, 0.9];
    let labels = vec![20, 0, 20, 0, 20, 0];
    let cfg = IhwConfig {
        nfolds: 1,
        nbins: Some(17),
        ..IhwConfig::default()
    };
    let res = ihw(&p, Covariate::Categorical(labels.clone()), 0.1, &cfg).unwrap();
    assert_eq!(res.nbins(), 2);
    assert_eq!(res.levels(), &[0, 20]);
    assert_eq!(res.strata()[0], Some(1));
    for (s, &l) in res.strata().iter().zip(&labels) {
        assert_eq!(res.levels()[s.unwrap()], l);
    }

    // A declared label with no observed p-value is an empty stratum.
    let censored = IhwConfig {
        m_groups: Some(GroupCounts::from([(0, 3), (7, 5), (20, 3)])),
        ..cfg
    };
    let res = ihw(&p, Covariate::Categorical(labels), 0.1, &censored).unwrap();
    assert_eq!(res.levels(), &[0, 7, 20]);
    assert_eq!(res.strata()[0], Some(2));
    assert_eq!(res.cell_sizes().get(1, 0), Some(5.0));
    assert_eq!(res.total_tests(), 11);
}
