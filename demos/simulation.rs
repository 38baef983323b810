//! Compare BH with IHW on a simulated screen, then rerun IHW on a filtered list.
//!
//! ```text
//! RUST_LOG=ihw=debug cargo run --example simulation
//! ```

use ihw::{bh_adjust, groups_by_filter, ihw, Covariate, GroupCounts, IhwConfig, TiesPolicy};
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Bernoulli, Distribution, Normal, Uniform};
use statrs::distribution::{ContinuousCDF, Normal as Gaussian};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let m = 100_000;
    let alpha = 0.1;
    let mut rng = StdRng::seed_from_u64(1);
    let cov = Uniform::new(0.0, 2.5)?;
    let h = Bernoulli::new(0.1)?;
    let noise = Normal::new(0.0, 1.0)?;
    let phi = Gaussian::new(0.0, 1.0)?;

    let mut p = Vec::with_capacity(m);
    let mut x = Vec::with_capacity(m);
    for _ in 0..m {
        let xi = cov.sample(&mut rng);
        let mean = if h.sample(&mut rng) { xi } else { 0.0 };
        p.push(1.0 - phi.cdf(mean + noise.sample(&mut rng)));
        x.push(xi);
    }

    let bh = bh_adjust(&p, m as u64)?.iter().filter(|&&a| a <= alpha).count();
    println!("BH:                 {bh} rejections");

    let cfg = IhwConfig {
        nbins: Some(20),
        ..IhwConfig::default()
    };
    let res = ihw(&p, Covariate::Numeric(x.clone()), alpha, &cfg)?;
    println!("IHW (20 bins):      {} rejections", res.rejections());
    for s in 0..res.nbins() {
        let row = res.weight_matrix().row(s);
        let upper = res.stratification_breaks()[s].unwrap_or(f64::NAN);
        println!("  stratum {s:>2} (x <= {upper:.3}): {row:.2?}");
    }

    // Keep only p <= 0.1 and declare the full per-stratum counts.
    let groups = groups_by_filter(&x, 20, TiesPolicy::Random, 1)?;
    let mut m_groups = GroupCounts::new();
    for &g in &groups {
        *m_groups.entry(g).or_insert(0) += 1;
    }
    let kept: Vec<usize> = (0..m).filter(|&i| p[i] <= 0.1).collect();
    let kept_p: Vec<f64> = kept.iter().map(|&i| p[i]).collect();
    let kept_groups: Vec<usize> = kept.iter().map(|&i| groups[i]).collect();
    let censored = IhwConfig {
        m_groups: Some(m_groups),
        ..IhwConfig::default()
    };
    let res = ihw(&kept_p, Covariate::Categorical(kept_groups), alpha, &censored)?;
    println!(
        "IHW (filtered):     {} rejections from {} kept of {} tests",
        res.rejections(),
        kept.len(),
        res.total_tests()
    );
    Ok(())
}
