//! Utility helpers: bin-count guidance.

/// Suggest a number of covariate strata for `m` hypotheses.
///
/// Uses `floor(sqrt(m) / 10)`, clamped to `[1, 40]`, so both the number of
/// strata and the hypotheses per stratum grow with `m`.
///
/// # Example
///
/// ```rust
/// use ihw::suggested_nbins;
///
/// assert_eq!(suggested_nbins(100), 1);
/// assert_eq!(suggested_nbins(100_000), 31);
/// ```
#[must_use]
pub fn suggested_nbins(m: usize) -> usize {
    let bins = ((m as f64).sqrt() / 10.0).floor() as usize;
    bins.clamp(1, 40)
}
