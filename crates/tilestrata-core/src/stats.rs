//! Small order-statistic helpers shared by the stretch and strata stages.
//! `pub(crate)` only.

/// Quantile `q ∈ [0, 1]` of an ascending-sorted slice, linearly interpolated
/// between the two nearest order statistics (position `q · (n − 1)`).
/// Returns NaN for an empty slice.
pub(crate) fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = (lo + 1).min(n - 1);
            let frac = pos - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}

/// Sort a copy of `values` (NaNs dropped) and take quantile `q`.
pub(crate) fn quantile(values: impl IntoIterator<Item = f64>, q: f64) -> f64 {
    let mut v: Vec<f64> = values.into_iter().filter(|x| !x.is_nan()).collect();
    v.sort_by(|a, b| a.total_cmp(b));
    quantile_sorted(&v, q)
}
