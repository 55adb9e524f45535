/// Euclidean projection of `v` onto `{w : sum(w) = 1, lower <= w_i <= upper}`.
///
/// The projection has the form `w_i = clamp(v_i - tau, lower, upper)` for a scalar
/// shift `tau`; the sum is monotone in `tau`, so `tau` is found by bisection.
/// The caller guarantees `n * lower <= 1 <= n * upper`.
pub fn project_capped_simplex(v: &[f64], lower: f64, upper: f64) -> Vec<f64> {
    if v.is_empty() {
        return Vec::new();
    }
    let (min_v, max_v) = v
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| (lo.min(*x), hi.max(*x)));

    let sum_at = |tau: f64| -> f64 { v.iter().map(|x| (x - tau).clamp(lower, upper)).sum() };

    // sum_at(lo_tau) = n * upper >= 1 and sum_at(hi_tau) = n * lower <= 1.
    let mut lo_tau = min_v - upper;
    let mut hi_tau = max_v - lower;
    for _ in 0..200 {
        let mid = 0.5 * (lo_tau + hi_tau);
        if mid <= lo_tau || mid >= hi_tau {
            break;
        }
        if sum_at(mid) > 1.0 {
            lo_tau = mid;
        } else {
            hi_tau = mid;
        }
    }
    let tau = 0.5 * (lo_tau + hi_tau);
    let mut w: Vec<f64> = v.iter().map(|x| (x - tau).clamp(lower, upper)).collect();

    // Push the residual onto the coordinates strictly inside the box.
    let residual = 1.0 - w.iter().sum::<f64>();
    let free: Vec<usize> = (0..w.len())
        .filter(|&i| w[i] > lower && w[i] < upper)
        .collect();
    if !free.is_empty() && residual != 0.0 {
        let share = residual / free.len() as f64;
        for i in free {
            w[i] = (w[i] + share).clamp(lower, upper);
        }
    }
    w
}
