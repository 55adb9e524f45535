use configuration::CapScaling;

/// Smallest and largest of the finite values, or `None` if there are none.
pub fn find_min_max(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((min, max)) => Some((min.min(v), max.max(v))),
        })
}

/// Maps `value` onto [0, 1] where `min` scores 0 and `max` scores 1.
/// A degenerate range scores everything 1.
pub fn normalize(value: f64, min: f64, max: f64) -> f64 {
    if max - min <= f64::EPSILON * max.abs().max(1.0) {
        return 1.0;
    }
    ((value - min) / (max - min)).clamp(0.0, 1.0)
}

/// Like `normalize`, but lower raw values score higher.
pub fn normalize_inverse(value: f64, min: f64, max: f64) -> f64 {
    if max - min <= f64::EPSILON * max.abs().max(1.0) {
        return 1.0;
    }
    ((max - value) / (max - min)).clamp(0.0, 1.0)
}

/// Monotonic transform of market caps before normalisation.
pub fn scale_caps(caps: &[f64], scaling: CapScaling) -> Vec<f64> {
    match scaling {
        CapScaling::Linear => caps.to_vec(),
        CapScaling::Log => caps.iter().map(|c| c.max(0.0).ln_1p()).collect(),
        CapScaling::Rank => ranks(caps),
    }
}

/// 1-based ascending ranks; ties share the average of their positions.
fn ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        let shared = (start + end + 1) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = shared;
        }
        start = end;
    }
    ranks
}
