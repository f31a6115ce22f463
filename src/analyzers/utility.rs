/// Sums `values` in ascending order, so equal multisets give identical sums.
fn ordered_sum(values: impl IntoIterator<Item = f64>) -> f64 {
    let mut sorted: Vec<f64> = values.into_iter().collect();
    sorted.sort_by(f64::total_cmp);
    sorted.into_iter().sum()
}

/// Arithmetic mean of a slice of values. Returns 0.0 for empty input.
///
/// The result does not depend on the order of `values`.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    ordered_sum(values.iter().copied()) / values.len() as f64
}

/// Computes the sample standard deviation given a pre-computed mean.
/// Returns `None` for fewer than two values.
pub fn sample_stddev(values: &[f64], mean: f64) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let variance = ordered_sum(values.iter().map(|v| (v - mean).powi(2)))
        / (values.len() - 1) as f64;

    Some(variance.sqrt())
}

/// Samples sorted by `(value, weight)` with weights scaled so the largest
/// is exactly 1.0. `None` when no sample carries weight.
fn normalized(samples: &[(f64, f64)]) -> Option<Vec<(f64, f64)>> {
    let max = samples.iter().map(|(_, w)| *w).fold(0.0, f64::max);
    if max <= 0.0 {
        return None;
    }
    let mut scaled: Vec<(f64, f64)> = samples.iter().map(|(v, w)| (*v, w / max)).collect();
    scaled.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
    Some(scaled)
}

/// Weighted mean of `(value, weight)` pairs. `None` when the weights sum to zero.
///
/// Only relative weights matter: equal weights of any size give exactly
/// [`mean`] of the values, and the input order never changes the result.
pub fn weighted_mean(samples: &[(f64, f64)]) -> Option<f64> {
    let samples = normalized(samples)?;
    let total: f64 = samples.iter().map(|(_, w)| w).sum();
    Some(samples.iter().map(|(v, w)| v * w).sum::<f64>() / total)
}

/// Reliability-weighted sample standard deviation.
///
/// Equal weights give the ordinary sample standard deviation. Returns `None`
/// when there are no effective degrees of freedom.
pub fn weighted_sample_stddev(samples: &[(f64, f64)], mean: f64) -> Option<f64> {
    if samples.len() < 2 {
        return None;
    }
    let samples = normalized(samples)?;
    let v1: f64 = samples.iter().map(|(_, w)| w).sum();
    let v2: f64 = samples.iter().map(|(_, w)| w * w).sum();
    let denom = v1 - v2 / v1;
    if denom <= 0.0 {
        return None;
    }
    let ss = samples
        .iter()
        .map(|(v, w)| w * (v - mean).powi(2))
        .sum::<f64>();

    Some((ss / denom).sqrt())
}

/// Pearson correlation of paired observations.
///
/// `None` for fewer than two pairs or when either side has no variation.
pub fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    if pairs.len() < 2 {
        return None;
    }
    let xs: Vec<f64> = pairs.iter().map(|(x, _)| *x).collect();
    let ys: Vec<f64> = pairs.iter().map(|(_, y)| *y).collect();
    let (mx, my) = (mean(&xs), mean(&ys));

    let cov = ordered_sum(pairs.iter().map(|(x, y)| (x - mx) * (y - my)));
    let sx = ordered_sum(xs.iter().map(|x| (x - mx).powi(2))).sqrt();
    let sy = ordered_sum(ys.iter().map(|y| (y - my).powi(2))).sqrt();
    if sx == 0.0 || sy == 0.0 {
        return None;
    }
    Some((cov / (sx * sy)).clamp(-1.0, 1.0))
}
