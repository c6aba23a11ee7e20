//! Small numeric helpers shared by the statistical branch.

/// Arithmetic mean; `0.0` for an empty slice.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Population standard deviation; `0.0` for an empty slice.
pub fn std_dev(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let m = mean(data);
    let var = data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / data.len() as f64;
    var.sqrt()
}

/// Mean squared error of a scalar prediction broadcast against `actual`.
pub fn mse_against_scalar(actual: &[f64], predicted: f64) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    actual.iter().map(|a| (a - predicted).powi(2)).sum::<f64>() / actual.len() as f64
}

/// Least-squares slope of `data` against its sample index.
pub fn slope(data: &[f64]) -> f64 {
    let n = data.len();
    if n < 2 {
        return 0.0;
    }
    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = mean(data);
    let mut num = 0.0;
    let mut den = 0.0;
    for (i, y) in data.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (y - y_mean);
        den += dx * dx;
    }
    if den < f64::EPSILON {
        0.0
    } else {
        num / den
    }
}

/// Population variance of first differences.
pub fn increment_variance(data: &[f64]) -> f64 {
    if data.len() < 2 {
        return 0.0;
    }
    let diffs: Vec<f64> = data.windows(2).map(|w| w[1] - w[0]).collect();
    std_dev(&diffs).powi(2)
}
