/// Rational-quadratic kernel weight for a bar `offset` positions back from
/// the estimated bar. Decays with the square of the offset; `relative_weight`
/// controls how fast far bars lose influence relative to near ones.
pub fn kernel_weight(offset: usize, bandwidth: usize, relative_weight: f64) -> f64 {
    let i = offset as f64;
    let h = bandwidth as f64;
    (1.0 + i * i / (h * h * 2.0 * relative_weight)).powf(-relative_weight)
}

/// Kernel-weighted local estimate of the close at `index`, using the
/// trailing `bandwidth` bars. Returns `None` when there are fewer than
/// `bandwidth` bars ending at `index`, or when the cumulative weight is
/// zero — an undefined estimate is a missing value, never a division by
/// zero.
pub fn kernel_estimate(
    closes: &[f64],
    index: usize,
    bandwidth: usize,
    relative_weight: f64,
) -> Option<f64> {
    if bandwidth == 0 || index >= closes.len() || index + 1 < bandwidth {
        return None;
    }

    let mut weighted_sum = 0.0;
    let mut cumulative_weight = 0.0;
    for offset in 0..bandwidth {
        let w = kernel_weight(offset, bandwidth, relative_weight);
        weighted_sum += closes[index - offset] * w;
        cumulative_weight += w;
    }

    if cumulative_weight == 0.0 {
        None
    } else {
        Some(weighted_sum / cumulative_weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_is_one_at_zero_offset() {
        assert!((kernel_weight(0, 8, 8.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn weight_non_increasing_in_offset() {
        for &r in &[0.5, 1.0, 8.0, 25.0] {
            let mut prev = f64::INFINITY;
            for offset in 0..50 {
                let w = kernel_weight(offset, 8, r);
                assert!(w <= prev, "w({offset}) increased for r={r}");
                assert!(w > 0.0);
                prev = w;
            }
        }
    }

    #[test]
    fn estimate_undefined_with_short_history() {
        let closes = vec![1.0, 2.0, 3.0];
        assert!(kernel_estimate(&closes, 2, 8, 8.0).is_none());
    }

    #[test]
    fn estimate_of_constant_series_is_the_constant() {
        let closes = vec![42.0; 20];
        let est = kernel_estimate(&closes, 19, 8, 8.0).unwrap();
        assert!((est - 42.0).abs() < 1e-9);
    }

    #[test]
    fn estimate_leans_toward_recent_closes() {
        // Rising series: the recency-weighted mean sits above the plain mean
        // of the window but below the latest close.
        let closes: Vec<f64> = (1..=20).map(|i| i as f64).collect();
        let est = kernel_estimate(&closes, 19, 8, 8.0).unwrap();
        let window_mean: f64 = closes[12..20].iter().sum::<f64>() / 8.0;
        assert!(est > window_mean);
        assert!(est < 20.0);
    }
}
