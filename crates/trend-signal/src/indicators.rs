use engine_core::Bar;

/// Average True Range over `period` bars. Used to derive volatility offsets
/// for bracket orders. Returns an empty Vec when there is not enough data.
pub fn atr(bars: &[Bar], period: usize) -> Vec<f64> {
    if period == 0 || bars.len() < period + 1 {
        return vec![];
    }

    let mut true_ranges = Vec::new();
    for i in 1..bars.len() {
        let high_low = bars[i].high - bars[i].low;
        let high_close = (bars[i].high - bars[i - 1].close).abs();
        let low_close = (bars[i].low - bars[i - 1].close).abs();
        true_ranges.push(high_low.max(high_close).max(low_close));
    }

    let mut atr_values = Vec::new();
    let mut atr = true_ranges[..period].iter().sum::<f64>() / period as f64;
    atr_values.push(atr);

    for tr in &true_ranges[period..] {
        atr = (atr * (period - 1) as f64 + tr) / period as f64;
        atr_values.push(atr);
    }

    atr_values
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn bars(ranges: &[(f64, f64, f64)]) -> Vec<Bar> {
        let start = Utc::now() - Duration::days(ranges.len() as i64);
        ranges
            .iter()
            .enumerate()
            .map(|(i, &(high, low, close))| Bar {
                timestamp: start + Duration::days(i as i64),
                open: close,
                high,
                low,
                close,
                volume: 1_000,
            })
            .collect()
    }

    #[test]
    fn atr_insufficient_data() {
        let data = bars(&[(10.0, 9.0, 9.5), (10.5, 9.5, 10.0)]);
        assert!(atr(&data, 5).is_empty());
    }

    #[test]
    fn atr_constant_range() {
        // Every bar spans exactly 2.0 with no gaps, so ATR stays at 2.0.
        let data = bars(&[
            (11.0, 9.0, 10.0),
            (11.0, 9.0, 10.0),
            (11.0, 9.0, 10.0),
            (11.0, 9.0, 10.0),
            (11.0, 9.0, 10.0),
        ]);
        let values = atr(&data, 3);
        assert_eq!(values.len(), 2);
        for v in values {
            assert!((v - 2.0).abs() < 1e-9);
        }
    }
}
