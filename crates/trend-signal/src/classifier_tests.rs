#[cfg(test)]
mod tests {
    use crate::classifier::{TrendClassifier, TrendParams};
    use engine_core::TrendState;

    fn classifier(crossover_mode: bool) -> TrendClassifier {
        TrendClassifier::new(TrendParams {
            crossover_mode,
            ..TrendParams::default()
        })
        .unwrap()
    }

    /// Rise by 1 per bar for `rise` bars, then fall by 10 per bar. The steep
    /// decline makes the smoothed estimate peak right after the price peak.
    fn rise_then_fall(rise: usize, fall: usize) -> Vec<f64> {
        let mut closes: Vec<f64> = (1..=rise).map(|i| 300.0 + i as f64).collect();
        let peak = 300.0 + rise as f64;
        closes.extend((1..=fall).map(|i| peak - 10.0 * i as f64));
        closes
    }

    #[test]
    fn rejects_invalid_params() {
        assert!(TrendClassifier::new(TrendParams {
            bandwidth: 0,
            ..TrendParams::default()
        })
        .is_err());
        assert!(TrendClassifier::new(TrendParams {
            bandwidth: 4,
            lag: 4,
            ..TrendParams::default()
        })
        .is_err());
        assert!(TrendClassifier::new(TrendParams {
            relative_weight: 0.0,
            ..TrendParams::default()
        })
        .is_err());
    }

    #[test]
    fn short_series_yields_undefined_for_all_bars() {
        let clf = classifier(false);
        // 7 bars < bandwidth 8
        let closes = vec![10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0];
        let states: Vec<_> = clf.states(&closes).collect();

        assert_eq!(states.len(), closes.len());
        for bar in &states {
            assert!(bar.estimate.is_none());
            assert!(bar.state.is_none());
            assert!(!bar.turned_bullish && !bar.turned_bearish);
            assert!(!bar.bullish_cross && !bar.bearish_cross);
        }
        assert!(clf.latest(&closes).is_none());
    }

    #[test]
    fn empty_series_is_fine() {
        let clf = classifier(false);
        assert_eq!(clf.states(&[]).count(), 0);
        assert!(clf.latest(&[]).is_none());
    }

    #[test]
    fn flat_series_has_no_signal() {
        let clf = classifier(false);
        let closes = vec![50.0; 30];
        let states: Vec<_> = clf.states(&closes).collect();
        assert!(states.iter().all(|b| b.state.is_none()));
    }

    #[test]
    fn rising_series_is_bullish() {
        let clf = classifier(false);
        let closes: Vec<f64> = (1..=30).map(|i| i as f64).collect();
        let last = clf.latest(&closes).unwrap();
        assert_eq!(last.state, Some(TrendState::Bullish));
        assert!(!last.turned_bearish);
    }

    #[test]
    fn single_bearish_turn_at_the_inflection() {
        let clf = classifier(false);
        let closes = rise_then_fall(30, 10);
        let peak_index = 29;
        let states: Vec<_> = clf.states(&closes).collect();

        let turns: Vec<usize> = states
            .iter()
            .enumerate()
            .filter(|(_, b)| b.turned_bearish)
            .map(|(i, _)| i)
            .collect();

        assert_eq!(turns.len(), 1, "expected exactly one bearish turn");
        let turn = turns[0];
        assert!(
            turn > peak_index && turn <= peak_index + clf.params().lag,
            "turn at {turn} not within lag of peak {peak_index}"
        );
        assert!(states.iter().all(|b| !b.turned_bullish));
        // Rate mode wires the bearish alert to the turn event.
        assert!(states[turn].alert_bearish);
        assert_eq!(states.last().unwrap().state, Some(TrendState::Bearish));
    }

    #[test]
    fn crossover_mode_flips_on_the_secondary_estimate() {
        let clf = classifier(true);
        let closes = rise_then_fall(30, 10);
        let states: Vec<_> = clf.states(&closes).collect();

        // While rising, the faster secondary estimate sits above the primary.
        assert_eq!(states[20].state, Some(TrendState::Bullish));

        let crosses: Vec<usize> = states
            .iter()
            .enumerate()
            .filter(|(_, b)| b.bearish_cross)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(crosses.len(), 1, "expected exactly one bearish cross");
        assert!(crosses[0] > 29);
        // Crossover mode wires the alert to the cross event.
        assert!(states[crosses[0]].alert_bearish);
        assert_eq!(states.last().unwrap().state, Some(TrendState::Bearish));
    }

    #[test]
    fn both_event_families_are_always_exposed() {
        // Rate mode still computes crossover events so a strategy can pick
        // either family explicitly.
        let clf = classifier(false);
        let closes = rise_then_fall(30, 10);
        let states: Vec<_> = clf.states(&closes).collect();
        assert!(states.iter().any(|b| b.bearish_cross));
        assert!(states.iter().any(|b| b.turned_bearish));
        // But the alert follows the rate family in this mode: a bar with only
        // a cross event raises no alert.
        assert!(states
            .iter()
            .any(|b| b.bearish_cross && !b.turned_bearish && !b.alert_bearish));
    }

    #[test]
    fn sequence_is_restartable() {
        let clf = classifier(false);
        let closes = rise_then_fall(20, 5);
        let first: Vec<_> = clf.states(&closes).map(|b| b.estimate).collect();
        let second: Vec<_> = clf.states(&closes).map(|b| b.estimate).collect();
        assert_eq!(first, second);
    }
}
