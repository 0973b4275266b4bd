use crate::model::{AlertSignal, RsiZone, ThresholdState, TimeFrame, Trend};
use crate::strategy::SignalThresholds;

/// Vote a pair-level trend from the sign of its MACD readings.
///
/// Zeros and NaN abstain; an exact tie is `Neutral`.
pub fn classify_trend(macd: &[f64]) -> Trend {
    let positive = macd.iter().filter(|&&v| v > 0.0).count();
    let negative = macd.iter().filter(|&&v| v < 0.0).count();

    match positive.cmp(&negative) {
        std::cmp::Ordering::Greater => Trend::Up,
        std::cmp::Ordering::Less => Trend::Down,
        std::cmp::Ordering::Equal => Trend::Neutral,
    }
}

/// Emit one state per timeframe whose RSI is at or beyond a threshold.
///
/// Both bounds are inclusive.
pub fn classify_threshold(
    rsi: impl IntoIterator<Item = (TimeFrame, f64)>,
    thresholds: &SignalThresholds,
) -> Vec<ThresholdState> {
    rsi.into_iter()
        .filter_map(|(timeframe, rsi_value)| {
            let zone = zone_of(rsi_value, thresholds)?;
            Some(ThresholdState {
                timeframe,
                rsi_value,
                zone,
            })
        })
        .collect()
}

fn zone_of(value: f64, thresholds: &SignalThresholds) -> Option<RsiZone> {
    if value >= thresholds.overbought {
        Some(RsiZone::Overbought)
    } else if value <= thresholds.oversold {
        Some(RsiZone::Oversold)
    } else {
        None
    }
}

/// Overbought and oversold counts across all timeframes of one pair.
///
/// The two counts are independent, so a value can land in both when the
/// thresholds cross.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtremeTally {
    pub overbought: usize,
    pub oversold: usize,
}

pub fn tally(rsi: &[f64], thresholds: &SignalThresholds) -> ExtremeTally {
    ExtremeTally {
        overbought: rsi.iter().filter(|&&v| v >= thresholds.overbought).count(),
        oversold: rsi.iter().filter(|&&v| v <= thresholds.oversold).count(),
    }
}

/// Pair-level alert direction, or `None` when neither count reaches
/// `thresholds.alert_count`. Mostly overbought points down; ties point up.
pub fn classify_alert(rsi: &[f64], thresholds: &SignalThresholds) -> Option<AlertSignal> {
    let counts = tally(rsi, thresholds);
    let limit = thresholds.alert_count;
    if counts.overbought < limit && counts.oversold < limit {
        return None;
    }

    if counts.overbought > counts.oversold {
        Some(AlertSignal::DownArrow)
    } else {
        Some(AlertSignal::UpArrow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zipped(rsi: [f64; 8]) -> Vec<(TimeFrame, f64)> {
        TimeFrame::ALL.into_iter().zip(rsi).collect()
    }

    #[test]
    fn trend_up_when_positive_majority() {
        let macd = [0.1, 0.2, -0.1, 0.3, 0.0, 0.5, -0.2, 0.1];
        assert_eq!(classify_trend(&macd), Trend::Up);
    }

    #[test]
    fn trend_down_when_negative_majority() {
        let macd = [-0.1, -0.2, -0.1, 0.3, 0.0, -0.5, -0.2, 0.1];
        assert_eq!(classify_trend(&macd), Trend::Down);
    }

    #[test]
    fn trend_neutral_on_tie_or_all_zero() {
        assert_eq!(classify_trend(&[1.0, -1.0, 2.0, -2.0]), Trend::Neutral);
        assert_eq!(classify_trend(&[0.0; 8]), Trend::Neutral);
        assert_eq!(classify_trend(&[f64::NAN; 8]), Trend::Neutral);
    }

    #[test]
    fn trend_flips_under_negation() {
        let samples: [[f64; 8]; 3] = [
            [0.1, 0.2, -0.1, 0.3, 0.0, 0.5, -0.2, 0.1],
            [-3.0, -2.0, -1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            [1.0, -1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        ];
        for macd in samples {
            let negated: Vec<f64> = macd.iter().map(|v| -v).collect();
            let expected = match classify_trend(&macd) {
                Trend::Up => Trend::Down,
                Trend::Down => Trend::Up,
                Trend::Neutral => Trend::Neutral,
            };
            assert_eq!(classify_trend(&negated), expected);
        }
    }

    #[test]
    fn threshold_emits_only_extremes() {
        let thresholds = SignalThresholds::default();
        let states = classify_threshold(
            zipped([75.0, 20.0, 50.0, 50.0, 50.0, 50.0, 50.0, 50.0]),
            &thresholds,
        );
        assert_eq!(states.len(), 2);
        assert_eq!(states[0].timeframe, TimeFrame::M1);
        assert_eq!(states[0].zone, RsiZone::Overbought);
        assert_eq!(states[0].formatted_value(), "75.00");
        assert_eq!(states[1].timeframe, TimeFrame::M5);
        assert_eq!(states[1].zone, RsiZone::Oversold);
        assert_eq!(states[1].formatted_value(), "20.00");
    }

    #[test]
    fn threshold_bounds_are_inclusive() {
        let thresholds = SignalThresholds::default();
        let states = classify_threshold(
            zipped([70.0, 30.0, 69.99, 30.01, 50.0, 50.0, 50.0, 50.0]),
            &thresholds,
        );
        let timeframes: Vec<_> = states.iter().map(|s| s.timeframe).collect();
        assert_eq!(timeframes, vec![TimeFrame::M1, TimeFrame::M5]);
    }

    #[test]
    fn threshold_ignores_nan() {
        let thresholds = SignalThresholds::default();
        let states = classify_threshold(zipped([f64::NAN; 8]), &thresholds);
        assert!(states.is_empty());
    }

    #[test]
    fn threshold_respects_custom_bounds() {
        let thresholds = SignalThresholds {
            overbought: 80.0,
            oversold: 20.0,
            alert_count: 4,
        };
        let states = classify_threshold(
            zipped([75.0, 25.0, 80.0, 20.0, 50.0, 50.0, 50.0, 50.0]),
            &thresholds,
        );
        let timeframes: Vec<_> = states.iter().map(|s| s.timeframe).collect();
        assert_eq!(timeframes, vec![TimeFrame::M15, TimeFrame::M30]);
    }

    #[test]
    fn alert_points_down_when_mostly_overbought() {
        let thresholds = SignalThresholds::default();
        let rsi = [71.0, 72.0, 75.0, 80.0, 70.0, 50.0, 50.0, 50.0];
        assert_eq!(
            tally(&rsi, &thresholds),
            ExtremeTally {
                overbought: 5,
                oversold: 0
            }
        );
        assert_eq!(classify_alert(&rsi, &thresholds), Some(AlertSignal::DownArrow));
    }

    #[test]
    fn alert_points_up_when_mostly_oversold() {
        let thresholds = SignalThresholds::default();
        let rsi = [10.0, 20.0, 30.0, 25.0, 50.0, 50.0, 50.0, 50.0];
        assert_eq!(classify_alert(&rsi, &thresholds), Some(AlertSignal::UpArrow));
    }

    #[test]
    fn alert_needs_count_to_reach_threshold() {
        let thresholds = SignalThresholds::default();
        let rsi = [71.0, 72.0, 75.0, 20.0, 20.0, 20.0, 50.0, 50.0];
        assert_eq!(classify_alert(&rsi, &thresholds), None);
    }

    #[test]
    fn alert_tie_favours_up_arrow() {
        let thresholds = SignalThresholds::default();
        let rsi = [71.0, 72.0, 75.0, 80.0, 20.0, 20.0, 20.0, 20.0];
        assert_eq!(classify_alert(&rsi, &thresholds), Some(AlertSignal::UpArrow));
    }

    #[test]
    fn crossed_thresholds_count_both_sides() {
        let thresholds = SignalThresholds {
            overbought: 40.0,
            oversold: 60.0,
            alert_count: 8,
        };
        let counts = tally(&[50.0; 8], &thresholds);
        assert_eq!(counts.overbought, 8);
        assert_eq!(counts.oversold, 8);
        assert_eq!(
            classify_alert(&[50.0; 8], &thresholds),
            Some(AlertSignal::UpArrow)
        );
    }
}
