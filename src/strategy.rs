pub mod condition;

use crate::config::SignalConfig;

/// Immutable classification thresholds for one polling cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalThresholds {
    /// RSI at or above this value is overbought.
    pub overbought: f64,
    /// RSI at or below this value is oversold.
    pub oversold: f64,
    /// Number of extreme timeframes a pair needs before an alert fires.
    pub alert_count: usize,
}

impl SignalThresholds {
    pub fn from_config(config: &SignalConfig) -> Self {
        Self {
            overbought: config.overbought,
            oversold: config.oversold,
            alert_count: config.alert_count,
        }
    }

    /// Same thresholds with the alert count replaced, e.g. from the settings store.
    pub fn with_alert_count(self, alert_count: usize) -> Self {
        Self {
            alert_count,
            ..self
        }
    }
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self {
            overbought: 70.0,
            oversold: 30.0,
            alert_count: 4,
        }
    }
}
