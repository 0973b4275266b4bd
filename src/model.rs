use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Candle interval an indicator column is computed over.
///
/// String representations match the chat card labels (e.g. `"M15"`, `"H4"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeFrame {
    M1,
    M5,
    M15,
    M30,
    H1,
    H2,
    H4,
    D1,
}

impl TimeFrame {
    /// Fixed ordering shared by the RSI, MACD and pivot column blocks.
    pub const ALL: [TimeFrame; 8] = [
        Self::M1,
        Self::M5,
        Self::M15,
        Self::M30,
        Self::H1,
        Self::H2,
        Self::H4,
        Self::D1,
    ];

    /// Parse a label into a `TimeFrame`.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "M1" => Some(Self::M1),
            "M5" => Some(Self::M5),
            "M15" => Some(Self::M15),
            "M30" => Some(Self::M30),
            "H1" => Some(Self::H1),
            "H2" => Some(Self::H2),
            "H4" => Some(Self::H4),
            "D1" => Some(Self::D1),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::M1 => "M1",
            Self::M5 => "M5",
            Self::M15 => "M15",
            Self::M30 => "M30",
            Self::H1 => "H1",
            Self::H2 => "H2",
            Self::H4 => "H4",
            Self::D1 => "D1",
        }
    }

    /// Column suffix the feed provider uses for this interval.
    ///
    /// The daily interval is the provider default and carries no suffix.
    pub fn column_suffix(self) -> Option<&'static str> {
        match self {
            Self::M1 => Some("1"),
            Self::M5 => Some("5"),
            Self::M15 => Some("15"),
            Self::M30 => Some("30"),
            Self::H1 => Some("60"),
            Self::H2 => Some("120"),
            Self::H4 => Some("240"),
            Self::D1 => None,
        }
    }
}

impl fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pair-level trend voted by the sign of the MACD readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Trend {
    Up,
    Down,
    Neutral,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => write!(f, "UP TREND"),
            Self::Down => write!(f, "DOWN TREND"),
            Self::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RsiZone {
    Overbought,
    Oversold,
}

/// Direction hint attached to a pair-level alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AlertSignal {
    UpArrow,
    DownArrow,
}

impl fmt::Display for AlertSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpArrow => write!(f, "⬆"),
            Self::DownArrow => write!(f, "⬇"),
        }
    }
}

/// Top-level feed provider response: `{ "data": [ { "s": ..., "d": [...] } ] }`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedResponse {
    #[serde(default)]
    data: Option<Vec<RawFeedEntry>>,
}

impl FeedResponse {
    #[cfg(test)]
    pub fn new(entries: Vec<RawFeedEntry>) -> Self {
        Self {
            data: Some(entries),
        }
    }

    pub fn entries(&self) -> &[RawFeedEntry] {
        self.data.as_deref().unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawFeedEntry {
    #[serde(rename = "s", default)]
    pub symbol: Option<String>,
    /// Provider `null`s are read as NaN.
    #[serde(rename = "d", default, deserialize_with = "nullable_floats")]
    pub indicators: Vec<f64>,
}

fn nullable_floats<'de, D>(deserializer: D) -> Result<Vec<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<Option<f64>>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

/// Fibonacci pivot levels for one timeframe, formatted to 5 decimal places.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PivotLevels {
    pub r3: String,
    pub r2: String,
    pub r1: String,
    pub s1: String,
    pub s2: String,
    pub s3: String,
}

impl PivotLevels {
    /// Build from a 6-wide `R3, R2, R1, S1, S2, S3` block.
    pub fn from_block(block: &[f64; 6]) -> Self {
        let fmt = |v: f64| format!("{v:.5}");
        Self {
            r3: fmt(block[0]),
            r2: fmt(block[1]),
            r1: fmt(block[2]),
            s1: fmt(block[3]),
            s2: fmt(block[4]),
            s3: fmt(block[5]),
        }
    }
}

/// An RSI reading that crossed the overbought or oversold threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdState {
    pub timeframe: TimeFrame,
    pub rsi_value: f64,
    pub zone: RsiZone,
}

impl ThresholdState {
    pub fn formatted_value(&self) -> String {
        format!("{:.2}", self.rsi_value)
    }
}

/// Pair symbol with its prefix stripped, split into currency codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencyPair {
    pub symbol: String,
    pub base: String,
    pub quote: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalRecord {
    pub pair: String,
    pub base_currency: String,
    pub quote_currency: String,
    pub description: String,
    pub timeframe: TimeFrame,
    /// RSI formatted to 2 decimal places.
    pub rsi_value: String,
    pub zone: RsiZone,
    pub trend: Trend,
    pub pivot: PivotLevels,
}

impl SignalRecord {
    pub fn key(&self) -> String {
        format!("{}_{}", self.pair, self.timeframe)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertRecord {
    pub pair: String,
    pub description: String,
    pub signal: AlertSignal,
}
