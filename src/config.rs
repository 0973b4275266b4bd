use std::collections::HashMap;
use std::num::{NonZeroU32, NonZeroUsize};
use std::path::Path;
use std::time::Duration;

use chrono::FixedOffset;
use error_stack::{Report, ResultExt};
use serde::Deserialize;

use crate::error::ConfigError;
use crate::feed::tradingview::SCANNER_URL;
use crate::model::TimeFrame;
use crate::notifier::line::LINE_API_BASE;

const DEFAULT_PAIRS: &[&str] = &[
    "AUDCAD", "AUDCHF", "AUDJPY", "AUDUSD", "CADCHF", "CADJPY", "CHFJPY", "EURAUD", "EURCAD",
    "EURCHF", "EURGBP", "EURJPY", "EURUSD", "GBPAUD", "GBPCAD", "GBPJPY", "GBPUSD", "NZDCAD",
    "NZDCHF", "NZDJPY", "NZDUSD", "USDCAD", "USDCHF", "USDJPY",
];

const DEFAULT_CURRENCIES: &[(&str, &str)] = &[
    ("AUD", "Australian Dollar"),
    ("CAD", "Canadian Dollar"),
    ("EUR", "Euro"),
    ("CHF", "Swiss Franc"),
    ("GBP", "Great Britain Pound"),
    ("JPY", "Japanese Yen"),
    ("NZD", "New Zealand Dollar"),
    ("USD", "US Dollar"),
];

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "text".into()
}

fn default_utc_offset_hours() -> i32 {
    7
}

fn default_feed_url() -> String {
    SCANNER_URL.into()
}

fn default_requests_per_minute() -> u32 {
    30
}

fn default_overbought() -> f64 {
    70.0
}

fn default_oversold() -> f64 {
    30.0
}

fn default_alert_count() -> usize {
    4
}

fn default_max_items() -> usize {
    12
}

fn default_prefix() -> String {
    "FX_IDC:".into()
}

fn default_pairs() -> Vec<String> {
    DEFAULT_PAIRS.iter().map(|p| (*p).to_owned()).collect()
}

fn default_timeframes() -> Vec<String> {
    TimeFrame::ALL.iter().map(|tf| tf.as_str().to_owned()).collect()
}

fn default_currencies() -> HashMap<String, String> {
    DEFAULT_CURRENCIES
        .iter()
        .map(|(code, name)| ((*code).to_owned(), (*name).to_owned()))
        .collect()
}

fn default_line_api_base() -> String {
    LINE_API_BASE.into()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_fallback_text() -> String {
    "No interesting currency pairs found.".into()
}

fn default_interval_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_bind() -> String {
    "0.0.0.0:8000".into()
}

#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub signal: SignalConfig,
    #[serde(default)]
    pub market: MarketConfig,
    #[serde(default)]
    pub line: LineConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Accepted values: `"text"` | `"json"`
    #[serde(default = "default_log_format")]
    pub log_format: String,
    /// Offset used for card timestamps (Asia/Bangkok by default).
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            utc_offset_hours: default_utc_offset_hours(),
        }
    }
}

impl GeneralConfig {
    pub fn utc_offset(&self) -> Option<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_hours.checked_mul(3600)?)
    }
}

#[derive(Debug, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_feed_url")]
    pub url: String,
    /// Pre-encoded `Basic` credential, sent as-is.
    pub token: Option<String>,
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: default_feed_url(),
            token: None,
            requests_per_minute: default_requests_per_minute(),
        }
    }
}

impl FeedConfig {
    pub fn rate(&self) -> Option<NonZeroU32> {
        NonZeroU32::new(self.requests_per_minute)
    }
}

#[derive(Debug, Deserialize)]
pub struct SignalConfig {
    #[serde(default = "default_overbought")]
    pub overbought: f64,
    #[serde(default = "default_oversold")]
    pub oversold: f64,
    /// Fallback when the settings store has no alert count.
    #[serde(default = "default_alert_count")]
    pub alert_count: usize,
    /// Cards per carousel message.
    #[serde(default = "default_max_items")]
    pub max_items: usize,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            overbought: default_overbought(),
            oversold: default_oversold(),
            alert_count: default_alert_count(),
            max_items: default_max_items(),
        }
    }
}

impl SignalConfig {
    pub fn batch_size(&self) -> Option<NonZeroUsize> {
        NonZeroUsize::new(self.max_items)
    }
}

#[derive(Debug, Deserialize)]
pub struct MarketConfig {
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_pairs")]
    pub pairs: Vec<String>,
    /// Timeframe labels requested from the feed, in column order.
    #[serde(default = "default_timeframes")]
    pub timeframes: Vec<String>,
    #[serde(default = "default_currencies")]
    pub currencies: HashMap<String, String>,
}

impl MarketConfig {
    /// Parsed timeframes; unknown labels are rejected by validation.
    pub fn timeframes(&self) -> Vec<TimeFrame> {
        self.timeframes
            .iter()
            .filter_map(|label| TimeFrame::from_str(label))
            .collect()
    }
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            pairs: default_pairs(),
            timeframes: default_timeframes(),
            currencies: default_currencies(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LineConfig {
    #[serde(default = "default_line_api_base")]
    pub api_base: String,
    /// When absent, messages are logged instead of sent.
    pub channel_access_token: Option<String>,
    /// User or group that receives scheduled alerts.
    pub alert_recipient: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_fallback_text")]
    pub fallback_text: String,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            api_base: default_line_api_base(),
            channel_access_token: None,
            alert_recipient: None,
            timeout_secs: default_timeout_secs(),
            fallback_text: default_fallback_text(),
        }
    }
}

impl LineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RenderConfig {
    pub icon_up: Option<String>,
    pub icon_down: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct JobsConfig {
    #[serde(default = "default_true")]
    pub alert_enabled: bool,
    #[serde(default = "default_interval_secs")]
    pub alert_interval_secs: u64,
    /// URL pinged periodically to keep a hosted instance awake.
    pub keep_alive_url: Option<String>,
    #[serde(default = "default_interval_secs")]
    pub keep_alive_interval_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            alert_enabled: true,
            alert_interval_secs: default_interval_secs(),
            keep_alive_url: None,
            keep_alive_interval_secs: default_interval_secs(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StorageConfig {
    /// SQLite file holding runtime-editable settings; static defaults when absent.
    pub settings_db: Option<String>,
}

/// Load and validate an `AppConfig` from a TOML file at `path`.
pub fn load(path: &Path) -> Result<AppConfig, Report<ConfigError>> {
    let content = std::fs::read_to_string(path)
        .change_context(ConfigError::ReadFile)
        .attach_with(|| format!("path: {}", path.display()))?;

    let config: AppConfig = toml::from_str(&content).change_context(ConfigError::Parse {
        reason: "invalid TOML syntax or schema mismatch".into(),
    })?;

    validate(&config)?;

    Ok(config)
}

fn invalid(field: String) -> Report<ConfigError> {
    Report::new(ConfigError::Validation { field })
}

fn validate(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    validate_general(config)?;
    validate_signal(config)?;
    validate_market(config)?;
    validate_timings(config)?;
    Ok(())
}

fn validate_general(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    if !matches!(config.general.log_format.as_str(), "text" | "json") {
        return Err(invalid(format!(
            "general.log_format \"{}\" must be \"text\" or \"json\"",
            config.general.log_format
        )));
    }
    if !(-12..=14).contains(&config.general.utc_offset_hours) {
        return Err(invalid(format!(
            "general.utc_offset_hours {} is out of range",
            config.general.utc_offset_hours
        )));
    }
    Ok(())
}

fn validate_signal(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let signal = &config.signal;
    for (name, value) in [("overbought", signal.overbought), ("oversold", signal.oversold)] {
        if !(0.0..=100.0).contains(&value) {
            return Err(invalid(format!(
                "signal.{name} {value} must be within 0..=100"
            )));
        }
    }
    if signal.alert_count == 0 {
        return Err(invalid("signal.alert_count must be at least 1".into()));
    }
    if signal.batch_size().is_none() {
        return Err(invalid("signal.max_items must be at least 1".into()));
    }
    Ok(())
}

fn validate_market(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let market = &config.market;
    if market.pairs.is_empty() {
        return Err(invalid("market.pairs must not be empty".into()));
    }
    if market.timeframes.is_empty() {
        return Err(invalid("market.timeframes must not be empty".into()));
    }
    for (idx, label) in market.timeframes.iter().enumerate() {
        if TimeFrame::from_str(label).is_none() {
            return Err(invalid(format!(
                "market.timeframes: unknown timeframe \"{label}\""
            )));
        }
        if market.timeframes[..idx].contains(label) {
            return Err(invalid(format!(
                "market.timeframes: \"{label}\" listed twice"
            )));
        }
    }
    for pair in &market.pairs {
        let known = |code: Option<&str>| code.is_some_and(|c| market.currencies.contains_key(c));
        if pair.len() != 6 || !known(pair.get(..3)) || !known(pair.get(3..)) {
            return Err(invalid(format!(
                "market.pairs: \"{pair}\" is not a pair of known currency codes"
            )));
        }
    }
    Ok(())
}

fn validate_timings(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    if config.feed.rate().is_none() {
        return Err(invalid("feed.requests_per_minute must be at least 1".into()));
    }
    if config.line.timeout_secs == 0 {
        return Err(invalid("line.timeout_secs must be at least 1".into()));
    }
    if config.jobs.alert_interval_secs == 0 || config.jobs.keep_alive_interval_secs == 0 {
        return Err(invalid("jobs intervals must be at least 1 second".into()));
    }
    Ok(())
}
