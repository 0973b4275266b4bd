use std::collections::HashMap;

use error_stack::{Report, bail};
use tracing::{debug, warn};

use crate::error::ExtractError;
use crate::indicator::IndicatorLayout;
use crate::model::{AlertRecord, CurrencyPair, FeedResponse, RawFeedEntry, SignalRecord};
use crate::strategy::SignalThresholds;
use crate::strategy::condition::{classify_alert, classify_threshold, classify_trend};

/// Insertion-ordered keyed records.
///
/// Re-inserting a key replaces the value but keeps its original position.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSet<T> {
    entries: Vec<(String, T)>,
    index: HashMap<String, usize>,
}

impl<T> RecordSet<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn insert(&mut self, key: String, value: T) {
        match self.index.get(&key) {
            Some(&pos) => self.entries[pos].1 = value,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
            }
        }
    }

    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&T> {
        self.index.get(key).map(|&pos| &self.entries[pos].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<T> Default for RecordSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<(String, T)> for RecordSet<T> {
    fn from_iter<I: IntoIterator<Item = (String, T)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (key, value) in iter {
            set.insert(key, value);
        }
        set
    }
}

/// Ticker prefix and currency display names.
#[derive(Debug, Clone)]
pub struct CurrencyTable {
    prefix: String,
    names: HashMap<String, String>,
}

impl CurrencyTable {
    pub fn new(prefix: impl Into<String>, names: HashMap<String, String>) -> Self {
        Self {
            prefix: prefix.into(),
            names,
        }
    }

    /// Split a feed symbol like `FX_IDC:EURUSD` into its currencies.
    ///
    /// Unknown currency codes are described by the code itself.
    pub fn describe(&self, raw_symbol: &str) -> Option<CurrencyPair> {
        let symbol = raw_symbol.strip_prefix(&self.prefix).unwrap_or(raw_symbol);
        if symbol.len() < 6 {
            return None;
        }
        let base = symbol.get(..3)?;
        let quote = symbol.get(3..)?;

        Some(CurrencyPair {
            symbol: symbol.to_owned(),
            base: base.to_owned(),
            quote: quote.to_owned(),
            description: format!("{} vs {}", self.name_of(base), self.name_of(quote)),
        })
    }

    fn name_of<'a>(&'a self, code: &'a str) -> &'a str {
        self.names.get(code).map(String::as_str).unwrap_or(code)
    }
}

/// Turns raw feed entries into per-pair, per-timeframe signal records.
#[derive(Debug, Clone)]
pub struct Pipeline {
    layout: IndicatorLayout,
    thresholds: SignalThresholds,
    currencies: CurrencyTable,
}

impl Pipeline {
    pub fn new(
        layout: IndicatorLayout,
        thresholds: SignalThresholds,
        currencies: CurrencyTable,
    ) -> Self {
        Self {
            layout,
            thresholds,
            currencies,
        }
    }

    pub fn thresholds(&self) -> &SignalThresholds {
        &self.thresholds
    }

    /// One record per (pair, timeframe) whose RSI crossed a threshold,
    /// keyed `<PAIR>_<TIMEFRAME>`.
    pub fn extract(
        &self,
        response: &FeedResponse,
    ) -> Result<RecordSet<SignalRecord>, Report<ExtractError>> {
        if response.is_empty() {
            bail!(ExtractError::NoData);
        }

        let mut records = RecordSet::new();
        for entry in response.entries() {
            let Some((pair, raw_symbol)) = self.pair_of(entry) else {
                continue;
            };
            let window = match self.layout.window(raw_symbol, &entry.indicators) {
                Ok(window) => window,
                Err(report) => {
                    warn!(error = ?report, "skipping feed entry");
                    continue;
                }
            };

            let states = classify_threshold(window.rsi_by_timeframe(), &self.thresholds);
            if states.is_empty() {
                continue;
            }
            let trend = classify_trend(window.macd());

            for state in states {
                let pivot = match self.layout.locate(&entry.indicators, state.timeframe) {
                    Ok(Some(pivot)) => pivot,
                    Ok(None) => {
                        debug!(symbol = %pair.symbol, timeframe = %state.timeframe, "no pivot block");
                        continue;
                    }
                    Err(report) => {
                        warn!(error = ?report, "skipping timeframe");
                        continue;
                    }
                };
                let record = SignalRecord {
                    pair: pair.symbol.clone(),
                    base_currency: pair.base.clone(),
                    quote_currency: pair.quote.clone(),
                    description: pair.description.clone(),
                    timeframe: state.timeframe,
                    rsi_value: state.formatted_value(),
                    zone: state.zone,
                    trend,
                    pivot,
                };
                records.insert(record.key(), record);
            }
        }

        debug!(
            entries = response.entries().len(),
            records = records.len(),
            "signal extraction complete"
        );
        Ok(records)
    }

    /// Pair-level alerts for pairs with at least `alert_count` extreme
    /// timeframes, keyed by pair symbol.
    pub fn extract_alerts(
        &self,
        response: &FeedResponse,
        alert_count: usize,
    ) -> Result<RecordSet<AlertRecord>, Report<ExtractError>> {
        if response.is_empty() {
            bail!(ExtractError::NoData);
        }

        let thresholds = self.thresholds.with_alert_count(alert_count);
        let mut alerts = RecordSet::new();
        for entry in response.entries() {
            let Some((pair, raw_symbol)) = self.pair_of(entry) else {
                continue;
            };
            let window = match self.layout.window(raw_symbol, &entry.indicators) {
                Ok(window) => window,
                Err(report) => {
                    warn!(error = ?report, "skipping feed entry");
                    continue;
                }
            };

            if let Some(signal) = classify_alert(window.rsi(), &thresholds) {
                alerts.insert(
                    pair.symbol.clone(),
                    AlertRecord {
                        pair: pair.symbol,
                        description: pair.description,
                        signal,
                    },
                );
            }
        }

        debug!(
            entries = response.entries().len(),
            alerts = alerts.len(),
            alert_count,
            "alert extraction complete"
        );
        Ok(alerts)
    }

    fn pair_of<'a>(&self, entry: &'a RawFeedEntry) -> Option<(CurrencyPair, &'a str)> {
        let raw_symbol = entry.symbol.as_deref()?;
        match self.currencies.describe(raw_symbol) {
            Some(pair) => Some((pair, raw_symbol)),
            None => {
                warn!(symbol = raw_symbol, "skipping feed entry with unrecognised symbol");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AlertSignal, RsiZone, TimeFrame, Trend};

    fn currencies() -> CurrencyTable {
        let names = [("EUR", "Euro"), ("USD", "US Dollar"), ("JPY", "Japanese Yen")]
            .into_iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        CurrencyTable::new("FX_IDC:", names)
    }

    fn pipeline() -> Pipeline {
        Pipeline::new(
            IndicatorLayout::standard(),
            SignalThresholds::default(),
            currencies(),
        )
    }

    fn entry(symbol: &str, rsi: [f64; 8], macd: [f64; 8]) -> RawFeedEntry {
        let mut indicators = Vec::with_capacity(64);
        indicators.extend(rsi);
        indicators.extend(macd);
        indicators.extend((0..48).map(|i| 1.0 + i as f64 / 1000.0));
        RawFeedEntry {
            symbol: Some(symbol.to_owned()),
            indicators,
        }
    }

    const CALM: [f64; 8] = [50.0; 8];
    const RISING: [f64; 8] = [0.1, 0.2, 0.3, 0.1, -0.1, 0.2, 0.1, 0.0];

    #[test]
    fn record_set_keeps_first_position_on_overwrite() {
        let mut set = RecordSet::new();
        set.insert("a".to_owned(), 1);
        set.insert("b".to_owned(), 2);
        set.insert("a".to_owned(), 3);
        assert_eq!(set.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(set.get("a"), Some(&3));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn describe_strips_prefix_and_names_currencies() {
        let pair = currencies().describe("FX_IDC:EURUSD").unwrap();
        assert_eq!(pair.symbol, "EURUSD");
        assert_eq!(pair.base, "EUR");
        assert_eq!(pair.quote, "USD");
        assert_eq!(pair.description, "Euro vs US Dollar");
    }

    #[test]
    fn describe_falls_back_to_code_and_rejects_short_symbols() {
        let table = currencies();
        assert_eq!(table.describe("EURXAU").unwrap().description, "Euro vs XAU");
        assert!(table.describe("FX_IDC:EUR").is_none());
    }

    #[test]
    fn extract_emits_one_record_per_extreme_timeframe() {
        let response = FeedResponse::new(vec![entry(
            "FX_IDC:EURUSD",
            [75.0, 20.0, 50.0, 50.0, 50.0, 50.0, 50.0, 50.0],
            RISING,
        )]);

        let records = pipeline().extract(&response).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(
            records.keys().collect::<Vec<_>>(),
            vec!["EURUSD_M1", "EURUSD_M5"]
        );

        let m1 = records.get("EURUSD_M1").unwrap();
        assert_eq!(m1.description, "Euro vs US Dollar");
        assert_eq!(m1.rsi_value, "75.00");
        assert_eq!(m1.zone, RsiZone::Overbought);
        assert_eq!(m1.trend, Trend::Up);
        assert_eq!(m1.pivot.r3, "1.00000");
        assert_eq!(m1.pivot.s3, "1.00500");

        let m5 = records.get("EURUSD_M5").unwrap();
        assert_eq!(m5.timeframe, TimeFrame::M5);
        assert_eq!(m5.zone, RsiZone::Oversold);
        assert_eq!(m5.trend, Trend::Up);
        assert_eq!(m5.pivot.r3, "1.00600");
    }

    #[test]
    fn calm_pairs_contribute_nothing() {
        let response = FeedResponse::new(vec![
            entry("FX_IDC:EURUSD", CALM, RISING),
            entry(
                "FX_IDC:USDJPY",
                [50.0, 50.0, 50.0, 50.0, 50.0, 50.0, 50.0, 15.0],
                RISING,
            ),
        ]);
        let records = pipeline().extract(&response).unwrap();
        assert_eq!(records.keys().collect::<Vec<_>>(), vec!["USDJPY_D1"]);
    }

    #[test]
    fn entries_without_symbol_or_short_arrays_are_skipped() {
        let mut nameless = entry("FX_IDC:EURUSD", [80.0; 8], RISING);
        nameless.symbol = None;
        let short = RawFeedEntry {
            symbol: Some("FX_IDC:EURJPY".to_owned()),
            indicators: vec![80.0; 20],
        };
        let good = entry("FX_IDC:USDJPY", [80.0; 8], RISING);

        let records = pipeline()
            .extract(&FeedResponse::new(vec![nameless, short, good]))
            .unwrap();
        assert_eq!(records.len(), 8);
        assert!(records.values().all(|r| r.pair == "USDJPY"));
    }

    #[test]
    fn empty_feed_is_no_data() {
        let err = pipeline().extract(&FeedResponse::default()).unwrap_err();
        assert!(matches!(err.current_context(), ExtractError::NoData));
        let err = pipeline()
            .extract_alerts(&FeedResponse::new(Vec::new()), 4)
            .unwrap_err();
        assert!(matches!(err.current_context(), ExtractError::NoData));
    }

    #[test]
    fn extraction_is_deterministic() {
        let response = FeedResponse::new(vec![
            entry("FX_IDC:EURUSD", [75.0, 20.0, 50.0, 50.0, 50.0, 50.0, 50.0, 90.0], RISING),
            entry("FX_IDC:USDJPY", [10.0; 8], [-1.0; 8]),
        ]);
        let pipeline = pipeline();
        let first = pipeline.extract(&response).unwrap();
        let second = pipeline.extract(&response).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 11);
    }

    #[test]
    fn alerts_are_pair_level() {
        let response = FeedResponse::new(vec![
            entry(
                "FX_IDC:EURUSD",
                [71.0, 72.0, 75.0, 80.0, 70.0, 50.0, 50.0, 50.0],
                RISING,
            ),
            entry(
                "FX_IDC:USDJPY",
                [71.0, 72.0, 75.0, 50.0, 50.0, 50.0, 50.0, 50.0],
                RISING,
            ),
            entry("FX_IDC:EURJPY", [25.0; 8], RISING),
        ]);

        let alerts = pipeline().extract_alerts(&response, 4).unwrap();
        assert_eq!(alerts.keys().collect::<Vec<_>>(), vec!["EURUSD", "EURJPY"]);
        assert_eq!(alerts.get("EURUSD").unwrap().signal, AlertSignal::DownArrow);
        assert_eq!(alerts.get("EURJPY").unwrap().signal, AlertSignal::UpArrow);
        assert_eq!(
            alerts.get("EURJPY").unwrap().description,
            "Euro vs Japanese Yen"
        );

        let lenient = pipeline().extract_alerts(&response, 3).unwrap();
        assert_eq!(lenient.len(), 3);
    }
}
