use error_stack::{Report, bail};

use crate::error::ExtractError;
use crate::model::{PivotLevels, TimeFrame};

/// Fibonacci pivot levels in the order they appear inside each 6-wide block.
pub const PIVOT_LEVELS: [&str; 6] = ["R3", "R2", "R1", "S1", "S2", "S3"];

const PIVOT_WIDTH: usize = PIVOT_LEVELS.len();

/// Offset table mapping the provider's flat indicator array to named fields.
///
/// The request columns are generated from this same table (see [`columns`]),
/// so the column order sent upstream always matches the offsets read back:
///
/// ```text
/// [0, n)          RSI, one per timeframe
/// [n, 2n)         MACD, one per timeframe
/// [2n, 2n + 6n)   R3 R2 R1 S1 S2 S3, one block per timeframe
/// ```
///
/// [`columns`]: IndicatorLayout::columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorLayout {
    timeframes: Vec<TimeFrame>,
    rsi_offset: usize,
    macd_offset: usize,
    pivot_offset: usize,
}

impl IndicatorLayout {
    pub fn new(timeframes: Vec<TimeFrame>) -> Self {
        let n = timeframes.len();
        Self {
            timeframes,
            rsi_offset: 0,
            macd_offset: n,
            pivot_offset: 2 * n,
        }
    }

    /// The 64-column layout over all eight timeframes.
    pub fn standard() -> Self {
        Self::new(TimeFrame::ALL.to_vec())
    }

    /// Minimum array length every feed entry must carry.
    pub fn required_len(&self) -> usize {
        self.pivot_offset + self.timeframes.len() * PIVOT_WIDTH
    }

    /// Request column names, in offset order.
    pub fn columns(&self) -> Vec<String> {
        let with_suffix = |name: &str, tf: TimeFrame| match tf.column_suffix() {
            Some(suffix) => format!("{name}|{suffix}"),
            None => name.to_owned(),
        };

        let mut columns = Vec::with_capacity(self.required_len());
        columns.extend(self.timeframes.iter().map(|&tf| with_suffix("RSI", tf)));
        columns.extend(
            self.timeframes
                .iter()
                .map(|&tf| with_suffix("MACD.macd", tf)),
        );
        for &tf in &self.timeframes {
            columns.extend(
                PIVOT_LEVELS
                    .iter()
                    .map(|level| with_suffix(&format!("Pivot.M.Fibonacci.{level}"), tf)),
            );
        }
        columns
    }

    /// Validate `indicators` against the table and return a view over it.
    pub fn window<'a>(
        &'a self,
        symbol: &str,
        indicators: &'a [f64],
    ) -> Result<IndicatorWindow<'a>, Report<ExtractError>> {
        let required = self.required_len();
        if indicators.len() < required {
            bail!(ExtractError::DataContract {
                symbol: symbol.to_owned(),
                required,
                available: indicators.len(),
            });
        }
        Ok(IndicatorWindow {
            layout: self,
            indicators,
        })
    }

    /// Pivot levels of `timeframe`, or `None` when the layout has no block for it.
    pub fn locate(
        &self,
        indicators: &[f64],
        timeframe: TimeFrame,
    ) -> Result<Option<PivotLevels>, Report<ExtractError>> {
        Ok(self.window("", indicators)?.pivots(timeframe))
    }
}

impl Default for IndicatorLayout {
    fn default() -> Self {
        Self::standard()
    }
}

/// Length-checked view into one entry's indicator array.
#[derive(Debug, Clone, Copy)]
pub struct IndicatorWindow<'a> {
    layout: &'a IndicatorLayout,
    indicators: &'a [f64],
}

impl<'a> IndicatorWindow<'a> {
    pub fn rsi(self) -> &'a [f64] {
        let start = self.layout.rsi_offset;
        &self.indicators[start..start + self.layout.timeframes.len()]
    }

    pub fn macd(self) -> &'a [f64] {
        let start = self.layout.macd_offset;
        &self.indicators[start..start + self.layout.timeframes.len()]
    }

    /// RSI values zipped with their timeframe.
    pub fn rsi_by_timeframe(self) -> impl Iterator<Item = (TimeFrame, f64)> + 'a {
        self.layout
            .timeframes
            .iter()
            .copied()
            .zip(self.rsi().iter().copied())
    }

    pub fn pivots(self, timeframe: TimeFrame) -> Option<PivotLevels> {
        let idx = self.layout.timeframes.iter().position(|&tf| tf == timeframe)?;
        let start = self.layout.pivot_offset + idx * PIVOT_WIDTH;
        let block: &[f64; PIVOT_WIDTH] = self.indicators[start..start + PIVOT_WIDTH]
            .try_into()
            .ok()?;
        Some(PivotLevels::from_block(block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequential(len: usize) -> Vec<f64> {
        (0..len).map(|i| i as f64).collect()
    }

    #[test]
    fn standard_layout_needs_64_values() {
        let layout = IndicatorLayout::standard();
        assert_eq!(layout.required_len(), 64);
        assert_eq!(layout.columns().len(), 64);
    }

    #[test]
    fn columns_follow_offset_order() {
        let columns = IndicatorLayout::standard().columns();
        assert_eq!(columns[0], "RSI|1");
        assert_eq!(columns[7], "RSI");
        assert_eq!(columns[8], "MACD.macd|1");
        assert_eq!(columns[15], "MACD.macd");
        assert_eq!(columns[16], "Pivot.M.Fibonacci.R3|1");
        assert_eq!(columns[21], "Pivot.M.Fibonacci.S3|1");
        assert_eq!(columns[22], "Pivot.M.Fibonacci.R3|5");
        assert_eq!(columns[52], "Pivot.M.Fibonacci.R3|240");
        assert_eq!(columns[58], "Pivot.M.Fibonacci.R3");
        assert_eq!(columns[63], "Pivot.M.Fibonacci.S3");
    }

    #[test]
    fn locate_returns_contiguous_block_for_every_timeframe() {
        let layout = IndicatorLayout::standard();
        let data = sequential(64);
        for (i, tf) in TimeFrame::ALL.into_iter().enumerate() {
            let start = 16 + i * 6;
            let levels = layout.locate(&data, tf).unwrap().unwrap();
            assert_eq!(levels.r3, format!("{:.5}", start as f64));
            assert_eq!(levels.r2, format!("{:.5}", (start + 1) as f64));
            assert_eq!(levels.r1, format!("{:.5}", (start + 2) as f64));
            assert_eq!(levels.s1, format!("{:.5}", (start + 3) as f64));
            assert_eq!(levels.s2, format!("{:.5}", (start + 4) as f64));
            assert_eq!(levels.s3, format!("{:.5}", (start + 5) as f64));
        }
    }

    #[test]
    fn locate_skips_timeframe_missing_from_layout() {
        let layout = IndicatorLayout::new(vec![TimeFrame::M1, TimeFrame::H1]);
        assert_eq!(layout.required_len(), 16);
        let data = sequential(16);
        assert!(layout.locate(&data, TimeFrame::D1).unwrap().is_none());
        let h1 = layout.locate(&data, TimeFrame::H1).unwrap().unwrap();
        assert_eq!(h1.r3, "10.00000");
    }

    #[test]
    fn short_array_is_a_data_contract_error() {
        let layout = IndicatorLayout::standard();
        let err = layout.window("EURUSD", &sequential(63)).unwrap_err();
        assert!(matches!(
            err.current_context(),
            ExtractError::DataContract {
                required: 64,
                available: 63,
                ..
            }
        ));
        assert!(layout.locate(&[], TimeFrame::M1).is_err());
    }

    #[test]
    fn longer_arrays_are_accepted() {
        let layout = IndicatorLayout::standard();
        let data = sequential(70);
        let window = layout.window("EURUSD", &data).unwrap();
        assert_eq!(window.rsi(), &data[0..8]);
        assert_eq!(window.macd(), &data[8..16]);
    }

    #[test]
    fn rsi_is_zipped_with_timeframes() {
        let layout = IndicatorLayout::standard();
        let data = sequential(64);
        let pairs: Vec<_> = layout
            .window("EURUSD", &data)
            .unwrap()
            .rsi_by_timeframe()
            .collect();
        assert_eq!(pairs.len(), 8);
        assert_eq!(pairs[0], (TimeFrame::M1, 0.0));
        assert_eq!(pairs[7], (TimeFrame::D1, 7.0));
    }
}
