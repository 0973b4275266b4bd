pub mod tradingview;

use error_stack::Report;
use futures::future::BoxFuture;
use serde::Serialize;

use crate::error::FeedError;
use crate::indicator::IndicatorLayout;
use crate::model::FeedResponse;

/// Scanner request body: which tickers, and which columns in which order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedRequest {
    symbols: FeedSymbols,
    columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct FeedSymbols {
    tickers: Vec<String>,
    query: FeedQuery,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct FeedQuery {
    types: Vec<String>,
}

impl FeedRequest {
    /// Columns come from `layout`, so the response offsets always line up.
    pub fn new(prefix: &str, pairs: &[String], layout: &IndicatorLayout) -> Self {
        Self {
            symbols: FeedSymbols {
                tickers: pairs.iter().map(|p| format!("{prefix}{p}")).collect(),
                query: FeedQuery {
                    types: vec!["forex".into()],
                },
            },
            columns: layout.columns(),
        }
    }

    pub fn tickers(&self) -> &[String] {
        &self.symbols.tickers
    }
}

/// Source of the precomputed indicator feed.
pub trait FeedClient: Send + Sync {
    fn fetch<'a>(
        &'a self,
        request: &'a FeedRequest,
    ) -> BoxFuture<'a, Result<FeedResponse, Report<FeedError>>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_matches_scanner_shape() {
        let pairs = vec!["EURUSD".to_owned(), "USDJPY".to_owned()];
        let request = FeedRequest::new("FX_IDC:", &pairs, &IndicatorLayout::standard());
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(
            value["symbols"]["tickers"],
            serde_json::json!(["FX_IDC:EURUSD", "FX_IDC:USDJPY"])
        );
        assert_eq!(value["symbols"]["query"]["types"], serde_json::json!(["forex"]));
        assert_eq!(value["columns"].as_array().unwrap().len(), 64);
        assert_eq!(value["columns"][0], "RSI|1");
    }
}
