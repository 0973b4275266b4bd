use std::num::NonZeroU32;
use std::sync::Arc;

use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use tracing::info;

use crate::error::FeedError;
use crate::feed::{FeedClient, FeedRequest};
use crate::model::FeedResponse;

pub const SCANNER_URL: &str = "https://scanner.tradingview.com/forex/scan";

/// TradingView scanner client.
///
/// Both the webhook and the alert job share one instance, so the rate
/// limiter covers every caller.
pub struct TradingViewFeed {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

impl TradingViewFeed {
    pub fn new(url: impl Into<String>, token: Option<String>, per_minute: NonZeroU32) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            token,
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_minute(per_minute))),
        }
    }

    fn context() -> FeedError {
        FeedError::Request {
            provider: "tradingview".into(),
        }
    }
}

impl FeedClient for TradingViewFeed {
    fn fetch<'a>(
        &'a self,
        request: &'a FeedRequest,
    ) -> BoxFuture<'a, Result<FeedResponse, Report<FeedError>>> {
        Box::pin(async move {
            self.rate_limiter.until_ready().await;

            let mut builder = self.client.post(&self.url).json(request);
            if let Some(token) = &self.token {
                builder = builder.header(reqwest::header::AUTHORIZATION, format!("Basic {token}"));
            }

            let response = builder
                .send()
                .await
                .change_context_lazy(Self::context)
                .attach_with(|| format!("url: {}", self.url))?;

            if !response.status().is_success() {
                return Err(Report::new(Self::context())
                    .attach(format!("HTTP status: {}", response.status())));
            }

            let feed: FeedResponse =
                response
                    .json()
                    .await
                    .change_context(FeedError::ResponseParse {
                        provider: "tradingview".into(),
                    })?;

            info!(
                tickers = request.tickers().len(),
                entries = feed.entries().len(),
                "tradingview scan complete"
            );
            Ok(feed)
        })
    }
}
