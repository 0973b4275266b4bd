use std::num::NonZeroUsize;
use std::sync::Arc;

use chrono::{FixedOffset, Utc};
use error_stack::{Report, ResultExt};
use tracing::info;

use crate::batch::chunk;
use crate::delivery::{self, DeliveryContext, DeliveryPolicy, DeliveryReport};
use crate::error::{ExtractError, ServiceError};
use crate::feed::{FeedClient, FeedRequest};
use crate::model::{FeedResponse, SignalRecord};
use crate::notifier::Notifier;
use crate::pipeline::{Pipeline, RecordSet};
use crate::render::CardRenderer;
use crate::storage::{SettingsProvider, resolve_alert_count};

/// How records are presented and where scheduled alerts go.
#[derive(Debug, Clone)]
pub struct Presentation {
    pub renderer: CardRenderer,
    pub policy: DeliveryPolicy,
    pub batch_size: NonZeroUsize,
    pub utc_offset: FixedOffset,
    pub alert_recipient: Option<String>,
}

/// Runs one full cycle (fetch, extract, chunk, render, route, dispatch) per
/// incoming event or alert tick. Holds no state between cycles.
pub struct SignalService {
    feed: Arc<dyn FeedClient>,
    notifier: Arc<dyn Notifier>,
    settings: Arc<dyn SettingsProvider>,
    pipeline: Pipeline,
    request: FeedRequest,
    presentation: Presentation,
}

impl SignalService {
    pub fn new(
        feed: Arc<dyn FeedClient>,
        notifier: Arc<dyn Notifier>,
        settings: Arc<dyn SettingsProvider>,
        pipeline: Pipeline,
        request: FeedRequest,
        presentation: Presentation,
    ) -> Self {
        Self {
            feed,
            notifier,
            settings,
            pipeline,
            request,
            presentation,
        }
    }

    async fn fetch(&self) -> Result<FeedResponse, Report<ServiceError>> {
        self.feed
            .fetch(&self.request)
            .await
            .change_context(ServiceError::Feed)
    }

    /// Fetch and extract without sending anything.
    pub async fn scan(&self) -> Result<RecordSet<SignalRecord>, Report<ServiceError>> {
        let response = self.fetch().await?;
        self.pipeline
            .extract(&response)
            .change_context(ServiceError::Extract)
    }

    /// Interactive path: answer one chat event with signal cards, or the
    /// fallback text when nothing qualifies.
    pub async fn handle_event(
        &self,
        context: DeliveryContext,
    ) -> Result<DeliveryReport, Report<ServiceError>> {
        let response = self.fetch().await?;
        let records = match self.pipeline.extract(&response) {
            Ok(records) => records,
            Err(report) if matches!(report.current_context(), ExtractError::NoData) => {
                info!("feed returned no data");
                RecordSet::new()
            }
            Err(report) => return Err(report.change_context(ServiceError::Extract)),
        };

        let chunks = chunk(&records, self.presentation.batch_size);
        let now = Utc::now().with_timezone(&self.presentation.utc_offset);
        let messages = self.presentation.renderer.signal_messages(&chunks, now);

        info!(
            records = records.len(),
            chunks = chunks.len(),
            "signal cycle extracted"
        );
        self.deliver(messages, &context).await
    }

    /// Scheduled path: push pair-level alerts to the configured recipient.
    /// An empty feed or a quiet market sends nothing.
    pub async fn run_alert_cycle(&self) -> Result<DeliveryReport, Report<ServiceError>> {
        let alert_count = resolve_alert_count(
            self.settings.as_ref(),
            self.pipeline.thresholds().alert_count,
        )
        .await;

        let response = self.fetch().await?;
        let alerts = match self.pipeline.extract_alerts(&response, alert_count) {
            Ok(alerts) => alerts,
            Err(report) if matches!(report.current_context(), ExtractError::NoData) => {
                info!("feed returned no data, no alerts sent");
                return Ok(DeliveryReport::default());
            }
            Err(report) => return Err(report.change_context(ServiceError::Extract)),
        };

        let chunks = chunk(&alerts, self.presentation.batch_size);
        let messages = self.presentation.renderer.alert_messages(&chunks);
        info!(alerts = alerts.len(), alert_count, "alert cycle extracted");

        let context = DeliveryContext::scheduled(self.presentation.alert_recipient.clone());
        self.deliver(messages, &context).await
    }

    async fn deliver(
        &self,
        messages: Vec<crate::notifier::Message>,
        context: &DeliveryContext,
    ) -> Result<DeliveryReport, Report<ServiceError>> {
        let actions = delivery::route(messages, context, &self.presentation.policy)
            .change_context(ServiceError::Delivery)?;
        delivery::dispatch(self.notifier.as_ref(), &actions)
            .await
            .change_context(ServiceError::Delivery)
    }
}
