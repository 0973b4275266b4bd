//! Webhook endpoints for the chat channel.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use error_stack::{Report, ResultExt};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::delivery::DeliveryContext;
use crate::error::ServerError;
use crate::service::SignalService;

const GREETING: &str = "Hello! I'm OverTrade, your forex technical signal assistant. \
    Send me any message and I'll reply with the currency pairs whose RSI is \
    overbought or oversold right now.";

/// Upper bound on waiting for acknowledged events at shutdown.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SignalService>,
    /// Event cycles still running after their webhook was acknowledged.
    pub tracker: TaskTracker,
}

impl AppState {
    pub fn new(service: Arc<SignalService>) -> Self {
        Self {
            service,
            tracker: TaskTracker::new(),
        }
    }
}

/// Webhook request body: `{ "destination": ..., "events": [...] }`.
#[derive(Debug, Deserialize)]
pub struct WebhookBody {
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub reply_token: Option<String>,
    pub source: Option<EventSource>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSource {
    pub user_id: Option<String>,
    pub group_id: Option<String>,
    pub room_id: Option<String>,
}

impl WebhookEvent {
    /// Push target for this event: the group or room it came from, else the
    /// sending user.
    pub fn recipient(&self) -> Option<String> {
        let source = self.source.as_ref()?;
        source
            .group_id
            .clone()
            .or_else(|| source.room_id.clone())
            .or_else(|| source.user_id.clone())
    }

    /// Only message events start a signal cycle; their text is not inspected.
    pub fn delivery_context(&self) -> Option<DeliveryContext> {
        (self.kind == "message")
            .then(|| DeliveryContext::interactive(self.reply_token.clone(), self.recipient()))
    }
}

async fn home() -> Json<Value> {
    Json(json!({ "message": GREETING }))
}

async fn callback(
    State(state): State<AppState>,
    Json(body): Json<WebhookBody>,
) -> StatusCode {
    debug!(events = body.events.len(), "webhook received");

    for event in &body.events {
        let Some(context) = event.delivery_context() else {
            debug!(kind = %event.kind, "ignoring non-message event");
            continue;
        };
        let service = Arc::clone(&state.service);
        state.tracker.spawn(async move {
            match service.handle_event(context).await {
                Ok(report) => info!(sent = report.attempted, "chat event answered"),
                Err(e) => warn!(error = ?e, "chat event cycle failed"),
            }
        });
    }

    StatusCode::OK
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/", get(home))
        .route("/api/callback", post(callback))
        .with_state(state)
}

/// Serve the webhook on `bind` until `cancel` fires.
pub async fn serve(
    bind: &str,
    state: AppState,
    cancel: CancellationToken,
) -> Result<(), Report<ServerError>> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .change_context_lazy(|| ServerError::Bind { addr: bind.into() })?;

    info!(bind, "webhook server listening");
    serve_on(listener, state, cancel, DRAIN_TIMEOUT).await
}

/// Serve on an already bound listener. After `cancel` fires and open
/// connections close, waits up to `drain` for event cycles still in flight.
pub async fn serve_on(
    listener: tokio::net::TcpListener,
    state: AppState,
    cancel: CancellationToken,
    drain: Duration,
) -> Result<(), Report<ServerError>> {
    let tracker = state.tracker.clone();

    let served = axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .change_context(ServerError::Serve);

    tracker.close();
    if !tracker.is_empty() {
        info!(pending = tracker.len(), "waiting for in-flight chat events");
    }
    if tokio::time::timeout(drain, tracker.wait()).await.is_err() {
        warn!(pending = tracker.len(), "in-flight chat events abandoned at shutdown");
    }

    served
}
