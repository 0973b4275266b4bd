use std::time::Duration;

use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DeliveryError;
use crate::notifier::{Message, Notifier};

pub const LINE_API_BASE: &str = "https://api.line.me";
const REPLY_PATH: &str = "/v2/bot/message/reply";
const PUSH_PATH: &str = "/v2/bot/message/push";

/// LINE Messaging API client.
pub struct LineNotifier {
    client: reqwest::Client,
    api_base: String,
    access_token: String,
    reply_timeout: Duration,
}

impl LineNotifier {
    pub fn new(
        api_base: impl Into<String>,
        access_token: impl Into<String>,
        reply_timeout: Duration,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_owned(),
            access_token: access_token.into(),
            reply_timeout,
        }
    }

    async fn post<B: Serialize>(
        &self,
        action: &str,
        path: &str,
        body: &B,
        timeout: Duration,
        retry_key: Option<Uuid>,
    ) -> Result<(), Report<DeliveryError>> {
        let context = || DeliveryError::Transport {
            action: action.into(),
        };

        let url = format!("{}{}", self.api_base, path);
        let mut request = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .timeout(timeout)
            .json(body);
        if let Some(key) = retry_key {
            request = request.header("X-Line-Retry-Key", key.to_string());
        }

        let response = request.send().await.change_context_lazy(context)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Report::new(context())
                .attach(format!("HTTP status: {status}"))
                .attach(format!("response body: {detail}")));
        }

        debug!(action, %url, "line request accepted");
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyBody<'a> {
    reply_token: &'a str,
    messages: &'a [Message],
}

#[derive(Serialize)]
struct PushBody<'a> {
    to: &'a str,
    messages: &'a [Message],
}

impl Notifier for LineNotifier {
    fn reply<'a>(
        &'a self,
        reply_token: &'a str,
        messages: &'a [Message],
    ) -> BoxFuture<'a, Result<(), Report<DeliveryError>>> {
        Box::pin(async move {
            let body = ReplyBody {
                reply_token,
                messages,
            };
            self.post("reply", REPLY_PATH, &body, self.reply_timeout, None)
                .await?;
            info!(messages = messages.len(), "reply sent");
            Ok(())
        })
    }

    fn push<'a>(
        &'a self,
        to: &'a str,
        messages: &'a [Message],
        timeout: Duration,
    ) -> BoxFuture<'a, Result<(), Report<DeliveryError>>> {
        Box::pin(async move {
            let body = PushBody { to, messages };
            let retry_key = Uuid::new_v4();
            self.post("push", PUSH_PATH, &body, timeout, Some(retry_key))
                .await
                .attach_with(|| format!("recipient: {to}"))?;
            info!(to, messages = messages.len(), "push sent");
            Ok(())
        })
    }
}
