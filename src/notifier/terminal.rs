use std::time::Duration;

use error_stack::Report;
use futures::future::BoxFuture;

use crate::error::DeliveryError;
use crate::notifier::{Message, Notifier};

/// Logs outbound messages instead of sending them.
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn reply<'a>(
        &'a self,
        reply_token: &'a str,
        messages: &'a [Message],
    ) -> BoxFuture<'a, Result<(), Report<DeliveryError>>> {
        Box::pin(async move {
            for message in messages {
                tracing::info!(reply_token, message = %summary(message), "REPLY");
            }
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
            for message in messages {
                tracing::info!(
                    to,
                    timeout_secs = timeout.as_secs(),
                    message = %summary(message),
                    "PUSH"
                );
            }
            Ok(())
        })
    }
}

fn summary(message: &Message) -> String {
    match message {
        Message::Text { text } => text.clone(),
        Message::Flex { alt_text, contents } => {
            let cards = contents["contents"].as_array().map_or(1, Vec::len);
            format!("{alt_text} ({cards} cards)")
        }
    }
}
