pub mod line;
pub mod terminal;

use std::time::Duration;

use error_stack::Report;
use futures::future::BoxFuture;
use serde::Serialize;

use crate::error::DeliveryError;

/// One outbound chat message, serialized in the LINE Messaging API shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    Text {
        text: String,
    },
    Flex {
        #[serde(rename = "altText")]
        alt_text: String,
        contents: serde_json::Value,
    },
}

impl Message {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// Messaging transport the delivery router sends through.
pub trait Notifier: Send + Sync {
    /// Answer an incoming event using its single-use reply token.
    fn reply<'a>(
        &'a self,
        reply_token: &'a str,
        messages: &'a [Message],
    ) -> BoxFuture<'a, Result<(), Report<DeliveryError>>>;

    /// Send unprompted to a user or group id.
    fn push<'a>(
        &'a self,
        to: &'a str,
        messages: &'a [Message],
        timeout: Duration,
    ) -> BoxFuture<'a, Result<(), Report<DeliveryError>>>;
}

#[cfg(test)]
pub(crate) mod recording {
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub enum Sent {
        Reply { token: String, messages: Vec<Message> },
        Push { to: String, messages: Vec<Message> },
    }

    /// Records every call; fails the calls whose 0-based index is listed.
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub sent: Mutex<Vec<Sent>>,
        pub fail_on: Vec<usize>,
        calls: Mutex<usize>,
    }

    impl RecordingNotifier {
        pub fn failing_on(fail_on: Vec<usize>) -> Self {
            Self {
                fail_on,
                ..Self::default()
            }
        }

        pub fn sent(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }

        fn record(&self, sent: Sent, action: &str) -> Result<(), Report<DeliveryError>> {
            let mut calls = self.calls.lock().unwrap();
            let idx = *calls;
            *calls += 1;
            if self.fail_on.contains(&idx) {
                return Err(Report::new(DeliveryError::Transport {
                    action: action.into(),
                }));
            }
            self.sent.lock().unwrap().push(sent);
            Ok(())
        }
    }

    impl Notifier for RecordingNotifier {
        fn reply<'a>(
            &'a self,
            reply_token: &'a str,
            messages: &'a [Message],
        ) -> BoxFuture<'a, Result<(), Report<DeliveryError>>> {
            let sent = Sent::Reply {
                token: reply_token.to_owned(),
                messages: messages.to_vec(),
            };
            Box::pin(async move { self.record(sent, "reply") })
        }

        fn push<'a>(
            &'a self,
            to: &'a str,
            messages: &'a [Message],
            _timeout: Duration,
        ) -> BoxFuture<'a, Result<(), Report<DeliveryError>>> {
            let sent = Sent::Push {
                to: to.to_owned(),
                messages: messages.to_vec(),
            };
            Box::pin(async move { self.record(sent, "push") })
        }
    }
}
