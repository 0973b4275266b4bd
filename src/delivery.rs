use std::time::Duration;

use error_stack::{Report, bail};
use tracing::{info, warn};

use crate::error::DeliveryError;
use crate::notifier::{Message, Notifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationKind {
    /// Answering an incoming chat event.
    Interactive,
    /// Triggered by the periodic alert job.
    Scheduled,
}

/// Who to answer and how the cycle was triggered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryContext {
    pub kind: InvocationKind,
    pub reply_token: Option<String>,
    pub recipient: Option<String>,
}

impl DeliveryContext {
    pub fn interactive(reply_token: Option<String>, recipient: Option<String>) -> Self {
        Self {
            kind: InvocationKind::Interactive,
            reply_token,
            recipient,
        }
    }

    pub fn scheduled(recipient: Option<String>) -> Self {
        Self {
            kind: InvocationKind::Scheduled,
            reply_token: None,
            recipient,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryPolicy {
    /// Sent as a reply when an interactive cycle finds nothing.
    pub fallback_text: String,
    pub push_timeout: Duration,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self {
            fallback_text: "No interesting currency pairs found.".into(),
            push_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SendAction {
    Reply {
        token: String,
        messages: Vec<Message>,
    },
    Push {
        to: String,
        messages: Vec<Message>,
        timeout: Duration,
    },
}

impl SendAction {
    fn kind(&self) -> &'static str {
        match self {
            Self::Reply { .. } => "reply",
            Self::Push { .. } => "push",
        }
    }
}

/// Decide how rendered chunks reach the chat.
///
/// - nothing to say: interactive gets one fallback reply, scheduled sends nothing
/// - scheduled, or more than one chunk: push every chunk to the recipient
/// - interactive with a single chunk: one reply
pub fn route(
    chunks: Vec<Message>,
    context: &DeliveryContext,
    policy: &DeliveryPolicy,
) -> Result<Vec<SendAction>, Report<DeliveryError>> {
    if chunks.is_empty() {
        return match context.kind {
            InvocationKind::Scheduled => Ok(Vec::new()),
            InvocationKind::Interactive => Ok(vec![SendAction::Reply {
                token: reply_token(context)?,
                messages: vec![Message::text(policy.fallback_text.clone())],
            }]),
        };
    }

    if context.kind == InvocationKind::Scheduled || chunks.len() > 1 {
        let to = recipient(context)?;
        return Ok(chunks
            .into_iter()
            .map(|chunk| SendAction::Push {
                to: to.clone(),
                messages: vec![chunk],
                timeout: policy.push_timeout,
            })
            .collect());
    }

    Ok(vec![SendAction::Reply {
        token: reply_token(context)?,
        messages: chunks,
    }])
}

fn reply_token(context: &DeliveryContext) -> Result<String, Report<DeliveryError>> {
    match &context.reply_token {
        Some(token) => Ok(token.clone()),
        None => bail!(DeliveryError::MissingTarget {
            action: "reply".into(),
            target: "reply token".into(),
        }),
    }
}

fn recipient(context: &DeliveryContext) -> Result<String, Report<DeliveryError>> {
    match &context.recipient {
        Some(to) => Ok(to.clone()),
        None => bail!(DeliveryError::MissingTarget {
            action: "push".into(),
            target: "recipient".into(),
        }),
    }
}

/// Outcome of dispatching one cycle's actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeliveryReport {
    pub attempted: usize,
    pub failed: usize,
}

/// Issue `actions` in order.
///
/// A failed action is logged and the remaining ones are still attempted; the
/// cycle then reports `DeliveryError::Partial`.
pub async fn dispatch(
    notifier: &dyn Notifier,
    actions: &[SendAction],
) -> Result<DeliveryReport, Report<DeliveryError>> {
    let mut report = DeliveryReport::default();

    for (idx, action) in actions.iter().enumerate() {
        report.attempted += 1;
        let result = match action {
            SendAction::Reply { token, messages } => notifier.reply(token, messages).await,
            SendAction::Push {
                to,
                messages,
                timeout,
            } => notifier.push(to, messages, *timeout).await,
        };
        if let Err(e) = result {
            report.failed += 1;
            warn!(error = ?e, action = action.kind(), index = idx, "send action failed (continuing)");
        }
    }

    if report.failed > 0 {
        bail!(DeliveryError::Partial {
            failed: report.failed,
            attempted: report.attempted,
        });
    }

    info!(actions = report.attempted, "delivery complete");
    Ok(report)
}
