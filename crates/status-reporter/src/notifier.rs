//! Publishing the status message: create once, edit afterwards.
//!
//! The notifier owns the diffing rule. A run whose message matches the
//! last published payload makes no network call at all; otherwise the
//! live message is edited in place, or created when there is none or
//! Discord no longer knows it.

use crate::message::{Message, MessageError};
use crate::types::{MessageHandle, MessageId, RunOutcome};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Failure talking to the webhook
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("message not found")]
    NotFound,

    #[error("webhook rejected the request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("cannot decode webhook response: {0}")]
    Decode(String),

    #[error("invalid message: {0}")]
    InvalidMessage(#[from] MessageError),

    #[error("still rate limited after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
}

impl From<WebhookError> for common::Error {
    fn from(e: WebhookError) -> Self {
        common::Error::notify(e.to_string())
    }
}

/// Create and edit calls against one webhook.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    /// Post a new message and return its id.
    async fn create(&self, message: &Message) -> Result<MessageId, WebhookError>;

    /// Replace the content of a message posted earlier.
    async fn edit(&self, id: &MessageId, message: &Message) -> Result<(), WebhookError>;
}

/// Bounded retry for rate limited calls
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,

    /// Upper bound on any single wait
    pub max_wait: Duration,

    /// First backoff when the server gives no delay
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            max_wait: Duration::from_secs(60),
            initial_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Wait before retry number `attempt` (1-based)
    fn backoff(&self, attempt: u32, retry_after: Duration) -> Duration {
        let wait = if retry_after.is_zero() {
            self.initial_backoff
                .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
        } else {
            retry_after
        };
        wait.min(self.max_wait)
    }

    /// Run `op`, retrying only while the webhook reports a rate limit.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, WebhookError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, WebhookError>>,
    {
        let attempts = self.max_attempts.max(1);
        for attempt in 1..=attempts {
            match op().await {
                Err(WebhookError::RateLimited { retry_after }) => {
                    if attempt == attempts {
                        break;
                    }
                    let wait = self.backoff(attempt, retry_after);
                    warn!(what, attempt, wait = ?wait, "Rate limited, retrying");
                    tokio::time::sleep(wait).await;
                }
                other => return other,
            }
        }
        Err(WebhookError::RetriesExhausted { attempts })
    }
}

/// What the notifier remembers between runs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotifyState {
    pub handle: Option<MessageHandle>,
    pub last_payload: Option<Message>,
}

/// Keeps one live message in sync with the latest rendering
pub struct Notifier<T> {
    transport: T,
    retry: RetryPolicy,
}

impl<T: WebhookTransport> Notifier<T> {
    pub fn new(transport: T, retry: RetryPolicy) -> Self {
        Self { transport, retry }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn create(&self, message: &Message) -> Result<MessageId, WebhookError> {
        self.retry
            .run("create", || self.transport.create(message))
            .await
    }

    /// Publish `message`, updating `state` on success.
    ///
    /// On error `state` keeps the previous payload so the next run tries
    /// again. A handle Discord reports as gone is dropped either way.
    pub async fn publish(
        &self,
        state: &mut NotifyState,
        message: &Message,
        now: DateTime<Utc>,
    ) -> Result<RunOutcome, WebhookError> {
        if state.handle.is_some()
            && state
                .last_payload
                .as_ref()
                .is_some_and(|last| last.same_content(message))
        {
            debug!("Message unchanged, skipping webhook");
            return Ok(RunOutcome::Unchanged);
        }

        message.validate()?;

        let outcome = match state.handle.clone() {
            Some(handle) => {
                let edited = self
                    .retry
                    .run("edit", || self.transport.edit(&handle.id, message))
                    .await;
                match edited {
                    Ok(()) => {
                        info!(id = %handle.id, "Edited status message");
                        RunOutcome::Edited(handle.id)
                    }
                    Err(WebhookError::NotFound) => {
                        warn!(id = %handle.id, "Status message is gone, posting a new one");
                        state.handle = None;
                        let id = self.create(message).await?;
                        state.handle = Some(MessageHandle {
                            id: id.clone(),
                            created_at: now,
                        });
                        RunOutcome::Recreated(id)
                    }
                    Err(e) => return Err(e),
                }
            }
            None => {
                let id = self.create(message).await?;
                info!(id = %id, "Created status message");
                state.handle = Some(MessageHandle {
                    id: id.clone(),
                    created_at: now,
                });
                RunOutcome::Created(id)
            }
        };

        state.last_payload = Some(message.clone());
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Embed;
    use mockall::Sequence;
    use mockall::predicate::eq;

    fn message(title: &str) -> Message {
        Message {
            embeds: vec![Embed {
                title: title.to_string(),
                color: 0x2E_CC_71,
                timestamp: Some(Utc::now()),
                ..Embed::default()
            }],
            ..Message::default()
        }
    }

    fn handle(id: &str) -> MessageHandle {
        MessageHandle {
            id: MessageId::new(id),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_first_publish_creates() {
        let mut transport = MockWebhookTransport::new();
        transport
            .expect_create()
            .times(1)
            .returning(|_| Ok(MessageId::new("1")));
        transport.expect_edit().never();

        let notifier = Notifier::new(transport, RetryPolicy::default());
        let mut state = NotifyState::default();
        let outcome = notifier
            .publish(&mut state, &message("up"), Utc::now())
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::Created(MessageId::new("1")));
        assert_eq!(state.handle.unwrap().id, MessageId::new("1"));
        assert!(state.last_payload.is_some());
    }

    #[tokio::test]
    async fn test_unchanged_makes_no_call() {
        let mut transport = MockWebhookTransport::new();
        transport.expect_create().never();
        transport.expect_edit().never();

        let notifier = Notifier::new(transport, RetryPolicy::default());
        let mut state = NotifyState {
            handle: Some(handle("1")),
            last_payload: Some(message("up")),
        };

        // differs only in the render timestamp
        let outcome = notifier
            .publish(&mut state, &message("up"), Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome, RunOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_changed_payload_edits() {
        let mut transport = MockWebhookTransport::new();
        transport
            .expect_edit()
            .with(eq(MessageId::new("1")), mockall::predicate::always())
            .times(1)
            .returning(|_, _| Ok(()));
        transport.expect_create().never();

        let notifier = Notifier::new(transport, RetryPolicy::default());
        let mut state = NotifyState {
            handle: Some(handle("1")),
            last_payload: Some(message("up")),
        };

        let outcome = notifier
            .publish(&mut state, &message("down"), Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome, RunOutcome::Edited(MessageId::new("1")));
        assert_eq!(state.last_payload.unwrap().embeds[0].title, "down");
    }

    #[tokio::test]
    async fn test_payload_without_handle_creates() {
        let mut transport = MockWebhookTransport::new();
        transport
            .expect_create()
            .times(1)
            .returning(|_| Ok(MessageId::new("9")));

        let notifier = Notifier::new(transport, RetryPolicy::default());
        let mut state = NotifyState {
            handle: None,
            last_payload: Some(message("up")),
        };

        let outcome = notifier
            .publish(&mut state, &message("up"), Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome, RunOutcome::Created(MessageId::new("9")));
    }

    #[tokio::test]
    async fn test_missing_message_is_recreated() {
        let mut seq = Sequence::new();
        let mut transport = MockWebhookTransport::new();
        transport
            .expect_edit()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(WebhookError::NotFound));
        transport
            .expect_create()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(MessageId::new("2")));

        let notifier = Notifier::new(transport, RetryPolicy::default());
        let mut state = NotifyState {
            handle: Some(handle("1")),
            last_payload: Some(message("up")),
        };

        let outcome = notifier
            .publish(&mut state, &message("down"), Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome, RunOutcome::Recreated(MessageId::new("2")));
        assert_eq!(state.handle.unwrap().id, MessageId::new("2"));
    }

    #[tokio::test]
    async fn test_failed_recreate_drops_handle() {
        let mut transport = MockWebhookTransport::new();
        transport
            .expect_edit()
            .returning(|_, _| Err(WebhookError::NotFound));
        transport.expect_create().returning(|_| {
            Err(WebhookError::Transport("connection reset".into()))
        });

        let notifier = Notifier::new(transport, RetryPolicy::default());
        let previous = message("up");
        let mut state = NotifyState {
            handle: Some(handle("1")),
            last_payload: Some(previous.clone()),
        };

        let result = notifier
            .publish(&mut state, &message("down"), Utc::now())
            .await;
        assert!(matches!(result, Err(WebhookError::Transport(_))));
        assert_eq!(state.handle, None);
        assert_eq!(state.last_payload, Some(previous));
    }

    #[tokio::test]
    async fn test_invalid_message_never_sent() {
        let mut transport = MockWebhookTransport::new();
        transport.expect_create().never();

        let notifier = Notifier::new(transport, RetryPolicy::default());
        let mut state = NotifyState::default();
        let result = notifier
            .publish(&mut state, &Message::default(), Utc::now())
            .await;
        assert!(matches!(
            result,
            Err(WebhookError::InvalidMessage(MessageError::Empty))
        ));
        assert_eq!(state, NotifyState::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_is_retried() {
        let mut seq = Sequence::new();
        let mut transport = MockWebhookTransport::new();
        transport
            .expect_create()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_| {
                Err(WebhookError::RateLimited {
                    retry_after: Duration::from_millis(500),
                })
            });
        transport
            .expect_create()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(MessageId::new("3")));

        let notifier = Notifier::new(transport, RetryPolicy::default());
        let mut state = NotifyState::default();

        let start = tokio::time::Instant::now();
        let outcome = notifier
            .publish(&mut state, &message("up"), Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome, RunOutcome::Created(MessageId::new("3")));
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_exhausts() {
        let mut transport = MockWebhookTransport::new();
        transport.expect_create().times(3).returning(|_| {
            Err(WebhookError::RateLimited {
                retry_after: Duration::ZERO,
            })
        });

        let policy = RetryPolicy {
            max_attempts: 3,
            ..RetryPolicy::default()
        };
        let notifier = Notifier::new(transport, policy);
        let mut state = NotifyState::default();
        let result = notifier
            .publish(&mut state, &message("up"), Utc::now())
            .await;
        assert!(matches!(
            result,
            Err(WebhookError::RetriesExhausted { attempts: 3 })
        ));
        assert_eq!(state.handle, None);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            max_wait: Duration::from_secs(5),
            initial_backoff: Duration::from_secs(1),
        };
        assert_eq!(policy.backoff(1, Duration::ZERO), Duration::from_secs(1));
        assert_eq!(policy.backoff(2, Duration::ZERO), Duration::from_secs(2));
        assert_eq!(policy.backoff(3, Duration::ZERO), Duration::from_secs(4));
        assert_eq!(policy.backoff(4, Duration::ZERO), Duration::from_secs(5));
        assert_eq!(
            policy.backoff(1, Duration::from_secs(90)),
            Duration::from_secs(5)
        );
    }
}
