//! Cross-context message channel
//!
//! A host-wide message bus plus one-shot listeners. A listener resolves with
//! the value of the first message carrying a truthy property named after its
//! channel; everything else is ignored. The subscription is taken when
//! [`MessageBus::wait_for_message`] is called, not when the returned future
//! is first polled, so a message posted in between is not lost.

use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use crate::error::{ErrorClassification, ErrorSeverity};

const BUS_CAPACITY: usize = 64;

/// Message channel failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("No message on channel '{channel}' within {timeout:?}")]
    Timeout { channel: String, timeout: Duration },

    #[error("Message bus closed")]
    Closed,

    #[error("Message on channel '{0}' is not a string payload")]
    InvalidPayload(String),
}

impl ChannelError {
    /// Stable code for callers reacting to classified failures
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "messageTimeout",
            Self::Closed => "messageBusClosed",
            Self::InvalidPayload(_) => "invalidMessagePayload",
        }
    }
}

impl ErrorClassification for ChannelError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Timeout { .. } => ErrorSeverity::Warning,
            Self::Closed | Self::InvalidPayload(_) => ErrorSeverity::Error,
        }
    }
}

/// Host-wide bus of structured messages
///
/// Cloning yields another handle to the same bus.
#[derive(Debug, Clone)]
pub struct MessageBus {
    sender: broadcast::Sender<Value>,
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBus {
    /// Bus with no listeners
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BUS_CAPACITY);
        Self { sender }
    }

    /// Post a message to every current listener
    ///
    /// Returns the number of listeners that will see it. Posting with nobody
    /// listening is not an error.
    pub fn post(&self, message: Value) -> usize {
        self.sender.send(message).unwrap_or(0)
    }

    /// Listeners currently subscribed
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Wait for one message addressed to `channel`
    ///
    /// Subscribes immediately; the returned future resolves with the channel
    /// property's value, or fails after `timeout`. Either way the
    /// subscription is dropped with the future.
    pub fn wait_for_message(
        &self,
        channel: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<Value, ChannelError>> + Send + 'static {
        let mut receiver = self.sender.subscribe();
        let channel = channel.to_string();

        async move {
            let listen = async {
                loop {
                    match receiver.recv().await {
                        Ok(message) => {
                            if let Some(payload) = addressed_to(&message, &channel) {
                                debug!(channel = %channel, "Received channel message");
                                return Ok(payload.clone());
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(channel = %channel, skipped, "Message listener lagged");
                        }
                        Err(RecvError::Closed) => return Err(ChannelError::Closed),
                    }
                }
            };

            let outcome = tokio::time::timeout(timeout, listen).await;
            outcome.unwrap_or_else(|_| Err(ChannelError::Timeout { channel, timeout }))
        }
    }
}

fn addressed_to<'a>(message: &'a Value, channel: &str) -> Option<&'a Value> {
    message.get(channel).filter(|payload| is_truthy(payload))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::channel.
    use serde_json::json;

    use super::*;

    /// Validates that unrelated and falsy messages are skipped.
    ///
    /// Assertions:
    /// - Confirms the payload of the first addressed message is returned.
    /// - Ensures the listener is gone after resolving.
    #[tokio::test]
    async fn test_resolves_on_addressed_message_only() {
        let bus = MessageBus::new();
        let waiting = bus.wait_for_message("login-redirect-data", Duration::from_secs(10));
        assert_eq!(bus.listener_count(), 1);

        bus.post(json!({"other": "x"}));
        bus.post(json!({"login-redirect-data": ""}));
        bus.post(json!({"login-redirect-data": "access_token=abc"}));

        assert_eq!(waiting.await, Ok(json!("access_token=abc")));
        assert_eq!(bus.listener_count(), 0);
    }

    /// Validates the timeout path with a paused clock.
    ///
    /// Assertions:
    /// - Confirms `ChannelError::Timeout` names the channel.
    #[tokio::test(start_paused = true)]
    async fn test_times_out_without_message() {
        let bus = MessageBus::new();
        let result = bus.wait_for_message("login-redirect-data", Duration::from_secs(10)).await;

        assert_eq!(
            result,
            Err(ChannelError::Timeout {
                channel: "login-redirect-data".into(),
                timeout: Duration::from_secs(10)
            })
        );
    }

    /// Validates that a fresh listener has no memory of earlier messages.
    ///
    /// Assertions:
    /// - A message posted before subscribing is not delivered.
    #[tokio::test(start_paused = true)]
    async fn test_no_memory_of_prior_messages() {
        let bus = MessageBus::new();
        assert_eq!(bus.post(json!({"chan": "early"})), 0);

        let waiting = bus.wait_for_message("chan", Duration::from_secs(1));
        assert!(matches!(waiting.await, Err(ChannelError::Timeout { .. })));
    }

    /// Validates truthiness rules.
    ///
    /// Assertions:
    /// - `null`, `false`, `0` and `""` are falsy; objects are truthy.
    #[test]
    fn test_truthiness() {
        assert!(!is_truthy(&Value::Null));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(is_truthy(&json!({})));
        assert!(is_truthy(&json!(1)));
    }
}
