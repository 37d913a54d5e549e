//! Session health probing.
//!
//! A session is healthy when it can act on the target conversation. Some
//! accounts lack metadata-read permission but can still post, so a failed
//! read is followed by a lightweight write probe before the session is
//! condemned.

use std::time::Duration;

use convoy_types::credential::ConversationId;
use convoy_types::error::TransportError;

use super::handle::SessionHandle;
use super::with_timeout;

/// How a probe concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Conversation metadata could be read.
    Readable,
    /// Metadata read failed but the probe message was accepted.
    Writable { read_error: TransportError },
    /// Neither read nor write succeeded.
    Unreachable {
        read_error: TransportError,
        write_error: TransportError,
    },
}

impl ProbeOutcome {
    pub fn is_healthy(&self) -> bool {
        !matches!(self, ProbeOutcome::Unreachable { .. })
    }
}

/// Checks whether a session can act on the target conversation.
#[derive(Debug, Clone)]
pub struct HealthProber {
    probe_message: String,
    call_timeout: Duration,
}

impl HealthProber {
    pub fn new(probe_message: impl Into<String>, call_timeout: Duration) -> Self {
        Self {
            probe_message: probe_message.into(),
            call_timeout,
        }
    }

    /// Probe `handle` and report only whether it is healthy. Never fails.
    pub async fn probe(
        &self,
        session: usize,
        handle: &SessionHandle,
        conversation: &ConversationId,
    ) -> bool {
        self.inspect(session, handle, conversation).await.is_healthy()
    }

    /// Probe `handle`: metadata read first, probe send only if that fails.
    pub async fn inspect(
        &self,
        session: usize,
        handle: &SessionHandle,
        conversation: &ConversationId,
    ) -> ProbeOutcome {
        let read_error =
            match with_timeout(self.call_timeout, handle.conversation_info(conversation)).await {
                Ok(_) => {
                    tracing::debug!(session, "Conversation access confirmed");
                    return ProbeOutcome::Readable;
                }
                Err(err) => err,
            };

        tracing::debug!(session, error = %read_error, "Conversation info failed, trying probe message");

        match with_timeout(
            self.call_timeout,
            handle.send_message(&self.probe_message, conversation),
        )
        .await
        {
            Ok(()) => {
                tracing::debug!(session, "Probe message accepted");
                ProbeOutcome::Writable { read_error }
            }
            Err(write_error) => {
                tracing::warn!(
                    session,
                    read_error = %read_error,
                    write_error = %write_error,
                    "Session cannot access conversation"
                );
                ProbeOutcome::Unreachable {
                    read_error,
                    write_error,
                }
            }
        }
    }
}
