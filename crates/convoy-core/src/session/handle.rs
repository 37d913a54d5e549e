//! SessionHandle -- object-safe dynamic dispatch wrapper for SessionClient.
//!
//! 1. Define an object-safe `SessionClientDyn` trait with boxed futures
//! 2. Blanket-impl `SessionClientDyn` for all `T: SessionClient`
//! 3. `SessionHandle` wraps `Arc<dyn SessionClientDyn>` and delegates
//!
//! The `Arc` makes handles cheap to clone, so the pool can hand out
//! snapshots without holding its lock across network calls.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use convoy_types::credential::{ConversationId, ConversationInfo};
use convoy_types::error::TransportError;

use super::client::SessionClient;

/// Object-safe version of [`SessionClient`] with boxed futures.
pub trait SessionClientDyn: Send + Sync {
    fn conversation_info_boxed<'a>(
        &'a self,
        conversation: &'a ConversationId,
    ) -> Pin<Box<dyn Future<Output = Result<ConversationInfo, TransportError>> + Send + 'a>>;

    fn send_message_boxed<'a>(
        &'a self,
        text: &'a str,
        conversation: &'a ConversationId,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>>;
}

impl<T: SessionClient> SessionClientDyn for T {
    fn conversation_info_boxed<'a>(
        &'a self,
        conversation: &'a ConversationId,
    ) -> Pin<Box<dyn Future<Output = Result<ConversationInfo, TransportError>> + Send + 'a>> {
        Box::pin(self.conversation_info(conversation))
    }

    fn send_message_boxed<'a>(
        &'a self,
        text: &'a str,
        conversation: &'a ConversationId,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> {
        Box::pin(self.send_message(text, conversation))
    }
}

/// Type-erased authenticated session.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<dyn SessionClientDyn>,
}

impl SessionHandle {
    /// Wrap a concrete `SessionClient`.
    pub fn new<T: SessionClient + 'static>(client: T) -> Self {
        Self {
            inner: Arc::new(client),
        }
    }

    pub async fn conversation_info(
        &self,
        conversation: &ConversationId,
    ) -> Result<ConversationInfo, TransportError> {
        self.inner.conversation_info_boxed(conversation).await
    }

    pub async fn send_message(
        &self,
        text: &str,
        conversation: &ConversationId,
    ) -> Result<(), TransportError> {
        self.inner.send_message_boxed(text, conversation).await
    }

    /// Whether two handles point at the same underlying client.
    #[cfg(test)]
    pub(crate) fn same_client(&self, other: &SessionHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle").finish_non_exhaustive()
    }
}
