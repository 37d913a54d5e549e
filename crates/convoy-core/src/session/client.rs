//! SessionClient and Authenticator trait definitions.
//!
//! These are the core abstractions the account transport implements.
//! Both use RPITIT (native async fn in traits, Rust 2024 edition).
//! Implementations live in convoy-infra (e.g., `GatewayAuthenticator`).

use std::future::Future;

use convoy_types::credential::{ConversationId, ConversationInfo, Credential};
use convoy_types::error::TransportError;

/// An authenticated account capable of acting on a conversation.
pub trait SessionClient: Send + Sync {
    /// Fetch conversation metadata. Success proves read access.
    fn conversation_info(
        &self,
        conversation: &ConversationId,
    ) -> impl Future<Output = Result<ConversationInfo, TransportError>> + Send;

    /// Post `text` to the conversation.
    fn send_message(
        &self,
        text: &str,
        conversation: &ConversationId,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Turns a raw credential blob into an authenticated [`SessionClient`].
pub trait Authenticator: Send + Sync {
    type Client: SessionClient + 'static;

    fn authenticate(
        &self,
        credential: &Credential,
    ) -> impl Future<Output = Result<Self::Client, TransportError>> + Send;
}

impl<T: SessionClient> SessionClient for std::sync::Arc<T> {
    fn conversation_info(
        &self,
        conversation: &ConversationId,
    ) -> impl Future<Output = Result<ConversationInfo, TransportError>> + Send {
        (**self).conversation_info(conversation)
    }

    fn send_message(
        &self,
        text: &str,
        conversation: &ConversationId,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        (**self).send_message(text, conversation)
    }
}
