//! GatewayAuthenticator and GatewaySession -- the concrete account transport.
//!
//! The session token returned by the gateway is wrapped in [`SecretString`]
//! and is only exposed when building the `Authorization` header. Neither type
//! implements `Debug`.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use convoy_core::session::client::{Authenticator, SessionClient};
use convoy_types::credential::{ConversationId, ConversationInfo, Credential};
use convoy_types::error::TransportError;
use convoy_types::settings::GatewaySettings;

use super::types::{
    ConversationResponse, CreateSessionRequest, CreateSessionResponse, GatewayErrorBody,
    SendMessageRequest,
};

/// Exchanges credential blobs for gateway sessions.
pub struct GatewayAuthenticator {
    http: reqwest::Client,
    base_url: String,
    request_timeout_secs: u64,
}

impl GatewayAuthenticator {
    pub fn new(settings: &GatewaySettings) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| TransportError::Unreachable(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            request_timeout_secs: settings.request_timeout_secs,
        })
    }

}

impl Authenticator for GatewayAuthenticator {
    type Client = GatewaySession;

    async fn authenticate(&self, credential: &Credential) -> Result<GatewaySession, TransportError> {
        let url = format!("{}/v1/sessions", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&CreateSessionRequest {
                credential: credential.expose(),
            })
            .send()
            .await
            .map_err(|e| request_error(e, self.request_timeout_secs))?;

        let body: CreateSessionResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| TransportError::Deserialization(format!("invalid session response: {e}")))?;

        // A 2xx without a token is a failed login, not a protocol error
        let token = body
            .token
            .filter(|token| !token.is_empty())
            .ok_or(TransportError::AuthenticationFailed)?;

        tracing::debug!(
            session = credential.index(),
            account = body.account_id.as_deref().unwrap_or("unknown"),
            "Gateway session created"
        );

        Ok(GatewaySession {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            token: SecretString::from(token),
            request_timeout_secs: self.request_timeout_secs,
        })
    }
}

/// One authenticated gateway account.
pub struct GatewaySession {
    http: reqwest::Client,
    base_url: String,
    token: SecretString,
    request_timeout_secs: u64,
}

impl GatewaySession {
    fn conversation_url(&self, conversation: &ConversationId) -> String {
        format!("{}/v1/conversations/{}", self.base_url, conversation.as_str())
    }
}

impl SessionClient for GatewaySession {
    async fn conversation_info(
        &self,
        conversation: &ConversationId,
    ) -> Result<ConversationInfo, TransportError> {
        let response = self
            .http
            .get(self.conversation_url(conversation))
            .bearer_auth(self.token.expose_secret())
            .send()
            .await
            .map_err(|e| request_error(e, self.request_timeout_secs))?;

        let body: ConversationResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| {
                TransportError::Deserialization(format!("invalid conversation response: {e}"))
            })?;

        Ok(ConversationInfo {
            id: body.id,
            name: body.name,
            participant_count: body.participant_count,
        })
    }

    async fn send_message(
        &self,
        text: &str,
        conversation: &ConversationId,
    ) -> Result<(), TransportError> {
        let url = format!("{}/messages", self.conversation_url(conversation));
        let response = self
            .http
            .post(&url)
            .bearer_auth(self.token.expose_secret())
            .json(&SendMessageRequest { text })
            .send()
            .await
            .map_err(|e| request_error(e, self.request_timeout_secs))?;

        check_status(response).await?;
        Ok(())
    }
}

fn request_error(err: reqwest::Error, timeout_secs: u64) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout { secs: timeout_secs }
    } else {
        TransportError::Unreachable(err.to_string())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(status.as_u16(), &body))
}

/// Map a non-2xx gateway response to a transport error.
fn status_error(status: u16, body: &str) -> TransportError {
    match status {
        401 | 403 => TransportError::AuthenticationFailed,
        _ => {
            let message = serde_json::from_str::<GatewayErrorBody>(body)
                .map(|b| b.error)
                .unwrap_or_else(|_| body.to_string());
            TransportError::Rejected { status, message }
        }
    }
}
