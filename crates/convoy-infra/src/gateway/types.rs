//! Gateway wire types.
//!
//! These are the gateway's JSON request/response bodies. They are mapped to
//! the transport-agnostic types in `convoy-types` at the client boundary.

use serde::{Deserialize, Serialize};

/// Body of `POST /v1/sessions`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateSessionRequest<'a> {
    pub credential: &'a str,
}

/// Response of `POST /v1/sessions`.
///
/// A missing or empty token is treated as an authentication failure.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSessionResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
}

/// Response of `GET /v1/conversations/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationResponse {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub participant_count: Option<u32>,
}

/// Body of `POST /v1/conversations/{id}/messages`.
#[derive(Debug, Clone, Serialize)]
pub struct SendMessageRequest<'a> {
    pub text: &'a str,
}

/// Error body the gateway returns with non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayErrorBody {
    pub error: String,
}
