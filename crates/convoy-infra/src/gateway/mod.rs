//! HTTP account gateway transport.
//!
//! Implements the `Authenticator` / `SessionClient` ports from `convoy-core`
//! against a JSON gateway that owns the actual messaging accounts:
//!
//! - `POST {base}/v1/sessions` exchanges a credential blob for a session token
//! - `GET {base}/v1/conversations/{id}` reads conversation metadata
//! - `POST {base}/v1/conversations/{id}/messages` posts a message

pub mod client;
pub mod types;

pub use client::{GatewayAuthenticator, GatewaySession};
