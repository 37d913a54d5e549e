//! Session management for Convoy.
//!
//! This module defines the account-session abstractions and the pool built
//! on them:
//! - `SessionClient` / `Authenticator`: RPITIT traits for transport backends
//! - `SessionHandle`: object-safe, cheaply cloneable wrapper for dynamic dispatch
//! - `HealthProber`: read-then-write access check against the conversation
//! - `SessionFactory`: authenticate with infinite fixed-backoff retry, then probe
//! - `SessionPool`: sessions by index plus the round-robin rotation queue

pub mod client;
pub mod factory;
pub mod handle;
pub mod health;
pub mod pool;

use std::future::Future;
use std::time::Duration;

use convoy_types::error::TransportError;

/// Run a transport call with an upper bound on its duration.
///
/// A hung call is reported as `TransportError::Timeout` so it can never hold
/// a tick open indefinitely.
pub async fn with_timeout<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, TransportError>>,
) -> Result<T, TransportError> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout {
            secs: limit.as_secs(),
        }),
    }
}
