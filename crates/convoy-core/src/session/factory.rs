//! Session factory: authenticate one credential, then probe it.
//!
//! Authentication failures are retried after a fixed backoff for as long
//! as the run lives. The wait races the run's cancellation token, so a
//! permanently invalid credential never outlives `stop` or shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use convoy_types::credential::{ConversationId, Credential};
use convoy_types::error::DeliveryError;

use super::client::Authenticator;
use super::handle::SessionHandle;
use super::health::HealthProber;
use super::pool::Session;
use super::with_timeout;

/// Creates authenticated, health-checked sessions from credentials.
pub struct SessionFactory<A: Authenticator> {
    authenticator: Arc<A>,
    prober: HealthProber,
    retry_backoff: Duration,
    call_timeout: Duration,
}

impl<A: Authenticator> Clone for SessionFactory<A> {
    fn clone(&self) -> Self {
        Self {
            authenticator: Arc::clone(&self.authenticator),
            prober: self.prober.clone(),
            retry_backoff: self.retry_backoff,
            call_timeout: self.call_timeout,
        }
    }
}

impl<A: Authenticator> SessionFactory<A> {
    pub fn new(
        authenticator: Arc<A>,
        prober: HealthProber,
        retry_backoff: Duration,
        call_timeout: Duration,
    ) -> Self {
        Self {
            authenticator,
            prober,
            retry_backoff,
            call_timeout,
        }
    }

    /// Authenticate `credential` until it succeeds, then probe the session.
    ///
    /// Only returns an error when `cancel` fires; authentication failures
    /// are logged and retried after the fixed backoff. The returned session
    /// carries its health flag whether or not the probe passed.
    pub async fn create(
        &self,
        credential: &Credential,
        conversation: &ConversationId,
        cancel: &CancellationToken,
    ) -> Result<Session, DeliveryError> {
        let index = credential.index();
        let mut attempts: u32 = 0;

        let client = loop {
            if cancel.is_cancelled() {
                return Err(DeliveryError::Cancelled);
            }
            attempts += 1;
            tracing::info!(session = index, attempt = attempts, "Creating session");

            let result = tokio::select! {
                _ = cancel.cancelled() => return Err(DeliveryError::Cancelled),
                result = with_timeout(self.call_timeout, self.authenticator.authenticate(credential)) => result,
            };

            match result {
                Ok(client) => break client,
                Err(err) => {
                    tracing::warn!(
                        session = index,
                        attempt = attempts,
                        error = %err,
                        retry_in_secs = self.retry_backoff.as_secs(),
                        "Session authentication failed"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(DeliveryError::Cancelled),
                        _ = tokio::time::sleep(self.retry_backoff) => {}
                    }
                }
            }
        };

        tracing::info!(session = index, attempts, "Session authenticated");

        let handle = SessionHandle::new(client);
        let healthy = self.prober.probe(index, &handle, conversation).await;
        if healthy {
            tracing::info!(session = index, "Session can access conversation");
        } else {
            tracing::warn!(session = index, "Session conversation access limited");
        }

        Ok(Session::new(index, handle, healthy, attempts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::client::SessionClient;
    use convoy_types::credential::ConversationInfo;
    use convoy_types::error::TransportError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    struct OkClient;

    impl SessionClient for OkClient {
        async fn conversation_info(
            &self,
            conversation: &ConversationId,
        ) -> Result<ConversationInfo, TransportError> {
            Ok(ConversationInfo {
                id: conversation.to_string(),
                ..Default::default()
            })
        }

        async fn send_message(&self, _: &str, _: &ConversationId) -> Result<(), TransportError> {
            Ok(())
        }
    }

    /// Fails the first `failures` authentications, then succeeds.
    struct FlakyAuthenticator {
        failures: u32,
        calls: AtomicU32,
    }

    impl FlakyAuthenticator {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
            }
        }
    }

    impl Authenticator for FlakyAuthenticator {
        type Client = OkClient;

        async fn authenticate(&self, _credential: &Credential) -> Result<OkClient, TransportError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(TransportError::AuthenticationFailed)
            } else {
                Ok(OkClient)
            }
        }
    }

    fn factory(auth: Arc<FlakyAuthenticator>) -> SessionFactory<FlakyAuthenticator> {
        SessionFactory::new(
            auth,
            HealthProber::new("probe", Duration::from_secs(5)),
            Duration::from_secs(10),
            Duration::from_secs(30),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_exactly_k_times_with_fixed_backoff() {
        let auth = Arc::new(FlakyAuthenticator::new(3));
        let factory = factory(auth.clone());
        let cancel = CancellationToken::new();
        let started = Instant::now();

        let session = factory
            .create(&Credential::new(4, "blob"), &"1".parse().unwrap(), &cancel)
            .await
            .unwrap();

        assert_eq!(auth.calls.load(Ordering::SeqCst), 4);
        assert_eq!(session.auth_attempts, 4);
        assert_eq!(session.index, 4);
        assert!(session.healthy);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(30), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(31), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_success_does_not_wait() {
        let auth = Arc::new(FlakyAuthenticator::new(0));
        let started = Instant::now();

        let session = factory(auth)
            .create(&Credential::new(0, "blob"), &"1".parse().unwrap(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(session.auth_attempts, 1);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_ends_infinite_retry() {
        let auth = Arc::new(FlakyAuthenticator::new(u32::MAX));
        let factory = factory(auth.clone());
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(35)).await;
            canceller.cancel();
        });

        let result = factory
            .create(&Credential::new(0, "bad"), &"1".parse().unwrap(), &cancel)
            .await;

        assert!(matches!(result, Err(DeliveryError::Cancelled)));
        // Attempts at t=0, 10, 20, 30; cancelled while waiting for t=40.
        assert_eq!(auth.calls.load(Ordering::SeqCst), 4);
    }
}
