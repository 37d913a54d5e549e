//! The session pool: every session created for the current run, keyed by
//! credential index, plus the round-robin rotation queue of healthy indices.
//!
//! Unhealthy sessions stay in the mapping for status accounting but are
//! never in the rotation. The only way to replace sessions is a full
//! [`SessionPool::rebuild`].

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use convoy_types::credential::{ConversationId, Credential};
use convoy_types::error::{DeliveryError, TransportError};
use convoy_types::event::DeliveryEvent;
use convoy_types::status::SessionStatusInfo;

use crate::event::bus::EventBus;

use super::client::Authenticator;
use super::factory::SessionFactory;
use super::handle::SessionHandle;

/// One authenticated account plus its health flag and delivery counters.
#[derive(Debug, Clone)]
pub struct Session {
    /// Matches the credential's position in the configured list.
    pub index: usize,
    pub handle: SessionHandle,
    pub healthy: bool,
    /// Authentication attempts it took to create this session.
    pub auth_attempts: u32,
    pub created_at: DateTime<Utc>,
    pub sends: u64,
    pub failures: u64,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
}

impl Session {
    pub fn new(index: usize, handle: SessionHandle, healthy: bool, auth_attempts: u32) -> Self {
        Self {
            index,
            handle,
            healthy,
            auth_attempts,
            created_at: Utc::now(),
            sends: 0,
            failures: 0,
            consecutive_failures: 0,
            last_error: None,
        }
    }

    fn record_success(&mut self) {
        self.sends += 1;
        self.consecutive_failures = 0;
    }

    fn record_failure(&mut self, error: &TransportError) {
        self.failures += 1;
        self.consecutive_failures += 1;
        self.last_error = Some(error.to_string());
    }
}

/// Failover order for one tick, stamped with the pool build it was taken from.
#[derive(Debug, Clone)]
pub struct DeliveryOrder {
    pub generation: u64,
    /// Healthy sessions, rotation front first.
    pub sessions: Vec<(usize, SessionHandle)>,
}

/// Healthy and total session counts after construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSummary {
    pub healthy: usize,
    pub total: usize,
}

#[derive(Default)]
struct PoolState {
    sessions: BTreeMap<usize, Session>,
    rotation: VecDeque<usize>,
    /// Bumped on every clear; late registrations from an older build are dropped.
    generation: u64,
    run_id: Option<Uuid>,
}

impl PoolState {
    fn insert(&mut self, session: Session) {
        let index = session.index;
        self.rotation.retain(|&i| i != index);
        if session.healthy {
            self.rotation.push_back(index);
        }
        self.sessions.insert(index, session);
    }

    fn select_next(&mut self) -> Option<SessionHandle> {
        let index = self.rotation.pop_front()?;
        self.rotation.push_back(index);
        self.sessions.get(&index).map(|s| s.handle.clone())
    }

    fn ordered_healthy(&self) -> Vec<(usize, SessionHandle)> {
        self.rotation
            .iter()
            .filter_map(|index| {
                self.sessions
                    .get(index)
                    .filter(|s| s.healthy)
                    .map(|s| (*index, s.handle.clone()))
            })
            .collect()
    }

    fn healthy_count(&self) -> usize {
        self.sessions.values().filter(|s| s.healthy).count()
    }

    fn demote(&mut self, index: usize) -> bool {
        match self.sessions.get_mut(&index) {
            Some(session) if session.healthy => {
                session.healthy = false;
                self.rotation.retain(|&i| i != index);
                true
            }
            _ => false,
        }
    }
}

/// Thread-safe session pool shared by pool construction and the delivery loop.
///
/// Concurrent session creations write through the internal mutex; the lock is
/// never held across a network call.
#[derive(Clone)]
pub struct SessionPool {
    state: Arc<Mutex<PoolState>>,
    /// Consecutive delivery failures before a session is demoted (0 = never).
    failure_threshold: u32,
    events: EventBus,
}

impl SessionPool {
    pub fn new(failure_threshold: u32, events: EventBus) -> Self {
        Self {
            state: Arc::new(Mutex::new(PoolState::default())),
            failure_threshold,
            events,
        }
    }

    #[cfg(test)]
    pub(crate) async fn register(&self, session: Session) {
        self.state.lock().await.insert(session);
    }

    async fn register_for(&self, generation: u64, session: Session) -> bool {
        let mut state = self.state.lock().await;
        if state.generation != generation {
            return false;
        }
        state.insert(session);
        true
    }

    /// Next healthy session in round-robin order, or `None` if there is none.
    ///
    /// The selected index moves to the back of the queue, so the queue length
    /// stays equal to the number of healthy sessions.
    pub async fn select_next(&self) -> Option<SessionHandle> {
        self.state.lock().await.select_next()
    }

    /// Every healthy handle in rotation order, starting from the front.
    pub async fn healthy_snapshot(&self) -> Vec<SessionHandle> {
        self.state
            .lock()
            .await
            .ordered_healthy()
            .into_iter()
            .map(|(_, handle)| handle)
            .collect()
    }

    /// Failover order for one delivery attempt.
    ///
    /// Returns the healthy snapshot (with indices) and advances the rotation
    /// by one, so consecutive ticks lead with different sessions. Outcomes
    /// must be reported with the returned generation.
    pub async fn delivery_order(&self) -> DeliveryOrder {
        let mut state = self.state.lock().await;
        let sessions = state.ordered_healthy();
        state.select_next();
        DeliveryOrder {
            generation: state.generation,
            sessions,
        }
    }

    pub async fn healthy_count(&self) -> usize {
        self.state.lock().await.healthy_count()
    }

    pub async fn total_count(&self) -> usize {
        self.state.lock().await.sessions.len()
    }

    /// Record a successful send by session `index` of pool `generation`.
    pub async fn record_success(&self, generation: u64, index: usize) {
        let mut state = self.state.lock().await;
        if state.generation != generation {
            tracing::debug!(
                session = index,
                generation,
                "Ignoring send outcome from a replaced pool"
            );
            return;
        }
        if let Some(session) = state.sessions.get_mut(&index) {
            session.record_success();
        }
    }

    /// Record a failed send by session `index` of pool `generation`.
    ///
    /// Returns `true` when this failure pushed the session over the failure
    /// threshold and it was taken out of the rotation. Outcomes reported
    /// against a replaced pool are ignored.
    pub async fn record_failure(
        &self,
        generation: u64,
        index: usize,
        error: &TransportError,
    ) -> bool {
        let mut state = self.state.lock().await;
        if state.generation != generation {
            tracing::debug!(
                session = index,
                generation,
                "Ignoring send outcome from a replaced pool"
            );
            return false;
        }
        let Some(session) = state.sessions.get_mut(&index) else {
            return false;
        };
        session.record_failure(error);
        let over_threshold =
            self.failure_threshold > 0 && session.consecutive_failures >= self.failure_threshold;
        if !over_threshold || !state.demote(index) {
            return false;
        }

        tracing::warn!(
            session = index,
            threshold = self.failure_threshold,
            "Session removed from rotation after repeated delivery failures"
        );
        if let Some(run_id) = state.run_id {
            self.events.publish(DeliveryEvent::SessionDegraded {
                run_id,
                session: index,
            });
        }
        true
    }

    /// Drop every session. Returns the new pool generation.
    pub async fn clear(&self) -> u64 {
        let mut state = self.state.lock().await;
        state.sessions.clear();
        state.rotation.clear();
        state.generation += 1;
        state.generation
    }

    /// Per-session status, ordered by index.
    pub async fn status(&self) -> Vec<SessionStatusInfo> {
        let state = self.state.lock().await;
        state
            .sessions
            .values()
            .map(|s| SessionStatusInfo {
                index: s.index,
                healthy: s.healthy,
                in_rotation: state.rotation.contains(&s.index),
                sends: s.sends,
                failures: s.failures,
                consecutive_failures: s.consecutive_failures,
                last_error: s.last_error.clone(),
                created_at: s.created_at,
            })
            .collect()
    }

    /// Discard all sessions and create one per credential from scratch.
    ///
    /// Credentials are authenticated concurrently; each session is registered
    /// as soon as its probe completes, so a credential stuck in its retry loop
    /// never holds back the others. Resolves once every credential has a
    /// session, or with `DeliveryError::Cancelled` if `cancel` fires first.
    pub async fn rebuild<A: Authenticator + 'static>(
        &self,
        run_id: Uuid,
        factory: &SessionFactory<A>,
        credentials: &[Credential],
        conversation: &ConversationId,
        cancel: &CancellationToken,
    ) -> Result<PoolSummary, DeliveryError> {
        let generation = self.clear().await;
        self.state.lock().await.run_id = Some(run_id);
        tracing::info!(credentials = credentials.len(), "Creating sessions");

        let mut tasks = JoinSet::new();
        for credential in credentials.iter().cloned() {
            let pool = self.clone();
            let factory = factory.clone();
            let conversation = conversation.clone();
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let session = factory.create(&credential, &conversation, &cancel).await?;
                let ready = DeliveryEvent::SessionReady {
                    run_id,
                    session: session.index,
                    healthy: session.healthy,
                    auth_attempts: session.auth_attempts,
                };
                if pool.register_for(generation, session).await {
                    pool.events.publish(ready);
                }
                Ok::<(), DeliveryError>(())
            });
        }

        let mut cancelled = false;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(DeliveryError::Cancelled)) => cancelled = true,
                Ok(Err(err)) => tracing::error!(error = %err, "Session creation failed"),
                Err(err) => tracing::error!(error = %err, "Session creation task panicked"),
            }
        }
        if cancelled {
            tracing::info!("Session creation cancelled");
            return Err(DeliveryError::Cancelled);
        }

        let summary = {
            let state = self.state.lock().await;
            PoolSummary {
                healthy: state.healthy_count(),
                total: state.sessions.len(),
            }
        };
        tracing::info!(
            healthy = summary.healthy,
            total = credentials.len(),
            "{}/{} sessions healthy",
            summary.healthy,
            credentials.len()
        );
        self.events.publish(DeliveryEvent::PoolBuilt {
            run_id,
            healthy: summary.healthy,
            total: summary.total,
        });
        Ok(summary)
    }
}

impl std::fmt::Debug for SessionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionPool")
            .field("failure_threshold", &self.failure_threshold)
            .finish_non_exhaustive()
    }
}
