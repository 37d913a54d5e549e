//! Delivery engine: owns the session pool and drives the delivery loop.
//!
//! A run moves through the phases `Starting -> Active <-> Recovering` and
//! back to `Idle` on `stop`, on shutdown, or when the initial pool build
//! yields no healthy session. Exactly one tick is in flight per run; each
//! tick finishes (including its network calls) before the next delay is
//! armed.
//!
//! # Tick scheduling
//!
//! | Tick outcome                    | Next tick after         |
//! |---------------------------------|-------------------------|
//! | delivered / every session failed | `plan.delay_secs`      |
//! | pool rebuilt (no healthy left)  | `recovery_delay_secs`   |
//! | unexpected error or panic       | `error_retry_secs`      |
//!
//! `stop` cancels the run's token. An in-flight send is allowed to finish,
//! but no further session is tried and no further tick is scheduled. Every
//! run carries its own id and every failover order its pool generation, so
//! a late tick from a stopped run can never touch the state or the sessions
//! of a newer run.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use convoy_types::error::DeliveryError;
use convoy_types::event::DeliveryEvent;
use convoy_types::plan::DeliveryPlan;
use convoy_types::settings::DeliverySettings;
use convoy_types::status::{DeliveryStatus, LoopPhase, SessionStatusInfo, StartOutcome};

use crate::compose::compose_message;
use crate::event::bus::{EventBus, EventStream};
use crate::plan::PlanSource;
use crate::session::client::Authenticator;
use crate::session::factory::SessionFactory;
use crate::session::health::HealthProber;
use crate::session::pool::{DeliveryOrder, SessionPool};
use crate::session::with_timeout;

use super::state::DeliveryState;

// ---------------------------------------------------------------------------
// Tick outcome
// ---------------------------------------------------------------------------

/// What one tick did. Decides the delay before the next tick.
#[derive(Debug)]
enum TickOutcome {
    Delivered { template_index: usize, session: usize },
    Failed { template_index: usize },
    Recovered { healthy: usize },
}

/// The live run: its identity and the token that stops it.
struct RunHandle {
    id: Uuid,
    token: CancellationToken,
}

// ---------------------------------------------------------------------------
// DeliveryEngine
// ---------------------------------------------------------------------------

/// Session pool manager plus delivery loop, shared by the control surface.
///
/// Generic over the account transport (`A`) and where run configuration
/// comes from (`S`). Cloning is cheap; all clones drive the same engine.
pub struct DeliveryEngine<A: Authenticator, S: PlanSource> {
    inner: Arc<EngineInner<A, S>>,
}

impl<A: Authenticator, S: PlanSource> Clone for DeliveryEngine<A, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct EngineInner<A: Authenticator, S: PlanSource> {
    source: S,
    factory: SessionFactory<A>,
    pool: SessionPool,
    settings: DeliverySettings,
    state: RwLock<DeliveryState>,
    /// Serializes start/stop and holds the live run.
    run: Mutex<Option<RunHandle>>,
    /// Process-wide token; every run token is a child of it.
    shutdown: CancellationToken,
    events: EventBus,
}

impl<A, S> DeliveryEngine<A, S>
where
    A: Authenticator + 'static,
    S: PlanSource + 'static,
{
    pub fn new(
        authenticator: A,
        source: S,
        settings: DeliverySettings,
        events: EventBus,
        shutdown: CancellationToken,
    ) -> Self {
        let prober = HealthProber::new(settings.probe_message.clone(), settings.call_timeout());
        let factory = SessionFactory::new(
            Arc::new(authenticator),
            prober,
            settings.auth_retry(),
            settings.call_timeout(),
        );
        let pool = SessionPool::new(settings.failure_threshold, events.clone());

        Self {
            inner: Arc::new(EngineInner {
                source,
                factory,
                pool,
                settings,
                state: RwLock::new(DeliveryState::default()),
                run: Mutex::new(None),
                shutdown,
                events,
            }),
        }
    }

    /// Start a delivery run.
    ///
    /// Loads the plan (configuration errors are returned and the engine
    /// stays idle), resets all counters, and spawns pool construction plus
    /// the loop in the background. A no-op returning `AlreadyRunning` while
    /// a run is live.
    pub async fn start(&self) -> Result<StartOutcome, DeliveryError> {
        let inner = &self.inner;
        let mut run = inner.run.lock().await;

        if inner.shutdown.is_cancelled() {
            return Err(DeliveryError::Cancelled);
        }
        if inner.state.read().await.running {
            tracing::info!("Start requested while already running");
            return Ok(StartOutcome::AlreadyRunning);
        }

        let plan = inner.source.load().await.inspect_err(|err| {
            tracing::error!(error = %err, "Failed to load delivery configuration");
        })?;
        if plan.templates.is_empty() {
            return Err(DeliveryError::EmptyTemplates);
        }
        let plan = Arc::new(plan);

        let run_id = Uuid::now_v7();
        let token = inner.shutdown.child_token();
        inner.state.write().await.begin(run_id, Arc::clone(&plan));
        *run = Some(RunHandle {
            id: run_id,
            token: token.clone(),
        });

        tracing::info!(
            %run_id,
            conversation = %plan.conversation_id,
            credentials = plan.credentials.len(),
            templates = plan.templates.len(),
            delay_secs = plan.delay_secs,
            "Starting delivery run"
        );
        inner.events.publish(DeliveryEvent::RunStarted {
            run_id,
            credentials: plan.credentials.len(),
            templates: plan.templates.len(),
        });

        let outcome = StartOutcome::Started {
            credentials: plan.credentials.len(),
            templates: plan.templates.len(),
        };
        tokio::spawn(Arc::clone(inner).run_delivery(run_id, plan, token));
        Ok(outcome)
    }

    /// Stop the current run. Returns `false` if nothing was running.
    ///
    /// Takes effect at the next tick boundary; a send already in flight
    /// completes, but nothing further is scheduled.
    pub async fn stop(&self) -> bool {
        let Some(handle) = self.inner.run.lock().await.take() else {
            return false;
        };
        handle.token.cancel();
        self.inner.finish_run(handle.id, "stopped").await;
        true
    }

    /// Stop any live run and refuse further starts.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        self.stop().await;
    }

    /// Snapshot of the loop counters and pool health.
    pub async fn status(&self) -> DeliveryStatus {
        let inner = &self.inner;
        let mut status = {
            let state = inner.state.read().await;
            let plan = state.plan.as_deref();
            DeliveryStatus {
                running: state.running,
                phase: state.phase,
                run_id: state.run_id,
                current_index: state.current_index,
                total_messages: plan.map_or(0, |p| p.templates.len()),
                loop_count: state.loop_count,
                total_credentials: plan.map_or(0, |p| p.credentials.len()),
                delay_secs: plan.map_or(0, |p| p.delay_secs),
                total_sent: state.total_sent,
                failed_ticks: state.failed_ticks,
                conversation_id: plan.map(|p| p.conversation_id.to_string()),
                ..DeliveryStatus::default()
            }
        };
        status.healthy_sessions = inner.pool.healthy_count().await;
        status.total_sessions = inner.pool.total_count().await;
        status
    }

    /// Per-session health and delivery counters.
    pub async fn sessions(&self) -> Vec<SessionStatusInfo> {
        self.inner.pool.status().await
    }

    /// Events of every run, starting now.
    pub fn subscribe(&self) -> EventStream {
        self.inner.events.subscribe()
    }

    /// Events of one run, starting now.
    pub fn follow_run(&self, run_id: Uuid) -> EventStream {
        self.inner.events.follow_run(run_id)
    }
}

impl<A, S> EngineInner<A, S>
where
    A: Authenticator + 'static,
    S: PlanSource + 'static,
{
    /// Build the pool, then run ticks until the run is stopped.
    async fn run_delivery(
        self: Arc<Self>,
        run_id: Uuid,
        plan: Arc<DeliveryPlan>,
        cancel: CancellationToken,
    ) {
        let summary = match self
            .pool
            .rebuild(run_id, &self.factory, &plan.credentials, &plan.conversation_id, &cancel)
            .await
        {
            Ok(summary) => summary,
            Err(DeliveryError::Cancelled) => return,
            Err(err) => {
                tracing::error!(%run_id, error = %err, "Session pool construction failed");
                self.abandon_run(run_id, "pool construction failed").await;
                return;
            }
        };

        if summary.healthy == 0 {
            tracing::error!(%run_id, total = summary.total, "No healthy sessions, delivery stopped");
            self.abandon_run(run_id, "no healthy sessions").await;
            return;
        }

        if !self.set_phase(run_id, LoopPhase::Active).await {
            return;
        }
        tracing::info!(%run_id, healthy = summary.healthy, "Starting delivery loop");
        self.run_loop(run_id, &plan, &cancel).await;
        tracing::debug!(%run_id, "Delivery loop exited");
    }

    async fn run_loop(&self, run_id: Uuid, plan: &DeliveryPlan, cancel: &CancellationToken) {
        loop {
            if cancel.is_cancelled() || !self.is_live(run_id).await {
                break;
            }

            let result = AssertUnwindSafe(self.tick(run_id, plan, cancel))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    Err(DeliveryError::Internal(format!(
                        "tick panicked: {}",
                        panic_message(panic.as_ref())
                    )))
                });

            let delay = match result {
                Ok(TickOutcome::Recovered { healthy }) => {
                    tracing::info!(%run_id, healthy, "Session pool rebuilt");
                    self.settings.recovery_delay()
                }
                Ok(TickOutcome::Delivered {
                    template_index,
                    session,
                }) => {
                    tracing::debug!(%run_id, template_index, session, "Tick delivered");
                    Duration::from_secs(plan.delay_secs)
                }
                Ok(TickOutcome::Failed { template_index }) => {
                    tracing::debug!(%run_id, template_index, "Tick failed on every session");
                    Duration::from_secs(plan.delay_secs)
                }
                Err(DeliveryError::Cancelled) => break,
                Err(err) => {
                    tracing::error!(%run_id, error = %err, "Delivery tick failed, continuing");
                    self.settings.error_retry()
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// One unit of loop work.
    async fn tick(
        &self,
        run_id: Uuid,
        plan: &DeliveryPlan,
        cancel: &CancellationToken,
    ) -> Result<TickOutcome, DeliveryError> {
        if self.pool.healthy_count().await == 0 {
            return self.recover(run_id, plan, cancel).await;
        }

        let template_index = {
            let mut state = self.state.write().await;
            if !state.owned_by(run_id) {
                return Err(DeliveryError::Cancelled);
            }
            if let Some(loop_count) = state.wrap_if_exhausted() {
                self.events.publish(DeliveryEvent::LoopCompleted { run_id, loop_count });
            }
            state.current_index
        };
        let message = compose(plan, template_index)?;

        tracing::info!(
            %run_id,
            "Sending message {}/{}",
            template_index + 1,
            plan.templates.len()
        );

        let DeliveryOrder {
            generation,
            sessions,
        } = self.pool.delivery_order().await;
        let attempts = sessions.len();
        for (session, handle) in sessions {
            if cancel.is_cancelled() {
                tracing::debug!(%run_id, session, "Run stopped, abandoning failover");
                return Err(DeliveryError::Cancelled);
            }
            let sent = with_timeout(
                self.settings.call_timeout(),
                handle.send_message(&message, &plan.conversation_id),
            )
            .await;

            match sent {
                Ok(()) => {
                    self.pool.record_success(generation, session).await;
                    self.record_delivery(run_id, template_index, session).await?;
                    return Ok(TickOutcome::Delivered {
                        template_index,
                        session,
                    });
                }
                Err(err) => {
                    tracing::warn!(%run_id, session, error = %err, "Send failed, trying next session");
                    self.pool.record_failure(generation, session, &err).await;
                }
            }
        }

        {
            let mut state = self.state.write().await;
            if !state.owned_by(run_id) {
                return Err(DeliveryError::Cancelled);
            }
            state.record_failed_tick();
        }
        tracing::warn!(
            %run_id,
            template = template_index + 1,
            attempts,
            "Message failed on every session, will retry next tick"
        );
        self.events.publish(DeliveryEvent::DeliveryFailed {
            run_id,
            template_index,
            attempts,
        });
        Ok(TickOutcome::Failed { template_index })
    }

    /// No healthy session left: rebuild the whole pool.
    async fn recover(
        &self,
        run_id: Uuid,
        plan: &DeliveryPlan,
        cancel: &CancellationToken,
    ) -> Result<TickOutcome, DeliveryError> {
        if !self.set_phase(run_id, LoopPhase::Recovering).await {
            return Err(DeliveryError::Cancelled);
        }
        tracing::warn!(%run_id, "No healthy sessions, recreating");
        self.events.publish(DeliveryEvent::Recovering { run_id });

        let summary = self
            .pool
            .rebuild(run_id, &self.factory, &plan.credentials, &plan.conversation_id, cancel)
            .await?;

        if !self.set_phase(run_id, LoopPhase::Active).await {
            return Err(DeliveryError::Cancelled);
        }
        Ok(TickOutcome::Recovered {
            healthy: summary.healthy,
        })
    }

    async fn record_delivery(
        &self,
        run_id: Uuid,
        template_index: usize,
        session: usize,
    ) -> Result<(), DeliveryError> {
        let (completed, template_count) = {
            let mut state = self.state.write().await;
            if !state.owned_by(run_id) {
                return Err(DeliveryError::Cancelled);
            }
            let count = state.plan.as_ref().map_or(0, |p| p.templates.len());
            (state.advance(), count)
        };

        tracing::info!(
            %run_id,
            session,
            "Message {}/{} sent",
            template_index + 1,
            template_count
        );
        self.events.publish(DeliveryEvent::MessageDelivered {
            run_id,
            template_index,
            session,
        });
        if let Some(loop_count) = completed {
            tracing::info!(%run_id, loop_count, "Template sequence completed, starting over");
            self.events.publish(DeliveryEvent::LoopCompleted { run_id, loop_count });
        }
        Ok(())
    }

    async fn is_live(&self, run_id: Uuid) -> bool {
        let state = self.state.read().await;
        state.running && state.owned_by(run_id)
    }

    /// Move a live run to `phase`. Returns `false` if the run is gone.
    async fn set_phase(&self, run_id: Uuid, phase: LoopPhase) -> bool {
        let mut state = self.state.write().await;
        if !state.running || !state.owned_by(run_id) {
            return false;
        }
        state.phase = phase;
        true
    }

    /// End a run from inside the loop (as opposed to `stop`).
    async fn abandon_run(&self, run_id: Uuid, reason: &str) {
        let mut run = self.run.lock().await;
        if run.as_ref().is_some_and(|handle| handle.id == run_id) {
            *run = None;
        }
        drop(run);
        self.finish_run(run_id, reason).await;
    }

    async fn finish_run(&self, run_id: Uuid, reason: &str) {
        {
            let mut state = self.state.write().await;
            if state.owned_by(run_id) {
                state.running = false;
                state.phase = LoopPhase::Idle;
            }
        }
        tracing::info!(%run_id, reason, "Delivery run stopped");
        self.events.publish(DeliveryEvent::RunStopped {
            run_id,
            reason: reason.to_string(),
        });
    }
}

fn compose(plan: &DeliveryPlan, template_index: usize) -> Result<String, DeliveryError> {
    let template = plan
        .templates
        .get(template_index)
        .ok_or(DeliveryError::EmptyTemplates)?;
    let mut rng = rand::thread_rng();
    Ok(compose_message(&plan.names, template, &mut rng))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::client::SessionClient;
    use convoy_types::credential::{ConversationId, ConversationInfo, Credential};
    use convoy_types::error::{ConfigError, TransportError};
    use convoy_types::plan::NameLists;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::time::Instant;

    // --- test transport ---

    /// State shared by every client the test authenticator hands out.
    #[derive(Default)]
    struct Gateway {
        /// `(session, text)` of every accepted send.
        sent: std::sync::Mutex<Vec<(usize, String)>>,
        sends_fail: AtomicBool,
        panic_next_send: AtomicBool,
        /// The next send never completes on its own.
        hang_next_send: AtomicBool,
        auth_calls: AtomicUsize,
    }

    struct TestClient {
        index: usize,
        reachable: bool,
        gateway: Arc<Gateway>,
    }

    impl SessionClient for TestClient {
        async fn conversation_info(
            &self,
            conversation: &ConversationId,
        ) -> Result<ConversationInfo, TransportError> {
            if !self.reachable {
                return Err(TransportError::Rejected {
                    status: 404,
                    message: "unknown conversation".to_string(),
                });
            }
            Ok(ConversationInfo {
                id: conversation.to_string(),
                ..Default::default()
            })
        }

        async fn send_message(
            &self,
            text: &str,
            _conversation: &ConversationId,
        ) -> Result<(), TransportError> {
            if self.gateway.panic_next_send.swap(false, Ordering::SeqCst) {
                panic!("transport bug");
            }
            if self.gateway.hang_next_send.swap(false, Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            if !self.reachable || self.gateway.sends_fail.load(Ordering::SeqCst) {
                return Err(TransportError::Unreachable("send refused".to_string()));
            }
            self.gateway
                .sent
                .lock()
                .unwrap()
                .push((self.index, text.to_string()));
            Ok(())
        }
    }

    struct TestAuthenticator {
        gateway: Arc<Gateway>,
        /// Blobs that authenticate but cannot reach the conversation.
        unreachable: HashSet<&'static str>,
    }

    impl Authenticator for TestAuthenticator {
        type Client = TestClient;

        async fn authenticate(&self, credential: &Credential) -> Result<TestClient, TransportError> {
            self.gateway.auth_calls.fetch_add(1, Ordering::SeqCst);
            if credential.expose() == "invalid" {
                return Err(TransportError::AuthenticationFailed);
            }
            Ok(TestClient {
                index: credential.index(),
                reachable: !self.unreachable.contains(credential.expose()),
                gateway: Arc::clone(&self.gateway),
            })
        }
    }

    struct StaticPlan(Result<DeliveryPlan, ConfigError>);

    impl PlanSource for StaticPlan {
        async fn load(&self) -> Result<DeliveryPlan, ConfigError> {
            self.0.clone()
        }
    }

    fn plan(credentials: &[&str], templates: usize, delay_secs: u64) -> DeliveryPlan {
        DeliveryPlan {
            credentials: credentials
                .iter()
                .enumerate()
                .map(|(i, c)| Credential::new(i, *c))
                .collect(),
            conversation_id: "4242".parse().unwrap(),
            templates: (0..templates).map(|i| format!("m{i}")).collect(),
            names: NameLists::default(),
            delay_secs,
        }
    }

    type TestEngine = DeliveryEngine<TestAuthenticator, StaticPlan>;

    fn engine_with(
        plan: Result<DeliveryPlan, ConfigError>,
        unreachable: &[&'static str],
        settings: DeliverySettings,
    ) -> (TestEngine, Arc<Gateway>) {
        let gateway = Arc::new(Gateway::default());
        let engine = DeliveryEngine::new(
            TestAuthenticator {
                gateway: Arc::clone(&gateway),
                unreachable: unreachable.iter().copied().collect(),
            },
            StaticPlan(plan),
            settings,
            EventBus::new(256),
            CancellationToken::new(),
        );
        (engine, gateway)
    }

    async fn wait_until(engine: &TestEngine, done: impl Fn(&DeliveryStatus) -> bool) -> DeliveryStatus {
        for _ in 0..10_000 {
            let status = engine.status().await;
            if done(&status) {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached: {:?}", engine.status().await);
    }

    fn sent(gateway: &Gateway) -> Vec<(usize, String)> {
        gateway.sent.lock().unwrap().clone()
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_pass_wraps_and_skips_unhealthy_session() {
        let (engine, gateway) = engine_with(
            Ok(plan(&["good", "bad"], 3, 2)),
            &["bad"],
            DeliverySettings::default(),
        );

        let outcome = engine.start().await.unwrap();
        assert_eq!(
            outcome,
            StartOutcome::Started {
                credentials: 2,
                templates: 3
            }
        );

        let status = wait_until(&engine, |s| s.total_sent >= 3).await;
        assert_eq!(status.current_index, 0);
        assert_eq!(status.loop_count, 1);
        assert_eq!(status.healthy_sessions, 1);
        assert_eq!(status.total_sessions, 2);
        assert_eq!(status.total_credentials, 2);
        assert_eq!(status.phase, LoopPhase::Active);

        let status = wait_until(&engine, |s| s.total_sent >= 4).await;
        assert_eq!(status.current_index, 1);
        assert_eq!(status.loop_count, 1);

        let sent = sent(&gateway);
        let texts: Vec<&str> = sent.iter().map(|(_, t)| t.as_str()).collect();
        assert_eq!(texts, vec!["m0", "m1", "m2", "m0"]);
        assert!(sent.iter().all(|(session, _)| *session == 0));

        engine.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_message_is_retried_without_advancing() {
        let settings = DeliverySettings {
            failure_threshold: 0,
            ..DeliverySettings::default()
        };
        let (engine, gateway) = engine_with(Ok(plan(&["only"], 3, 4)), &[], settings);
        gateway.sends_fail.store(true, Ordering::SeqCst);
        let mut events = engine.subscribe();

        engine.start().await.unwrap();

        let mut failures = Vec::new();
        while failures.len() < 2 {
            if let DeliveryEvent::DeliveryFailed { template_index, .. } = events.recv().await.unwrap() {
                failures.push((Instant::now(), template_index));
            }
        }
        assert_eq!(failures[0].1, 0);
        assert_eq!(failures[1].1, 0);
        let gap = failures[1].0 - failures[0].0;
        assert!(gap >= Duration::from_secs(4) && gap < Duration::from_secs(5), "{gap:?}");

        let status = engine.status().await;
        assert_eq!(status.current_index, 0);
        assert_eq!(status.loop_count, 0);
        assert_eq!(status.failed_ticks, 2);
        assert!(status.running);

        gateway.sends_fail.store(false, Ordering::SeqCst);
        let status = wait_until(&engine, |s| s.total_sent >= 1).await;
        assert_eq!(status.current_index, 1);
        assert_eq!(sent(&gateway)[0].1, "m0");

        engine.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_pool_is_rebuilt_on_recovery_delay() {
        let settings = DeliverySettings {
            failure_threshold: 1,
            ..DeliverySettings::default()
        };
        let (engine, gateway) = engine_with(Ok(plan(&["only"], 2, 7)), &[], settings);
        let mut events = engine.subscribe();

        engine.start().await.unwrap();
        wait_until(&engine, |s| s.total_sent >= 1).await;
        gateway.sends_fail.store(true, Ordering::SeqCst);

        let recovering_at = loop {
            if let DeliveryEvent::Recovering { .. } = events.recv().await.unwrap() {
                break Instant::now();
            }
        };
        let next_attempt_at = loop {
            if let DeliveryEvent::DeliveryFailed { .. } = events.recv().await.unwrap() {
                break Instant::now();
            }
        };

        let gap = next_attempt_at - recovering_at;
        assert!(gap >= Duration::from_secs(5) && gap < Duration::from_secs(7), "{gap:?}");
        assert_eq!(gateway.auth_calls.load(Ordering::SeqCst), 2);
        assert_eq!(engine.status().await.current_index, 1);

        engine.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent_while_running() {
        let (engine, gateway) = engine_with(Ok(plan(&["a"], 5, 1)), &[], DeliverySettings::default());

        engine.start().await.unwrap();
        wait_until(&engine, |s| s.total_sent >= 2).await;

        assert_eq!(engine.start().await.unwrap(), StartOutcome::AlreadyRunning);
        let status = engine.status().await;
        assert!(status.total_sent >= 2);
        assert_eq!(gateway.auth_calls.load(Ordering::SeqCst), 1);

        engine.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_configuration_error_keeps_engine_idle() {
        let (engine, gateway) = engine_with(
            Err(ConfigError::NoCredentials),
            &[],
            DeliverySettings::default(),
        );

        let err = engine.start().await.unwrap_err();
        assert!(matches!(err, DeliveryError::Config(ConfigError::NoCredentials)));

        let status = engine.status().await;
        assert!(!status.running);
        assert_eq!(status.phase, LoopPhase::Idle);
        assert_eq!(gateway.auth_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_healthy_sessions_at_start_returns_to_idle() {
        let (engine, _gateway) = engine_with(
            Ok(plan(&["x", "y"], 2, 1)),
            &["x", "y"],
            DeliverySettings::default(),
        );
        let mut events = engine.subscribe();

        engine.start().await.unwrap();
        let status = wait_until(&engine, |s| !s.running).await;

        assert_eq!(status.phase, LoopPhase::Idle);
        assert_eq!(status.total_sessions, 2);
        assert_eq!(status.healthy_sessions, 0);
        assert_eq!(status.total_sent, 0);

        let reason = loop {
            if let DeliveryEvent::RunStopped { reason, .. } = events.recv().await.unwrap() {
                break reason;
            }
        };
        assert_eq!(reason, "no healthy sessions");

        assert!(!engine.stop().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_scheduling() {
        let (engine, gateway) = engine_with(Ok(plan(&["a"], 3, 1)), &[], DeliverySettings::default());

        engine.start().await.unwrap();
        wait_until(&engine, |s| s.total_sent >= 2).await;

        assert!(engine.stop().await);
        let delivered = sent(&gateway).len();
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(sent(&gateway).len(), delivered);
        let status = engine.status().await;
        assert!(!status.running);
        assert_eq!(status.phase, LoopPhase::Idle);
        assert!(!engine.stop().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_stop_resets_counters() {
        let (engine, _gateway) = engine_with(Ok(plan(&["a"], 2, 1)), &[], DeliverySettings::default());

        engine.start().await.unwrap();
        wait_until(&engine, |s| s.loop_count >= 1).await;
        let first_run = engine.status().await.run_id;
        engine.stop().await;

        engine.start().await.unwrap();
        let status = engine.status().await;
        assert_eq!(status.loop_count, 0);
        assert_eq!(status.total_sent, 0);
        assert!(status.running);
        assert!(status.run_id.is_some());
        assert_ne!(status.run_id, first_run);

        wait_until(&engine, |s| s.total_sent >= 1).await;
        engine.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_run_does_not_fail_over_to_other_sessions() {
        let (engine, gateway) = engine_with(
            Ok(plan(&["a", "b"], 2, 1)),
            &[],
            DeliverySettings::default(),
        );
        gateway.hang_next_send.store(true, Ordering::SeqCst);

        engine.start().await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(engine.stop().await);

        // The hung send times out at 30s; session 1 must not be tried after it
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(sent(&gateway).is_empty());
        assert_eq!(engine.status().await.total_sent, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_failure_of_stopped_run_leaves_new_pool_alone() {
        let settings = DeliverySettings {
            failure_threshold: 1,
            ..DeliverySettings::default()
        };
        let (engine, gateway) = engine_with(Ok(plan(&["a"], 3, 1)), &[], settings);
        gateway.hang_next_send.store(true, Ordering::SeqCst);
        let mut events = engine.subscribe();

        engine.start().await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        engine.stop().await;
        engine.start().await.unwrap();
        let current = engine.status().await.run_id.unwrap();

        // Past the stopped run's send timeout
        tokio::time::sleep(Duration::from_secs(35)).await;

        let status = engine.status().await;
        assert!(status.running);
        assert_eq!(status.run_id, Some(current));
        assert_eq!(status.healthy_sessions, 1);
        assert!(status.total_sent >= 30, "{status:?}");
        let sessions = engine.sessions().await;
        assert_eq!(sessions[0].failures, 0);
        assert!(sessions[0].in_rotation);

        while let Ok(event) = events.try_recv() {
            assert!(
                !matches!(
                    event,
                    DeliveryEvent::SessionDegraded { .. } | DeliveryEvent::Recovering { .. }
                ),
                "{event:?}"
            );
        }

        engine.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_tick_is_retried_after_error_delay() {
        let (engine, gateway) = engine_with(Ok(plan(&["a"], 3, 1)), &[], DeliverySettings::default());
        gateway.panic_next_send.store(true, Ordering::SeqCst);
        let mut events = engine.subscribe();

        let started = Instant::now();
        engine.start().await.unwrap();

        let delivered_at = loop {
            if let DeliveryEvent::MessageDelivered { template_index, .. } = events.recv().await.unwrap() {
                assert_eq!(template_index, 0);
                break Instant::now();
            }
        };
        let waited = delivered_at - started;
        assert!(waited >= Duration::from_secs(10) && waited < Duration::from_secs(11), "{waited:?}");
        assert!(engine.status().await.running);

        engine.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_auth_retries() {
        let (engine, gateway) = engine_with(
            Ok(plan(&["invalid"], 1, 1)),
            &[],
            DeliverySettings::default(),
        );

        engine.start().await.unwrap();
        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(gateway.auth_calls.load(Ordering::SeqCst), 3);

        engine.shutdown().await;
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(gateway.auth_calls.load(Ordering::SeqCst), 3);
        assert!(!engine.status().await.running);
        assert!(matches!(engine.start().await, Err(DeliveryError::Cancelled)));
    }
}
