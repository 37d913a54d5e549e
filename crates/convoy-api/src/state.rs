//! Application state wiring the delivery engine to its infrastructure.
//!
//! The engine is generic over its transport and plan source; AppState pins
//! it to the gateway client and the configuration directory.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use convoy_core::delivery::DeliveryEngine;
use convoy_core::event::bus::EventBus;
use convoy_infra::config::load_settings;
use convoy_infra::gateway::GatewayAuthenticator;
use convoy_infra::plan_source::FilePlanSource;
use convoy_types::settings::DeliverySettings;

/// The engine pinned to the concrete infra implementations.
pub type ConcreteEngine = DeliveryEngine<GatewayAuthenticator, FilePlanSource>;

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: ConcreteEngine,
    pub settings: Arc<DeliverySettings>,
    pub config_dir: PathBuf,
    /// Cancelled on Ctrl+C / SIGTERM; stops the loop and open WebSockets.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Load `convoy.toml` from `config_dir` and wire the engine.
    pub async fn init(config_dir: PathBuf) -> anyhow::Result<Self> {
        let settings = load_settings(&config_dir).await;
        Self::with_settings(config_dir, settings)
    }

    pub fn with_settings(config_dir: PathBuf, settings: DeliverySettings) -> anyhow::Result<Self> {
        let authenticator = GatewayAuthenticator::new(&settings.gateway)?;
        let shutdown = CancellationToken::new();
        let engine = DeliveryEngine::new(
            authenticator,
            FilePlanSource::new(config_dir.clone()),
            settings.clone(),
            EventBus::default(),
            shutdown.clone(),
        );

        tracing::debug!(
            config_dir = %config_dir.display(),
            gateway = %settings.gateway.base_url,
            "Application state initialized"
        );

        Ok(Self {
            engine,
            settings: Arc::new(settings),
            config_dir,
            shutdown,
        })
    }
}
