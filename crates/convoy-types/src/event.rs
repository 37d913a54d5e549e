//! Event types for the Convoy delivery event bus.
//!
//! `DeliveryEvent` is broadcast by the delivery engine during a run.
//! All variants are Clone + Send + Sync for use with tokio broadcast channels.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events emitted while a delivery run is in progress.
///
/// Every variant carries the `run_id` of the run that produced it, so
/// subscribers can tell a late event of a stopped run from the current one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeliveryEvent {
    /// A run was accepted and its pool is being built.
    RunStarted {
        run_id: Uuid,
        credentials: usize,
        templates: usize,
    },

    /// A credential authenticated and was probed.
    SessionReady {
        run_id: Uuid,
        session: usize,
        healthy: bool,
        auth_attempts: u32,
    },

    /// Pool construction finished.
    PoolBuilt {
        run_id: Uuid,
        healthy: usize,
        total: usize,
    },

    /// A message was accepted by one of the sessions.
    MessageDelivered {
        run_id: Uuid,
        template_index: usize,
        session: usize,
    },

    /// Every healthy session failed to deliver the current message.
    DeliveryFailed {
        run_id: Uuid,
        template_index: usize,
        attempts: usize,
    },

    /// A session left the rotation after repeated delivery failures.
    SessionDegraded { run_id: Uuid, session: usize },

    /// The template sequence wrapped around.
    LoopCompleted { run_id: Uuid, loop_count: u64 },

    /// Zero healthy sessions; the pool is being rebuilt.
    Recovering { run_id: Uuid },

    /// The run ended (explicit stop, shutdown, or no healthy sessions at start).
    RunStopped { run_id: Uuid, reason: String },
}

impl DeliveryEvent {
    /// The run this event belongs to.
    pub fn run_id(&self) -> Uuid {
        match self {
            DeliveryEvent::RunStarted { run_id, .. }
            | DeliveryEvent::SessionReady { run_id, .. }
            | DeliveryEvent::PoolBuilt { run_id, .. }
            | DeliveryEvent::MessageDelivered { run_id, .. }
            | DeliveryEvent::DeliveryFailed { run_id, .. }
            | DeliveryEvent::SessionDegraded { run_id, .. }
            | DeliveryEvent::LoopCompleted { run_id, .. }
            | DeliveryEvent::Recovering { run_id }
            | DeliveryEvent::RunStopped { run_id, .. } => *run_id,
        }
    }
}
