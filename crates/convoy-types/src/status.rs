//! Status reporting types for the control surface and CLI.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Delivery loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopPhase {
    /// Not running, nothing scheduled.
    #[default]
    Idle,
    /// Run accepted, initial pool construction in progress.
    Starting,
    /// Ticks are being delivered on schedule.
    Active,
    /// No healthy sessions; pool reconstruction in progress.
    Recovering,
}

impl fmt::Display for LoopPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopPhase::Idle => write!(f, "idle"),
            LoopPhase::Starting => write!(f, "starting"),
            LoopPhase::Active => write!(f, "active"),
            LoopPhase::Recovering => write!(f, "recovering"),
        }
    }
}

/// Snapshot of the delivery state, as returned by the status operation.
///
/// Missing fields deserialize to their defaults, so older clients and
/// partial payloads still parse.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryStatus {
    pub running: bool,
    pub phase: LoopPhase,
    /// Most recent run; kept after it stops so its events can be matched.
    pub run_id: Option<Uuid>,
    pub current_index: usize,
    pub total_messages: usize,
    pub loop_count: u64,
    pub healthy_sessions: usize,
    pub total_sessions: usize,
    /// Number of configured credentials. Also accepted as `totalCookies`
    /// when reading status payloads.
    #[serde(alias = "totalCookies")]
    pub total_credentials: usize,
    pub delay_secs: u64,
    pub total_sent: u64,
    pub failed_ticks: u64,
    pub conversation_id: Option<String>,
}

/// Per-session status for the sessions endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatusInfo {
    pub index: usize,
    pub healthy: bool,
    pub in_rotation: bool,
    pub sends: u64,
    pub failures: u64,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    /// ISO 8601 timestamp of when the session was authenticated.
    pub created_at: DateTime<Utc>,
}

/// Result of a `start` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StartOutcome {
    /// A new run was registered; pool construction continues in the background.
    Started { credentials: usize, templates: usize },
    /// A run is already in progress; nothing was reset.
    AlreadyRunning,
}
