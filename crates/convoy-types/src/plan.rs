//! The delivery plan: everything loaded from the configuration directory
//! before a run can start.

use serde::{Deserialize, Serialize};

use crate::credential::{ConversationId, Credential};

/// Default pause between delivery ticks when `delay.txt` is absent or unusable.
pub const DEFAULT_DELAY_SECS: u64 = 10;

/// Immutable inputs of one delivery run.
#[derive(Debug, Clone)]
pub struct DeliveryPlan {
    /// Ordered credential blobs; the index is the session identity.
    pub credentials: Vec<Credential>,
    /// Conversation every message is delivered to.
    pub conversation_id: ConversationId,
    /// Message templates replayed cyclically.
    pub templates: Vec<String>,
    /// Name pools for the random display-name prefix.
    pub names: NameLists,
    /// Pause between ticks after a delivery attempt.
    pub delay_secs: u64,
}

impl DeliveryPlan {
    /// Summary suitable for `convoy check` output.
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            conversation_id: self.conversation_id.to_string(),
            credentials: self.credentials.len(),
            templates: self.templates.len(),
            first_names: self.names.first.len(),
            last_names: self.names.last.len(),
            delay_secs: self.delay_secs,
        }
    }
}

/// Two independent name pools. Either may be empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NameLists {
    pub first: Vec<String>,
    pub last: Vec<String>,
}

/// Counts describing a loaded plan (never includes credential material).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub conversation_id: String,
    pub credentials: usize,
    pub templates: usize,
    pub first_names: usize,
    pub last_names: usize,
    pub delay_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts() {
        let plan = DeliveryPlan {
            credentials: vec![Credential::new(0, "a"), Credential::new(1, "b")],
            conversation_id: "42".parse().unwrap(),
            templates: vec!["one".into(), "two".into(), "three".into()],
            names: NameLists {
                first: vec!["Ada".into()],
                last: vec![],
            },
            delay_secs: DEFAULT_DELAY_SECS,
        };
        let summary = plan.summary();
        assert_eq!(summary.conversation_id, "42");
        assert_eq!(summary.credentials, 2);
        assert_eq!(summary.templates, 3);
        assert_eq!(summary.first_names, 1);
        assert_eq!(summary.last_names, 0);
        assert_eq!(summary.delay_secs, 10);
    }
}
