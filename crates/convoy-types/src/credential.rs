//! Account credentials and the target conversation identifier.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// One raw per-account credential blob.
///
/// Identity is the position in the configured ordered list. The blob is
/// opaque to Convoy: it is handed as-is to the authenticator and never
/// logged or included in `Debug` output.
#[derive(Clone)]
pub struct Credential {
    index: usize,
    blob: Arc<SecretString>,
}

impl Credential {
    pub fn new(index: usize, blob: impl Into<String>) -> Self {
        Self {
            index,
            blob: Arc::new(SecretString::from(blob.into())),
        }
    }

    /// Position of this credential in the configured list.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Expose the raw blob for handing to the authenticator.
    pub fn expose(&self) -> &str {
        self.blob.expose_secret()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("index", &self.index)
            .field("blob", &"[REDACTED]")
            .finish()
    }
}

/// Numeric identifier of the remote conversation all messages go to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ConversationId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConfigError::NonNumericConversation(trimmed.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Conversation metadata returned by a metadata read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationInfo {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub participant_count: Option<u32>,
}
