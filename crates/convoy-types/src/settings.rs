//! Engine settings for Convoy.
//!
//! `DeliverySettings` represents the optional `convoy.toml` that tunes the
//! fixed backoffs, call timeouts, health thresholds and the gateway binding.
//! All fields have sensible defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Timing and health knobs for the delivery engine.
///
/// Loaded from `{config_dir}/convoy.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliverySettings {
    /// Wait between authentication attempts for one credential.
    #[serde(default = "default_auth_retry_secs")]
    pub auth_retry_secs: u64,

    /// Wait after a pool rebuild triggered by zero healthy sessions.
    #[serde(default = "default_recovery_delay_secs")]
    pub recovery_delay_secs: u64,

    /// Wait after a tick fails unexpectedly.
    #[serde(default = "default_error_retry_secs")]
    pub error_retry_secs: u64,

    /// Upper bound on any single authenticate / probe / send call.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    /// Consecutive delivery failures before a session leaves the rotation
    /// (0 keeps failing sessions in rotation forever).
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Literal text sent by the write probe when metadata access fails.
    #[serde(default = "default_probe_message")]
    pub probe_message: String,

    /// Delay before `serve` starts the loop on its own (0 disables).
    #[serde(default = "default_autostart_delay_secs")]
    pub autostart_delay_secs: u64,

    /// Gateway transport binding.
    #[serde(default)]
    pub gateway: GatewaySettings,
}

fn default_auth_retry_secs() -> u64 {
    10
}

fn default_recovery_delay_secs() -> u64 {
    5
}

fn default_error_retry_secs() -> u64 {
    10
}

fn default_call_timeout_secs() -> u64 {
    30
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_probe_message() -> String {
    "🧪 Test".to_string()
}

fn default_autostart_delay_secs() -> u64 {
    3
}

impl DeliverySettings {
    pub fn auth_retry(&self) -> Duration {
        Duration::from_secs(self.auth_retry_secs)
    }

    pub fn recovery_delay(&self) -> Duration {
        Duration::from_secs(self.recovery_delay_secs)
    }

    pub fn error_retry(&self) -> Duration {
        Duration::from_secs(self.error_retry_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    /// Reject values the engine cannot run with.
    ///
    /// A zero call timeout would fail every call before it is sent, and the
    /// gateway client only speaks plain HTTP(S).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.call_timeout_secs == 0 {
            return Err(ConfigError::InvalidSettings(
                "call_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.gateway.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidSettings(
                "gateway.request_timeout_secs must be at least 1".to_string(),
            ));
        }
        let url = &self.gateway.base_url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidSettings(format!(
                "gateway.base_url must be an http(s) URL, got '{url}'"
            )));
        }
        Ok(())
    }
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            auth_retry_secs: default_auth_retry_secs(),
            recovery_delay_secs: default_recovery_delay_secs(),
            error_retry_secs: default_error_retry_secs(),
            call_timeout_secs: default_call_timeout_secs(),
            failure_threshold: default_failure_threshold(),
            probe_message: default_probe_message(),
            autostart_delay_secs: default_autostart_delay_secs(),
            gateway: GatewaySettings::default(),
        }
    }
}

/// Where the account gateway lives and how long to wait on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySettings {
    #[serde(default = "default_gateway_url")]
    pub base_url: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_gateway_url() -> String {
    "http://127.0.0.1:8900".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            base_url: default_gateway_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_settings_default_values() {
        let settings = DeliverySettings::default();
        assert_eq!(settings.auth_retry(), Duration::from_secs(10));
        assert_eq!(settings.recovery_delay(), Duration::from_secs(5));
        assert_eq!(settings.error_retry(), Duration::from_secs(10));
        assert_eq!(settings.call_timeout(), Duration::from_secs(30));
        assert_eq!(settings.failure_threshold, 3);
        assert_eq!(settings.autostart_delay_secs, 3);
        assert_eq!(settings.gateway.base_url, "http://127.0.0.1:8900");
    }

    #[test]
    fn test_validate_rejects_unusable_values() {
        assert!(DeliverySettings::default().validate().is_ok());

        let settings = DeliverySettings {
            call_timeout_secs: 0,
            ..DeliverySettings::default()
        };
        assert_eq!(
            settings.validate().unwrap_err().to_string(),
            "invalid settings: call_timeout_secs must be at least 1"
        );

        let mut settings = DeliverySettings::default();
        settings.gateway.base_url = "gateway.internal:9000".to_string();
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidSettings(msg)) if msg.contains("gateway.internal:9000")
        ));
    }

    #[test]
    fn test_delivery_settings_deserialize_with_defaults() {
        let settings: DeliverySettings = toml::from_str("").unwrap();
        assert_eq!(settings.auth_retry_secs, 10);
        assert_eq!(settings.probe_message, "🧪 Test");
        assert_eq!(settings.gateway.request_timeout_secs, 30);
    }

    #[test]
    fn test_delivery_settings_deserialize_with_values() {
        let toml_str = r#"
auth_retry_secs = 2
recovery_delay_secs = 1
failure_threshold = 5
probe_message = "ping"

[gateway]
base_url = "http://gateway.internal:9000"
"#;
        let settings: DeliverySettings = toml::from_str(toml_str).unwrap();
        assert_eq!(settings.auth_retry(), Duration::from_secs(2));
        assert_eq!(settings.recovery_delay(), Duration::from_secs(1));
        assert_eq!(settings.error_retry_secs, 10);
        assert_eq!(settings.failure_threshold, 5);
        assert_eq!(settings.probe_message, "ping");
        assert_eq!(settings.gateway.base_url, "http://gateway.internal:9000");
        assert_eq!(settings.gateway.request_timeout_secs, 30);
    }
}
