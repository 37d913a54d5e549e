//! Engine settings loader.
//!
//! Reads `convoy.toml` from the configuration directory and deserializes it
//! into [`DeliverySettings`]. Falls back to defaults when the file is missing,
//! malformed, or holds values the engine cannot run with.

use std::path::Path;

use convoy_types::error::ConfigError;
use convoy_types::settings::DeliverySettings;

/// Name of the optional settings file inside the configuration directory.
pub const SETTINGS_FILE: &str = "convoy.toml";

/// Load engine settings from `{config_dir}/convoy.toml`.
///
/// - If the file does not exist, returns [`DeliverySettings::default()`].
/// - If the file exists but fails to parse or validate, logs a warning and
///   returns the default.
/// - Otherwise returns the parsed settings.
pub async fn load_settings(config_dir: &Path) -> DeliverySettings {
    let settings_path = config_dir.join(SETTINGS_FILE);

    let content = match tokio::fs::read_to_string(&settings_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No {SETTINGS_FILE} found at {}, using defaults", settings_path.display());
            return DeliverySettings::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", settings_path.display());
            return DeliverySettings::default();
        }
    };

    match parse_settings(&content) {
        Ok(settings) => settings,
        Err(err) => {
            tracing::warn!("Ignoring {}: {err}, using defaults", settings_path.display());
            DeliverySettings::default()
        }
    }
}

/// Parse and validate the content of a settings file.
pub fn parse_settings(content: &str) -> Result<DeliverySettings, ConfigError> {
    let settings: DeliverySettings = toml::from_str(content)
        .map_err(|e| ConfigError::InvalidSettings(e.message().to_string()))?;
    settings.validate()?;
    Ok(settings)
}
