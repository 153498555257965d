//! Global configuration loader for Solace.
//!
//! Reads `config.toml` from the data directory (`~/.solace/` in production)
//! and deserializes it into [`GlobalConfig`]. Falls back to defaults when the
//! file is missing, unreadable, malformed, or fails validation.

use std::path::Path;

use solace_types::config::GlobalConfig;

pub const CONFIG_FILE: &str = "config.toml";

/// Load global configuration from `{data_dir}/config.toml`.
pub async fn load_global_config(data_dir: &Path) -> GlobalConfig {
    let config_path = data_dir.join(CONFIG_FILE);

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
    };

    let config = match toml::from_str::<GlobalConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            return GlobalConfig::default();
        }
    };

    if let Err(err) = config.validate() {
        tracing::warn!("{}: {err}, using defaults", config_path.display());
        return GlobalConfig::default();
    }

    config
}

/// Render a configuration back to TOML for `solace config`.
pub fn render_config(config: &GlobalConfig) -> Result<String, toml::ser::Error> {
    toml::to_string_pretty(config)
}
