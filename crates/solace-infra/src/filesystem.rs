//! Data directory resolution.

use std::path::PathBuf;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "SOLACE_DATA_DIR";

/// Resolve the Solace data directory.
///
/// `SOLACE_DATA_DIR` wins, then `~/.solace`, then `./.solace`.
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".solace");
    }

    PathBuf::from(".solace")
}

/// `sqlite://` URL for the transcript database inside `data_dir`.
pub fn database_url(data_dir: &std::path::Path) -> String {
    format!("sqlite://{}?mode=rwc", data_dir.join("solace.db").display())
}
