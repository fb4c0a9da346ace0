mod config;

pub use config::{
    AudioConfig, Config, RecoveryConfig, SessionDefaults, TimerConfig, WakeLockConfig,
};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns the data directory, creating it if needed.
///
/// `PAHM_DATA_DIR` overrides the location. Otherwise `~/.config/pahm/`, or
/// `~/.config/pahm-dev/` when `PAHM_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("PAHM_DATA_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("PAHM_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("pahm-dev")
            } else {
                base_dir.join("pahm")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
