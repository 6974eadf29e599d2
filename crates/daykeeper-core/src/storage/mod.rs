mod config;
pub mod database;

pub use config::{Config, FeedConfig, HabitsConfig, UserConfig};
pub use database::Database;

use std::path::PathBuf;

/// Returns `~/.config/daykeeper[-dev]/` based on DAYKEEPER_ENV.
///
/// Set DAYKEEPER_ENV=dev to use a development data directory.
///
/// # Errors
/// Returns an error if creating the data directory fails.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("DAYKEEPER_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("daykeeper-dev")
    } else {
        base_dir.join("daykeeper")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
