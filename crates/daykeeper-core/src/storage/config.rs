//! TOML-based application configuration.
//!
//! Stores:
//! - The generated local user identity
//! - Habit defaults (cadence)
//! - Change feed polling behavior
//!
//! Configuration is stored at `~/.config/daykeeper/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use super::data_dir;
use crate::error::ConfigError;

/// Local user identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserConfig {
    /// Generated on first use; identifies this profile as habit owner
    /// and partnership member.
    #[serde(default)]
    pub id: Option<Uuid>,
}

/// Habit defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HabitsConfig {
    /// Cadence applied when `habit add` is given no interval.
    #[serde(default = "default_cadence_days")]
    pub default_cadence_days: u32,
}

/// Change feed polling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Seconds between polls of the change feed.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Emit heartbeat events on quiet polls.
    #[serde(default = "default_true")]
    pub heartbeat: bool,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/daykeeper/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub user: UserConfig,
    #[serde(default)]
    pub habits: HabitsConfig,
    #[serde(default)]
    pub feed: FeedConfig,
}

// Default functions
fn default_cadence_days() -> u32 {
    1
}
fn default_poll_interval() -> u64 {
    5
}
fn default_true() -> bool {
    true
}

impl Default for HabitsConfig {
    fn default() -> Self {
        Self {
            default_cadence_days: default_cadence_days(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            heartbeat: true,
        }
    }
}

impl Config {
    fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("~/.config"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from disk, writing the default config on first run.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path,
                message: e.to_string(),
            }),
            Err(_) => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
        }
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path()?;
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        std::fs::write(&path, content).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })
    }

    /// The local user id, generating and persisting one on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if a freshly generated id cannot be saved.
    pub fn ensure_user_id(&mut self) -> Result<Uuid, ConfigError> {
        if let Some(id) = self.user.id {
            return Ok(id);
        }
        let id = Uuid::new_v4();
        self.user.id = Some(id);
        self.save()?;
        Ok(id)
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let root = toml::Value::try_from(self).ok()?;
        let value = lookup(&root, key)?;
        Some(match value {
            toml::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    /// Set a config value by dot-separated key and persist.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed
    /// to the existing field's type, or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut root = toml::Value::try_from(&*self)
            .map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        set_value(&mut root, key, value)?;
        *self = root
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        self.save()
    }
}

fn lookup<'a>(root: &'a toml::Value, key: &str) -> Option<&'a toml::Value> {
    if key.is_empty() {
        return None;
    }
    let mut current = root;
    for part in key.split('.') {
        current = current.get(part)?;
    }
    Some(current)
}

fn set_value(root: &mut toml::Value, key: &str, value: &str) -> Result<(), ConfigError> {
    let unknown = || ConfigError::UnknownKey(key.to_string());
    let invalid = |message: String| ConfigError::InvalidValue {
        key: key.to_string(),
        message,
    };

    let (parent_path, leaf) = match key.rsplit_once('.') {
        Some((parent, leaf)) => (Some(parent), leaf),
        None => (None, key),
    };
    if leaf.is_empty() {
        return Err(unknown());
    }

    let mut current = root;
    if let Some(parent_path) = parent_path {
        for part in parent_path.split('.') {
            current = current.get_mut(part).ok_or_else(unknown)?;
        }
    }
    let table = current.as_table_mut().ok_or_else(unknown)?;

    // New value takes the type of the field it replaces.
    let new_value = match table.get(leaf) {
        Some(toml::Value::Boolean(_)) => toml::Value::Boolean(
            value.parse().map_err(|_| invalid(format!("cannot parse '{value}' as bool")))?,
        ),
        Some(toml::Value::Integer(_)) => toml::Value::Integer(
            value.parse().map_err(|_| invalid(format!("cannot parse '{value}' as integer")))?,
        ),
        Some(toml::Value::Float(_)) => toml::Value::Float(
            value.parse().map_err(|_| invalid(format!("cannot parse '{value}' as number")))?,
        ),
        Some(toml::Value::String(_)) => toml::Value::String(value.to_string()),
        Some(_) => return Err(invalid("cannot set non-scalar values".to_string())),
        // Optional fields are absent from the table until set. Only
        // user.id qualifies; any other missing leaf is an unknown key.
        None if key == "user.id" => toml::Value::String(value.to_string()),
        None => return Err(unknown()),
    };
    table.insert(leaf.to_string(), new_value);
    Ok(())
}
