//! Store connection configuration.
//!
//! # Responsibility
//! - Read the document store connection parameters once at process start.
//! - Fail fast when any required parameter is absent.
//!
//! # Invariants
//! - Blank values are treated as missing.
//! - `api_key` never appears in `Debug` output or logs.

use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::path::PathBuf;

pub const ENV_API_KEY: &str = "STICKYNOTE_API_KEY";
pub const ENV_AUTH_DOMAIN: &str = "STICKYNOTE_AUTH_DOMAIN";
pub const ENV_PROJECT_ID: &str = "STICKYNOTE_PROJECT_ID";
pub const ENV_STORAGE_BUCKET: &str = "STICKYNOTE_STORAGE_BUCKET";
pub const ENV_MESSAGING_SENDER_ID: &str = "STICKYNOTE_MESSAGING_SENDER_ID";
pub const ENV_APP_ID: &str = "STICKYNOTE_APP_ID";
pub const ENV_DATA_DIR: &str = "STICKYNOTE_DATA_DIR";

const REQUIRED_VARS: [&str; 6] = [
    ENV_API_KEY,
    ENV_AUTH_DOMAIN,
    ENV_PROJECT_ID,
    ENV_STORAGE_BUCKET,
    ENV_MESSAGING_SENDER_ID,
    ENV_APP_ID,
];

/// Configuration loading errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Every required variable that was absent or blank.
    MissingVars(Vec<&'static str>),
    InvalidProjectId(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingVars(names) => {
                write!(f, "missing required configuration: {}", names.join(", "))
            }
            Self::InvalidProjectId(value) => write!(
                f,
                "project id `{value}` is invalid; expected lowercase letters, digits, `_` or `-`"
            ),
        }
    }
}

impl Error for ConfigError {}

/// Connection parameters for the document store.
#[derive(Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub api_key: String,
    pub auth_domain: String,
    pub project_id: String,
    pub storage_bucket: String,
    pub messaging_sender_id: String,
    pub app_id: String,
    /// Directory holding the project database file.
    pub data_dir: PathBuf,
}

impl StoreConfig {
    /// Loads configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary key lookup.
    ///
    /// # Errors
    /// - `MissingVars` lists all absent required keys, not only the first.
    /// - `InvalidProjectId` when the project id has characters outside
    ///   `[a-z0-9_-]`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let values = REQUIRED_VARS.map(|key| read(key));
        let missing: Vec<&'static str> = REQUIRED_VARS
            .iter()
            .zip(values.iter())
            .filter(|(_, value)| value.is_none())
            .map(|(key, _)| *key)
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingVars(missing));
        }

        let [api_key, auth_domain, project_id, storage_bucket, messaging_sender_id, app_id] =
            values.map(Option::unwrap_or_default);
        let config = Self {
            api_key,
            auth_domain,
            project_id,
            storage_bucket,
            messaging_sender_id,
            app_id,
            data_dir: read(ENV_DATA_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
        };

        if !is_valid_project_id(&config.project_id) {
            return Err(ConfigError::InvalidProjectId(config.project_id));
        }
        Ok(config)
    }

    /// Returns the database file path for this project.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.sqlite3", self.project_id))
    }
}

impl Debug for StoreConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("api_key", &"<redacted>")
            .field("auth_domain", &self.auth_domain)
            .field("project_id", &self.project_id)
            .field("storage_bucket", &self.storage_bucket)
            .field("messaging_sender_id", &self.messaging_sender_id)
            .field("app_id", &self.app_id)
            .field("data_dir", &self.data_dir)
            .finish()
    }
}

fn is_valid_project_id(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}
