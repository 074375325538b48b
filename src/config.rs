//! Runtime settings.
//!
//! Loaded from a TOML file (`--config`, else `./form13f.toml`, else the user
//! config directory), then overridden by environment variables. Every field
//! has a default, so an empty file or no file at all is valid.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::llm::ProviderKind;

/// Config file name looked up in the working directory.
pub const CONFIG_FILENAME: &str = "form13f.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Per-provider model settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Model name; the provider default when unset.
    pub model: Option<String>,
    /// API base URL; the public endpoint when unset.
    pub endpoint: Option<String>,
    /// API key. Usually supplied through the environment instead.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

/// Model-backed extraction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Providers in fallback order.
    pub providers: Vec<ProviderKind>,
    pub openai: ProviderSettings,
    pub gemini: ProviderSettings,
    /// Attempts per provider before moving to the next.
    pub max_attempts: u32,
    pub max_content_chars: usize,
    /// Chunks of one document in flight at once.
    pub concurrency: usize,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            providers: vec![ProviderKind::OpenAi, ProviderKind::Gemini],
            openai: ProviderSettings::default(),
            gemini: ProviderSettings::default(),
            max_attempts: 3,
            max_content_chars: 100_000,
            concurrency: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Directory the local artifact store writes under.
    pub root: PathBuf,
    /// Logical key prefix for artifacts.
    pub prefix: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            root: default_data_dir().join("artifacts"),
            prefix: "holdings".to_string(),
        }
    }
}

/// Application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub file_workers: usize,
    pub record_workers: usize,
    /// JSON list of accession ids or CIKs to process first.
    pub priority_file: Option<PathBuf>,
    /// List the store before each run instead of trusting the cached inventory.
    pub refresh_inventory: bool,
    /// Largest tolerated fraction of skipped rows in a tier-2 table.
    pub skipped_row_threshold: f64,
    pub fetch_max_attempts: u32,
    pub persist_max_attempts: u32,
    /// Delay between requests to one host.
    pub request_delay_ms: u64,
    pub request_timeout_secs: u64,
    /// Contact user agents, rotated per retry.
    pub user_agents: Vec<String>,
    pub model: ModelSettings,
    pub storage: StorageSettings,
    pub log_csv: PathBuf,
    pub inventory_csv: PathBuf,
    pub batches_dir: PathBuf,
}

/// Default base directory: `~/Documents/form13f`, falling back to the home
/// directory, then the working directory.
pub fn default_data_dir() -> PathBuf {
    dirs::document_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("form13f")
}

impl Default for Settings {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            file_workers: 4,
            record_workers: 1,
            priority_file: None,
            refresh_inventory: true,
            skipped_row_threshold: 0.10,
            fetch_max_attempts: 3,
            persist_max_attempts: 3,
            request_delay_ms: 150,
            request_timeout_secs: 60,
            user_agents: Vec::new(),
            model: ModelSettings::default(),
            storage: StorageSettings::default(),
            log_csv: data_dir.join("run_log.csv"),
            inventory_csv: data_dir.join("inventory.csv"),
            batches_dir: data_dir.join("batches"),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Settings {
    /// Parse settings from TOML text.
    pub fn from_toml(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Resolve the config file to read, if any.
    pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        let local = PathBuf::from(CONFIG_FILENAME);
        if local.exists() {
            return Some(local);
        }
        dirs::config_dir()
            .map(|d| d.join("form13f").join("config.toml"))
            .filter(|p| p.exists())
    }

    /// Load from file (if any) and the process environment.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = match Self::locate(explicit) {
            Some(path) => {
                debug!("Loading config from {}", path.display());
                let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                    path: path.clone(),
                    source,
                })?;
                Self::from_toml(&text, &path)?
            }
            None => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Apply environment overrides read through `lookup`.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(v) = lookup("FORM13F_FILE_WORKERS") {
            self.file_workers = parse_env("FORM13F_FILE_WORKERS", &v)?;
        }
        if let Some(v) = lookup("FORM13F_RECORD_WORKERS") {
            self.record_workers = parse_env("FORM13F_RECORD_WORKERS", &v)?;
        }
        if let Some(v) = lookup("FORM13F_PRIORITY_FILE") {
            self.priority_file = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("FORM13F_REFRESH_INVENTORY") {
            self.refresh_inventory = parse_bool("FORM13F_REFRESH_INVENTORY", &v)?;
        }
        if let Some(v) = lookup("FORM13F_SKIPPED_ROW_THRESHOLD") {
            self.skipped_row_threshold = parse_env("FORM13F_SKIPPED_ROW_THRESHOLD", &v)?;
        }
        if let Some(v) = lookup("FORM13F_REQUEST_DELAY_MS") {
            self.request_delay_ms = parse_env("FORM13F_REQUEST_DELAY_MS", &v)?;
        }
        if let Some(v) = lookup("FORM13F_USER_AGENTS") {
            self.user_agents = split_list(&v);
        }
        if let Some(v) = lookup("FORM13F_STORAGE_ROOT") {
            self.storage.root = PathBuf::from(v);
        }
        if let Some(v) = lookup("FORM13F_BATCHES_DIR") {
            self.batches_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("FORM13F_LOG_CSV") {
            self.log_csv = PathBuf::from(v);
        }
        if let Some(v) = lookup("MODEL_PROVIDER") {
            let mut providers = Vec::new();
            for name in split_list(&v) {
                let kind =
                    ProviderKind::from_str(&name).ok_or_else(|| ConfigError::InvalidValue {
                        key: "MODEL_PROVIDER".to_string(),
                        value: name.clone(),
                    })?;
                providers.push(kind);
            }
            self.model.providers = providers;
        }
        if let Some(v) = lookup("OPENAI_API_KEY") {
            self.model.openai.api_key = Some(v);
        }
        if let Some(v) = lookup("OPENAI_BASE_URL") {
            self.model.openai.endpoint = Some(v);
        }
        if let Some(v) = lookup("GEMINI_API_KEY") {
            self.model.gemini.api_key = Some(v);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.skipped_row_threshold) {
            return Err(ConfigError::InvalidValue {
                key: "skipped_row_threshold".to_string(),
                value: self.skipped_row_threshold.to_string(),
            });
        }
        if self.file_workers == 0 || self.record_workers == 0 {
            return Err(ConfigError::InvalidValue {
                key: "file_workers/record_workers".to_string(),
                value: format!("{}/{}", self.file_workers, self.record_workers),
            });
        }
        Ok(())
    }
}
