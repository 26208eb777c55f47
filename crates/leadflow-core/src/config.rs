//! TOML configuration with serde defaults and env-var secret overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::LeadflowError;

/// Top-level Leadflow configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub zapi: ZapiConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

/// Z-API (WhatsApp gateway) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZapiConfig {
    #[serde(default = "default_zapi_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub instance_id: String,
    #[serde(default)]
    pub instance_token: String,
    /// Account-level security token, sent as the `Client-Token` header.
    #[serde(default)]
    pub client_token: String,
    /// Phone numbers of this bot and any sibling bots. Inbound events from
    /// these numbers are dropped so bots never answer each other.
    #[serde(default)]
    pub service_numbers: Vec<String>,
}

impl Default for ZapiConfig {
    fn default() -> Self {
        Self {
            base_url: default_zapi_base_url(),
            instance_id: String::new(),
            instance_token: String::new(),
            client_token: String::new(),
            service_numbers: Vec::new(),
        }
    }
}

/// AI responder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// Gemini API key. Empty = responder disabled (fixed fallback reply).
    #[serde(default)]
    pub api_key: String,
    /// Model identifiers in preference order.
    #[serde(default = "default_models")]
    pub models: Vec<String>,
    /// Retry attempts per model before falling through to the next.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay for exponential backoff, in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            models: default_models(),
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

/// Storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// How many past messages are fed to the AI responder.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            history_limit: default_history_limit(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// Bearer token for the operator `/api/*` routes. Empty = no auth.
    /// The webhook route is always open (platform callbacks carry no bearer).
    #[serde(default)]
    pub api_key: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
            api_key: String::new(),
        }
    }
}

/// Lead-completion notification settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NotifyConfig {
    /// Operator number that receives the qualified-lead summary.
    /// Empty = notifications disabled.
    #[serde(default)]
    pub admin_phone: String,
}

fn default_name() -> String {
    "Leadflow".to_string()
}

fn default_data_dir() -> String {
    "~/.leadflow".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_zapi_base_url() -> String {
    "https://api.z-api.io/instances".to_string()
}

fn default_models() -> Vec<String> {
    vec![
        "gemini-2.5-flash".to_string(),
        "gemini-2.5-flash-lite".to_string(),
        "gemini-2.0-flash".to_string(),
    ]
}

fn default_max_retries() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_db_path() -> String {
    "~/.leadflow/data/leadflow.db".to_string()
}

fn default_history_limit() -> usize {
    10
}

fn default_api_host() -> String {
    "127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
    3000
}

/// Load config from a TOML file, falling back to defaults when absent.
///
/// Secrets can be supplied via environment instead of the file:
/// `GEMINI_API_KEY` and `ZAPI_CLIENT_TOKEN` override their config fields
/// when set and non-empty.
pub fn load(path: &str) -> Result<Config, LeadflowError> {
    let path = Path::new(path);

    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path).map_err(|e| {
            LeadflowError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        toml::from_str(&content)
            .map_err(|e| LeadflowError::Config(format!("failed to parse config: {e}")))?
    } else {
        tracing::info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        Config::default()
    };

    if let Ok(key) = std::env::var("GEMINI_API_KEY") {
        if !key.is_empty() {
            config.ai.api_key = key;
        }
    }
    if let Ok(token) = std::env::var("ZAPI_CLIENT_TOKEN") {
        if !token.is_empty() {
            config.zapi.client_token = token;
        }
    }

    Ok(config)
}
