use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level application configuration, loaded from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub client: ClientConfig,
    pub analytics: AnalyticsConfig,
    pub refresh: RefreshConfig,
}

impl AppConfig {
    /// Load configuration from default path (~/.config/convo-dash/config.toml),
    /// falling back to defaults if the file doesn't exist.
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Write current configuration to the default path.
    pub fn save(&self) -> anyhow::Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;
        Ok(())
    }

    /// Default config file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("convo-dash")
            .join("config.toml")
    }

    /// Data directory for the message store.
    pub fn data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("convo-dash")
    }

    /// Store directory, resolving the default when none is configured.
    pub fn store_dir(&self) -> PathBuf {
        self.store
            .data_dir
            .clone()
            .unwrap_or_else(|| Self::data_dir().join("store"))
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Port.
    pub port: u16,
    /// Bearer token for authentication (None = no auth).
    pub auth_token: Option<String>,
    /// Enable CORS.
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
            auth_token: None,
            cors: true,
        }
    }
}

/// Message store configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding `messages.json` and `analysis.json`.
    pub data_dir: Option<PathBuf>,
}

/// API client configuration, used by the CLI dashboard commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the message store API.
    pub api_base: String,
    /// Optional bearer token sent with every request.
    pub auth_token: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: "http://127.0.0.1:8080".into(),
            auth_token: None,
            timeout_secs: 30,
        }
    }
}

/// Policy knobs for the aggregation engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Delivery statuses recorded before this instant are ignored.
    pub status_epoch: DateTime<Utc>,
    /// Conversation ids matching this pattern are well-formed phone numbers;
    /// failures on anything else are attributed to an incorrect number.
    pub valid_number_pattern: String,
    /// First SLA bucket, in minutes.
    pub sla_fast_mins: u32,
    /// Second SLA bucket, in minutes.
    pub sla_slow_mins: u32,
    /// Response latencies at or above this many minutes are outliers.
    pub max_response_mins: u32,
    /// Number of trailing days in the activity sparkline.
    pub sparkline_days: u32,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            status_epoch: default_status_epoch(),
            valid_number_pattern: r"^966\d{9}$".into(),
            sla_fast_mins: 5,
            sla_slow_mins: 15,
            max_response_mins: 1440,
            sparkline_days: 7,
        }
    }
}

fn default_status_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 12, 31, 12, 28, 0)
        .single()
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Periodic dashboard refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub enabled: bool,
    /// Cron expression (5, 6 or 7 fields; 7 fields include seconds).
    pub cron: String,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cron: "*/30 * * * * * *".into(),
        }
    }
}
