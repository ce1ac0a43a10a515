//! Server configuration module
//!
//! Handles loading and parsing of server configuration from files and environment variables.
//! Game limits (room size, name and word lengths) are fixed rules, not configuration.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "pretty" => Some(LogFormat::Pretty),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Path to the configuration file
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Whether `config_path` existed; defaults were used otherwise
    #[serde(skip)]
    pub from_file: bool,

    /// Address to bind listeners on
    #[serde(default = "default_host")]
    pub host: String,

    /// WebSocket port for game clients
    #[serde(default = "default_websocket_port")]
    pub websocket_port: u16,

    /// Status API port
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Whether to serve the status API
    #[serde(default = "default_true")]
    pub api_enabled: bool,

    /// Newline-separated word file; the built-in list is used when unset
    #[serde(default)]
    pub dictionary_path: Option<PathBuf>,

    /// Maximum simultaneous connections from one IP
    #[serde(default = "default_max_connections_per_ip")]
    pub max_connections_per_ip: usize,

    /// Seconds without an inbound frame before a connection is closed
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Outbound messages queued per connection before it counts as dead
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,

    /// Inbound events queued for the dispatcher
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// Log output format
    #[serde(default)]
    pub log_format: LogFormat,
}

// Default value functions
fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_websocket_port() -> u16 {
    8765
}

fn default_api_port() -> u16 {
    8766
}

fn default_true() -> bool {
    true
}

fn default_max_connections_per_ip() -> usize {
    10
}

fn default_idle_timeout() -> u64 {
    300 // 5 minutes
}

fn default_outbound_buffer() -> usize {
    64
}

fn default_event_buffer() -> usize {
    256
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("config/server.toml"),
            from_file: false,
            host: default_host(),
            websocket_port: default_websocket_port(),
            api_port: default_api_port(),
            api_enabled: default_true(),
            dictionary_path: None,
            max_connections_per_ip: default_max_connections_per_ip(),
            idle_timeout_secs: default_idle_timeout(),
            outbound_buffer: default_outbound_buffer(),
            event_buffer: default_event_buffer(),
            log_format: LogFormat::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from file and environment variables.
    ///
    /// Runs before logging is set up, so a missing file is reported through
    /// `from_file` rather than logged here.
    pub async fn load() -> Result<Self> {
        let config_path = env::var("WORDCHAIN_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/server.toml"));

        let mut config = Self::load_from(config_path).await?;

        // Override with environment variables
        config.apply_env_overrides();

        config.validate()?;

        Ok(config)
    }

    /// Read a config file, falling back to defaults when it does not exist
    pub async fn load_from(config_path: PathBuf) -> Result<Self> {
        let mut config = if config_path.exists() {
            let content = tokio::fs::read_to_string(&config_path)
                .await
                .with_context(|| {
                    format!("Failed to read config file: {}", config_path.display())
                })?;

            let mut config = Self::from_toml(&content).with_context(|| {
                format!("Failed to parse config file: {}", config_path.display())
            })?;
            config.from_file = true;
            config
        } else {
            Self::default()
        };

        config.config_path = config_path;
        Ok(config)
    }

    /// Parse a TOML document; missing keys take their defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("WORDCHAIN_HOST") {
            self.host = val;
        }
        if let Some(port) = lookup("WORDCHAIN_WEBSOCKET_PORT").and_then(|v| v.parse().ok()) {
            self.websocket_port = port;
        }
        if let Some(port) = lookup("WORDCHAIN_API_PORT").and_then(|v| v.parse().ok()) {
            self.api_port = port;
        }
        if let Some(val) = lookup("WORDCHAIN_API_ENABLED") {
            self.api_enabled = val.to_lowercase() == "true" || val == "1";
        }
        if let Some(val) = lookup("WORDCHAIN_DICTIONARY") {
            self.dictionary_path = Some(PathBuf::from(val));
        }
        if let Some(max) = lookup("WORDCHAIN_MAX_CONNECTIONS_PER_IP").and_then(|v| v.parse().ok())
        {
            self.max_connections_per_ip = max;
        }
        if let Some(format) = lookup("WORDCHAIN_LOG_FORMAT").and_then(|v| LogFormat::parse(&v)) {
            self.log_format = format;
        }
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.websocket_port == 0 || self.api_port == 0 {
            anyhow::bail!("Ports must be non-zero");
        }
        if self.api_enabled && self.websocket_port == self.api_port {
            anyhow::bail!("WebSocket port and API port must be different");
        }
        if self.max_connections_per_ip == 0 {
            anyhow::bail!("max_connections_per_ip must be at least 1");
        }
        if self.idle_timeout_secs == 0 {
            anyhow::bail!("idle_timeout_secs must be at least 1");
        }
        if self.outbound_buffer == 0 || self.event_buffer == 0 {
            anyhow::bail!("Queue sizes must be at least 1");
        }

        Ok(())
    }

    /// WebSocket listen address
    pub fn websocket_addr(&self) -> String {
        format!("{}:{}", self.host, self.websocket_port)
    }

    /// Status API listen address
    pub fn api_addr(&self) -> String {
        format!("{}:{}", self.host, self.api_port)
    }
}
