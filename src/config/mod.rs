//! Configuration module.
//!
//! Configuration is merged from three layers, later layers winning:
//! compiled defaults, a `config.json` file in the working directory, and
//! environment overrides (`QUIZ__…` prefixed variables plus the plain
//! `HOST` / `PORT` variables).

pub mod loader;

pub use loader::load;

use serde::{Deserialize, Serialize};

/// Root configuration struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Bind address for the WebSocket server
    #[serde(default = "default_host")]
    pub host: String,
    /// Bind port for the WebSocket server
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub server: ServerTuning,
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            server: ServerTuning::default(),
            store: StoreSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Server behavior knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerTuning {
    /// Length of generated room codes
    #[serde(default = "default_code_length")]
    pub code_length: usize,
    /// Attempts before giving up on a collision-free room code
    #[serde(default = "default_code_attempts")]
    pub code_attempts: usize,
    /// Per-session outbound frame queue capacity
    #[serde(default = "default_send_queue_capacity")]
    pub send_queue_capacity: usize,
    /// Maximum accepted inbound frame size in bytes
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    /// Comma-separated allowed CORS origins, or "*"
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,
}

impl Default for ServerTuning {
    fn default() -> Self {
        Self {
            code_length: default_code_length(),
            code_attempts: default_code_attempts(),
            send_queue_capacity: default_send_queue_capacity(),
            max_message_size: default_max_message_size(),
            cors_origins: default_cors_origins(),
        }
    }
}

/// Persistence backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(default)]
    pub backend: StoreBackend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Optional tracing level directive; `RUST_LOG` is used when absent
    #[serde(default)]
    pub level: Option<String>,
    /// Format for rendered logs
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    /// Directory path for log files
    #[serde(default = "default_log_dir")]
    pub dir: String,
    /// Log file base name
    #[serde(default = "default_log_filename")]
    pub filename: String,
    /// Rotation policy: "daily" (default), "hourly", or "never"
    #[serde(default = "default_rotation")]
    pub rotation: String,
    /// Enable rolling file logging in addition to stdout
    #[serde(default)]
    pub enable_file_logging: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: None,
            format: default_log_format(),
            dir: default_log_dir(),
            filename: default_log_filename(),
            rotation: default_rotation(),
            enable_file_logging: false,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8765
}

fn default_code_length() -> usize {
    crate::protocol::DEFAULT_CODE_LENGTH
}

fn default_code_attempts() -> usize {
    32
}

fn default_send_queue_capacity() -> usize {
    64
}

fn default_max_message_size() -> usize {
    65536 // 64KB
}

fn default_cors_origins() -> String {
    "*".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Text
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_log_filename() -> String {
    "server.log".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}
