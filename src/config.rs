use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub connection: ConnectionConfig,
    pub trade: TradeConfig,
    pub coordination: CoordinationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Interception host address
    pub host: String,
    /// Port used by the first process; the second one uses `base_port + 1`
    pub base_port: u16,
    /// Window allowed for the host to answer before giving up
    pub connect_timeout_ms: u64,
    /// Poll interval while waiting on session milestones
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval() -> u64 {
    500
}

impl ConnectionConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradeConfig {
    /// Orchestrator tick
    pub tick_interval_ms: u64,
    /// Delay between accepting and confirming a trade. Empirical, not a protocol guarantee.
    pub confirm_delay_ms: u64,
    /// Poll interval while waiting to enter a room
    #[serde(default = "default_poll_interval")]
    pub room_poll_ms: u64,
}

impl TradeConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn confirm_delay(&self) -> Duration {
        Duration::from_millis(self.confirm_delay_ms)
    }

    pub fn room_poll(&self) -> Duration {
        Duration::from_millis(self.room_poll_ms)
    }
}

impl Default for TradeConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1_000,
            confirm_delay_ms: 3_150,
            room_poll_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CoordinationConfig {
    /// Host-wide name of the startup gate
    pub gate_name: String,
    /// Maximum number of sibling processes allowed to run alongside this one
    pub max_siblings: usize,
    /// Poll interval while waiting on the gate
    #[serde(default = "default_gate_poll")]
    pub gate_poll_ms: u64,
    /// Directory holding the gate and the process registry (default: user runtime dir)
    #[serde(default)]
    pub runtime_dir: Option<PathBuf>,
}

fn default_gate_poll() -> u64 {
    100
}

impl CoordinationConfig {
    pub fn gate_poll(&self) -> Duration {
        Duration::from_millis(self.gate_poll_ms)
    }

    pub fn resolved_runtime_dir(&self) -> PathBuf {
        self.runtime_dir.clone().unwrap_or_else(|| {
            dirs::runtime_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("traderup")
        })
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
    /// Directory for the daily rolling log file (disabled when unset)
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    "debug".to_string()
}

impl AppConfig {
    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("connection.host", "127.0.0.1")?
            .set_default("connection.base_port", 9092)?
            .set_default("connection.connect_timeout_ms", 2_500)?
            .set_default("connection.poll_interval_ms", 500)?
            .set_default("trade.tick_interval_ms", 1_000)?
            .set_default("trade.confirm_delay_ms", 3_150)?
            .set_default("trade.room_poll_ms", 500)?
            .set_default("coordination.gate_name", "TraderUpProcessSynchronization")?
            .set_default("coordination.max_siblings", 1)?
            .set_default("coordination.gate_poll_ms", 100)?
            .set_default("logging.level", "debug")?
            .set_default("logging.json", false)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("TRADERUP_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (TRADERUP__CONNECTION__HOST, etc.)
            .add_source(
                Environment::with_prefix("TRADERUP")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Built-in configuration, used by tests and when no config directory exists
    pub fn default_config() -> Self {
        Self {
            connection: ConnectionConfig {
                host: "127.0.0.1".to_string(),
                base_port: 9092,
                connect_timeout_ms: 2_500,
                poll_interval_ms: 500,
            },
            trade: TradeConfig::default(),
            coordination: CoordinationConfig {
                gate_name: "TraderUpProcessSynchronization".to_string(),
                max_siblings: 1,
                gate_poll_ms: 100,
                runtime_dir: None,
            },
            logging: LoggingConfig {
                level: default_log_level(),
                json: false,
                dir: None,
            },
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.connection.host.trim().is_empty() {
            errors.push("connection.host must not be empty".to_string());
        }

        if self.connection.base_port == 0 || self.connection.base_port == u16::MAX {
            errors.push("connection.base_port must leave room for a sibling port".to_string());
        }

        if self.connection.connect_timeout_ms == 0 {
            errors.push("connection.connect_timeout_ms must be positive".to_string());
        }

        if self.trade.tick_interval_ms == 0 {
            errors.push("trade.tick_interval_ms must be positive".to_string());
        }

        if self.coordination.gate_name.is_empty()
            || self
                .coordination
                .gate_name
                .contains(|c: char| c == '/' || c == '\\')
        {
            errors.push("coordination.gate_name must be a plain, non-empty name".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
