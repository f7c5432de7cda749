//! Host configuration

use analysis::AnalysisConfig;
use config::{Config, ConfigError, Environment, File};
use detection_loop::LoopConfig;
use dms::DmsConfig;
use serde::{Deserialize, Serialize};

use crate::simulator::SimulationConfig;

/// Default configuration file, without extension
pub const CONFIG_FILE: &str = "config/fatigue-monitor";

/// Environment variable prefix (`FATIGUE__SERVER__PORT=9000`)
pub const ENV_PREFIX: &str = "FATIGUE";

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// All host settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,
    /// Emit JSON log lines
    pub log_json: bool,
    pub server: ServerConfig,
    pub dms: DmsConfig,
    pub detection: LoopConfig,
    pub analysis: AnalysisConfig,
    pub simulation: SimulationConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_json: false,
            server: ServerConfig::default(),
            dms: DmsConfig::default(),
            detection: LoopConfig::default(),
            analysis: AnalysisConfig::default(),
            simulation: SimulationConfig::default(),
        }
    }
}

impl Settings {
    /// Built-in defaults, then the optional config file, then environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(CONFIG_FILE)
    }

    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
