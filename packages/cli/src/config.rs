use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use verso_server::HubConfig;

pub const DEFAULT_CONFIG_NAME: &str = "verso.config.json";

/// Verso configuration file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Queue capacity of each document worker
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,

    /// Undelivered broadcasts kept per client
    #[serde(default = "default_client_buffer")]
    pub client_buffer: usize,

    /// tracing filter used when RUST_LOG is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_command_buffer() -> usize {
    HubConfig::default().command_buffer
}

fn default_client_buffer() -> usize {
    HubConfig::default().client_buffer
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Config {
    /// Load config from a directory
    pub fn load(cwd: &str) -> anyhow::Result<Self> {
        let config_path = PathBuf::from(cwd).join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            command_buffer: self.command_buffer,
            client_buffer: self.client_buffer,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            command_buffer: default_command_buffer(),
            client_buffer: default_client_buffer(),
            log_filter: default_log_filter(),
        }
    }
}
