//! Agent configuration.
//!
//! Settings are resolved with priority:
//! 1. Environment variables (`CMDBC_API_SERVER`, `CMDBC_API_USERNAME`,
//!    `CMDBC_API_PASSWORD`, `CMDBC_HOST_NAME`, `CMDBC_STATE_DIR`)
//! 2. Config file (`~/.config/cmdbc/config.toml` or an explicit path)
//! 3. Default values

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cloud::config::{DEFAULT_SERVER_URL, Endpoints};
use crate::cloud::ApiConfig;

pub const ENV_API_SERVER: &str = "CMDBC_API_SERVER";
pub const ENV_API_USERNAME: &str = "CMDBC_API_USERNAME";
pub const ENV_API_PASSWORD: &str = "CMDBC_API_PASSWORD";
pub const ENV_HOST_NAME: &str = "CMDBC_HOST_NAME";
pub const ENV_STATE_DIR: &str = "CMDBC_STATE_DIR";

/// Configuration file structure
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    api: ApiSection,
    paths: PathsSection,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ApiSection {
    /// Server base URL (e.g., "https://cmdb.example.com")
    server: Option<String>,
    username: Option<String>,
    password: Option<String>,
    client_id: Option<String>,
    host_name: Option<String>,
    header_timeout_secs: Option<u64>,
    endpoints: Option<Endpoints>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct PathsSection {
    state_dir: Option<PathBuf>,
    change_log: Option<PathBuf>,
}

/// Runtime agent configuration
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub api: ApiConfig,
    /// Directory holding local baselines
    pub state_dir: PathBuf,
    /// Append-only change log file
    pub change_log: PathBuf,
    /// Where the server URL came from (for logging)
    pub source: ConfigSource,
}

impl Default for AgentConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            api: ApiConfig {
                host_name: default_host_name(),
                ..Default::default()
            },
            state_dir: data_dir.join("state"),
            change_log: data_dir.join("change.log"),
            source: ConfigSource::Default,
        }
    }
}

/// Where the configuration came from
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigSource {
    /// Using default hardcoded values
    Default,
    /// Loaded from environment variable
    Environment,
    /// Loaded from config file
    ConfigFile,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::ConfigFile => write!(f, "config file"),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".local").join("share")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cmdbc")
}

fn default_host_name() -> String {
    ["HOSTNAME", "COMPUTERNAME"]
        .iter()
        .find_map(|var| std::env::var(var).ok())
        .or_else(|| fs::read_to_string("/etc/hostname").ok())
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

/// Get the path to the configuration file
pub fn get_config_file_path() -> Option<PathBuf> {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .map(|p| p.join("cmdbc").join("config.toml"))
}

/// Get the path to the config file for documentation purposes
pub fn get_config_file_path_string() -> String {
    get_config_file_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "~/.config/cmdbc/config.toml".to_string())
}

/// Load configuration from `path`, or from the default location when `None`.
///
/// A missing default config file is not an error; a missing explicit one is.
pub fn load_config(path: Option<&Path>) -> Result<AgentConfig> {
    let content = match path {
        Some(path) => Some(
            fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {:?}", path))?,
        ),
        None => match get_config_file_path() {
            Some(path) if path.exists() => match fs::read_to_string(&path) {
                Ok(content) => Some(content),
                Err(e) => {
                    tracing::warn!("Failed to read config file {:?}: {}", path, e);
                    None
                }
            },
            _ => None,
        },
    };

    let mut config = match content {
        Some(content) => parse_config(&content)?,
        None => AgentConfig::default(),
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    tracing::debug!(
        "Using CMDB server {} (from {})",
        config.api.server,
        config.source
    );
    Ok(config)
}

/// Build a configuration from config file contents, on top of the defaults.
pub fn parse_config(content: &str) -> Result<AgentConfig> {
    let file: ConfigFile = toml::from_str(content).context("Failed to parse config file")?;
    let mut config = AgentConfig::default();

    let api = file.api;
    if let Some(server) = clean_url(api.server) {
        config.api.server = server;
        config.source = ConfigSource::ConfigFile;
    }
    if let Some(username) = api.username {
        config.api.username = username;
    }
    if let Some(password) = api.password {
        config.api.password = password;
    }
    if let Some(client_id) = api.client_id.filter(|c| !c.is_empty()) {
        config.api.client_id = client_id;
    }
    if let Some(host_name) = api.host_name.filter(|h| !h.is_empty()) {
        config.api.host_name = host_name;
    }
    if let Some(secs) = api.header_timeout_secs {
        if secs == 0 {
            anyhow::bail!("header_timeout_secs must be greater than zero");
        }
        config.api.header_timeout = Duration::from_secs(secs);
    }
    if let Some(endpoints) = api.endpoints {
        config.api.endpoints = endpoints;
    }

    if let Some(state_dir) = file.paths.state_dir {
        config.state_dir = state_dir;
    }
    if let Some(change_log) = file.paths.change_log {
        config.change_log = change_log;
    }

    Ok(config)
}

/// Apply environment overrides, reading variables through `lookup`.
pub fn apply_env_overrides(config: &mut AgentConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(server) = clean_url(lookup(ENV_API_SERVER)) {
        tracing::info!("Using CMDB server from environment variable: {}", server);
        config.api.server = server;
        config.source = ConfigSource::Environment;
    }
    if let Some(username) = lookup(ENV_API_USERNAME) {
        config.api.username = username;
    }
    if let Some(password) = lookup(ENV_API_PASSWORD) {
        config.api.password = password;
    }
    if let Some(host_name) = lookup(ENV_HOST_NAME).filter(|h| !h.trim().is_empty()) {
        config.api.host_name = host_name.trim().to_string();
    }
    if let Some(state_dir) = lookup(ENV_STATE_DIR).filter(|d| !d.trim().is_empty()) {
        config.state_dir = PathBuf::from(state_dir.trim());
    }
}

fn clean_url(url: Option<String>) -> Option<String> {
    url.map(|u| u.trim().trim_end_matches('/').to_string())
        .filter(|u| !u.is_empty())
}

/// Generate example config file content
pub fn generate_example_config() -> String {
    format!(
        r#"# cmdbc Agent Configuration
# Place this file at: ~/.config/cmdbc/config.toml

[api]
# CMDB server base URL
# Default: {DEFAULT_SERVER_URL}
# server = "https://cmdb.example.com"

# Basic-auth credentials for the authentication endpoint
# username = "cmdbc"
# password = "changeme"

# Name this machine reports as the device host (default: system hostname)
# host_name = "register-01"

# Seconds to wait for response headers
# header_timeout_secs = 10

# [api.endpoints]
# checkin = "v1/usbci/checkin"
# checkout = "v1/usbci/checkout"

[paths]
# state_dir = "/var/lib/cmdbc/state"
# change_log = "/var/log/cmdbc/change.log"
"#
    )
}
