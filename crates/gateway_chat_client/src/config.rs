//! Client config load/save for `~/.gateway-chat/config.yaml`.
//! Sections: `gateway.*` (where and as whom), `client.*` (handshake identity), `chat.*`.

use std::path::{Path, PathBuf};

use crate::client::{
    ClientConfig, DEFAULT_CLIENT_ID, DEFAULT_GATEWAY_URL, DEFAULT_HISTORY_LIMIT, DEFAULT_LOCALE,
    DEFAULT_MODE, DEFAULT_PLATFORM, DEFAULT_SESSION_KEY,
};
use crate::error::ConfigError;

/// Gateway section (url, token, session_key).
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GatewaySection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_key: Option<String>,
}

/// Client identity section sent during the handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ClientSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_limit: Option<u32>,
}

/// Chat section (default model for sends).
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChatSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Full config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewaySection,
    #[serde(default)]
    pub client: ClientSection,
    #[serde(default)]
    pub chat: ChatSection,
}

impl Config {
    /// Resolve every field against the defaults. An empty URL is rejected.
    pub fn client_config(&self) -> Result<ClientConfig, ConfigError> {
        let url = self
            .gateway
            .url
            .clone()
            .unwrap_or_else(|| DEFAULT_GATEWAY_URL.to_string());
        if url.trim().is_empty() {
            return Err(ConfigError::MissingUrl);
        }

        let mut cfg = ClientConfig::new(url);
        cfg.token = self.gateway.token.clone().filter(|t| !t.is_empty());
        cfg.session_key = self
            .gateway
            .session_key
            .clone()
            .unwrap_or_else(|| DEFAULT_SESSION_KEY.to_string());

        let id = self
            .client
            .id
            .clone()
            .unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string());
        cfg.user_agent = self
            .client
            .user_agent
            .clone()
            .unwrap_or_else(|| format!("{}/{}", id, cfg.client.version));
        cfg.client.id = id;
        cfg.client.platform = self
            .client
            .platform
            .clone()
            .unwrap_or_else(|| DEFAULT_PLATFORM.to_string());
        cfg.client.mode = self
            .client
            .mode
            .clone()
            .unwrap_or_else(|| DEFAULT_MODE.to_string());
        cfg.locale = self
            .client
            .locale
            .clone()
            .unwrap_or_else(|| DEFAULT_LOCALE.to_string());
        cfg.history_limit = self.client.history_limit.unwrap_or(DEFAULT_HISTORY_LIMIT);

        Ok(cfg)
    }
}

/// Returns the default config file path: `~/.gateway-chat/config.yaml` (platform-specific).
pub fn default_config_path() -> Option<PathBuf> {
    let home = home_dir()?;
    Some(home.join(".gateway-chat").join("config.yaml"))
}

#[cfg(unix)]
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

#[cfg(windows)]
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE").map(PathBuf::from)
}

#[cfg(not(any(unix, windows)))]
fn home_dir() -> Option<PathBuf> {
    None
}

/// Load config from a YAML file. An empty file yields the defaults.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    Ok(serde_yaml::from_str(&contents)?)
}

/// Load config if the file exists, otherwise return the defaults.
pub fn load_or_default(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No config file, using defaults");
        return Ok(Config::default());
    }
    load(path)
}

/// Save config to a YAML file. Creates parent directory if missing.
pub fn save(path: &Path, config: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let contents = serde_yaml::to_string(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}
