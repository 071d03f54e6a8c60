use crate::adapter::RetentionPolicy;
use crate::basemap::{find_basemap, DEFAULT_BASEMAP};
use crate::view::{DEFAULT_CENTER, DEFAULT_ZOOM};
use crate::widgets::{BookmarksConfig, PrintConfig};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

pub const CONFIG_FILE: &str = "viewer.json";
pub const DEFAULT_BASE_PATH: &str = "/opendata-viewer";
pub const DEFAULT_BIND: &str = "127.0.0.1:3000";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Upstream catalog URL is not set")]
    MissingUpstream,
    #[error("Invalid URL for {field}: {value}")]
    InvalidUrl { field: &'static str, value: String },
    #[error("Invalid bind address: {0}")]
    InvalidBind(String),
    #[error("Base path must start with '/': {0}")]
    InvalidBasePath(String),
    #[error("Unknown basemap: {0}")]
    UnknownBasemap(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Retention {
    #[default]
    Remove,
    Hide,
}

impl From<Retention> for RetentionPolicy {
    fn from(r: Retention) -> Self {
        match r {
            Retention::Remove => RetentionPolicy::Remove,
            Retention::Hide => RetentionPolicy::HideFeatureLayers,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// The upstream JSON document listing every catalog record.
    pub upstream_url: Option<String>,
    /// Base URL that resource file names are appended to.
    pub open_data_url: String,
    /// Where the catalog client finds the proxy endpoints.
    pub api_url: String,
    pub bind: String,
    pub base_path: String,
    /// Serve an empty filtered catalog as 200 instead of 500.
    pub allow_empty: bool,
    pub upstream_timeout_secs: u64,
    pub catalog_cache_secs: u64,
    pub retention: Retention,
    pub basemap: String,
    pub center: (f64, f64),
    pub zoom: f64,
    pub bookmarks: BookmarksConfig,
    pub print: PrintConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            upstream_url: None,
            open_data_url: "https://maps.mecknc.gov/opendata".to_string(),
            api_url: format!("http://{}{}", DEFAULT_BIND, DEFAULT_BASE_PATH),
            bind: DEFAULT_BIND.to_string(),
            base_path: DEFAULT_BASE_PATH.to_string(),
            allow_empty: false,
            upstream_timeout_secs: 30,
            catalog_cache_secs: 300,
            retention: Retention::default(),
            basemap: DEFAULT_BASEMAP.to_string(),
            center: DEFAULT_CENTER,
            zoom: DEFAULT_ZOOM,
            bookmarks: BookmarksConfig::default(),
            print: PrintConfig::default(),
        }
    }
}

impl ViewerConfig {
    pub fn upstream(&self) -> Result<Url, ConfigError> {
        let raw = self
            .upstream_url
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::MissingUpstream)?;
        parse_url("upstream_url", raw)
    }

    pub fn api(&self) -> Result<Url, ConfigError> {
        parse_url("api_url", &self.api_url)
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .parse()
            .map_err(|_| ConfigError::InvalidBind(self.bind.clone()))
    }

    /// Checks the fields every command relies on. The upstream URL is only
    /// required by `serve`, so it is checked separately by [`ViewerConfig::upstream`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_url("open_data_url", &self.open_data_url)?;
        self.api()?;
        self.bind_addr()?;
        if !self.base_path.starts_with('/') {
            return Err(ConfigError::InvalidBasePath(self.base_path.clone()));
        }
        if find_basemap(&self.basemap).is_none() {
            return Err(ConfigError::UnknownBasemap(self.basemap.clone()));
        }
        Ok(())
    }
}

fn parse_url(field: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|_| ConfigError::InvalidUrl {
        field,
        value: value.to_string(),
    })
}

#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            config_path: crate::get_config_root().join(CONFIG_FILE),
        }
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    pub fn load(&self) -> Result<ViewerConfig> {
        if !self.config_path.exists() {
            return Ok(ViewerConfig::default());
        }

        let content = fs::read_to_string(&self.config_path).context("Failed to read viewer.json")?;

        serde_json::from_str(&content).context("Failed to parse viewer.json")
    }

    pub fn save(&self, config: &ViewerConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).context("Failed to create config directory")?;
            }
        }

        let content =
            serde_json::to_string_pretty(config).context("Failed to serialize viewer config")?;

        fs::write(&self.config_path, content).context("Failed to write viewer.json")
    }
}
