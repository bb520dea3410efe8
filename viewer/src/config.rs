use anyhow::{Context, Result};
use livedrop_client::{CredentialStore, DEFAULT_CASES_URL, DEFAULT_SKINS_URL};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::Level;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";
const DEFAULT_VIEWPORT_WIDTH: f64 = 1_200.0;

fn read_string(key: &str, fallback: &str) -> String {
    std::env::var(key)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

/// Viewer configuration (from config file).
///
/// Every field is optional in the file. `base_url` and `invite` fall back to
/// `LIVEDROP_BASE_URL` and `LIVEDROP_INVITE` before their built-in defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub invite: String,
    pub cases_url: String,
    pub skins_url: String,
    pub log_level: String,
    pub viewport_width: f64,
    pub credentials_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: read_string("LIVEDROP_BASE_URL", DEFAULT_BASE_URL),
            invite: read_string("LIVEDROP_INVITE", ""),
            cases_url: DEFAULT_CASES_URL.to_string(),
            skins_url: DEFAULT_SKINS_URL.to_string(),
            log_level: "info".to_string(),
            viewport_width: DEFAULT_VIEWPORT_WIDTH,
            credentials_path: None,
        }
    }
}

impl Config {
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config = if contents.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(contents).context("could not parse config file")?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("could not read config file {}", path.display()))?;
        Self::from_yaml(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        self.level()?;
        anyhow::ensure!(
            self.viewport_width.is_finite() && self.viewport_width > 0.0,
            "viewport_width must be positive, got {}",
            self.viewport_width
        );
        Ok(())
    }

    pub fn level(&self) -> Result<Level> {
        Level::from_str(&self.log_level)
            .with_context(|| format!("invalid log level: {}", self.log_level))
    }

    /// Where the bearer credential is kept.
    pub fn credential_store(&self) -> Option<CredentialStore> {
        match &self.credentials_path {
            Some(path) => Some(CredentialStore::new(path.clone())),
            None => CredentialStore::default_location(),
        }
    }
}
