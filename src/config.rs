use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::auth::LockoutPolicy;

pub static CONFIG_PATH: Lazy<PathBuf> = Lazy::new(|| {
    if let Some(p) = option_env!("FACEGATE_CONFIG_PATH") {
        return PathBuf::from(p);
    }
    directories::ProjectDirs::from("", "", "facegate")
        .map(|d| d.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("/usr/local/etc/facegate/config.toml"))
});

pub static DATA_DIR: Lazy<PathBuf> = Lazy::new(|| {
    if let Some(p) = option_env!("FACEGATE_DATA_DIR") {
        return PathBuf::from(p);
    }
    directories::ProjectDirs::from("", "", "facegate")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("/var/lib/facegate"))
});

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Minimum similarity for a probe to count as a match.
    pub threshold: f64,
    /// Consecutive failed logins before an administrator account locks.
    pub max_login_attempts: u32,
    /// Seconds a locked administrator account stays locked.
    pub lockout_secs: u64,
    /// Registry and ledger location; platform data dir when unset.
    pub data_dir: Option<PathBuf>,
    /// External extraction command, e.g. "python3 /opt/facegate/extract.py".
    /// Reads the probe image on stdin, writes the encoded signature on
    /// stdout. When unset, probes must already be encoded signatures.
    pub extractor: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threshold: 0.40,
            max_login_attempts: 3,
            lockout_secs: 300,
            data_dir: None,
            extractor: None,
        }
    }
}

impl Config {
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| DATA_DIR.clone())
    }

    /// The login lockout settings in the form the auth module consumes.
    pub fn lockout_policy(&self) -> LockoutPolicy {
        LockoutPolicy::new(self.max_login_attempts, self.lockout_secs)
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path.unwrap_or(&CONFIG_PATH);
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config at {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
}

pub fn save_config(cfg: &Config, path: Option<&Path>) -> Result<()> {
    let path = path.unwrap_or(&CONFIG_PATH);
    let data = toml::to_string_pretty(cfg)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, data)?;
    Ok(())
}
