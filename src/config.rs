use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::exec::RetryPolicy;
use crate::fingerprint::Strategy;
use crate::scan::enumerate::DEFAULT_EXCLUDES;
use crate::scan::scanner::DEFAULT_BATCH_SIZE;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub backoff_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_secs: 2,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(c: &RetryConfig) -> Self {
        RetryPolicy {
            max_retries: c.max_retries,
            backoff: Duration::from_secs(c.backoff_secs),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub host: Option<String>,
    pub port: u16,
    pub user: Option<String>,
    /// Exact trash folder name; autodetected when unset.
    pub trash_folder: Option<String>,
    pub exclude: Vec<String>,
    pub batch_size: u32,
    pub strategy: Strategy,
    pub backup_dir: String,
    pub retry: RetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: None,
            port: 993,
            user: None,
            trash_folder: None,
            exclude: DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect(),
            batch_size: DEFAULT_BATCH_SIZE,
            strategy: Strategy::default(),
            backup_dir: "email_backup".to_string(),
            retry: RetryConfig::default(),
        }
    }
}

impl Config {
    pub fn host(&self) -> Result<&str> {
        self.host
            .as_deref()
            .ok_or_else(|| anyhow!("host not set in config (or IMAP_HOST)"))
    }

    pub fn user(&self) -> Result<&str> {
        self.user
            .as_deref()
            .ok_or_else(|| anyhow!("user not set in config (or IMAP_USER)"))
    }

    /// Apply `IMAP_HOST`, `IMAP_PORT`, `IMAP_USER` and `BACKUP_DIR` through
    /// `lookup`, which is `std::env::var` outside tests.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(h) = lookup("IMAP_HOST") {
            self.host = Some(h);
        }
        if let Some(p) = lookup("IMAP_PORT") {
            self.port = p
                .parse()
                .with_context(|| format!("invalid IMAP_PORT {:?}", p))?;
        }
        if let Some(u) = lookup("IMAP_USER") {
            self.user = Some(u);
        }
        if let Some(d) = lookup("BACKUP_DIR") {
            self.backup_dir = d;
        }
        Ok(())
    }
}

fn config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or_else(|| anyhow!("no config dir available"))?
        .join("mailsweep"))
}

pub fn config_path() -> Result<PathBuf> {
    let mut p = config_dir()?;
    fs::create_dir_all(&p)?;
    p.push("config.toml");
    Ok(p)
}

pub fn parse_config(s: &str) -> Result<Config> {
    let cfg: Config = toml::from_str(s)?;
    Ok(cfg)
}

fn read_config(path: &Path) -> Result<Config> {
    let s = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    parse_config(&s).with_context(|| format!("parsing config {}", path.display()))
}

/// Load the config from `explicit` or the default location, then apply
/// environment overrides. A missing default file is replaced by a template
/// and reported as an error so the user can fill it in.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let mut cfg = match explicit {
        Some(path) => read_config(path)?,
        None => {
            let path = config_path()?;
            if !path.exists() {
                let sample = Config {
                    host: Some("imap.example.com".to_string()),
                    user: Some("you@example.com".to_string()),
                    ..Config::default()
                };
                let tom = toml::to_string_pretty(&sample)?;
                fs::write(&path, tom)?;
                return Err(anyhow!(
                    "Created template config at {}, edit it and run again",
                    path.display()
                ));
            }
            read_config(&path)?
        }
    };
    cfg.apply_env(|k| std::env::var(k).ok())?;
    Ok(cfg)
}
