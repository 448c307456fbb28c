use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use serde::Deserialize;

/// Env var naming an optional YAML config file.
pub const CONFIG_ENV: &str = "LIVE_ROCKET_CONFIG";
/// Env var overriding the listen address.
pub const LISTEN_ENV: &str = "LISTEN";

/// Request size limits enforced by the codec.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_header_bytes: usize,
    pub max_body_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_header_bytes: 16 * 1024,
            max_body_bytes: 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen_addr: String,
    /// A connection without a complete request for this long is closed.
    pub idle_timeout_ms: u64,
    pub write_timeout_ms: u64,
    pub max_connections: usize,
    pub templates_dir: String,
    pub log_level: String,
    pub limits: Limits,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            idle_timeout_ms: 30_000,
            write_timeout_ms: 10_000,
            max_connections: 1024,
            templates_dir: "templates".to_string(),
            log_level: "info".to_string(),
            limits: Limits::default(),
        }
    }
}

impl Config {
    /// Defaults, then the YAML file named by `LIVE_ROCKET_CONFIG` (if set),
    /// then the `LISTEN` override.
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::from_yaml_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };

        if let Ok(listen) = std::env::var(LISTEN_ENV) {
            cfg.listen_addr = listen;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_yaml_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_yaml_str(&content)
            .with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn from_yaml_str(content: &str) -> anyhow::Result<Self> {
        // an empty document means "all defaults"
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.listen_addr
            .parse::<SocketAddr>()
            .with_context(|| format!("invalid listen address '{}'", self.listen_addr))?;
        if self.idle_timeout_ms == 0 || self.write_timeout_ms == 0 {
            bail!("timeouts must be greater than zero");
        }
        if self.max_connections == 0 {
            bail!("max_connections must be greater than zero");
        }
        if self.limits.max_header_bytes == 0 || self.limits.max_body_bytes == 0 {
            bail!("size limits must be greater than zero");
        }
        Ok(())
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}
