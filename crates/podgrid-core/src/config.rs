//! podgrid.toml configuration parser.
//!
//! Every section and key is optional; missing values fall back to the
//! defaults of a single-host development setup.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PodgridConfig {
    pub server: ServerConfig,
    pub liveness: LivenessConfig,
    pub backend: BackendConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5005,
        }
    }
}

/// Liveness monitor timing. Durations are strings such as `"10s"` or
/// `"500ms"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    pub interval: String,
    pub inspect_timeout: String,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            interval: "10s".to_string(),
            inspect_timeout: "5s".to_string(),
        }
    }
}

impl LivenessConfig {
    /// Period between two liveness cycles.
    pub fn interval(&self) -> anyhow::Result<Duration> {
        parse_field("liveness.interval", &self.interval)
    }

    /// Upper bound on a single backend `inspect` call.
    pub fn inspect_timeout(&self) -> anyhow::Result<Duration> {
        parse_field("liveness.inspect_timeout", &self.inspect_timeout)
    }
}

/// Which execution backend hosts the nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Docker,
    Memory,
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "docker" => Ok(Self::Docker),
            "memory" => Ok(Self::Memory),
            other => bail!("unknown backend kind: {other} (expected docker or memory)"),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Docker => f.write_str("docker"),
            Self::Memory => f.write_str("memory"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,
    /// Image each node container runs.
    pub image: String,
    /// Command that keeps the node container alive.
    pub command: Vec<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Docker,
            image: "alpine".to_string(),
            command: vec!["sleep".to_string(), "infinity".to_string()],
        }
    }
}

impl PodgridConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: PodgridConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject values the daemon cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        let interval = self.liveness.interval()?;
        if interval.is_zero() {
            bail!("liveness.interval must be greater than zero");
        }
        if self.liveness.inspect_timeout()?.is_zero() {
            bail!("liveness.inspect_timeout must be greater than zero");
        }
        if self.backend.image.trim().is_empty() {
            bail!("backend.image must not be empty");
        }
        Ok(())
    }
}

/// Parse `"500ms"`, `"10s"`, `"2m"` or a bare number of seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

fn parse_field(field: &str, value: &str) -> anyhow::Result<Duration> {
    parse_duration(value).with_context(|| format!("invalid duration for {field}: {value:?}"))
}
