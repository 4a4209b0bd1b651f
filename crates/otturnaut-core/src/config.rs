use serde::{Deserialize, Serialize};

use crate::models::RuntimeKind;

/// Top-level agent configuration, loaded from TOML (`otturnaut.toml`) with
/// every field defaulted so a bare invocation works against a local
/// Docker + Caddy pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub runtime: RuntimeConfig,
    pub caddy: CaddyConfig,
    pub ports: PortRangeConfig,
    pub health_check: HealthCheckConfig,
    pub build: BuildConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub kind: RuntimeKind,
    pub endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaddyConfig {
    pub admin_url: String,
    pub http_port: u16,
    pub https_port: u16,
    pub automatic_https_disable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortRangeConfig {
    pub range_lo: u16,
    pub range_hi: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    pub max_attempts: u32,
    pub interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            runtime: RuntimeConfig::default(),
            caddy: CaddyConfig::default(),
            ports: PortRangeConfig::default(),
            health_check: HealthCheckConfig::default(),
            build: BuildConfig::default(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            kind: RuntimeKind::Docker,
            endpoint: "/var/run/docker.sock".to_string(),
        }
    }
}

impl Default for CaddyConfig {
    fn default() -> Self {
        Self {
            admin_url: "http://localhost:2019".to_string(),
            http_port: 80,
            https_port: 443,
            automatic_https_disable: false,
        }
    }
}

impl Default for PortRangeConfig {
    fn default() -> Self {
        Self {
            range_lo: 10000,
            range_hi: 20000,
        }
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            interval_ms: 1000,
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self { timeout_secs: 600 }
    }
}

impl AgentConfig {
    /// Load from a TOML file, falling back to built-in defaults for any
    /// field the file omits. Missing files are not an error — a fresh
    /// install runs against defaults until an operator drops in a config.
    pub fn load_from_path(path: &std::path::Path) -> anyhow::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Ok(toml::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }
}
