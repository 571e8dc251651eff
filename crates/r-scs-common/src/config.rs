//! ---
//! scs_section: "01-core-functionality"
//! scs_subsection: "module"
//! scs_type: "source"
//! scs_scope: "code"
//! scs_description: "Shared primitives and utilities for the node runtimes."
//! scs_version: "v0.0.0-prealpha"
//! scs_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds, DurationSeconds};
use tracing::debug;

use crate::logging::LogFormat;

fn default_listen_port() -> u16 {
    16001
}

fn default_server_port() -> u16 {
    16000
}

fn default_networked() -> bool {
    true
}

fn default_loop_period() -> Duration {
    Duration::from_millis(50)
}

fn default_status_interval_ticks() -> u32 {
    3
}

fn default_link_interval_ticks() -> u32 {
    20
}

fn default_watchdog_timeout() -> Duration {
    Duration::from_secs(3)
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

/// Primary configuration object for a reactor PLC node.
///
/// Identity fields are loaded once at boot and never change at runtime; a
/// node that must change identity is restarted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Unit identifier reported in every RPLC packet.
    pub reactor_id: u32,
    /// Local radio port this node answers on.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    /// Radio port of the supervisor hub.
    #[serde(default = "default_server_port")]
    pub server_port: u16,
    /// Whether this node participates in the SCADA network at all.
    /// Standalone units keep the safety loop but never link.
    #[serde(default = "default_networked")]
    pub networked: bool,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata describing where a [`NodeConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedNodeConfig {
    pub config: NodeConfig,
    pub source: PathBuf,
}

impl NodeConfig {
    pub const ENV_CONFIG_PATH: &'static str = "R_SCS_CONFIG";

    /// Load configuration from disk, respecting the `R_SCS_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedNodeConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedNodeConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedNodeConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    fn from_path(path: PathBuf) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<NodeConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        if self.listen_port == self.server_port {
            return Err(anyhow!(
                "listen_port and server_port must differ (both {})",
                self.listen_port
            ));
        }
        self.timing.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for NodeConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: NodeConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Cadence constants for the control loop and the session layer.
///
/// Status and link cadences are counted in loop ticks, not wall clock, so a
/// node that misses iterations under load degrades gracefully instead of
/// bursting.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Nominal control loop period (20 Hz).
    #[serde(default = "default_loop_period")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub loop_period: Duration,
    /// Loop ticks between STATUS transmissions while linked.
    #[serde(default = "default_status_interval_ticks")]
    pub status_interval_ticks: u32,
    /// Loop ticks between LINK_REQ transmissions while unlinked.
    #[serde(default = "default_link_interval_ticks")]
    pub link_interval_ticks: u32,
    /// Session watchdog timeout.
    #[serde(default = "default_watchdog_timeout")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub watchdog_timeout: Duration,
}

impl TimingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.loop_period.is_zero() {
            return Err(anyhow!("loop_period must be non-zero"));
        }
        if self.status_interval_ticks == 0 || self.link_interval_ticks == 0 {
            return Err(anyhow!("status and link intervals must be at least one tick"));
        }
        if self.watchdog_timeout < self.loop_period {
            return Err(anyhow!(
                "watchdog_timeout must be at least one loop period"
            ));
        }
        Ok(())
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            loop_period: default_loop_period(),
            status_interval_ticks: default_status_interval_ticks(),
            link_interval_ticks: default_link_interval_ticks(),
            watchdog_timeout: default_watchdog_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}
