use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_derive::Deserialize;
use thiserror::Error;

const DEFAULT_SCAN_INTERVAL: f64 = 15.0;
const DEFAULT_OFFLINE_THRESHOLD: f64 = 300.0;
const DEFAULT_SIMULATION_SCAN_INTERVAL: f64 = 1.0;
const DEFAULT_SIMULATION_OFFLINE_THRESHOLD: f64 = 3.0;
const DEFAULT_SCAN_TIMEOUT: f64 = 30.0;
const DEFAULT_NOTIFY_TIMEOUT: f64 = 10.0;
const DEFAULT_TOPIC: &str = "my_wifi_monitor";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("no {0}target SSIDs provided on the command line or in the config file")]
    NoTargets(&'static str),

    #[error("{field} must be a non-negative number of seconds, got {value}")]
    InvalidDuration { field: &'static str, value: f64 },
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct AppConfig {
    pub scan: Option<ScanConfig>,
    pub ntfy: Option<NtfyConfig>,
    pub simulation: Option<SimulationConfig>,
    pub mqtt: Option<MqttConfig>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct ScanConfig {
    pub targets: Option<Vec<String>>,
    pub interval_seconds: Option<f64>,
    pub offline_threshold_seconds: Option<f64>,
    pub timeout_seconds: Option<f64>,
    pub nmcli_path: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct NtfyConfig {
    pub topic: Option<String>,
    pub server: Option<String>,
    pub curl_path: Option<String>,
    pub timeout_seconds: Option<f64>,
}

/// Replaces the `[scan]` and ntfy topic values when running with `--simulate`.
#[derive(Deserialize, Debug, Default, Clone)]
pub struct SimulationConfig {
    pub targets: Option<Vec<String>>,
    pub interval_seconds: Option<f64>,
    pub offline_threshold_seconds: Option<f64>,
    pub topic: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct MqttConfig {
    pub host: String,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub publisher_id: Option<String>,
    pub topic_path: Option<String>,
    pub keep_alive_seconds: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NtfySettings {
    pub topic: String,
    pub server: String,
    pub curl_path: String,
}

/// Effective settings after applying defaults, simulation overrides and
/// command-line targets.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub targets: BTreeSet<String>,
    pub scan_interval: Duration,
    pub offline_threshold: Duration,
    pub scan_timeout: Duration,
    pub notify_timeout: Duration,
    pub nmcli_path: String,
    pub ntfy: NtfySettings,
    pub simulate: bool,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::de::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Targets given on the command line take precedence over the config file.
    pub fn resolve(
        &self,
        simulate: bool,
        cli_targets: Option<Vec<String>>,
    ) -> Result<Settings, ConfigError> {
        let scan = self.scan.clone().unwrap_or_default();
        let ntfy = self.ntfy.clone().unwrap_or_default();
        let sim = self.simulation.clone().unwrap_or_default();

        let (config_targets, interval, threshold, topic) = if simulate {
            (
                sim.targets,
                sim.interval_seconds
                    .unwrap_or(DEFAULT_SIMULATION_SCAN_INTERVAL),
                sim.offline_threshold_seconds
                    .unwrap_or(DEFAULT_SIMULATION_OFFLINE_THRESHOLD),
                sim.topic,
            )
        } else {
            (
                scan.targets,
                scan.interval_seconds.unwrap_or(DEFAULT_SCAN_INTERVAL),
                scan.offline_threshold_seconds
                    .unwrap_or(DEFAULT_OFFLINE_THRESHOLD),
                ntfy.topic,
            )
        };

        let targets: BTreeSet<String> = cli_targets
            .filter(|targets| !targets.is_empty())
            .or(config_targets)
            .unwrap_or_default()
            .into_iter()
            .map(|target| target.trim().to_string())
            .filter(|target| !target.is_empty())
            .collect();
        if targets.is_empty() {
            return Err(ConfigError::NoTargets(if simulate { "simulation " } else { "" }));
        }

        Ok(Settings {
            targets,
            scan_interval: seconds("interval_seconds", interval)?,
            offline_threshold: seconds("offline_threshold_seconds", threshold)?,
            scan_timeout: seconds(
                "scan.timeout_seconds",
                scan.timeout_seconds.unwrap_or(DEFAULT_SCAN_TIMEOUT),
            )?,
            notify_timeout: seconds(
                "ntfy.timeout_seconds",
                ntfy.timeout_seconds.unwrap_or(DEFAULT_NOTIFY_TIMEOUT),
            )?,
            nmcli_path: scan.nmcli_path.unwrap_or_else(|| "nmcli".to_string()),
            ntfy: NtfySettings {
                topic: topic.unwrap_or_else(|| DEFAULT_TOPIC.to_string()),
                server: ntfy.server.unwrap_or_else(|| "https://ntfy.sh".to_string()),
                curl_path: ntfy.curl_path.unwrap_or_else(|| "/usr/bin/curl".to_string()),
            },
            simulate,
        })
    }
}

fn seconds(field: &'static str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value).map_err(|_| ConfigError::InvalidDuration { field, value })
}
