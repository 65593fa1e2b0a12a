//! Configuration module for portwatch.
//!
//! Loads the JSON configuration file, applies defaults and the legacy
//! single-target shape, and expands entries into monitored targets.

use crate::clock::DEFAULT_TIMEZONE;
use crate::monitor::{AddressFamily, Target};

use chrono_tz::Tz;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration file read when no path is given.
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

const DEFAULT_DELAY_SECS: i64 = 30;
const DEFAULT_TIMEOUT_SECS: i64 = 5;

/// Fatal configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("webhook missing in config")]
    MissingWebhook,
    #[error("cannot load timezone {name:?}: {reason}")]
    Timezone { name: String, reason: String },
    #[error("no targets configured")]
    NoTargets,
    #[error("no valid targets (missing IPs or ports)")]
    NoValidTargets,
}

/// One entry of the `targets` list.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub ipv4: String,
    #[serde(deserialize_with = "null_as_default")]
    pub ipv6: String,
    #[serde(deserialize_with = "null_as_default")]
    pub dport: i64,
}

/// The configuration file as written.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    #[serde(deserialize_with = "null_as_default")]
    pub targets: Vec<TargetConfig>,
    /// Legacy single-target fields, used when `targets` is empty.
    #[serde(deserialize_with = "null_as_default")]
    pub ipv4: String,
    #[serde(deserialize_with = "null_as_default")]
    pub ipv6: String,
    #[serde(deserialize_with = "null_as_default")]
    pub dport: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub webhook: String,
    #[serde(deserialize_with = "null_as_default")]
    pub hostname: String,
    /// Probe interval in seconds.
    #[serde(deserialize_with = "null_as_default")]
    pub delay: i64,
    /// Probe timeout in seconds.
    #[serde(deserialize_with = "null_as_default")]
    pub timeout: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub timezone: String,
    pub trace_dir: Option<PathBuf>,
}

/// Treat an explicit JSON `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Validated settings the monitor runs with.
#[derive(Debug, Clone)]
pub struct Settings {
    pub webhook: String,
    pub hostname: Option<String>,
    pub interval: Duration,
    pub timeout: Duration,
    pub timezone: Tz,
    pub trace_dir: Option<PathBuf>,
    pub targets: Vec<Target>,
}

impl Settings {
    /// Read and validate the configuration file at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        FileConfig::load(path)?.validate()
    }
}

impl FileConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Apply defaults and fallbacks, then expand targets.
    pub fn validate(mut self) -> Result<Settings, ConfigError> {
        if self.targets.is_empty()
            && (!self.ipv4.is_empty() || !self.ipv6.is_empty() || self.dport != 0)
        {
            self.targets = vec![TargetConfig {
                name: "default".to_string(),
                ipv4: self.ipv4.clone(),
                ipv6: self.ipv6.clone(),
                dport: self.dport,
            }];
        }

        if self.webhook.is_empty() {
            return Err(ConfigError::MissingWebhook);
        }

        // Non-positive values mean "not set"
        let delay = if self.delay <= 0 { DEFAULT_DELAY_SECS } else { self.delay };
        let timeout = if self.timeout <= 0 { DEFAULT_TIMEOUT_SECS } else { self.timeout };

        let timezone = parse_timezone(&self.timezone)?;

        if self.targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }

        let targets = expand_targets(&self.targets);
        if targets.is_empty() {
            return Err(ConfigError::NoValidTargets);
        }

        Ok(Settings {
            webhook: self.webhook,
            hostname: Some(self.hostname).filter(|h| !h.is_empty()),
            interval: Duration::from_secs(delay as u64),
            timeout: Duration::from_secs(timeout as u64),
            timezone,
            trace_dir: self.trace_dir,
            targets,
        })
    }
}

/// Look up an IANA zone name; empty means the default zone.
pub fn parse_timezone(name: &str) -> Result<Tz, ConfigError> {
    if name.is_empty() {
        return Ok(DEFAULT_TIMEZONE);
    }
    name.parse::<Tz>().map_err(|e| ConfigError::Timezone {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

/// One target per populated address (IPv4 first), skipping bad ports.
pub fn expand_targets(entries: &[TargetConfig]) -> Vec<Target> {
    let mut targets = Vec::new();

    for entry in entries {
        let port = match u16::try_from(entry.dport) {
            Ok(p) if p > 0 => p,
            _ => continue,
        };
        let name = Some(entry.name.clone());

        if !entry.ipv4.is_empty() {
            targets.push(Target::new(name.clone(), &entry.ipv4, AddressFamily::V4, port));
        }
        if !entry.ipv6.is_empty() {
            targets.push(Target::new(name, &entry.ipv6, AddressFamily::V6, port));
        }
    }

    targets
}
