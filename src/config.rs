//! Configuration management module
//!
//! Defaults, then an optional YAML file, then environment overrides. CLI
//! flags are applied on top by the binary.

use std::path::Path;

use load_waiter::{FailurePolicy, DEFAULT_PLAY_TIMEOUT_MS};
use network_intercept::config::InterceptConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use visual_snapshot::{SnapshotConfig, SNAPSHOTS_DIR_ENV};

use crate::errors::HarnessError;

pub const PLAY_TIMEOUT_ENV: &str = "STORYGATE_PLAY_TIMEOUT_MS";
pub const OFFLINE_ENV: &str = "STORYGATE_OFFLINE";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Upper bound for play steps that wait for images
    pub play_timeout_ms: u64,

    /// How play steps treat images that fail to load
    pub failure_policy: FailurePolicy,

    /// Refuse every request that is not intercepted
    pub offline: bool,

    /// Timeout of a single real network request
    pub request_timeout_ms: u64,

    pub snapshots: SnapshotConfig,

    pub intercept: InterceptConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            play_timeout_ms: DEFAULT_PLAY_TIMEOUT_MS,
            failure_policy: FailurePolicy::default(),
            offline: false,
            request_timeout_ms: 30_000,
            snapshots: SnapshotConfig::default(),
            intercept: InterceptConfig::default(),
        }
    }
}

impl HarnessConfig {
    /// Apply environment overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), HarnessError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(SNAPSHOTS_DIR_ENV).filter(|v| !v.trim().is_empty()) {
            self.snapshots.dir = dir.into();
        }

        if let Some(raw) = lookup(PLAY_TIMEOUT_ENV) {
            self.play_timeout_ms = raw.trim().parse().map_err(|_| {
                HarnessError::config(format!("{} must be milliseconds, got `{}`", PLAY_TIMEOUT_ENV, raw))
            })?;
        }

        if let Some(raw) = lookup(OFFLINE_ENV) {
            match raw.trim().parse::<bool>() {
                Ok(flag) => self.offline = flag,
                Err(_) => warn!(value = %raw, "ignoring non-boolean {}", OFFLINE_ENV),
            }
        }

        Ok(())
    }

    /// Resolve a relative snapshot directory against `cwd`.
    pub fn resolve_paths(&mut self, cwd: &Path) {
        if self.snapshots.dir.is_relative() {
            self.snapshots.dir = cwd.join(&self.snapshots.dir);
        }
    }
}

/// Load configuration from multiple sources
pub fn load_configuration(
    config_file: Option<&Path>,
    cwd: &Path,
) -> Result<HarnessConfig, HarnessError> {
    let mut config = match config_file {
        Some(path) if path.exists() => {
            let content = std::fs::read_to_string(path)?;
            let parsed: HarnessConfig = serde_yaml::from_str(&content).map_err(|err| {
                HarnessError::config(format!("failed to parse {}: {}", path.display(), err))
            })?;
            debug!(path = %path.display(), "configuration file loaded");
            parsed
        }
        Some(path) => {
            warn!(path = %path.display(), "configuration file not found; using defaults");
            HarnessConfig::default()
        }
        None => HarnessConfig::default(),
    };

    config.apply_env(|key| std::env::var(key).ok())?;
    config.resolve_paths(cwd);
    Ok(config)
}
