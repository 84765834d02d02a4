///! Data models for visual regression checks
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding the baseline directory
pub const SNAPSHOTS_DIR_ENV: &str = "SNAPSHOTS_DIR";

/// Baseline directory used when the environment does not override it
pub const DEFAULT_SNAPSHOTS_DIR: &str = "__snapshots__";

/// Sub-directory of the baseline directory receiving diff images
pub const DIFF_OUTPUT_DIR: &str = "__diff_output__";

/// How `failure_threshold` is interpreted
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdType {
    /// Ratio of changed pixels to total pixels (0.03 = 3 %)
    Percent,

    /// Absolute number of changed pixels
    Pixel,
}

/// Options for baseline comparison
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Baseline directory
    pub dir: PathBuf,

    /// Allowed difference before a comparison fails
    pub failure_threshold: f64,

    pub threshold_type: ThresholdType,

    /// Per-pixel colour distance (0.0-1.0) above which a pixel counts as changed
    pub per_pixel_threshold: f64,

    /// Overwrite baselines instead of comparing
    pub update: bool,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_SNAPSHOTS_DIR),
            failure_threshold: 0.03,
            threshold_type: ThresholdType::Percent,
            per_pixel_threshold: 0.01,
            update: false,
        }
    }
}

impl SnapshotConfig {
    /// Defaults, with the directory taken from `SNAPSHOTS_DIR` when set and
    /// resolved against `cwd`.
    pub fn from_env(cwd: &Path) -> Self {
        let dir = std::env::var(SNAPSHOTS_DIR_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SNAPSHOTS_DIR.to_string());
        Self {
            dir: cwd.join(dir),
            ..Self::default()
        }
    }

    pub fn baseline_path(&self, identifier: &str) -> PathBuf {
        self.dir.join(format!("{}.png", identifier))
    }

    pub fn diff_path(&self, identifier: &str) -> PathBuf {
        self.dir
            .join(DIFF_OUTPUT_DIR)
            .join(format!("{}-diff.png", identifier))
    }

    /// Whether a diff of `changed` out of `total` pixels is acceptable
    pub fn passes(&self, changed: u64, total: u64) -> bool {
        match self.threshold_type {
            ThresholdType::Percent => {
                let ratio = if total == 0 {
                    0.0
                } else {
                    changed as f64 / total as f64
                };
                ratio <= self.failure_threshold
            }
            ThresholdType::Pixel => changed as f64 <= self.failure_threshold,
        }
    }
}

/// Pixel diff between a capture and its baseline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffResult {
    /// Pixels above the per-pixel threshold
    pub changed_pixels: u64,

    pub total_pixels: u64,

    /// `changed_pixels / total_pixels` (0.0-1.0)
    pub diff_ratio: f64,

    /// Dimensions differ; every pixel counts as changed
    pub size_mismatch: bool,

    /// PNG highlighting changed pixels
    #[serde(skip)]
    pub diff_image: Option<Vec<u8>>,
}

/// Outcome of comparing a capture against its baseline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SnapshotOutcome {
    /// No baseline existed; the capture became the baseline
    Created { path: PathBuf },

    /// Baseline overwritten on request
    Updated { path: PathBuf },

    /// Within the failure threshold
    Matched { diff_ratio: f64, changed_pixels: u64 },

    /// Beyond the failure threshold
    Mismatch {
        diff_ratio: f64,
        changed_pixels: u64,
        diff_path: PathBuf,
    },
}

impl SnapshotOutcome {
    pub fn is_pass(&self) -> bool {
        !matches!(self, SnapshotOutcome::Mismatch { .. })
    }
}
