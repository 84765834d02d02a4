//! Baseline storage keyed by scenario identifier

use std::fs;
use std::path::Path;

use tracing::{info, warn};

use crate::{
    diff::VisualDiff,
    errors::VisualError,
    models::{SnapshotConfig, SnapshotOutcome},
};

/// Compares captures against baselines stored under one directory.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    config: SnapshotConfig,
}

impl SnapshotStore {
    pub fn new(config: SnapshotConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    /// Compare `capture` (PNG bytes) with the baseline for `identifier`.
    ///
    /// A missing baseline is written and reported as `Created`; with
    /// `update` set the baseline is overwritten. On mismatch the diff image
    /// lands in the diff output directory.
    pub fn check(&self, identifier: &str, capture: &[u8]) -> Result<SnapshotOutcome, VisualError> {
        validate_identifier(identifier)?;
        let baseline_path = self.config.baseline_path(identifier);

        if self.config.update || !baseline_path.exists() {
            let existed = baseline_path.exists();
            write_file(&baseline_path, capture)?;
            info!(
                snapshot = identifier,
                path = %baseline_path.display(),
                "Baseline written"
            );
            return Ok(if existed {
                SnapshotOutcome::Updated {
                    path: baseline_path,
                }
            } else {
                SnapshotOutcome::Created {
                    path: baseline_path,
                }
            });
        }

        let baseline = fs::read(&baseline_path)?;
        let diff = VisualDiff::compute(&baseline, capture, self.config.per_pixel_threshold)?;

        if self.config.passes(diff.changed_pixels, diff.total_pixels) {
            info!(
                snapshot = identifier,
                diff_ratio = diff.diff_ratio,
                "Snapshot matched baseline"
            );
            let diff_path = self.config.diff_path(identifier);
            if diff_path.exists() {
                // stale output from an earlier failure
                let _ = fs::remove_file(&diff_path);
            }
            return Ok(SnapshotOutcome::Matched {
                diff_ratio: diff.diff_ratio,
                changed_pixels: diff.changed_pixels,
            });
        }

        let diff_path = self.config.diff_path(identifier);
        if let Some(image) = &diff.diff_image {
            write_file(&diff_path, image)?;
        }
        warn!(
            snapshot = identifier,
            diff_ratio = diff.diff_ratio,
            changed_pixels = diff.changed_pixels,
            threshold = self.config.failure_threshold,
            size_mismatch = diff.size_mismatch,
            diff = %diff_path.display(),
            "Snapshot differs from baseline"
        );
        Ok(SnapshotOutcome::Mismatch {
            diff_ratio: diff.diff_ratio,
            changed_pixels: diff.changed_pixels,
            diff_path,
        })
    }
}

fn validate_identifier(identifier: &str) -> Result<(), VisualError> {
    if identifier.is_empty()
        || identifier.contains(['/', '\\'])
        || identifier == "."
        || identifier == ".."
    {
        return Err(VisualError::InvalidInput(format!(
            "snapshot identifier `{}` is not a plain file name",
            identifier
        )));
    }
    Ok(())
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), VisualError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)?;
    Ok(())
}
