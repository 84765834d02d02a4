//! Configuration types for the interception layer.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct InterceptConfig {
    /// Log every request that falls through to the network at `info`
    /// instead of `debug`. Useful for spotting accidental real fetches.
    pub report_passthrough: bool,
    /// Status code of substituted responses.
    pub mock_status: u16,
}

impl Default for InterceptConfig {
    fn default() -> Self {
        Self {
            report_passthrough: false,
            mock_status: 200,
        }
    }
}
