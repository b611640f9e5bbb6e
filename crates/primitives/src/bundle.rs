//! Bundler-related primitives

use serde::{Deserialize, Serialize};

/// Bundle modes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BundleMode {
    /// Sends bundles automatically every x seconds
    #[serde(rename = "auto")]
    Auto,
    /// Sends bundles upon request
    #[serde(rename = "manual")]
    Manual,
}
