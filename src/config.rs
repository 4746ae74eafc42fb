//! Configuration types for webview-devserver

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Crate configuration
///
/// Every field has a sensible default so `Config::default()` works out of
/// the box for local development; embedding hosts override the directories
/// with real on-device paths.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding extracted asset bundles (default: "./assets")
    ///
    /// Each asset occupies one top-level subdirectory named after its
    /// sanitized archive name. Created on startup if missing.
    #[serde(default = "default_assets_dir")]
    pub assets_dir: PathBuf,

    /// Directory for in-flight archive downloads (default: "./temp")
    ///
    /// Temporary files placed here are exclusively owned by one download
    /// and removed on every exit path.
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// TCP port for the local file server (default: 9090)
    ///
    /// The listener binds loopback-only. Port 0 requests an ephemeral port;
    /// whichever port is bound first stays fixed for the process lifetime.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Overall timeout for one archive download, in seconds (default: 120)
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            assets_dir: default_assets_dir(),
            temp_dir: default_temp_dir(),
            port: default_port(),
            download_timeout_secs: default_download_timeout(),
        }
    }
}

fn default_assets_dir() -> PathBuf {
    PathBuf::from("./assets")
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("./temp")
}

fn default_port() -> u16 {
    9090
}

fn default_download_timeout() -> u64 {
    120
}
