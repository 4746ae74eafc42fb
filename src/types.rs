//! Shared types and events

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Snapshot of the currently active content target
///
/// Returned by [`DevServer::get_server`](crate::DevServer::get_server) and
/// [`DevServer::set_server`](crate::DevServer::set_server). An ephemeral
/// session override always wins over a persisted value, so `persisted` is
/// only `true` when the reported URL came from durable storage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveTarget {
    /// The active target URL, or `None` when the host is on its built-in
    /// default content
    pub url: Option<String>,
    /// Whether the URL survives a process restart
    pub persisted: bool,
}

impl ActiveTarget {
    /// Snapshot representing the built-in default content
    pub fn default_content() -> Self {
        Self {
            url: None,
            persisted: false,
        }
    }
}

/// Webview configuration hints derived from a target URL
///
/// Hosts that need to reconfigure their webview for a new target (scheme,
/// cleartext allowance) read these instead of patching configuration objects
/// at runtime.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerHints {
    /// The target URL the hints were derived from
    pub url: String,
    /// Scheme the webview should load under ("http" or "https")
    pub scheme: String,
    /// Whether cleartext (mixed-content) traffic must be allowed
    pub cleartext: bool,
}

impl ServerHints {
    /// Derive hints from a target URL
    ///
    /// A `http://` URL implies cleartext traffic and the plain `http`
    /// scheme; everything else is treated as `https`.
    pub fn for_url(url: &str) -> Self {
        let is_http = url
            .get(..7)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("http://"));
        Self {
            url: url.to_string(),
            scheme: if is_http { "http" } else { "https" }.to_string(),
            cleartext: is_http,
        }
    }
}

/// Event emitted on the broadcast channel
///
/// Hosts subscribe via [`DevServer::subscribe`](crate::DevServer::subscribe)
/// and react to target switches, typically by reloading the webview.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// An archive was downloaded, verified, and extracted (or was already
    /// present and left untouched)
    DownloadComplete {
        /// Name of the asset in the store
        asset: String,
    },

    /// An archive download or extraction failed
    DownloadFailed {
        /// The archive URL that was being fetched
        url: String,
        /// Human-readable failure description
        error: String,
    },

    /// The local file server bound its listener
    ServerStarted {
        /// The bound loopback address
        addr: SocketAddr,
    },

    /// The local file server stopped accepting requests
    ServerStopped,

    /// A target switch committed; the host should reload its webview
    TargetChanged {
        /// The new active URL, or `None` for the built-in default
        url: Option<String>,
        /// Whether the new target survives a process restart
        persisted: bool,
    },
}
