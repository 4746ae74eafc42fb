//! # webview-devserver
//!
//! Backend library for redirecting a mobile application's embedded webview
//! from its bundled default page to an alternate content source during
//! development or staged rollout: either a remote URL, or a locally
//! downloaded bundle of static web assets served from the device's own
//! storage.
//!
//! The crate downloads a zip archive of web assets, verifies its integrity,
//! extracts and catalogues it, locates the directory that should act as the
//! HTTP root, and serves it through a loopback-only HTTP endpoint that can
//! swap its content root without restarting the listener. Which source is
//! active (default, remote, or local asset) is tracked per session and
//! optionally persisted through the host's key-value storage.
//!
//! ## Design Philosophy
//!
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Host-owned persistence** - Durable storage stays behind a trait the
//!   embedding application implements
//! - **Event-driven** - Target switches are broadcast; the host decides
//!   when and how to reload its webview
//!
//! ## Quick Start
//!
//! ```no_run
//! use webview_devserver::{Config, DevServer, Event};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let devserver = DevServer::new(Config::default())?;
//!
//!     // Reload the webview whenever the target changes
//!     let mut events = devserver.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             if let Event::TargetChanged { url, .. } = event {
//!                 println!("reload webview at {:?}", url);
//!             }
//!         }
//!     });
//!
//!     // Fetch a bundle and serve it locally
//!     devserver
//!         .download_asset("https://builds.example.com/web-v42.zip", false, None)
//!         .await?;
//!     let url = devserver.apply_asset("web-v42", true).await?;
//!     println!("webview now loads {}", url);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Core `DevServer` implementation
pub mod devserver;
/// Error types
pub mod error;
/// Web root locator
pub mod locator;
/// Target persistence interface
pub mod persist;
/// Local file server
pub mod server;
/// Asset store
pub mod store;
/// Shared types and events
pub mod types;

mod extract;
mod fetcher;

// Re-export commonly used types
pub use config::Config;
pub use devserver::DevServer;
pub use error::{Error, Result};
pub use locator::find_web_root;
pub use persist::{MemoryTargetStore, TargetStore};
pub use server::LocalServer;
pub use store::AssetStore;
pub use types::{ActiveTarget, Event, ServerHints};
