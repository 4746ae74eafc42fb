//! Core `DevServer` implementation
//!
//! Owns every collaborator (asset store, local file server, target
//! persistence, event channel) and coordinates which content source the
//! host webview loads next: the built-in default, a remote URL, or a
//! locally served asset.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::locator;
use crate::persist::{KEY_ACTIVE_ASSET, KEY_SERVER_URL, MemoryTargetStore, TargetStore};
use crate::server::LocalServer;
use crate::store::AssetStore;
use crate::types::{ActiveTarget, Event};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock, broadcast};
use tracing::{debug, info, warn};

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Main entry point (cloneable - all fields are Arc-wrapped)
///
/// One `DevServer` per process. The local file server inside it is a
/// process-wide singleton resource: it binds a single port and keeps it
/// for the process lifetime.
#[derive(Clone)]
pub struct DevServer {
    /// Static configuration
    config: Arc<Config>,
    /// Shared HTTP client for archive downloads
    client: reqwest::Client,
    /// Catalogue of extracted assets
    store: Arc<AssetStore>,
    /// The singleton local file server
    server: Arc<LocalServer>,
    /// Durable key-value storage for the active target (host-provided)
    targets: Arc<dyn TargetStore>,
    /// Session-only target override; always wins over the durable record
    session_url: Arc<RwLock<Option<String>>>,
    /// Per-asset-name locks serializing conflicting downloads
    download_locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
    /// Event broadcast channel sender (multiple subscribers supported)
    event_tx: broadcast::Sender<Event>,
}

impl DevServer {
    /// Create a `DevServer` with in-memory target persistence
    ///
    /// Suitable for hosts that do not need the active target to survive a
    /// process restart. Creates the asset and temp directories.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_target_store(config, Arc::new(MemoryTargetStore::default()))
    }

    /// Create a `DevServer` backed by the host's durable key-value store
    ///
    /// # Errors
    ///
    /// [`Error::Io`] when the asset or temp directory cannot be created,
    /// [`Error::Network`] when the HTTP client cannot be built.
    pub fn with_target_store(config: Config, targets: Arc<dyn TargetStore>) -> Result<Self> {
        let store = AssetStore::new(&config.assets_dir)?;
        std::fs::create_dir_all(&config.temp_dir).map_err(|e| Error::io(&config.temp_dir, e))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.download_timeout_secs))
            .build()?;

        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let server = Arc::new(LocalServer::new(config.port));

        Ok(Self {
            config: Arc::new(config),
            client,
            store: Arc::new(store),
            server,
            targets,
            session_url: Arc::new(RwLock::new(None)),
            download_locks: Arc::new(Mutex::new(HashMap::new())),
            event_tx,
        })
    }

    /// Subscribe to lifecycle and target-change events
    ///
    /// The host typically reloads its webview on
    /// [`Event::TargetChanged`](crate::Event::TargetChanged).
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Set the active target to a remote URL
    ///
    /// With `persist`, the URL is written to durable storage and any
    /// session override is dropped; without it, the URL becomes a
    /// session-only override and the durable record is cleared. Either way
    /// the active-asset record is cleared and a running local file server
    /// is stopped: a manual remote override supersedes a served asset.
    ///
    /// Returns the now-active snapshot.
    pub async fn set_server(&self, url: &str, persist: bool) -> ActiveTarget {
        self.record_target(url, persist, None).await;
        if self.server.is_running().await {
            self.server.stop().await;
            self.emit(Event::ServerStopped);
        }

        info!(url = %url, persist, "remote target set");
        self.emit(Event::TargetChanged {
            url: Some(url.to_string()),
            persisted: persist,
        });
        self.get_server().await
    }

    /// Read-only snapshot of the active target
    ///
    /// A session override, when present, always wins over the durable
    /// record; `persisted` is only reported for a durable URL.
    pub async fn get_server(&self) -> ActiveTarget {
        if let Some(url) = self.session_url.read().await.clone() {
            return ActiveTarget {
                url: Some(url),
                persisted: false,
            };
        }
        let saved = self.targets.get(KEY_SERVER_URL);
        ActiveTarget {
            persisted: saved.is_some(),
            url: saved,
        }
    }

    /// Return the host to its built-in default content
    ///
    /// Removes the session override, the durable URL, and the active-asset
    /// record, and stops the local file server if it is running.
    pub async fn clear_server(&self) {
        *self.session_url.write().await = None;
        self.targets.remove(KEY_SERVER_URL);
        self.targets.remove(KEY_ACTIVE_ASSET);

        if self.server.is_running().await {
            self.server.stop().await;
            self.emit(Event::ServerStopped);
        }

        info!("target cleared, back to default content");
        self.emit(Event::TargetChanged {
            url: None,
            persisted: false,
        });
    }

    /// Alias of [`clear_server`](Self::clear_server)
    pub async fn restore_default_asset(&self) {
        self.clear_server().await;
    }

    /// Serve a stored asset and make it the active target
    ///
    /// Locates the asset's web root (falling back to the asset's own
    /// directory when no entry point exists anywhere in the bundle),
    /// starts the local file server on it or swaps the root if the server
    /// is already running, and records the derived local URL as the active
    /// target. With `persist`, the asset name is recorded as well so the
    /// target survives a process restart via
    /// [`restore_persisted`](Self::restore_persisted).
    ///
    /// Returns the URL the host should load.
    ///
    /// # Errors
    ///
    /// [`Error::AssetNotFound`] when no such asset exists,
    /// [`Error::Bind`] when the server port cannot be bound.
    pub async fn apply_asset(&self, name: &str, persist: bool) -> Result<String> {
        let asset_dir = self
            .store
            .resolve_path(name)
            .ok_or_else(|| Error::AssetNotFound(name.to_string()))?;
        let root = self.locate_root(name, &asset_dir);

        let was_running = self.server.is_running().await;
        let addr = self.server.start(root).await?;
        if !was_running {
            self.emit(Event::ServerStarted { addr });
        }

        let url = format!("http://{}", addr);
        self.record_target(&url, persist, persist.then_some(name)).await;

        info!(asset = %name, url = %url, persist, "asset applied");
        self.emit(Event::TargetChanged {
            url: Some(url.clone()),
            persisted: persist,
        });
        Ok(url)
    }

    /// Re-activate a persisted asset target after a process restart
    ///
    /// Call once on startup, before the host's first load. When a
    /// persisted active-asset record exists, its web root is re-resolved
    /// and the local file server restarted without re-running the
    /// download. A record whose asset directory has vanished is cleared
    /// rather than failing the launch.
    ///
    /// Returns the restored URL, or `None` when there was nothing to
    /// restore.
    ///
    /// # Errors
    ///
    /// [`Error::Bind`] when the server port cannot be bound.
    pub async fn restore_persisted(&self) -> Result<Option<String>> {
        let Some(name) = self.targets.get(KEY_ACTIVE_ASSET) else {
            return Ok(None);
        };
        let Some(asset_dir) = self.store.resolve_path(&name) else {
            warn!(asset = %name, "persisted asset no longer on disk, clearing stale target");
            self.targets.remove(KEY_ACTIVE_ASSET);
            self.targets.remove(KEY_SERVER_URL);
            return Ok(None);
        };

        let root = self.locate_root(&name, &asset_dir);
        let addr = self.server.start(root).await?;
        let url = format!("http://{}", addr);
        // Refresh the durable URL: an ephemeral-port configuration may
        // have resolved to a different port than the previous run.
        self.targets.set(KEY_SERVER_URL, &url);
        self.emit(Event::ServerStarted { addr });

        info!(asset = %name, url = %url, "persisted asset target restored");
        Ok(Some(url))
    }

    /// List the names of all stored assets
    pub fn list_assets(&self) -> Result<Vec<String>> {
        self.store.list()
    }

    /// Delete a stored asset
    ///
    /// Removing a name that does not exist is a no-op. Removing the asset
    /// currently being served does not stop the server; the next requests
    /// will answer 404/500 until the target changes.
    pub fn remove_asset(&self, name: &str) -> Result<()> {
        self.store.remove(name)
    }

    /// The local file server's bound address while running
    pub async fn server_addr(&self) -> Option<SocketAddr> {
        self.server.addr().await
    }

    /// Record `url` as the active target
    ///
    /// `asset` carries the name to persist alongside a durable URL;
    /// ephemeral recording clears both durable keys so a stale persisted
    /// target cannot resurface on the next launch.
    async fn record_target(&self, url: &str, persist: bool, asset: Option<&str>) {
        if persist {
            self.targets.set(KEY_SERVER_URL, url);
            match asset {
                Some(name) => self.targets.set(KEY_ACTIVE_ASSET, name),
                None => self.targets.remove(KEY_ACTIVE_ASSET),
            }
            *self.session_url.write().await = None;
        } else {
            *self.session_url.write().await = Some(url.to_string());
            self.targets.remove(KEY_SERVER_URL);
            self.targets.remove(KEY_ACTIVE_ASSET);
        }
    }

    /// The directory to serve for an asset
    fn locate_root(&self, name: &str, asset_dir: &Path) -> std::path::PathBuf {
        match locator::find_web_root(asset_dir) {
            Some(root) => root,
            None => {
                warn!(
                    asset = %name,
                    "no {} found anywhere in asset, serving its top-level directory",
                    locator::ENTRY_POINT
                );
                asset_dir.to_path_buf()
            }
        }
    }

    /// Acquire the per-name download lock
    pub(crate) async fn lock_asset(&self, name: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.download_locks.lock().await;
            locks
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        debug!(asset = %name, "acquiring per-asset lock");
        lock.lock_owned().await
    }

    pub(crate) fn emit(&self, event: Event) {
        // Send fails only when no subscriber is listening, which is fine.
        let _ = self.event_tx.send(event);
    }

    pub(crate) fn http_client(&self) -> &reqwest::Client {
        &self.client
    }

    pub(crate) fn asset_store(&self) -> &AssetStore {
        &self.store
    }

    pub(crate) fn temp_dir(&self) -> &Path {
        &self.config.temp_dir
    }
}
