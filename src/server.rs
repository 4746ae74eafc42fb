//! Local file server
//!
//! One long-lived HTTP listener streams static files from a mutable root
//! directory so the host webview can load locally extracted bundles. The
//! listener binds loopback-only, keeps its port for the process lifetime
//! once first bound, and swaps its content root without rebinding.
//!
//! `start`, `stop`, and `swap_root` are the only mutators and are mutually
//! exclusive under a single lock. Request handling proceeds concurrently
//! against a root snapshotted at request entry, so an in-flight request is
//! never affected by a concurrent swap.

use crate::error::{Error, Result};
use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::{StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

/// Singleton local HTTP server with a swappable content root
#[derive(Debug)]
pub struct LocalServer {
    port: u16,
    slot: Mutex<ServerSlot>,
}

#[derive(Debug, Default)]
struct ServerSlot {
    running: Option<RunningServer>,
    /// Address of the first successful bind; reused on later starts so the
    /// port stays fixed for the process lifetime even when configured as 0.
    bound: Option<SocketAddr>,
}

#[derive(Debug)]
struct RunningServer {
    addr: SocketAddr,
    root: Arc<RwLock<PathBuf>>,
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

/// Shared request-handler state
#[derive(Clone)]
struct ServeState {
    root: Arc<RwLock<PathBuf>>,
}

impl LocalServer {
    /// Create a stopped server that will bind on `port` when first started
    ///
    /// Port 0 requests an ephemeral port; the resolved port is then fixed
    /// for the process lifetime.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            slot: Mutex::new(ServerSlot::default()),
        }
    }

    /// Start serving `root`, or swap the root if already running
    ///
    /// From stopped: binds the loopback listener and spawns the accept
    /// loop. While running: never rebinds, only replaces the root used by
    /// subsequently accepted requests. Returns the bound address either
    /// way.
    ///
    /// # Errors
    ///
    /// [`Error::Bind`] when the listening socket cannot be bound.
    pub async fn start(&self, root: PathBuf) -> Result<SocketAddr> {
        let mut slot = self.slot.lock().await;

        if let Some(running) = slot.running.as_ref() {
            *running.root.write().await = root;
            debug!(addr = %running.addr, "local server already running, root swapped");
            return Ok(running.addr);
        }

        let addr = slot
            .bound
            .unwrap_or_else(|| SocketAddr::from((Ipv4Addr::LOCALHOST, self.port)));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Bind { addr, source: e })?;
        let addr = listener.local_addr().map_err(|e| Error::Bind { addr, source: e })?;
        slot.bound = Some(addr);

        let root = Arc::new(RwLock::new(root));
        let app = router(ServeState { root: root.clone() });
        let shutdown = CancellationToken::new();
        let signal = shutdown.clone().cancelled_owned();
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(signal)
                .await
            {
                error!(error = %e, "local file server terminated unexpectedly");
            }
        });

        slot.running = Some(RunningServer {
            addr,
            root,
            shutdown,
            handle,
        });
        info!(%addr, "local file server listening");
        Ok(addr)
    }

    /// Atomically replace the root used by subsequently accepted requests
    ///
    /// In-flight requests already past root resolution are unaffected.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] when the server is not running.
    pub async fn swap_root(&self, new_root: PathBuf) -> Result<()> {
        let slot = self.slot.lock().await;
        match slot.running.as_ref() {
            Some(running) => {
                *running.root.write().await = new_root;
                debug!(addr = %running.addr, "content root swapped");
                Ok(())
            }
            None => Err(Error::InvalidInput(
                "local file server is not running".to_string(),
            )),
        }
    }

    /// Stop accepting requests and close the listening socket
    ///
    /// In-flight requests are allowed to finish. Stopping a stopped server
    /// is a no-op. A later `start` rebinds the same port.
    pub async fn stop(&self) {
        let mut slot = self.slot.lock().await;
        if let Some(running) = slot.running.take() {
            running.shutdown.cancel();
            if let Err(e) = running.handle.await {
                error!(error = %e, "local file server task failed during shutdown");
            }
            info!(addr = %running.addr, "local file server stopped");
        }
    }

    /// The bound address while running, `None` when stopped
    pub async fn addr(&self) -> Option<SocketAddr> {
        self.slot.lock().await.running.as_ref().map(|r| r.addr)
    }

    /// Whether the listener is currently accepting requests
    pub async fn is_running(&self) -> bool {
        self.slot.lock().await.running.is_some()
    }
}

fn router(state: ServeState) -> Router {
    Router::new()
        .fallback(serve_path)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve one request path from the currently configured root
///
/// The root is snapshotted once at entry. Traversal defense happens in two
/// stages: a lexical component check before any filesystem access, then a
/// canonical-prefix comparison that also covers symlinks.
async fn serve_path(State(state): State<ServeState>, uri: Uri) -> Response {
    let root = state.root.read().await.clone();

    let decoded = match urlencoding::decode(uri.path()) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => return plain_response(StatusCode::NOT_FOUND, "Not Found"),
    };
    let mut request_path = decoded;
    if request_path.ends_with('/') {
        request_path.push_str(crate::locator::ENTRY_POINT);
    }

    let relative = match sanitize_request_path(&request_path) {
        Some(relative) => relative,
        None => {
            debug!(path = %request_path, "rejected traversal attempt");
            return plain_response(StatusCode::FORBIDDEN, "Forbidden");
        }
    };

    let canonical_root = match tokio::fs::canonicalize(&root).await {
        Ok(canonical) => canonical,
        Err(_) => return plain_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Error"),
    };
    let canonical = match tokio::fs::canonicalize(root.join(&relative)).await {
        Ok(canonical) => canonical,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return plain_response(StatusCode::NOT_FOUND, "Not Found");
        }
        Err(_) => return plain_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Error"),
    };
    if !canonical.starts_with(&canonical_root) {
        debug!(path = %canonical.display(), "canonical path escapes root");
        return plain_response(StatusCode::FORBIDDEN, "Forbidden");
    }
    if !canonical.is_file() {
        return plain_response(StatusCode::NOT_FOUND, "Not Found");
    }

    let file = match tokio::fs::File::open(&canonical).await {
        Ok(file) => file,
        Err(_) => return plain_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Error"),
    };
    let body = Body::from_stream(ReaderStream::new(file));
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for(&canonical))
        .body(body)
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn plain_response(status: StatusCode, message: &'static str) -> Response {
    (status, message).into_response()
}

/// Lexically reduce a request path to a relative path inside the root
///
/// `None` means the path carries a component (parent dir, root, prefix)
/// that could address outside the root; such requests are forbidden before
/// the filesystem is touched at all.
fn sanitize_request_path(request_path: &str) -> Option<PathBuf> {
    let mut clean = PathBuf::new();
    for component in Path::new(request_path.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(clean)
}

/// Fixed extension to content-type table
///
/// Unknown or absent extensions fall back to the generic binary type.
fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" | "mjs" => "text/javascript",
        "json" | "map" => "application/json",
        "wasm" => "application/wasm",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "txt" => "text/plain",
        "xml" => "text/xml",
        "pdf" => "application/pdf",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        _ => "application/octet-stream",
    }
}
