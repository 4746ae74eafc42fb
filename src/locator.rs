//! Web root locator
//!
//! Archives come in many shapes: some carry `index.html` at the top level,
//! others wrap the site in one or more directory layers (`dist/`,
//! `MyApp/www/`). The locator finds the directory that should be served as
//! the HTTP root.

use std::path::{Path, PathBuf};
use tracing::trace;

/// The well-known entry-point file a servable directory must contain
pub const ENTRY_POINT: &str = "index.html";

/// Find the directory inside `asset_dir` to serve as the HTTP root
///
/// Pre-order depth-first search: a directory directly containing
/// [`ENTRY_POINT`] wins immediately, otherwise its subdirectories are
/// searched in listing order. Listing order is platform-defined, so when
/// several subtrees each contain an entry point, which one wins is
/// unspecified.
///
/// Returns `None` when no directory in the subtree contains the entry
/// point; the caller decides whether to fall back to `asset_dir` itself.
pub fn find_web_root(asset_dir: &Path) -> Option<PathBuf> {
    if !asset_dir.is_dir() {
        return None;
    }
    if asset_dir.join(ENTRY_POINT).is_file() {
        trace!(root = %asset_dir.display(), "web root found");
        return Some(asset_dir.to_path_buf());
    }

    let entries = std::fs::read_dir(asset_dir).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if let Some(found) = find_web_root(&path) {
                return Some(found);
            }
        }
    }
    None
}
