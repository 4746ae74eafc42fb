//! Asset store
//!
//! Catalogues extracted asset bundles on local storage. Every asset is one
//! top-level directory under the managed assets root; the directory name is
//! the asset name. This layer is synchronous and deliberately free of
//! locking: callers serialize conflicting operations per asset name.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Catalogue of extracted asset bundles
#[derive(Debug)]
pub struct AssetStore {
    assets_dir: PathBuf,
}

impl AssetStore {
    /// Open the store, creating the assets directory if missing
    pub fn new(assets_dir: impl Into<PathBuf>) -> Result<Self> {
        let assets_dir = assets_dir.into();
        std::fs::create_dir_all(&assets_dir).map_err(|e| Error::io(&assets_dir, e))?;
        Ok(Self { assets_dir })
    }

    /// The managed assets root
    pub fn assets_dir(&self) -> &Path {
        &self.assets_dir
    }

    /// List the names of all stored assets
    ///
    /// Every top-level directory under the assets root counts as one asset.
    /// Names are returned sorted for stable output.
    pub fn list(&self) -> Result<Vec<String>> {
        let entries =
            std::fs::read_dir(&self.assets_dir).map_err(|e| Error::io(&self.assets_dir, e))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(&self.assets_dir, e))?;
            let path = entry.path();
            if path.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Recursively delete an asset's directory
    ///
    /// Removing a name that does not exist is a no-op, not an error.
    pub fn remove(&self, name: &str) -> Result<()> {
        let dir = self.asset_dir(name)?;
        if dir.is_dir() {
            std::fs::remove_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
            debug!(asset = %name, "removed asset directory");
        }
        Ok(())
    }

    /// Path of an asset's directory, `None` if no such asset exists
    pub fn resolve_path(&self, name: &str) -> Option<PathBuf> {
        let dir = self.asset_dir(name).ok()?;
        if dir.is_dir() { Some(dir) } else { None }
    }

    /// Validated join of an asset name onto the assets root
    ///
    /// Rejects names that could address anything outside the root. Names
    /// produced by the fetcher's sanitizer always pass.
    pub(crate) fn asset_dir(&self, name: &str) -> Result<PathBuf> {
        if !is_valid_asset_name(name) {
            return Err(Error::InvalidInput(format!(
                "invalid asset name '{name}'"
            )));
        }
        Ok(self.assets_dir.join(name))
    }
}

/// A usable asset name is a single path component without traversal
fn is_valid_asset_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.chars().any(std::path::is_separator)
}
