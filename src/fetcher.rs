//! Archive fetching, verification, and installation
//!
//! Downloads a remote zip archive into an exclusively owned temporary file,
//! optionally verifies a SHA-256 checksum over the complete file, then
//! extracts it into the asset store under a name derived from the URL.
//! Operations on the same derived name are serialized; different names run
//! independently.

use crate::devserver::DevServer;
use crate::error::{Error, Result};
use crate::extract;
use crate::types::Event;
use sha2::{Digest, Sha256};
use std::path::Path;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tokio::task::spawn_blocking;
use tracing::{debug, info, warn};
use url::Url;

impl DevServer {
    /// Download a zip archive and install it as a named asset
    ///
    /// Issues a streaming GET against `url`, writes the body to a temporary
    /// file, verifies `checksum` (hex SHA-256, case-insensitive) when one
    /// is supplied, and extracts the archive into the asset store. The
    /// asset name is the URL's final path segment with the `.zip` suffix
    /// stripped and unsafe characters replaced by `_`.
    ///
    /// If an asset with that name already exists, the call is a successful
    /// no-op unless `overwrite` is set, in which case the existing
    /// directory is replaced wholesale. The temporary file is removed on
    /// every exit path.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] for an unparseable URL or one without a
    ///   usable file name segment
    /// - [`Error::Network`] / [`Error::HttpStatus`] for transport failures
    ///   and non-success statuses
    /// - [`Error::ChecksumMismatch`] when verification fails; nothing is
    ///   installed
    /// - [`Error::Extraction`] for a malformed archive or one containing
    ///   entries that escape the target directory
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use webview_devserver::{Config, DevServer};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let devserver = DevServer::new(Config::default())?;
    ///     devserver
    ///         .download_asset("https://builds.example.com/web-v42.zip", false, None)
    ///         .await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn download_asset(
        &self,
        url: &str,
        overwrite: bool,
        checksum: Option<&str>,
    ) -> Result<()> {
        let name = asset_name_from_url(url)?;
        // Serialize per derived name so two downloads racing toward the
        // same directory cannot interleave replacement.
        let _guard = self.lock_asset(&name).await;

        match self.download_and_extract(url, &name, overwrite, checksum).await {
            Ok(()) => {
                info!(asset = %name, url = %url, "asset download complete");
                self.emit(Event::DownloadComplete { asset: name });
                Ok(())
            }
            Err(e) => {
                warn!(url = %url, error = %e, "asset download failed");
                self.emit(Event::DownloadFailed {
                    url: url.to_string(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn download_and_extract(
        &self,
        url: &str,
        name: &str,
        overwrite: bool,
        checksum: Option<&str>,
    ) -> Result<()> {
        let temp_dir = self.temp_dir();
        // Owned by this download alone; dropped (and thereby deleted) on
        // every exit path.
        let temp = NamedTempFile::new_in(temp_dir).map_err(|e| Error::io(temp_dir, e))?;

        self.fetch_to_file(url, &temp).await?;

        if let Some(expected) = checksum {
            verify_checksum(temp.path(), expected).await?;
        }

        let target = self.asset_store().asset_dir(name)?;
        if target.exists() {
            if !overwrite {
                debug!(asset = %name, "asset already present, skipping extraction");
                return Ok(());
            }
            self.asset_store().remove(name)?;
        }

        let archive = temp.path().to_path_buf();
        let extract_target = target.clone();
        spawn_blocking(move || extract::extract_zip(&archive, &extract_target))
            .await
            .map_err(|e| Error::Extraction {
                archive: temp.path().to_path_buf(),
                reason: format!("extraction task panicked: {}", e),
            })??;

        Ok(())
    }

    /// Stream the response body for `url` into `temp`
    async fn fetch_to_file(&self, url: &str, temp: &NamedTempFile) -> Result<()> {
        debug!(url = %url, "fetching archive");
        let mut response = self.http_client().get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let file = temp.reopen().map_err(|e| Error::io(temp.path(), e))?;
        let mut file = tokio::fs::File::from_std(file);
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk)
                .await
                .map_err(|e| Error::io(temp.path(), e))?;
        }
        file.flush().await.map_err(|e| Error::io(temp.path(), e))?;
        Ok(())
    }
}

/// Compare the SHA-256 digest of `path` against `expected`, case-insensitive
async fn verify_checksum(path: &Path, expected: &str) -> Result<()> {
    let file_path = path.to_path_buf();
    let actual = spawn_blocking(move || sha256_hex(&file_path))
        .await
        .map_err(|e| {
            Error::io(
                path,
                std::io::Error::other(format!("checksum task panicked: {}", e)),
            )
        })??;

    if actual.eq_ignore_ascii_case(expected) {
        debug!(digest = %actual, "checksum verified");
        Ok(())
    } else {
        Err(Error::ChecksumMismatch {
            expected: expected.to_string(),
            actual,
        })
    }
}

/// Hex SHA-256 digest of a file's complete contents
fn sha256_hex(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path).map_err(|e| Error::io(path, e))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher).map_err(|e| Error::io(path, e))?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Derive the asset name from an archive URL
///
/// Takes the URL's final path segment, strips a trailing `.zip`, and
/// replaces every character outside `[A-Za-z0-9.-]` with `_`.
pub(crate) fn asset_name_from_url(raw_url: &str) -> Result<String> {
    let url = Url::parse(raw_url)
        .map_err(|e| Error::InvalidInput(format!("invalid url '{}': {}", raw_url, e)))?;
    let segment = url
        .path_segments()
        .and_then(|segments| segments.last())
        .unwrap_or("");
    let stem = segment.strip_suffix(".zip").unwrap_or(segment);

    let name: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if name.is_empty() || name.chars().all(|c| c == '.') {
        return Err(Error::InvalidInput(format!(
            "url '{}' has no usable file name segment",
            raw_url
        )));
    }
    Ok(name)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_strips_zip_suffix() {
        assert_eq!(
            asset_name_from_url("http://host.com/ver1.zip").unwrap(),
            "ver1"
        );
    }

    #[test]
    fn name_keeps_non_zip_segment_verbatim_modulo_sanitizing() {
        assert_eq!(
            asset_name_from_url("http://host.com/bundle.tar").unwrap(),
            "bundle.tar"
        );
    }

    #[test]
    fn name_replaces_unsafe_characters() {
        assert_eq!(
            asset_name_from_url("http://host.com/my%20app@2.zip").unwrap(),
            "my_20app_2"
        );
    }

    #[test]
    fn name_survives_query_strings() {
        assert_eq!(
            asset_name_from_url("https://cdn.example.com/builds/web-v4.2.zip?token=abc").unwrap(),
            "web-v4.2"
        );
    }

    #[test]
    fn url_without_file_segment_is_invalid() {
        assert!(matches!(
            asset_name_from_url("http://host.com/"),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            asset_name_from_url("not a url"),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn sha256_hex_digests_file_contents() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), b"hello world").unwrap();
        assert_eq!(
            sha256_hex(temp.path()).unwrap(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }
}
