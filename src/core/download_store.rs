// src/core/download_store.rs

//! URL-addressed package downloads, memoized in memory and on disk.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::constants::PACKAGE_EXTENSION;
use crate::core::cache::{RecipeDownloadCache, url_fingerprint};
use crate::core::error::{RecipeError, RecipeResult};
use crate::core::package::RecipePackage;
use crate::system::transport::Downloader;

/// A package obtained from a URL, and where its tarball lives on disk.
#[derive(Debug)]
pub struct RecipeDownload {
    /// Where the package came from.
    pub url: String,
    /// The cached tarball.
    pub path: PathBuf,
    /// The package read from it.
    pub package: RecipePackage,
}

/// Resolves a package URL to a local download.
///
/// Lookup order: in-memory slot, then `<dir>/<fingerprint(url)>.tgz`, then the
/// network. Concurrent first callers for one URL share a single slot, so the URL is
/// fetched and written at most once. A failed attempt leaves the slot empty and the
/// next call tries again.
#[derive(Debug)]
pub struct RecipeDownloadStore {
    dir: PathBuf,
    downloader: Arc<dyn Downloader>,
    cache: RecipeDownloadCache,
}

impl RecipeDownloadStore {
    /// Caches tarballs under `dir` and fetches misses with `downloader`.
    pub fn new(dir: impl Into<PathBuf>, downloader: Arc<dyn Downloader>) -> Self {
        Self {
            dir: dir.into(),
            downloader,
            cache: RecipeDownloadCache::new("downloads"),
        }
    }

    /// The cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The on-disk location of the download for `url`.
    pub fn path_for(&self, url: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", url_fingerprint(url), PACKAGE_EXTENSION))
    }

    /// Returns the download for `url`, fetching it at most once per process.
    pub async fn download(&self, url: &str) -> RecipeResult<Arc<RecipeDownload>> {
        let slot = self
            .cache
            .get_or_insert_with(url, || Arc::new(OnceCell::new()));
        slot.get_or_try_init(|| self.load_or_fetch(url))
            .await
            .cloned()
    }

    async fn load_or_fetch(&self, url: &str) -> RecipeResult<Arc<RecipeDownload>> {
        let path = self.path_for(url);

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {
                log::debug!("Download cache hit for '{}' at '{}'", url, path.display());
                let bytes = tokio::fs::read(&path).await?;
                let package = RecipePackage::from_tarball(bytes)?;
                return Ok(Arc::new(RecipeDownload {
                    url: url.to_string(),
                    path,
                    package,
                }));
            }
            Ok(_) => {
                return Err(RecipeError::InvalidPackage {
                    reason: format!("download cache entry '{}' is not a file", path.display()),
                });
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        log::debug!("Download cache miss for '{}'", url);
        let package = RecipePackage::from_url(url, self.downloader.as_ref()).await?;
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(&path, package.bytes()).await?;
        log::debug!("Cached '{}' at '{}'", url, path.display());

        Ok(Arc::new(RecipeDownload {
            url: url.to_string(),
            path,
            package,
        }))
    }

    /// Removes every cached tarball and forgets in-memory downloads.
    /// Returns the number of files deleted.
    pub async fn clear(&self) -> RecipeResult<usize> {
        self.cache.clear();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_file()
                && path.extension().is_some_and(|ext| ext == PACKAGE_EXTENSION)
            {
                tokio::fs::remove_file(&path).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
