// src/system/transport.rs

//! Package transport: fetching tarballs by URL and uploading them for publication.
//!
//! `http(s)://` URLs go through `reqwest`; `file://` URLs are read straight from
//! disk so an offline registry works with the same code path.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::path::PathBuf;
use thiserror::Error;

use crate::constants::{PACKAGE_EXTENSION, PACKAGES_ENDPOINT, PUBLISH_ENDPOINT};

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Unsupported URL '{0}'. Expected http://, https:// or file://")]
    UnsupportedUrl(String),
    #[error("Request to '{url}' failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Request to '{url}' failed with status {status}.")]
    Status { url: String, status: u16 },
    #[error("Could not read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The upload was rejected or never reached the server.
    #[error("UPLOAD_ERROR: {reason}")]
    Upload { reason: String },
}

impl TransportError {
    /// `true` when the resource simply is not there (404 or missing file).
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Status { status, .. } => *status == StatusCode::NOT_FOUND.as_u16(),
            Self::Io { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Fetches package bytes by URL.
#[async_trait]
pub trait Downloader: Send + Sync + std::fmt::Debug {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, TransportError>;
}

/// Hands a packaged recipe to the server, authenticated by a publish key.
#[async_trait]
pub trait Uploader: Send + Sync + std::fmt::Debug {
    async fn upload(&self, publish_key: &str, package: Vec<u8>) -> Result<(), TransportError>;
}

/// The URL a published version is downloaded from.
pub fn package_url(
    server_url: &str,
    recipe_type: &str,
    scope: &str,
    name: &str,
    version: &str,
) -> String {
    format!(
        "{}/{}/{}/{}/{}/{}.{}",
        server_url.trim_end_matches('/'),
        PACKAGES_ENDPOINT,
        recipe_type,
        scope,
        name,
        version,
        PACKAGE_EXTENSION
    )
}

/// The publish endpoint of a server.
pub fn publish_url(server_url: &str) -> String {
    format!("{}/{}", server_url.trim_end_matches('/'), PUBLISH_ENDPOINT)
}

/// Maps a `file://` URL to a local path. Returns `None` for any other scheme.
pub fn file_url_to_path(url: &str) -> Option<PathBuf> {
    let rest = url.strip_prefix("file://")?;
    // `file:///C:/x` on Windows carries a leading slash before the drive letter.
    if cfg!(target_os = "windows") && rest.get(2..3) == Some(":") {
        if let Some(drive_path) = rest.strip_prefix('/') {
            return Some(PathBuf::from(drive_path));
        }
    }
    Some(PathBuf::from(rest))
}

/// Downloads over HTTP(S) or from `file://` locations.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Downloader for HttpTransport {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        if let Some(path) = file_url_to_path(url) {
            log::debug!("Reading package from '{}'", path.display());
            return tokio::fs::read(&path)
                .await
                .map_err(|source| TransportError::Io { path, source });
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(TransportError::UnsupportedUrl(url.to_string()));
        }

        log::debug!("Downloading '{}'", url);
        let http_err = |source| TransportError::Http {
            url: url.to_string(),
            source,
        };
        let response = self.client.get(url).send().await.map_err(http_err)?;
        if !response.status().is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        let bytes = response.bytes().await.map_err(http_err)?;
        Ok(bytes.to_vec())
    }
}

/// Uploads to `<server>/api/v1/publish` with the publish key as bearer token.
#[derive(Debug, Clone)]
pub struct HttpUploader {
    endpoint: String,
    client: Client,
}

impl HttpUploader {
    pub fn new(server_url: &str) -> Self {
        Self {
            endpoint: publish_url(server_url),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl Uploader for HttpUploader {
    async fn upload(&self, publish_key: &str, package: Vec<u8>) -> Result<(), TransportError> {
        log::debug!("Uploading {} bytes to '{}'", package.len(), self.endpoint);
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(publish_key)
            .header(reqwest::header::CONTENT_TYPE, "application/gzip")
            .body(package)
            .send()
            .await
            .map_err(|e| TransportError::Upload {
                reason: e.to_string(),
            })?;

        if response.status() != StatusCode::OK {
            return Err(TransportError::Upload {
                reason: format!("server answered with status {}", response.status()),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_package_url_layout() {
        assert_eq!(
            package_url("https://recipes.example.com/", "gulp", "public", "mylib", "1.2.0"),
            "https://recipes.example.com/api/v1/packages/gulp/public/mylib/1.2.0.tgz"
        );
        assert_eq!(
            publish_url("https://recipes.example.com"),
            "https://recipes.example.com/api/v1/publish"
        );
    }

    #[tokio::test]
    async fn test_fetch_file_url() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("pkg.tgz");
        std::fs::write(&file, b"bytes").unwrap();

        let url = format!("file://{}", file.to_string_lossy().replace('\\', "/"));
        let bytes = HttpTransport::new().fetch(&url).await.unwrap();
        assert_eq!(bytes, b"bytes");
    }

    #[tokio::test]
    async fn test_fetch_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let url = format!("file://{}/nope.tgz", dir.path().to_string_lossy());
        let err = HttpTransport::new().fetch(&url).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_fetch_rejects_unknown_scheme() {
        let err = HttpTransport::new().fetch("ftp://x/y.tgz").await.unwrap_err();
        assert!(matches!(err, TransportError::UnsupportedUrl(_)));
    }

    #[tokio::test]
    async fn test_upload_non_200_is_upload_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let _ = socket
                .write_all(b"HTTP/1.1 403 Forbidden\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
                .await;
        });

        let uploader = HttpUploader::new(&format!("http://{}", addr));
        let err = uploader.upload("key", b"pkg".to_vec()).await.unwrap_err();
        assert!(matches!(err, TransportError::Upload { .. }));
    }
}
