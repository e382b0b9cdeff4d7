//! Storage abstraction for byte sources and destinations.
//!
//! Provides a unified interface for addressing a single object on Amazon S3
//! or the local filesystem. A provider owns the client handle for exactly
//! one object (the source extract, the cleaned destination, or a report
//! location) and exposes the narrow operations the sanitizer needs:
//! stat, ranged reads, whole-object put, and a buffered streaming writer.

mod local;
mod s3;

use bytes::Bytes;
use object_store::ObjectStore;
use object_store::buffered::BufWriter;
use object_store::path::Path;
use regex::Regex;
use snafu::prelude::*;
use std::collections::HashMap;
use std::ops::Range;
use std::sync::{Arc, LazyLock};

use crate::error::{InvalidUrlSnafu, ObjectStoreSnafu, StorageError};

pub use local::LocalConfig;
pub use s3::S3Config;

/// A reference-counted storage provider.
pub type StorageProviderRef = Arc<StorageProvider>;

// URL patterns for the supported backends.
const S3_URL: &str = r"^[sS]3[aA]?://(?P<bucket>[a-z0-9\-\.]+)/(?P<key>.+)$";
const S3_VIRTUAL: &str =
    r"^https://(?P<bucket>[a-z0-9\-\.]+)\.s3\.(?P<region>[\w\-]+)\.amazonaws\.com/(?P<key>.+)$";
const FILE_URI: &str = r"^file://(?P<path>/.+)$";
const FILE_PATH: &str = r"^(?P<path>/.+)$";

static S3_MATCHERS: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        Regex::new(S3_URL).expect("valid pattern"),
        Regex::new(S3_VIRTUAL).expect("valid pattern"),
    ]
});

static LOCAL_MATCHERS: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        Regex::new(FILE_URI).expect("valid pattern"),
        Regex::new(FILE_PATH).expect("valid pattern"),
    ]
});

/// Backend configuration for a single addressed object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    S3(S3Config),
    Local(LocalConfig),
}

impl BackendConfig {
    /// Parse a URL or filesystem path into a backend configuration.
    pub fn parse_url(url: &str) -> Result<Self, StorageError> {
        if let Some(caps) = S3_MATCHERS.iter().find_map(|r| r.captures(url)) {
            return Ok(BackendConfig::S3(S3Config {
                bucket: caps["bucket"].to_string(),
                region: std::env::var("AWS_DEFAULT_REGION")
                    .ok()
                    .or_else(|| caps.name("region").map(|m| m.as_str().to_string())),
                endpoint: std::env::var("AWS_ENDPOINT").ok(),
                key: Path::from(&caps["key"]),
            }));
        }

        if let Some(caps) = LOCAL_MATCHERS.iter().find_map(|r| r.captures(url)) {
            let full = std::path::PathBuf::from(&caps["path"]);
            let file_name = full
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_string);
            let key = match file_name {
                Some(name) => name,
                None => return InvalidUrlSnafu { url }.fail(),
            };
            let parent = full
                .parent()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_else(|| "/".to_string());
            return Ok(BackendConfig::Local(LocalConfig {
                directory: parent,
                key: Path::from(key),
            }));
        }

        InvalidUrlSnafu { url }.fail()
    }

    /// The object key within the backend.
    pub fn key(&self) -> &Path {
        match self {
            BackendConfig::S3(s3) => &s3.key,
            BackendConfig::Local(local) => &local.key,
        }
    }
}

/// Storage provider addressing a single object on a storage backend.
#[derive(Clone)]
pub struct StorageProvider {
    pub(crate) config: BackendConfig,
    pub(crate) object_store: Arc<dyn ObjectStore>,
    pub(crate) canonical_url: String,
}

impl std::fmt::Debug for StorageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StorageProvider<{}>", self.canonical_url)
    }
}

impl StorageProvider {
    /// Create a storage provider for the given URL.
    pub async fn for_url(url: &str) -> Result<Self, StorageError> {
        Self::for_url_with_options(url, HashMap::new()).await
    }

    /// Create a storage provider for the given URL with storage options.
    pub async fn for_url_with_options(
        url: &str,
        options: HashMap<String, String>,
    ) -> Result<Self, StorageError> {
        match BackendConfig::parse_url(url)? {
            BackendConfig::S3(config) => Self::construct_s3(config, options).await,
            BackendConfig::Local(config) => Self::construct_local(config).await,
        }
    }

    /// The canonical URL of the addressed object, for log/error context.
    pub fn url(&self) -> &str {
        &self.canonical_url
    }

    /// Total size of the addressed object in bytes.
    pub async fn size(&self) -> Result<usize, StorageError> {
        let meta = self
            .object_store
            .head(self.config.key())
            .await
            .context(ObjectStoreSnafu)?;
        Ok(meta.size)
    }

    /// Read a byte range of the addressed object.
    pub async fn get_range(&self, range: Range<usize>) -> Result<Bytes, StorageError> {
        self.object_store
            .get_range(self.config.key(), range)
            .await
            .context(ObjectStoreSnafu)
    }

    /// Read the whole addressed object.
    pub async fn get(&self) -> Result<Bytes, StorageError> {
        let result = self
            .object_store
            .get(self.config.key())
            .await
            .context(ObjectStoreSnafu)?;
        result.bytes().await.context(ObjectStoreSnafu)
    }

    /// Write the whole addressed object in one shot.
    pub async fn put(&self, bytes: Bytes) -> Result<(), StorageError> {
        self.object_store
            .put(self.config.key(), bytes.into())
            .await
            .context(ObjectStoreSnafu)?;
        Ok(())
    }

    /// A buffered streaming writer for the addressed object.
    ///
    /// Small outputs become a single put; large ones a multipart upload.
    /// Nothing is visible at the destination until the writer is shut down.
    pub fn writer(&self, capacity: usize) -> BufWriter {
        BufWriter::with_capacity(
            Arc::clone(&self.object_store),
            self.config.key().clone(),
            capacity,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_s3_url_parsing() {
        let config = BackendConfig::parse_url("s3://mybucket/extracts/dump.txt").unwrap();
        match config {
            BackendConfig::S3(s3) => {
                assert_eq!(s3.bucket, "mybucket");
                assert_eq!(s3.key, Path::from("extracts/dump.txt"));
            }
            _ => panic!("Expected S3 config"),
        }
    }

    #[test]
    fn test_virtual_hosted_s3_url_parsing() {
        let config =
            BackendConfig::parse_url("https://mybucket.s3.us-east-2.amazonaws.com/dump.txt")
                .unwrap();
        match config {
            BackendConfig::S3(s3) => {
                assert_eq!(s3.bucket, "mybucket");
                assert_eq!(s3.key, Path::from("dump.txt"));
            }
            _ => panic!("Expected S3 config"),
        }
    }

    #[test]
    fn test_local_path_parsing() {
        let config = BackendConfig::parse_url("/data/extracts/dump.txt").unwrap();
        match config {
            BackendConfig::Local(local) => {
                assert_eq!(local.directory, "/data/extracts");
                assert_eq!(local.key, Path::from("dump.txt"));
            }
            _ => panic!("Expected Local config"),
        }
    }

    #[test]
    fn test_file_uri_parsing() {
        let config = BackendConfig::parse_url("file:///data/dump.txt").unwrap();
        match config {
            BackendConfig::Local(local) => {
                assert_eq!(local.directory, "/data");
            }
            _ => panic!("Expected Local config"),
        }
    }

    #[test]
    fn test_invalid_url_rejected() {
        assert!(BackendConfig::parse_url("ftp://host/file").is_err());
        assert!(BackendConfig::parse_url("relative/path").is_err());
    }

    #[tokio::test]
    async fn test_local_put_get_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.txt");
        let provider = StorageProvider::for_url(path.to_str().unwrap()).await.unwrap();

        provider.put(Bytes::from_static(b"a~b~c\n")).await.unwrap();
        assert_eq!(provider.size().await.unwrap(), 6);
        assert_eq!(provider.get().await.unwrap().as_ref(), b"a~b~c\n");
        assert_eq!(provider.get_range(2..5).await.unwrap().as_ref(), b"b~c");
    }

    #[tokio::test]
    async fn test_streaming_writer_visible_after_shutdown() {
        use tokio::io::AsyncWriteExt;

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out.txt");
        let provider = StorageProvider::for_url(path.to_str().unwrap()).await.unwrap();

        let mut writer = provider.writer(1024);
        writer.write_all(b"line1\n").await.unwrap();
        writer.write_all(b"line2\n").await.unwrap();
        writer.shutdown().await.unwrap();

        assert_eq!(provider.get().await.unwrap().as_ref(), b"line1\nline2\n");
    }
}
