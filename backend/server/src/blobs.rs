//! # Blob Storage
//!
//! Binary storage for uploaded meal photos. A blob is addressed by the public URL
//! returned from [`BlobStore::put`], which is what the gallery record keeps.
//!
//! The local backend writes into `BLOB_ROOT` and the router serves that directory
//! under `/blobs`, so the URL stays valid exactly as long as the file exists.
use std::{
    collections::HashMap,
    path::PathBuf,
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use axum::body::Bytes;
use thiserror::Error;
use tokio::{fs, sync::Mutex};
use tracing::debug;

use crate::utils::{random_suffix, sanitize_filename};

#[derive(Error, Debug)]
pub enum BlobError {
    #[error("Blob IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Blob store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    fn backend_tag(&self) -> &'static str;

    /// Stores `bytes` under a randomized name derived from `filename`, returns its URL.
    async fn put(&self, filename: &str, bytes: Bytes) -> Result<String, BlobError>;

    /// Removes the blob behind `url`. `Ok(false)` when the URL is not one of ours.
    async fn delete(&self, url: &str) -> Result<bool, BlobError>;
}

fn blob_name(filename: &str) -> String {
    let (stem, extension) = match filename.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => (stem, sanitize_filename(extension)),
        _ => (filename, String::new()),
    };

    let mut stem = sanitize_filename(stem);
    if stem.is_empty() {
        stem = "image".to_string();
    }

    let extension = if extension.is_empty() {
        "jpg".to_string()
    } else {
        extension
    };

    format!("{stem}-{}.{extension}", random_suffix(12))
}

pub struct LocalBlobStore {
    root: PathBuf,
    public_url: String,
}

impl LocalBlobStore {
    pub async fn new(root: PathBuf, public_url: &str) -> Result<Self, BlobError> {
        fs::create_dir_all(&root).await?;

        Ok(Self {
            root,
            public_url: public_url.trim_end_matches('/').to_string(),
        })
    }

    /// File name inside the root for URLs minted by this store.
    fn owned_name<'a>(&self, url: &'a str) -> Option<&'a str> {
        let name = url
            .strip_prefix(self.public_url.as_str())?
            .strip_prefix('/')?;

        if name.is_empty() || name.contains('/') || name.contains("..") {
            return None;
        }

        Some(name)
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    fn backend_tag(&self) -> &'static str {
        "localfs"
    }

    async fn put(&self, filename: &str, bytes: Bytes) -> Result<String, BlobError> {
        let name = blob_name(filename);
        fs::write(self.root.join(&name), &bytes).await?;

        debug!("Stored blob {name} ({} bytes)", bytes.len());
        Ok(format!("{}/{name}", self.public_url))
    }

    async fn delete(&self, url: &str) -> Result<bool, BlobError> {
        let Some(name) = self.owned_name(url) else {
            debug!("Skipping delete of foreign blob {url}");
            return Ok(false);
        };

        fs::remove_file(self.root.join(name)).await?;
        Ok(true)
    }
}

/// In-process blobs keyed by URL, with a switch that makes deletes fail.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Bytes>>,
    failing_deletes: AtomicBool,
}

pub const MEMORY_BLOB_HOST: &str = "memory://blobs";

impl MemoryBlobStore {
    pub fn set_failing_deletes(&self, failing: bool) {
        self.failing_deletes.store(failing, Ordering::Relaxed);
    }

    pub async fn contains(&self, url: &str) -> bool {
        self.blobs.lock().await.contains_key(url)
    }

    pub async fn len(&self) -> usize {
        self.blobs.lock().await.len()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn put(&self, filename: &str, bytes: Bytes) -> Result<String, BlobError> {
        let url = format!("{MEMORY_BLOB_HOST}/{}", blob_name(filename));
        self.blobs.lock().await.insert(url.clone(), bytes);

        Ok(url)
    }

    async fn delete(&self, url: &str) -> Result<bool, BlobError> {
        if self.failing_deletes.load(Ordering::Relaxed) {
            return Err(BlobError::Unavailable("deletes switched off".to_string()));
        }

        Ok(self.blobs.lock().await.remove(url).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_name_keeps_extension() {
        let name = blob_name("Sunday Brunch!.PNG");

        assert!(name.starts_with("sunday-brunch-"));
        assert!(name.ends_with(".png"));
    }

    #[test]
    fn test_blob_name_fallbacks() {
        assert!(blob_name("").starts_with("image-"));
        assert!(blob_name("???").ends_with(".jpg"));
        assert!(blob_name(".hidden").starts_with("hidden-"));
    }

    #[tokio::test]
    async fn test_local_put_then_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path().to_path_buf(), "http://localhost:1111/blobs/")
            .await
            .unwrap();

        let url = store
            .put("eggs.jpg", Bytes::from_static(b"jpeg bytes"))
            .await
            .unwrap();
        assert!(url.starts_with("http://localhost:1111/blobs/eggs-"));

        let name = url.rsplit('/').next().unwrap();
        assert_eq!(std::fs::read(dir.path().join(name)).unwrap(), b"jpeg bytes");

        assert!(store.delete(&url).await.unwrap());
        assert!(!dir.path().join(name).exists());
    }

    #[tokio::test]
    async fn test_local_delete_ignores_foreign_urls() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path().to_path_buf(), "http://localhost:1111/blobs")
            .await
            .unwrap();

        assert!(!store.delete("https://elsewhere.example/a.jpg").await.unwrap());
        assert!(
            !store
                .delete("http://localhost:1111/blobs/../secret")
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_local_delete_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path().to_path_buf(), "http://localhost:1111/blobs")
            .await
            .unwrap();

        assert!(
            store
                .delete("http://localhost:1111/blobs/gone-abc.jpg")
                .await
                .is_err()
        );
    }
}
