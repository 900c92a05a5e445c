//! # Meal Gallery
//!
//! Ordered list of [`GalleryImage`] records under [`GALLERY_KEY`], newest first.
//!
//! ## Writes
//!
//! - Upload: blob first, record second. A failed record write can orphan a blob,
//!   but a record never points at a blob that was not written
//! - Caption edit and delete: read the whole list, change one record, replace the
//!   whole list. Untouched records are written back with their stored bytes
//! - All writers in this process queue on one mutex, so a create can't be lost
//!   inside another request's read-modify-write window. Other processes writing
//!   the same list can still interleave
//!
//! ## Reads
//!
//! Entries that fail to decode are logged and skipped. A store failure reads as
//! an empty gallery.
use std::{collections::HashSet, sync::Arc};

use axum::body::Bytes;
use carton::{GALLERY_KEY, GalleryImage, decode_image, encode_image};
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::{
    blobs::BlobStore,
    database::{KeyValueStore, StoreError},
    error::AppError,
    utils::generate_image_id,
};

pub const EMPTY_CAPTION: &str = "No caption";

struct Entry {
    raw: String,
    image: GalleryImage,
}

#[derive(Clone)]
pub struct GalleryService {
    store: Option<Arc<dyn KeyValueStore>>,
    blobs: Option<Arc<dyn BlobStore>>,
    writer: Arc<Mutex<()>>,
}

impl GalleryService {
    pub fn new(store: Option<Arc<dyn KeyValueStore>>, blobs: Option<Arc<dyn BlobStore>>) -> Self {
        Self {
            store,
            blobs,
            writer: Arc::new(Mutex::new(())),
        }
    }

    fn store(&self) -> Result<&Arc<dyn KeyValueStore>, AppError> {
        self.store.as_ref().ok_or_else(|| {
            AppError::ServiceUnavailable(
                "KV Storage not configured. Please set REDIS_URL.".to_string(),
            )
        })
    }

    fn blobs(&self) -> Result<&Arc<dyn BlobStore>, AppError> {
        self.blobs.as_ref().ok_or_else(|| {
            AppError::ServiceUnavailable(
                "Blob Storage not configured. Please set BLOB_ROOT.".to_string(),
            )
        })
    }

    async fn entries(store: &dyn KeyValueStore) -> Result<Vec<Entry>, StoreError> {
        let raw_entries = store.range(GALLERY_KEY).await?;

        Ok(raw_entries
            .into_iter()
            .filter_map(|raw| match decode_image(&raw) {
                Ok(image) => Some(Entry { raw, image }),
                Err(e) => {
                    warn!("Dropping malformed gallery entry: {e}");
                    None
                }
            })
            .collect())
    }

    pub async fn list(&self) -> Vec<GalleryImage> {
        let Some(store) = &self.store else {
            debug!("KV store not configured, gallery is empty");
            return Vec::new();
        };

        match Self::entries(store.as_ref()).await {
            Ok(entries) => entries.into_iter().map(|entry| entry.image).collect(),
            Err(e) => {
                warn!(
                    "Gallery read from {} failed, returning empty gallery: {e}",
                    store.backend_tag()
                );
                Vec::new()
            }
        }
    }

    /// Both stores have to be configured before an upload is even parsed.
    pub fn ready_for_upload(&self) -> Result<(), AppError> {
        self.blobs()?;
        self.store()?;
        Ok(())
    }

    /// Stores the photo, then records it at the head of the gallery.
    pub async fn upload(
        &self,
        filename: &str,
        bytes: Bytes,
        caption: &str,
    ) -> Result<GalleryImage, AppError> {
        self.ready_for_upload()?;
        let blobs = self.blobs()?;

        let url = blobs.put(filename, bytes).await?;
        info!("Stored upload {filename} at {url}");

        let caption = match caption.trim() {
            "" => EMPTY_CAPTION,
            trimmed => trimmed,
        };

        self.create(&url, caption).await.inspect_err(|e| {
            error!("Record write failed, blob {url} is orphaned: {e}");
        })
    }

    pub async fn create(&self, url: &str, caption: &str) -> Result<GalleryImage, AppError> {
        let store = self.store()?;
        let _writer = self.writer.lock().await;

        let taken: HashSet<String> = Self::entries(store.as_ref())
            .await?
            .into_iter()
            .map(|entry| entry.image.id)
            .collect();

        let mut id = generate_image_id();
        while taken.contains(&id) {
            id = generate_image_id();
        }

        let image = GalleryImage {
            id,
            url: url.to_string(),
            caption: caption.to_string(),
            uploaded_at: Utc::now(),
            updated_at: None,
        };

        let raw = encode_image(&image).map_err(|e| AppError::Upstream(e.to_string()))?;
        store.push_front(GALLERY_KEY, &raw).await?;

        Ok(image)
    }

    pub async fn update(&self, id: &str, caption: Option<String>) -> Result<GalleryImage, AppError> {
        let store = self.store()?;
        let _writer = self.writer.lock().await;

        let mut entries = Self::entries(store.as_ref()).await?;
        let entry = entries
            .iter_mut()
            .find(|entry| entry.image.id == id)
            .ok_or_else(|| AppError::NotFound("Image not found".to_string()))?;

        entry.image.caption = caption.unwrap_or_default();
        entry.image.updated_at = Some(Utc::now());
        entry.raw = encode_image(&entry.image).map_err(|e| AppError::Upstream(e.to_string()))?;
        let updated = entry.image.clone();

        Self::rewrite(store.as_ref(), &entries).await?;
        Ok(updated)
    }

    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        let store = self.store()?;
        let _writer = self.writer.lock().await;

        let mut entries = Self::entries(store.as_ref()).await?;
        let index = entries
            .iter()
            .position(|entry| entry.image.id == id)
            .ok_or_else(|| AppError::NotFound("Image not found".to_string()))?;

        let removed = entries.remove(index);
        self.release_blob(&removed.image.url).await;

        Self::rewrite(store.as_ref(), &entries).await?;
        Ok(())
    }

    /// Best effort, the record goes away even if the blob stays.
    async fn release_blob(&self, url: &str) {
        let Some(blobs) = &self.blobs else {
            warn!("Blob store not configured, leaving {url} in place");
            return;
        };

        match blobs.delete(url).await {
            Ok(true) => debug!("Deleted blob {url}"),
            Ok(false) => debug!("Blob {url} is not managed by {}", blobs.backend_tag()),
            Err(e) => error!("Error deleting blob {url}: {e}"),
        }
    }

    async fn rewrite(store: &dyn KeyValueStore, entries: &[Entry]) -> Result<(), StoreError> {
        let values: Vec<String> = entries.iter().map(|entry| entry.raw.clone()).collect();
        store.replace_list(GALLERY_KEY, &values).await
    }
}
