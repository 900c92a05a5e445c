use std::sync::Arc;

use tracing::{error, info, warn};

use super::{
    blobs::{BlobStore, LocalBlobStore},
    config::Config,
    counter::CounterService,
    database::{KeyValueStore, RedisStore, init_redis},
    gallery::GalleryService,
};

pub struct AppState {
    pub config: Config,
    pub counter: CounterService,
    pub gallery: GalleryService,
}

impl AppState {
    pub async fn new(config: Config) -> Arc<Self> {
        let store = connect_store(&config).await;
        let blobs = open_blobs(&config).await;

        Self::with_stores(config, store, blobs)
    }

    pub fn with_stores(
        config: Config,
        store: Option<Arc<dyn KeyValueStore>>,
        blobs: Option<Arc<dyn BlobStore>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            counter: CounterService::new(store.clone()),
            gallery: GalleryService::new(store, blobs),
        })
    }
}

async fn connect_store(config: &Config) -> Option<Arc<dyn KeyValueStore>> {
    let Some(redis_url) = &config.redis_url else {
        warn!("REDIS_URL not set, counter reads default and gallery writes are disabled");
        return None;
    };

    match init_redis(redis_url).await {
        Ok(connection) => {
            info!("Connected to Redis");
            Some(Arc::new(RedisStore::new(connection)))
        }
        Err(e) => {
            error!("Redis connection failed, running without KV storage: {e}");
            None
        }
    }
}

async fn open_blobs(config: &Config) -> Option<Arc<dyn BlobStore>> {
    let Some(root) = &config.blob_root else {
        warn!("BLOB_ROOT not set, uploads are disabled");
        return None;
    };

    match LocalBlobStore::new(root.clone(), &config.blob_public_url).await {
        Ok(blobs) => {
            info!("Serving blobs from {}", root.display());
            Some(Arc::new(blobs))
        }
        Err(e) => {
            error!("Blob root {} unusable, uploads are disabled: {e}", root.display());
            None
        }
    }
}
