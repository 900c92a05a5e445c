//! # Egg Counter
//!
//! One non-negative integer under [`COUNTER_KEY`].
//!
//! Reads never fail: an unset key, an unconfigured store, an unreachable store or a
//! garbled value all read as [`DEFAULT_EGG_COUNT`]. Writes are plain `SET`s, so two
//! clients writing at once race and the later write wins.
use std::sync::Arc;

use carton::{COUNTER_KEY, DEFAULT_EGG_COUNT};
use tracing::warn;

use crate::{database::KeyValueStore, error::AppError};

#[derive(Clone)]
pub struct CounterService {
    store: Option<Arc<dyn KeyValueStore>>,
}

impl CounterService {
    pub fn new(store: Option<Arc<dyn KeyValueStore>>) -> Self {
        Self { store }
    }

    pub async fn get(&self) -> u64 {
        let Some(store) = &self.store else {
            return DEFAULT_EGG_COUNT;
        };

        match store.get(COUNTER_KEY).await {
            Ok(Some(raw)) => raw.trim().parse().unwrap_or_else(|e| {
                warn!("Stored egg count {raw:?} is unreadable ({e}), using default");
                DEFAULT_EGG_COUNT
            }),
            Ok(None) => DEFAULT_EGG_COUNT,
            Err(e) => {
                warn!("Egg count read failed, using default: {e}");
                DEFAULT_EGG_COUNT
            }
        }
    }

    pub async fn set(&self, count: u64) -> Result<u64, AppError> {
        let store = self.store.as_ref().ok_or_else(|| {
            AppError::ServiceUnavailable(
                "KV Storage not configured. Please set REDIS_URL.".to_string(),
            )
        })?;

        store.set(COUNTER_KEY, &count.to_string()).await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;

    fn service() -> (Arc<MemoryStore>, CounterService) {
        let store = Arc::new(MemoryStore::default());
        let service = CounterService::new(Some(store.clone()));
        (store, service)
    }

    #[tokio::test]
    async fn test_default_when_never_set() {
        let (_, counter) = service();
        assert_eq!(counter.get().await, DEFAULT_EGG_COUNT);
    }

    #[tokio::test]
    async fn test_default_when_unconfigured() {
        let counter = CounterService::new(None);
        assert_eq!(counter.get().await, 55);
        assert!(matches!(
            counter.set(3).await,
            Err(AppError::ServiceUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let (_, counter) = service();

        for n in [0, 1, 15, 55, 10_000] {
            assert_eq!(counter.set(n).await.unwrap(), n);
            assert_eq!(counter.get().await, n);
        }
    }

    #[tokio::test]
    async fn test_unreachable_store_reads_default() {
        let (store, counter) = service();
        counter.set(12).await.unwrap();

        store.set_failing(true);
        assert_eq!(counter.get().await, DEFAULT_EGG_COUNT);
        assert!(matches!(counter.set(4).await, Err(AppError::Upstream(_))));

        store.set_failing(false);
        assert_eq!(counter.get().await, 12);
    }

    #[tokio::test]
    async fn test_garbled_value_reads_default() {
        let (store, counter) = service();
        store.set(COUNTER_KEY, "lots").await.unwrap();

        assert_eq!(counter.get().await, DEFAULT_EGG_COUNT);
    }
}
