//! # Redis
//!
//! Key-value store behind the counter and the gallery.
//!
//! ## Layout
//!
//! - `eggCount`: string holding the decimal counter value
//! - `gallery`: list of JSON encoded [`carton::GalleryImage`] records, newest first
//!
//! ## Implementation
//!
//! - New records are `LPUSH`ed so `LRANGE 0 -1` is already newest first
//! - There is no "update element by id" primitive on a list, so caption edits and
//!   deletes rewrite the whole list. The rewrite itself is one `MULTI` block, but the
//!   read before it is not, which is why the gallery service serializes its writers
//! - Nothing spans more than one key, last write wins on the counter
use std::{
    collections::{HashMap, VecDeque},
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use redis::{
    AsyncCommands, Client, RedisError,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] RedisError),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    fn backend_tag(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Inserts at the head of the list stored at `key`.
    async fn push_front(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Whole list, head first.
    async fn range(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Clears the list and writes `values` back head first.
    async fn replace_list(&self, key: &str, values: &[String]) -> Result<(), StoreError>;
}

pub async fn init_redis(redis_url: &str) -> Result<ConnectionManager, RedisError> {
    let config = ConnectionManagerConfig::new()
        .set_number_of_retries(1)
        .set_connection_timeout(Duration::from_millis(500));

    let client = Client::open(redis_url)?;
    client.get_connection_manager_with_config(config).await
}

#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
}

impl RedisStore {
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    fn backend_tag(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut connection = self.connection.clone();
        Ok(connection.get::<_, Option<String>>(key).await?)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        connection.set::<_, _, ()>(key, value).await?;
        Ok(())
    }

    async fn push_front(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        connection.lpush::<_, _, ()>(key, value).await?;
        Ok(())
    }

    async fn range(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut connection = self.connection.clone();
        Ok(connection.lrange::<_, Vec<String>>(key, 0, -1).await?)
    }

    async fn replace_list(&self, key: &str, values: &[String]) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        let mut pipe = redis::pipe();
        pipe.atomic().del(key).ignore();

        // RPUSH with no values is a syntax error
        if !values.is_empty() {
            pipe.rpush(key, values).ignore();
        }

        pipe.query_async::<()>(&mut connection).await?;
        Ok(())
    }
}

/// Process-local store with a failure switch, used by tests and local runs.
#[derive(Default)]
pub struct MemoryStore {
    scalars: Mutex<HashMap<String, String>>,
    lists: Mutex<HashMap<String, VecDeque<String>>>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable("memory store switched off".to_string()));
        }

        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check()?;
        Ok(self.scalars.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.check()?;
        self.scalars
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn push_front(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.check()?;
        self.lists
            .lock()
            .await
            .entry(key.to_string())
            .or_default()
            .push_front(value.to_string());
        Ok(())
    }

    async fn range(&self, key: &str) -> Result<Vec<String>, StoreError> {
        self.check()?;
        Ok(self
            .lists
            .lock()
            .await
            .get(key)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn replace_list(&self, key: &str, values: &[String]) -> Result<(), StoreError> {
        self.check()?;
        let mut lists = self.lists.lock().await;

        if values.is_empty() {
            lists.remove(key);
        } else {
            lists.insert(key.to_string(), values.iter().cloned().collect());
        }

        Ok(())
    }
}
