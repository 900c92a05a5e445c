use std::{env, fmt::Display, fs::read_to_string, path::PathBuf, str::FromStr};

use carton::MAX_UPLOAD_BYTES;
use tracing::{info, warn};

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub redis_url: Option<String>,
    pub blob_root: Option<PathBuf>,
    pub blob_public_url: String,
    pub max_upload_bytes: usize,
    pub cors_max_age_secs: u64,
}

impl Config {
    pub fn load() -> Self {
        let port: u16 = try_load("RUST_PORT", "1111");

        Self {
            port,
            redis_url: var("REDIS_URL").ok().or_else(|| read_secret("REDIS_URL")),
            blob_root: var("BLOB_ROOT").ok().map(PathBuf::from),
            blob_public_url: try_load(
                "BLOB_PUBLIC_URL",
                &format!("http://localhost:{port}/blobs"),
            ),
            max_upload_bytes: try_load("MAX_UPLOAD_BYTES", &MAX_UPLOAD_BYTES.to_string()),
            cors_max_age_secs: try_load("CORS_MAX_AGE_SECS", "3600"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 1111,
            redis_url: None,
            blob_root: None,
            blob_public_url: "http://localhost:1111/blobs".to_string(),
            max_upload_bytes: MAX_UPLOAD_BYTES,
            cors_max_age_secs: 3600,
        }
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        warn!("Environment variable {key} not found");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .expect("Environment misconfigured!")
}

fn read_secret(secret_name: &str) -> Option<String> {
    let path = format!("/run/secrets/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|e| {
            info!("No {secret_name} secret at {path}: {e}");
        })
        .ok()
        .filter(|s| !s.is_empty())
}
