//! Documentation of the egg counter and meal gallery service.
//!
//!
//!
//! # General Infrastructure
//! - One stateless HTTP service, every request talks to the stores on its own
//! - Redis holds the counter and the gallery list, see [`database`]
//! - Photos live in a blob directory served back under `/blobs`, see [`blobs`]
//! - Pages poll the counter every 1.5 seconds instead of holding a socket open
//!
//!
//!
//! # Endpoints
//!
//! | Endpoint | Method | Description |
//! |----------|--------|-------------|
//! | `/counter` | GET | `{ success, count }`, 55 when unset or unconfigured |
//! | `/counter` | POST | `{ count }` body, 400 unless a non-negative whole number |
//! | `/gallery` | GET | `{ success, images }`, empty on any store failure |
//! | `/upload` | POST | multipart `image` + `caption`, 400 without a file, 503 unconfigured |
//! | `/gallery/update` | POST | `{ id, caption }`, 404 for unknown ids |
//! | `/gallery/delete` | POST | `{ id }`, 404 for unknown ids |
//!
//! Any other method on these paths is a JSON 405.
//!
//!
//!
//! # Failure Policy
//!
//! Reads degrade: the counter falls back to its default and the gallery to an empty
//! list. Writes report the failure with a status code and never retry. A blob that
//! can't be deleted is logged and the record is removed anyway.
//!
//!
//!
//! # Notes
//!
//! ## Consistency
//! The counter is last write wins. Two pages editing within one poll window will
//! overwrite each other, the poll that lands last decides what everyone sees.
//!
//! Gallery edits rewrite the whole list. Writers inside one process are queued on a
//! mutex, the Redis replace is a single `MULTI`, but two server processes editing
//! at once can still drop each other's change.
//!
//!
//!
//! # Setup
//!
//! Run against a local Redis.
//! ```sh
//! REDIS_URL=redis://127.0.0.1:6379 BLOB_ROOT=./blobs RUST_LOG=info cargo run --bin server
//! ```
//!
//! View current docs.
//! ```sh
//! cargo doc --open
//! ```
use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{Method, header::CONTENT_TYPE},
    routing::{get, post},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::{cors::CorsLayer, services::ServeDir};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

pub mod blobs;
pub mod config;
pub mod counter;
pub mod database;
pub mod error;
pub mod gallery;
pub mod routes;
pub mod state;
pub mod utils;

use config::Config;
use routes::{
    counter_handler, delete_handler, gallery_handler, method_not_allowed, set_counter_handler,
    update_handler, upload_handler,
};
use state::AppState;

/// Room for multipart boundaries and the caption field on top of the image itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(state.config.cors_max_age_secs));

    let mut app = Router::new()
        .route(
            "/counter",
            get(counter_handler)
                .post(set_counter_handler)
                .fallback(method_not_allowed),
        )
        .route(
            "/gallery",
            get(gallery_handler).fallback(method_not_allowed),
        )
        .route(
            "/upload",
            post(upload_handler).fallback(method_not_allowed),
        )
        .route(
            "/gallery/update",
            post(update_handler).fallback(method_not_allowed),
        )
        .route(
            "/gallery/delete",
            post(delete_handler).fallback(method_not_allowed),
        );

    if let Some(root) = &state.config.blob_root {
        app = app.nest_service("/blobs", ServeDir::new(root));
    }

    app.layer(DefaultBodyLimit::max(
        state.config.max_upload_bytes + MULTIPART_OVERHEAD,
    ))
    .layer(cors)
    .with_state(state)
}

pub async fn start_server() -> std::io::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new(Config::load()).await;

    info!("Starting server...");
    let address = format!("0.0.0.0:{}", state.config.port);
    let app = build_router(state);

    info!("Binding to {address}");
    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
