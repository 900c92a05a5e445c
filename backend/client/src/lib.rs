//! Client side of the egg counter and meal gallery.
//!
//!
//!
//! # Counter
//! - [`session::EggSession`] holds the local count, the egg grid, shown threshold
//!   messages and the sync flags
//! - [`engine::SyncEngine`] owns a session, applies user input right away, saves in
//!   the background and polls the server for changes made elsewhere
//!
//!
//!
//! # Gallery
//! - [`gallery::GalleryController`] loads, uploads, edits and deletes through
//!   [`api::GalleryApi`] and keeps a [`gallery::GalleryView`] in step
//! - Photos over the upload ceiling are shrunk by [`compress::prepare_upload`]
//!   before they leave the machine
//!
//!
//!
//! # Notes
//! Saves are fire and forget. A failed save is logged and the session reports
//! itself degraded, nothing is retried. The next poll that sees a different server
//! count wins.
pub mod api;
pub mod compress;
pub mod engine;
pub mod error;
pub mod gallery;
pub mod grid;
pub mod session;
pub mod thresholds;
pub mod utils;
