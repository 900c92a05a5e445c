//! # Gallery
//!
//! [`GalleryView`] is what gets drawn: one card per image, in the order the
//! server returned them. [`GalleryController`] runs the fetch, render, mutate
//! cycle against a [`GalleryApi`] and keeps a one-line status next to it.
//!
//! ## Mutations
//! - Upload compresses large photos off the async runtime, then reloads
//! - A caption edit patches the card in place
//! - A delete marks the card as exiting, waits out the exit animation, drops
//!   it and reloads so the view matches the server again

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use carton::GalleryImage;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::{fs, task, time::sleep};
use tracing::{error, info, warn};

use crate::{
    api::GalleryApi,
    compress::{CompressionOptions, prepare_upload},
    error::ClientError,
    utils::{download_filename, status_message, unique_path},
};

pub const CARD_DELAY: Duration = Duration::from_millis(100);
pub const EXIT_DURATION: Duration = Duration::from_millis(300);

pub const EMPTY_MESSAGE: &str = "No egg meals yet! Upload your first one above 🍳";
pub const LOAD_FAILED_MESSAGE: &str = "Failed to load gallery. Please refresh the page.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CardState {
    Visible,
    Exiting,
}

#[derive(Clone, Debug)]
pub struct Card {
    pub image: GalleryImage,
    pub delay: Duration,
    pub state: CardState,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Loaded,
    Failed,
}

#[derive(Debug)]
pub struct GalleryView {
    cards: Vec<Card>,
    load: LoadState,
}

impl Default for GalleryView {
    fn default() -> Self {
        Self {
            cards: Vec::new(),
            load: LoadState::Loading,
        }
    }
}

impl GalleryView {
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn load_state(&self) -> LoadState {
        self.load
    }

    pub fn show(&mut self, images: Vec<GalleryImage>) {
        self.cards = images
            .into_iter()
            .enumerate()
            .map(|(index, image)| Card {
                image,
                delay: CARD_DELAY * index as u32,
                state: CardState::Visible,
            })
            .collect();
        self.load = LoadState::Loaded;
    }

    pub fn fail(&mut self) {
        self.cards.clear();
        self.load = LoadState::Failed;
    }

    pub fn patch_caption(&mut self, image: &GalleryImage) -> bool {
        match self.cards.iter_mut().find(|card| card.image.id == image.id) {
            Some(card) => {
                card.image.caption = image.caption.clone();
                card.image.updated_at = image.updated_at;
                true
            }
            None => false,
        }
    }

    pub fn begin_exit(&mut self, id: &str) -> bool {
        match self.cards.iter_mut().find(|card| card.image.id == id) {
            Some(card) => {
                card.state = CardState::Exiting;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &str) {
        self.cards.retain(|card| card.image.id != id);
    }
}

impl fmt::Display for GalleryView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.load {
            LoadState::Loading => return writeln!(f, "Loading gallery..."),
            LoadState::Failed => return writeln!(f, "{LOAD_FAILED_MESSAGE}"),
            LoadState::Loaded if self.cards.is_empty() => return writeln!(f, "{EMPTY_MESSAGE}"),
            LoadState::Loaded => {}
        }

        for card in &self.cards {
            let image = &card.image;
            let uploaded = image.uploaded_at.format("%Y-%m-%d %H:%M");

            if image.has_caption() {
                writeln!(f, "{}  {}  ({uploaded})", image.id, image.caption)?;
            } else {
                writeln!(f, "{}  ({uploaded})", image.id)?;
            }
        }

        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Status {
    Loading(String),
    Success(String),
    Error(String),
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Loading(message) | Status::Success(message) | Status::Error(message) => {
                write!(f, "{message}")
            }
        }
    }
}

pub struct GalleryController<A> {
    api: Arc<A>,
    view: GalleryView,
    status: Option<Status>,
    compression: CompressionOptions,
}

impl<A: GalleryApi> GalleryController<A> {
    pub fn new(api: Arc<A>, compression: CompressionOptions) -> Self {
        Self {
            api,
            view: GalleryView::default(),
            status: None,
            compression,
        }
    }

    pub fn view(&self) -> &GalleryView {
        &self.view
    }

    pub fn status(&self) -> Option<&Status> {
        self.status.as_ref()
    }

    fn fail_with(&mut self, error: ClientError) -> ClientError {
        self.status = Some(Status::Error(status_message(&error)));
        error
    }

    pub async fn load(&mut self) -> &GalleryView {
        let result = self.api.list_images().await;
        match result {
            Ok(images) => {
                info!("Loaded {} gallery images", images.len());
                self.view.show(images);
            }
            Err(e) => {
                error!("Failed to load gallery: {e}");
                self.view.fail();
            }
        }

        &self.view
    }

    pub async fn upload(&mut self, path: &Path, caption: &str) -> Result<GalleryImage, ClientError> {
        self.status = Some(Status::Loading("Processing image...".to_string()));

        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => return Err(self.fail_with(e.into())),
        };
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("image.jpg")
            .to_string();

        if bytes.len() > self.compression.max_bytes {
            self.status = Some(Status::Loading("Compressing image...".to_string()));
        }

        let options = self.compression.clone();
        let prepared = match task::spawn_blocking(move || prepare_upload(&filename, bytes, &options))
            .await
        {
            Ok(Ok(prepared)) => prepared,
            Ok(Err(e)) => return Err(self.fail_with(e)),
            Err(e) => return Err(self.fail_with(ClientError::Task(e.to_string()))),
        };

        self.status = Some(Status::Loading("Uploading...".to_string()));
        let result = self.api.upload_image(prepared, caption.trim()).await;
        let image = match result {
            Ok(image) => image,
            Err(e) => return Err(self.fail_with(e)),
        };

        self.status = Some(Status::Success("Upload successful! 🎉".to_string()));
        self.load().await;

        Ok(image)
    }

    pub async fn edit_caption(&mut self, id: &str, caption: &str) -> Result<GalleryImage, ClientError> {
        let result = self.api.update_caption(id, caption.trim()).await;
        let image = match result {
            Ok(image) => image,
            Err(e) => return Err(self.fail_with(e)),
        };

        if !self.view.patch_caption(&image) {
            self.load().await;
        }
        self.status = Some(Status::Success("Caption updated!".to_string()));

        Ok(image)
    }

    pub async fn delete(&mut self, id: &str) -> Result<(), ClientError> {
        let result = self.api.delete_image(id).await;
        if let Err(e) = result {
            return Err(self.fail_with(e));
        }
        self.status = Some(Status::Success("Image deleted!".to_string()));

        if self.view.begin_exit(id) {
            sleep(EXIT_DURATION).await;
            self.view.remove(id);
        }
        self.load().await;

        Ok(())
    }

    /// Saves every loaded image into `dir`, named after its caption.
    /// Failed downloads are logged and skipped.
    pub async fn download_all(&self, dir: &Path) -> Result<Vec<PathBuf>, ClientError> {
        fs::create_dir_all(dir).await?;

        let cards = self.view.cards();
        let pb = ProgressBar::new(cards.len() as u64);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
        );

        let mut saved = Vec::new();
        for card in cards {
            let image = &card.image;
            pb.set_message(format!("Fetching {}", image.id));

            match self.api.download(&image.url).await {
                Ok(bytes) => {
                    let path = unique_path(dir, &download_filename(&image.caption));
                    fs::write(&path, bytes).await?;
                    saved.push(path);
                }
                Err(e) => warn!("Skipping {}: {e}", image.id),
            }

            pb.inc(1);
        }

        pb.finish_with_message("Done");
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
    };

    use async_trait::async_trait;
    use chrono::Utc;
    use reqwest::StatusCode;

    use super::*;
    use crate::compress::PreparedUpload;

    fn image(id: &str, caption: &str) -> GalleryImage {
        GalleryImage {
            id: id.to_string(),
            url: format!("memory://blobs/{id}.jpg"),
            caption: caption.to_string(),
            uploaded_at: Utc::now(),
            updated_at: None,
        }
    }

    #[derive(Default)]
    struct FakeGalleryApi {
        images: Mutex<Vec<GalleryImage>>,
        uploads: Mutex<Vec<(PreparedUpload, String)>>,
        fail_list: AtomicBool,
    }

    impl FakeGalleryApi {
        fn with_images(images: Vec<GalleryImage>) -> Self {
            Self {
                images: Mutex::new(images),
                ..Self::default()
            }
        }

        fn not_found() -> ClientError {
            ClientError::Status {
                status: StatusCode::NOT_FOUND,
                message: "Image not found".to_string(),
            }
        }
    }

    #[async_trait]
    impl GalleryApi for FakeGalleryApi {
        async fn list_images(&self) -> Result<Vec<GalleryImage>, ClientError> {
            if self.fail_list.load(Ordering::SeqCst) {
                return Err(ClientError::Unexpected("offline".to_string()));
            }
            Ok(self.images.lock().unwrap().clone())
        }

        async fn upload_image(
            &self,
            upload: PreparedUpload,
            caption: &str,
        ) -> Result<GalleryImage, ClientError> {
            let created = image("new", caption);
            self.images.lock().unwrap().insert(0, created.clone());
            self.uploads
                .lock()
                .unwrap()
                .push((upload, caption.to_string()));
            Ok(created)
        }

        async fn update_caption(&self, id: &str, caption: &str) -> Result<GalleryImage, ClientError> {
            let mut images = self.images.lock().unwrap();
            let found = images
                .iter_mut()
                .find(|image| image.id == id)
                .ok_or_else(Self::not_found)?;

            found.caption = caption.to_string();
            found.updated_at = Some(Utc::now());
            Ok(found.clone())
        }

        async fn delete_image(&self, id: &str) -> Result<(), ClientError> {
            let mut images = self.images.lock().unwrap();
            let before = images.len();
            images.retain(|image| image.id != id);

            if images.len() == before {
                return Err(Self::not_found());
            }
            Ok(())
        }

        async fn download(&self, url: &str) -> Result<Vec<u8>, ClientError> {
            if url.contains("gone") {
                return Err(Self::not_found());
            }
            Ok(url.as_bytes().to_vec())
        }
    }

    fn controller(images: Vec<GalleryImage>) -> (Arc<FakeGalleryApi>, GalleryController<FakeGalleryApi>) {
        let api = Arc::new(FakeGalleryApi::with_images(images));
        let controller = GalleryController::new(api.clone(), CompressionOptions::default());
        (api, controller)
    }

    #[test]
    fn test_cards_are_staggered() {
        let mut view = GalleryView::default();
        view.show(vec![image("a", ""), image("b", ""), image("c", "")]);

        let delays: Vec<_> = view.cards().iter().map(|card| card.delay.as_millis()).collect();
        assert_eq!(delays, vec![0, 100, 200]);
    }

    #[test]
    fn test_display_states() {
        let mut view = GalleryView::default();
        assert_eq!(view.to_string(), "Loading gallery...\n");

        view.show(Vec::new());
        assert_eq!(view.to_string(), format!("{EMPTY_MESSAGE}\n"));

        view.fail();
        assert_eq!(view.to_string(), format!("{LOAD_FAILED_MESSAGE}\n"));

        view.show(vec![image("a", "poached"), image("b", "")]);
        let text = view.to_string();
        assert!(text.contains("a  poached"));
        assert_eq!(text.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_load_failure_shows_error_state() {
        let (api, mut controller) = controller(vec![image("a", "")]);
        api.fail_list.store(true, Ordering::SeqCst);

        let view = controller.load().await;
        assert_eq!(view.load_state(), LoadState::Failed);
    }

    #[tokio::test]
    async fn test_upload_trims_caption_and_reloads() {
        let (api, mut controller) = controller(vec![image("a", "old")]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brunch.png");
        std::fs::write(&path, b"tiny").unwrap();

        let created = controller.upload(&path, "  shakshuka  ").await.unwrap();
        assert_eq!(created.caption, "shakshuka");

        let uploads = api.uploads.lock().unwrap();
        assert_eq!(uploads[0].0.filename, "brunch.png");
        assert!(!uploads[0].0.compressed);
        drop(uploads);

        let ids: Vec<_> = controller
            .view()
            .cards()
            .iter()
            .map(|card| card.image.id.as_str())
            .collect();
        assert_eq!(ids, ["new", "a"]);
        assert_eq!(
            controller.status(),
            Some(&Status::Success("Upload successful! 🎉".to_string()))
        );
    }

    #[tokio::test]
    async fn test_upload_of_missing_file_sets_error() {
        let (_, mut controller) = controller(Vec::new());

        let result = controller.upload(Path::new("/definitely/not/here.jpg"), "").await;
        assert!(matches!(result, Err(ClientError::Io(_))));
        assert!(matches!(controller.status(), Some(Status::Error(_))));
    }

    #[tokio::test]
    async fn test_edit_caption_patches_card() {
        let (_, mut controller) = controller(vec![image("a", "old"), image("b", "keep")]);
        controller.load().await;

        controller.edit_caption("a", " fried ").await.unwrap();
        let cards = controller.view().cards();
        assert_eq!(cards[0].image.caption, "fried");
        assert!(cards[0].image.updated_at.is_some());
        assert_eq!(cards[1].image.caption, "keep");
    }

    #[tokio::test]
    async fn test_edit_unknown_caption_reports_server_message() {
        let (_, mut controller) = controller(vec![image("a", "old")]);
        controller.load().await;

        assert!(controller.edit_caption("zzz", "x").await.is_err());
        assert_eq!(
            controller.status(),
            Some(&Status::Error("Error: Image not found".to_string()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_exits_then_reloads() {
        let (_, mut controller) = controller(vec![image("a", ""), image("b", "")]);
        controller.load().await;

        controller.delete("a").await.unwrap();
        let ids: Vec<_> = controller
            .view()
            .cards()
            .iter()
            .map(|card| card.image.id.as_str())
            .collect();
        assert_eq!(ids, ["b"]);
        assert_eq!(controller.view().cards()[0].delay, Duration::ZERO);
        assert_eq!(
            controller.status(),
            Some(&Status::Success("Image deleted!".to_string()))
        );

        assert!(controller.delete("a").await.is_err());
    }

    #[test]
    fn test_begin_exit_marks_card() {
        let mut view = GalleryView::default();
        view.show(vec![image("a", "")]);

        assert!(view.begin_exit("a"));
        assert_eq!(view.cards()[0].state, CardState::Exiting);
        assert!(!view.begin_exit("missing"));
    }

    #[tokio::test]
    async fn test_download_all_names_files_by_caption() {
        let (_, mut controller) = controller(vec![
            image("a", "Eggs Benedict"),
            image("b", ""),
            image("gone", "lost"),
            image("c", "eggs benedict"),
        ]);
        controller.load().await;
        let dir = tempfile::tempdir().unwrap();

        let saved = controller.download_all(dir.path()).await.unwrap();
        let names: Vec<_> = saved
            .iter()
            .map(|path| path.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(
            names,
            ["eggs_benedict.jpg", "egg_meal.jpg", "eggs_benedict-2.jpg"]
        );
        assert_eq!(
            std::fs::read(&saved[1]).unwrap(),
            b"memory://blobs/b.jpg".to_vec()
        );
    }
}
