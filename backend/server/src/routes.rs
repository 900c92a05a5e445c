use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Multipart, State},
};
use carton::payloads::{CountResponse, DeleteResponse, GalleryResponse, ImageResponse};
use tracing::info;

use crate::{
    error::AppError,
    state::AppState,
    utils::{get_caption_update, get_count, get_delete},
};

pub async fn counter_handler(State(state): State<Arc<AppState>>) -> Json<CountResponse> {
    Json(CountResponse {
        success: true,
        count: state.counter.get().await,
    })
}

pub async fn set_counter_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<CountResponse>, AppError> {
    let count = get_count(&body)?;

    Ok(Json(CountResponse {
        success: true,
        count: state.counter.set(count).await?,
    }))
}

pub async fn gallery_handler(State(state): State<Arc<AppState>>) -> Json<GalleryResponse> {
    Json(GalleryResponse {
        success: true,
        images: state.gallery.list().await,
    })
}

struct Upload {
    filename: String,
    bytes: Bytes,
}

pub async fn upload_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<ImageResponse>, AppError> {
    state.gallery.ready_for_upload()?;

    let invalid = |e: axum::extract::multipart::MultipartError| {
        AppError::Validation(format!("Invalid upload: {}", e.body_text()))
    };

    let mut upload = None;
    let mut caption = String::new();

    while let Some(field) = multipart.next_field().await.map_err(invalid)? {
        let name = field.name().map(str::to_owned);

        match name.as_deref() {
            Some("image") => {
                let filename = field.file_name().unwrap_or("image.jpg").to_string();
                let bytes = field.bytes().await.map_err(invalid)?;
                upload = Some(Upload { filename, bytes });
            }
            Some("caption") => caption = field.text().await.map_err(invalid)?,
            _ => {}
        }
    }

    let upload = upload
        .filter(|upload| !upload.bytes.is_empty())
        .ok_or_else(|| AppError::Validation("No image file provided".to_string()))?;

    let limit = state.config.max_upload_bytes;
    if upload.bytes.len() > limit {
        return Err(AppError::Validation(format!(
            "Image is {} bytes, the limit is {limit}",
            upload.bytes.len()
        )));
    }

    let image = state
        .gallery
        .upload(&upload.filename, upload.bytes, &caption)
        .await?;
    info!("Added gallery image {}", image.id);

    Ok(Json(ImageResponse {
        success: true,
        image,
    }))
}

pub async fn update_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ImageResponse>, AppError> {
    let update = get_caption_update(&body)?;
    let image = state.gallery.update(&update.id, update.caption).await?;

    Ok(Json(ImageResponse {
        success: true,
        image,
    }))
}

pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<DeleteResponse>, AppError> {
    let delete = get_delete(&body)?;
    state.gallery.delete(&delete.id).await?;
    info!("Deleted gallery image {}", delete.id);

    Ok(Json(DeleteResponse {
        success: true,
        message: Some("Image deleted successfully".to_string()),
    }))
}

pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}
