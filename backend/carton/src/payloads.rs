//! Request bodies and response envelopes of the HTTP surface.

use serde::{Deserialize, Serialize};

use crate::GalleryImage;

#[derive(Debug, Serialize, Deserialize)]
pub struct CountPayload {
    pub count: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    pub success: bool,
    pub count: u64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GalleryResponse {
    pub success: bool,
    #[serde(default)]
    pub images: Vec<GalleryImage>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImageResponse {
    pub success: bool,
    pub image: GalleryImage,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub success: bool,
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateCaptionPayload {
    pub id: String,
    #[serde(default)]
    pub caption: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeletePayload {
    pub id: String,
}
