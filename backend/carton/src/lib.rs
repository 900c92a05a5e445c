//! # Carton
//!
//! Records and payloads shared by the server and the client.
//!
//! Everything here travels as JSON. Gallery records are also stored verbatim
//! as JSON strings inside the backing list, so the field names below are the
//! storage format too.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod payloads;

/// Value reported when the counter has never been written or the store is unreachable.
pub const DEFAULT_EGG_COUNT: u64 = 55;

/// Upload ceiling, also the client compression threshold.
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

pub const COUNTER_KEY: &str = "eggCount";
pub const GALLERY_KEY: &str = "gallery";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryImage {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub caption: String,
    pub uploaded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl GalleryImage {
    pub fn has_caption(&self) -> bool {
        !self.caption.trim().is_empty()
    }
}

pub fn decode_image(entry: &str) -> Result<GalleryImage, serde_json::Error> {
    serde_json::from_str(entry)
}

pub fn encode_image(image: &GalleryImage) -> Result<String, serde_json::Error> {
    serde_json::to_string(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_field_names() {
        let image = GalleryImage {
            id: "1700000000000abc123def".to_string(),
            url: "http://localhost:1111/blobs/omelette-x1.jpg".to_string(),
            caption: "omelette".to_string(),
            uploaded_at: "2025-11-14T12:00:00Z".parse().unwrap(),
            updated_at: None,
        };

        let json = encode_image(&image).unwrap();
        assert!(json.contains("\"uploadedAt\""));
        assert!(!json.contains("updatedAt"));
    }

    #[test]
    fn test_decode_without_caption() {
        let image = decode_image(
            r#"{"id":"a","url":"http://x/a.jpg","uploadedAt":"2025-11-14T12:00:00.000Z"}"#,
        )
        .unwrap();

        assert_eq!(image.caption, "");
        assert!(!image.has_caption());
        assert!(image.updated_at.is_none());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_image("not json").is_err());
        assert!(decode_image(r#"{"id":"a"}"#).is_err());
    }
}
