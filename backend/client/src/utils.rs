use std::{
    path::{Path, PathBuf},
    sync::LazyLock,
};

use regex::Regex;

use crate::error::ClientError;

const FALLBACK_NAME: &str = "egg-meal";

static NOT_ALPHANUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)[^a-z0-9]").expect("static regex"));

/// Saved name for a gallery image, built from its caption.
pub fn download_filename(caption: &str) -> String {
    let base = if caption.is_empty() {
        FALLBACK_NAME
    } else {
        caption
    };

    let name = NOT_ALPHANUMERIC.replace_all(base, "_").to_lowercase();
    format!("{name}.jpg")
}

/// `dir/name`, or `dir/stem-2.ext`, `dir/stem-3.ext`... when taken.
pub fn unique_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }

    let path = Path::new(name);
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(FALLBACK_NAME);
    let extension = path.extension().and_then(|ext| ext.to_str());

    (2..)
        .map(|n| match extension {
            Some(ext) => dir.join(format!("{stem}-{n}.{ext}")),
            None => dir.join(format!("{stem}-{n}")),
        })
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

/// Plain text for the status line. Server rejections show the server's message.
pub fn status_message(error: &ClientError) -> String {
    match error {
        ClientError::Status { message, .. } => format!("Error: {message}"),
        other => format!("Error: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::*;

    #[test]
    fn test_basic() {
        assert_eq!(download_filename("scrambled"), "scrambled.jpg");
        assert_eq!(download_filename("Eggs Benedict"), "eggs_benedict.jpg");
    }

    #[test]
    fn test_special_characters() {
        assert_eq!(download_filename("Sunny-side up!"), "sunny_side_up_.jpg");
        assert_eq!(download_filename("omelette 🍳"), "omelette__.jpg");
    }

    #[test]
    fn test_empty_caption() {
        assert_eq!(download_filename(""), "egg_meal.jpg");
    }

    #[test]
    fn test_unique_path_counts_up() {
        let dir = tempfile::tempdir().unwrap();

        let first = unique_path(dir.path(), "toast.jpg");
        assert_eq!(first, dir.path().join("toast.jpg"));
        std::fs::write(&first, b"1").unwrap();

        let second = unique_path(dir.path(), "toast.jpg");
        assert_eq!(second, dir.path().join("toast-2.jpg"));
        std::fs::write(&second, b"2").unwrap();

        assert_eq!(
            unique_path(dir.path(), "toast.jpg"),
            dir.path().join("toast-3.jpg")
        );
    }

    #[test]
    fn test_status_message_prefers_server_text() {
        let error = ClientError::Status {
            status: StatusCode::NOT_FOUND,
            message: "Image not found".to_string(),
        };
        assert_eq!(status_message(&error), "Error: Image not found");

        let error = ClientError::Unexpected("boom".to_string());
        assert_eq!(status_message(&error), "Error: Unexpected response: boom");
    }
}
