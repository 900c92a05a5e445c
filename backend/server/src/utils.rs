use std::sync::LazyLock;

use axum::body::Bytes;
use carton::payloads::{DeletePayload, UpdateCaptionPayload};
use chrono::Utc;
use rand::Rng;
use regex::Regex;
use serde_json::Value;

use crate::error::AppError::{self, MalformedPayload, Validation};

static UNSAFE_FILENAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("static regex"));

/// Lowercases and collapses every run of characters outside `[a-z0-9]` into one dash.
pub fn sanitize_filename(input: &str) -> String {
    let lowered = input.to_lowercase();

    UNSAFE_FILENAME
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

pub fn random_suffix(len: usize) -> String {
    let mut rng = rand::thread_rng();

    (0..len)
        .filter_map(|_| char::from_digit(rng.gen_range(0..36), 36))
        .collect()
}

/// Millisecond timestamp followed by nine base36 characters.
pub fn generate_image_id() -> String {
    format!("{}{}", Utc::now().timestamp_millis(), random_suffix(9))
}

fn parse_json(body: &Bytes) -> Result<Value, AppError> {
    serde_json::from_slice(body).map_err(|_| MalformedPayload)
}

/// Largest float that still holds every whole number below it exactly, 2^53.
const EXACT_FLOAT_LIMIT: f64 = 9_007_199_254_740_992.0;

/// Accepts any JSON integer that fits a `u64`, and whole floats below 2^53.
pub fn get_count(body: &Bytes) -> Result<u64, AppError> {
    let payload = parse_json(body)?;
    let invalid = || Validation("Invalid count value".to_string());

    let count = payload.get("count").ok_or_else(invalid)?;

    if let Some(count) = count.as_u64() {
        return Ok(count);
    }

    match count.as_f64() {
        Some(count) if count >= 0.0 && count.fract() == 0.0 && count < EXACT_FLOAT_LIMIT => {
            Ok(count as u64)
        }
        _ => Err(invalid()),
    }
}

fn required_id(id: Option<&Value>) -> Result<String, AppError> {
    match id.and_then(Value::as_str).map(str::trim) {
        Some(id) if !id.is_empty() => Ok(id.to_string()),
        _ => Err(Validation("Image ID is required".to_string())),
    }
}

pub fn get_caption_update(body: &Bytes) -> Result<UpdateCaptionPayload, AppError> {
    let payload = parse_json(body)?;
    let id = required_id(payload.get("id"))?;

    let caption = match payload.get("caption") {
        None | Some(Value::Null) => None,
        Some(Value::String(caption)) => Some(caption.clone()),
        Some(_) => return Err(Validation("Caption must be a string".to_string())),
    };

    Ok(UpdateCaptionPayload { id, caption })
}

pub fn get_delete(body: &Bytes) -> Result<DeletePayload, AppError> {
    let payload = parse_json(body)?;

    Ok(DeletePayload {
        id: required_id(payload.get("id"))?,
    })
}
