//! ImgBB image hosting. Uploads are base64 form posts; ImgBB returns public URLs.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::info;
use serde::Deserialize;

use crate::{
    config::ImgbbConfig,
    error::{AppError, AppResult},
};

#[derive(Clone)]
pub struct ImgbbClient {
    http: reqwest::Client,
    api_key: String,
    api_base: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct UploadedImage {
    pub url: String,
    pub display_url: String,
    #[serde(default)]
    pub delete_url: String,
}

#[derive(Deserialize)]
struct UploadResponse {
    #[serde(default)]
    success: bool,
    data: Option<UploadedImage>,
    error: Option<UploadError>,
}

#[derive(Deserialize)]
struct UploadError {
    message: Option<String>,
}

/// Strip an optional `data:image/...;base64,` prefix, check that the payload
/// decodes and is not larger than `max_bytes`, and return the bare base64.
pub fn decode_image_payload(raw: &str, max_bytes: usize) -> AppResult<String> {
    let trimmed = raw.trim();
    let encoded = match trimmed.strip_prefix("data:") {
        Some(rest) => {
            let (meta, data) = rest
                .split_once(',')
                .ok_or_else(|| AppError::validation("Malformed data URL"))?;
            if !meta.starts_with("image/") || !meta.ends_with(";base64") {
                return Err(AppError::validation("Only base64 image data URLs are accepted"));
            }
            data
        }
        None => trimmed,
    };

    if encoded.is_empty() {
        return Err(AppError::validation("Image data is empty"));
    }
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|_| AppError::validation("Image data is not valid base64"))?;
    if bytes.len() > max_bytes {
        return Err(AppError::validation(format!(
            "Image is {} bytes, the limit is {}",
            bytes.len(),
            max_bytes
        )));
    }
    Ok(encoded.to_string())
}

impl ImgbbClient {
    pub fn new(config: &ImgbbConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        }
    }

    /// Upload already-validated base64 image data.
    pub async fn upload(&self, base64_image: &str, name: &str) -> AppResult<UploadedImage> {
        let response = self
            .http
            .post(format!("{}/1/upload", self.api_base))
            .query(&[("key", self.api_key.as_str())])
            .form(&[("image", base64_image), ("name", name)])
            .send()
            .await?;

        let status = response.status();
        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| AppError::upstream("ImgBB", format!("HTTP {}: {}", status, e)))?;
        let image = parse_upload(status.is_success(), body)?;
        info!("Uploaded image {} to ImgBB", image.url);
        Ok(image)
    }
}

fn parse_upload(http_ok: bool, body: UploadResponse) -> AppResult<UploadedImage> {
    match body.data {
        Some(image) if http_ok && body.success => Ok(image),
        _ => {
            let message = body
                .error
                .and_then(|e| e.message)
                .unwrap_or_else(|| "upload rejected".to_string());
            Err(AppError::upstream("ImgBB", message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_1X1: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    #[test]
    fn accepts_raw_base64_and_data_urls() {
        assert_eq!(decode_image_payload(PNG_1X1, 1024).unwrap(), PNG_1X1);
        let data_url = format!("data:image/png;base64,{}", PNG_1X1);
        assert_eq!(decode_image_payload(&data_url, 1024).unwrap(), PNG_1X1);
    }

    #[test]
    fn rejects_bad_payloads() {
        assert!(decode_image_payload("", 1024).is_err());
        assert!(decode_image_payload("not base64!!", 1024).is_err());
        assert!(decode_image_payload("data:text/plain;base64,aGVsbG8=", 1024).is_err());
        assert!(decode_image_payload(PNG_1X1, 10).is_err());
    }

    #[test]
    fn upload_response_parsing() {
        let ok: UploadResponse = serde_json::from_value(serde_json::json!({
            "success": true,
            "status": 200,
            "data": {
                "url": "https://i.ibb.co/abc/leopard.jpg",
                "display_url": "https://i.ibb.co/abc/leopard.jpg",
                "delete_url": "https://ibb.co/abc/del"
            }
        }))
        .unwrap();
        let image = parse_upload(true, ok).unwrap();
        assert_eq!(image.url, "https://i.ibb.co/abc/leopard.jpg");

        let rejected: UploadResponse = serde_json::from_value(serde_json::json!({
            "success": false,
            "status": 400,
            "error": { "message": "Invalid API v1 key." }
        }))
        .unwrap();
        match parse_upload(false, rejected) {
            Err(AppError::Upstream { message, .. }) => assert_eq!(message, "Invalid API v1 key."),
            other => panic!("unexpected {:?}", other.map(|i| i.url)),
        }
    }
}
