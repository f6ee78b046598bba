// 📷 Winner photo uploads (Cloudinary unsigned preset)
//
// The host takes the raw image plus an upload preset and answers with a JSON
// body. A `secure_url` in that body is the durable URI stored on the winner;
// anything else is a failed upload.

use reqwest::multipart::{Form, Part};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

const CLOUDINARY_API: &str = "https://api.cloudinary.com/v1_1";

/// The single failure condition of the image host.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("image upload failed: {reason}")]
pub struct UploadError {
    pub reason: String,
}

impl UploadError {
    fn new(reason: impl Into<String>) -> Self {
        UploadError {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImageHost {
    http: reqwest::Client,
    endpoint: String,
    upload_preset: String,
}

impl ImageHost {
    pub fn cloudinary(cloud_name: &str, upload_preset: &str) -> Self {
        let endpoint = format!(
            "{}/{}/image/upload",
            CLOUDINARY_API,
            urlencoding::encode(cloud_name.trim())
        );
        Self::with_endpoint(&endpoint, upload_preset)
    }

    /// Point at any Cloudinary-compatible endpoint.
    pub fn with_endpoint(endpoint: &str, upload_preset: &str) -> Self {
        ImageHost {
            http: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
            upload_preset: upload_preset.to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Upload an image and return its durable URI.
    pub async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<String, UploadError> {
        if bytes.is_empty() {
            return Err(UploadError::new("empty image"));
        }

        let size = bytes.len();
        let part = Part::bytes(bytes).file_name(file_name.to_string());
        let form = Form::new()
            .part("file", part)
            .text("upload_preset", self.upload_preset.clone());

        let response = self
            .http
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                warn!(%e, "image host unreachable");
                UploadError::new(e.to_string())
            })?;

        let status = response.status();
        let body: Value = response.json().await.map_err(|e| {
            warn!(%status, %e, "image host sent an unreadable response");
            UploadError::new(e.to_string())
        })?;

        let url = secure_url(&body)?;
        info!(file_name, size, %url, "photo uploaded");
        Ok(url)
    }
}

/// Pull the durable URI out of a host response.
pub fn secure_url(body: &Value) -> Result<String, UploadError> {
    match body.get("secure_url").and_then(Value::as_str) {
        Some(url) if !url.trim().is_empty() => Ok(url.to_string()),
        _ => {
            let reason = body
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("no secure_url in response");
            Err(UploadError::new(reason))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_secure_url_is_extracted() {
        let body = json!({"secure_url": "https://res.cloudinary.com/demo/image/upload/v1/a.jpg"});
        assert_eq!(
            secure_url(&body).unwrap(),
            "https://res.cloudinary.com/demo/image/upload/v1/a.jpg"
        );
    }

    #[test]
    fn test_error_body_is_an_upload_failure() {
        let body = json!({"error": {"message": "Upload preset not found"}});
        let err = secure_url(&body).unwrap_err();
        assert_eq!(err.reason, "Upload preset not found");
        assert_eq!(err.to_string(), "image upload failed: Upload preset not found");

        assert!(secure_url(&json!({"secure_url": ""})).is_err());
        assert!(secure_url(&json!({})).is_err());
    }

    #[test]
    fn test_cloudinary_endpoint() {
        let host = ImageHost::cloudinary("fest-2025", "winners");
        assert_eq!(
            host.endpoint(),
            "https://api.cloudinary.com/v1_1/fest-2025/image/upload"
        );
    }

    #[tokio::test]
    async fn test_empty_upload_fails_without_network() {
        let host = ImageHost::with_endpoint("http://127.0.0.1:9/upload", "winners");
        let err = host.upload("a.jpg", Vec::new()).await.unwrap_err();
        assert_eq!(err.reason, "empty image");
    }
}
