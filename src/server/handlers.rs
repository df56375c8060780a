//! Request handlers.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Multipart, State};
use axum::Json;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Serialize;

use super::error::ApiError;
use super::AppState;
use crate::engine::{ImageOutcome, WatermarkConfig, WatermarkEngine};
use crate::error::Error;

/// Form field carrying the JSON configuration.
const CONFIG_FIELD: &str = "watermarkConfig";
/// Form field carrying the watermark file.
const WATERMARK_FIELD: &str = "watermark";

/// Body of the health endpoints.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `"success"` while the process is serving.
    pub status: &'static str,
}

/// Liveness check.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "success" })
}

/// Result lists for a processed batch, aligned 1:1 with the uploaded images.
#[derive(Debug, Serialize)]
pub struct ProcessImagesResponse {
    /// Base64-encoded result per image, `null` where processing failed.
    pub images: Vec<Option<String>>,
    /// Error message per image, `null` where processing succeeded.
    pub errors: Vec<Option<String>>,
}

impl ProcessImagesResponse {
    fn from_outcomes(outcomes: Vec<ImageOutcome>) -> Self {
        let mut images = Vec::with_capacity(outcomes.len());
        let mut errors = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome {
                Ok(processed) => {
                    images.push(Some(STANDARD.encode(&processed.bytes)));
                    errors.push(None);
                }
                Err(failure) => {
                    images.push(None);
                    errors.push(Some(failure.to_string()));
                }
            }
        }
        Self { images, errors }
    }
}

/// Raw parts of a batch upload.
#[derive(Debug, Default)]
struct BatchUpload {
    config: Option<String>,
    watermark: Option<Bytes>,
    images: BTreeMap<usize, Bytes>,
}

impl BatchUpload {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut upload = Self::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            if name == CONFIG_FIELD {
                upload.config = Some(field.text().await?);
            } else if name == WATERMARK_FIELD {
                upload.watermark = Some(field.bytes().await?);
            } else if let Some(index) = parse_image_index(&name) {
                upload.images.insert(index, field.bytes().await?);
            } else {
                tracing::debug!(field = %name, "ignoring unknown form field");
            }
        }
        Ok(upload)
    }

    /// Images `images[0]`, `images[1]`, ... up to the first missing index.
    fn into_images(mut self) -> Vec<Bytes> {
        (0..).map_while(|i| self.images.remove(&i)).collect()
    }
}

/// Parse `images[N]` into `N`.
fn parse_image_index(name: &str) -> Option<usize> {
    name.strip_prefix("images[")?
        .strip_suffix(']')?
        .parse()
        .ok()
}

/// Resize and watermark a batch of uploaded images.
///
/// Missing or invalid configuration and a missing or undecodable watermark
/// reject the whole request. Individual images that fail are reported in the
/// `errors` list while their siblings are still processed.
#[tracing::instrument(skip_all)]
pub async fn process_images(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<ProcessImagesResponse>, ApiError> {
    let mut upload = BatchUpload::read(multipart).await?;

    let config_json = upload
        .config
        .take()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::BadRequest("No watermark configuration provided".to_string()))?;
    let config = WatermarkConfig::from_json(&config_json).map_err(|e| {
        tracing::warn!(error = %e, "rejecting watermark configuration");
        ApiError::BadRequest("Invalid watermark configuration".to_string())
    })?;

    let watermark = upload
        .watermark
        .take()
        .ok_or_else(|| ApiError::BadRequest("Failed to get watermark file".to_string()))?;
    let engine = WatermarkEngine::new(&watermark, config, state.config.process_options())
        .map_err(|e| {
            tracing::warn!(error = %e, "rejecting watermark image");
            match e {
                Error::Decode(_) | Error::InvalidDimensions { .. } | Error::Io(_) => {
                    ApiError::BadRequest("Failed to decode watermark image".to_string())
                }
                other => ApiError::BadRequest(other.to_string()),
            }
        })?;

    let images = upload.into_images();
    tracing::info!(
        images = images.len(),
        output_width = config.output_width,
        output_height = config.output_height,
        "processing batch"
    );

    let timeout = state.config.request_timeout();
    let task = tokio::task::spawn_blocking(move || engine.process_batch(&images));
    let outcomes = tokio::time::timeout(timeout, task)
        .await
        .map_err(|_| ApiError::Timeout(timeout))?
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(ProcessImagesResponse::from_outcomes(outcomes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_indexed_image_fields() {
        assert_eq!(parse_image_index("images[0]"), Some(0));
        assert_eq!(parse_image_index("images[12]"), Some(12));
        assert_eq!(parse_image_index("images[]"), None);
        assert_eq!(parse_image_index("images[-1]"), None);
        assert_eq!(parse_image_index("images"), None);
        assert_eq!(parse_image_index("watermark"), None);
    }

    #[test]
    fn images_stop_at_first_gap() {
        let mut upload = BatchUpload::default();
        upload.images.insert(0, Bytes::from_static(b"a"));
        upload.images.insert(1, Bytes::from_static(b"b"));
        upload.images.insert(3, Bytes::from_static(b"d"));
        let images = upload.into_images();
        assert_eq!(images, vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")]);
    }

    #[test]
    fn response_lists_stay_aligned() {
        use crate::engine::{ImageFailure, OutputFormat, ProcessedImage};

        let outcomes = vec![
            Ok(ProcessedImage {
                bytes: vec![1, 2, 3],
                format: OutputFormat::Png,
                width: 1,
                height: 1,
            }),
            Err(ImageFailure {
                index: 1,
                source: Error::InvalidConfig("x".to_string()),
            }),
        ];
        let response = ProcessImagesResponse::from_outcomes(outcomes);
        assert_eq!(response.images, vec![Some("AQID".to_string()), None]);
        assert_eq!(response.errors[0], None);
        assert!(response.errors[1].as_deref().unwrap().starts_with("image 1:"));
    }
}
