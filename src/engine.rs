//! Per-request watermarking pipeline.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ImageFormat, ImageReader, RgbaImage};
use serde::Deserialize;

use crate::blending;
use crate::error::{Error, Result};
use crate::resize;

/// JPEG quality used when none is configured (matches the common encoder default).
pub const DEFAULT_JPEG_QUALITY: u8 = 75;

/// Output box and watermark settings shared by every image in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatermarkConfig {
    /// Width of the box images are fitted into.
    pub output_width: u32,
    /// Height of the box images are fitted into.
    pub output_height: u32,
    /// Watermark height as a percentage of the scaled image height.
    #[serde(alias = "watermarkSizePercent")]
    pub watermark_size: f32,
    /// Blend opacity in `[0, 1]`; `0` selects the default of `0.5`.
    #[serde(default)]
    pub watermark_opacity: f32,
}

impl WatermarkConfig {
    /// Parse a configuration from its JSON form and validate it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the JSON is malformed or any value
    /// is out of range.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.output_width == 0 {
            return Err(Error::InvalidConfig(
                "outputWidth must be positive".to_string(),
            ));
        }
        if self.output_height == 0 {
            return Err(Error::InvalidConfig(
                "outputHeight must be positive".to_string(),
            ));
        }
        if resize::ensure_within_budget(self.output_width, self.output_height).is_err() {
            return Err(Error::InvalidConfig(format!(
                "output box {}x{} exceeds the limit of {} px per side and {} px in total",
                self.output_width,
                self.output_height,
                resize::MAX_DIMENSION,
                resize::MAX_PIXELS
            )));
        }
        if !self.watermark_size.is_finite() || self.watermark_size <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "watermarkSize must be a positive percentage, got {}",
                self.watermark_size
            )));
        }
        if !(0.0..=1.0).contains(&self.watermark_opacity) {
            return Err(Error::InvalidConfig(format!(
                "watermarkOpacity must be within [0, 1], got {}",
                self.watermark_opacity
            )));
        }
        Ok(())
    }
}

/// Encoding used for a processed image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Lossless PNG, used when the input was a PNG.
    Png,
    /// JPEG, used for JPEG input and as the fallback for everything else.
    Jpeg,
}

impl OutputFormat {
    /// Select the output encoding from the decoded input format.
    #[must_use]
    pub fn from_detected(format: Option<ImageFormat>) -> Self {
        match format {
            Some(ImageFormat::Png) => Self::Png,
            Some(ImageFormat::Jpeg) => Self::Jpeg,
            other => {
                tracing::warn!(
                    detected = ?other,
                    "input format has no matching encoder, falling back to JPEG"
                );
                Self::Jpeg
            }
        }
    }

    /// Conventional file extension.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }
}

/// Options controlling encoding of processed images.
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    /// JPEG quality (1-100).
    pub jpeg_quality: u8,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

/// A successfully watermarked and re-encoded image.
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    /// Encoded bytes.
    pub bytes: Vec<u8>,
    /// Encoding of `bytes`.
    pub format: OutputFormat,
    /// Width of the composed image.
    pub width: u32,
    /// Height of the composed image.
    pub height: u32,
}

/// A per-image failure inside a batch, tagged with the image's position.
#[derive(Debug, thiserror::Error)]
#[error("image {index}: {source}")]
pub struct ImageFailure {
    /// Zero-based position of the image in the batch.
    pub index: usize,
    /// What went wrong.
    #[source]
    pub source: Error,
}

/// Outcome for one image of a batch.
pub type ImageOutcome = std::result::Result<ProcessedImage, ImageFailure>;

/// The watermarking engine for one request.
///
/// Holds the validated configuration and the decoded watermark, so a batch
/// decodes the watermark once and shares it across images.
pub struct WatermarkEngine {
    config: WatermarkConfig,
    watermark: DynamicImage,
    options: ProcessOptions,
}

impl WatermarkEngine {
    /// Create an engine from watermark bytes and a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for an out-of-range configuration,
    /// [`Error::Decode`] if the watermark cannot be decoded, and
    /// [`Error::InvalidDimensions`] if it is empty.
    pub fn new(
        watermark_bytes: &[u8],
        config: WatermarkConfig,
        options: ProcessOptions,
    ) -> Result<Self> {
        config.validate()?;
        let (watermark, _) = decode(watermark_bytes)?;
        Self::from_image(watermark, config, options)
    }

    /// Create an engine from an already decoded watermark.
    ///
    /// # Errors
    ///
    /// Same as [`WatermarkEngine::new`], minus decoding.
    pub fn from_image(
        watermark: DynamicImage,
        config: WatermarkConfig,
        options: ProcessOptions,
    ) -> Result<Self> {
        config.validate()?;
        if watermark.width() == 0 || watermark.height() == 0 {
            return Err(Error::InvalidDimensions {
                width: watermark.width(),
                height: watermark.height(),
            });
        }
        Ok(Self {
            config,
            watermark,
            options,
        })
    }

    /// Fit `image` into the output box and blend the scaled watermark onto it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDimensions`] if `image` is empty or the scaled
    /// watermark would exceed the resize budget.
    pub fn apply(&self, image: &DynamicImage) -> Result<RgbaImage> {
        let scaled = resize::scale_to_fit(
            image,
            self.config.output_width,
            self.config.output_height,
        )?;
        let wm_height = resize::watermark_height(scaled.height(), self.config.watermark_size);
        let watermark = resize::scale_to_height(&self.watermark, wm_height)?;
        Ok(blending::blend(
            &scaled,
            &watermark,
            self.config.watermark_opacity,
        ))
    }

    /// Decode, watermark, and re-encode a single image.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`], [`Error::InvalidDimensions`], or
    /// [`Error::Encode`] depending on the failing stage.
    pub fn process_image(&self, bytes: &[u8]) -> Result<ProcessedImage> {
        let (image, detected) = decode(bytes)?;
        let composed = self.apply(&image)?;
        let format = OutputFormat::from_detected(detected);
        let (width, height) = composed.dimensions();
        let bytes = encode_image(composed, format, &self.options)?;
        Ok(ProcessedImage {
            bytes,
            format,
            width,
            height,
        })
    }

    /// Process every image of a batch.
    ///
    /// A failing image never aborts its siblings: the result list always has
    /// one entry per input, in input order. Runs in parallel when the
    /// `parallel` feature is enabled (via rayon).
    #[must_use]
    pub fn process_batch<B>(&self, images: &[B]) -> Vec<ImageOutcome>
    where
        B: AsRef<[u8]> + Sync,
    {
        let run = |(index, bytes): (usize, &B)| -> ImageOutcome {
            match self.process_image(bytes.as_ref()) {
                Ok(processed) => {
                    tracing::debug!(
                        index,
                        width = processed.width,
                        height = processed.height,
                        format = ?processed.format,
                        "image processed"
                    );
                    Ok(processed)
                }
                Err(source) => {
                    tracing::warn!(index, error = %source, "image failed");
                    Err(ImageFailure { index, source })
                }
            }
        };

        #[cfg(feature = "parallel")]
        let outcomes: Vec<ImageOutcome> = {
            use rayon::prelude::*;
            images.par_iter().enumerate().map(run).collect()
        };

        #[cfg(not(feature = "parallel"))]
        let outcomes: Vec<ImageOutcome> = images.iter().enumerate().map(run).collect();

        let failed = outcomes.iter().filter(|o| o.is_err()).count();
        tracing::info!(
            total = outcomes.len(),
            failed,
            "batch processed"
        );
        outcomes
    }
}

/// Decode image bytes, guessing the format from their content.
fn decode(bytes: &[u8]) -> Result<(DynamicImage, Option<ImageFormat>)> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(Error::Io)?;
    let format = reader.format();
    let image = reader.decode().map_err(Error::Decode)?;
    Ok((image, format))
}

/// Encode a composed image in the requested format.
///
/// JPEG has no alpha channel, so the image is flattened to RGB first.
///
/// # Errors
///
/// Returns [`Error::Encode`] if the encoder fails.
pub fn encode_image(
    image: RgbaImage,
    format: OutputFormat,
    options: &ProcessOptions,
) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let dyn_img = DynamicImage::ImageRgba8(image);
    match format {
        OutputFormat::Png => {
            dyn_img
                .write_with_encoder(PngEncoder::new(&mut buf))
                .map_err(Error::Encode)?;
        }
        OutputFormat::Jpeg => {
            let quality = options.jpeg_quality.clamp(1, 100);
            DynamicImage::ImageRgb8(dyn_img.to_rgb8())
                .write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))
                .map_err(Error::Encode)?;
        }
    }
    Ok(buf)
}
