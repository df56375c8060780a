//! Aspect-preserving image scaling.
//!
//! Base images are fitted into the output box with a single scale factor
//! `ratio = min(target_w / w, target_h / h)`; upscaling is allowed. The
//! watermark is scaled to a fixed height with its width following the aspect
//! ratio. Both use Lanczos3 resampling.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};

use crate::error::{Error, Result};

/// Resampling filter used for every resize.
const FILTER: FilterType = FilterType::Lanczos3;

/// Largest width or height any resize may produce.
pub const MAX_DIMENSION: u32 = 16_384;

/// Largest pixel count any resize may produce (64 Mpx, 256 MiB as RGBA).
pub const MAX_PIXELS: u64 = 64 * 1024 * 1024;

fn ensure_positive(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidDimensions { width, height });
    }
    Ok(())
}

/// Check that a `width x height` buffer stays within [`MAX_DIMENSION`] and
/// [`MAX_PIXELS`].
///
/// # Errors
///
/// Returns [`Error::InvalidDimensions`] if either limit is exceeded.
pub fn ensure_within_budget(width: u32, height: u32) -> Result<()> {
    if width > MAX_DIMENSION
        || height > MAX_DIMENSION
        || u64::from(width) * u64::from(height) > MAX_PIXELS
    {
        return Err(Error::InvalidDimensions { width, height });
    }
    Ok(())
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn round_dim(value: f64) -> u32 {
    value.round().clamp(0.0, f64::from(u32::MAX)) as u32
}

/// Compute the largest `(width, height)` that fits inside the target box
/// while keeping the source aspect ratio.
///
/// # Errors
///
/// Returns [`Error::InvalidDimensions`] if the source or target has a zero
/// dimension, or the fitted size exceeds the resize budget.
pub fn fit_dimensions(
    width: u32,
    height: u32,
    target_width: u32,
    target_height: u32,
) -> Result<(u32, u32)> {
    ensure_positive(width, height)?;
    ensure_positive(target_width, target_height)?;

    let width_ratio = f64::from(target_width) / f64::from(width);
    let height_ratio = f64::from(target_height) / f64::from(height);
    let ratio = width_ratio.min(height_ratio);

    let new_width = round_dim(f64::from(width) * ratio).clamp(1, target_width);
    let new_height = round_dim(f64::from(height) * ratio).clamp(1, target_height);
    ensure_within_budget(new_width, new_height)?;
    Ok((new_width, new_height))
}

/// Scale an image to fit within `target_width x target_height`, preserving
/// its aspect ratio. At least one side ends up equal to its target.
///
/// # Errors
///
/// Returns [`Error::InvalidDimensions`] if the image or the target box has a
/// zero dimension, or the result would exceed the resize budget.
pub fn scale_to_fit(
    image: &DynamicImage,
    target_width: u32,
    target_height: u32,
) -> Result<DynamicImage> {
    let (width, height) = image.dimensions();
    let (new_width, new_height) = fit_dimensions(width, height, target_width, target_height)?;
    tracing::debug!(
        width,
        height,
        new_width,
        new_height,
        "scaling image to fit output box"
    );
    Ok(image.resize_exact(new_width, new_height, FILTER))
}

/// Scale an image to exactly `target_height` pixels tall; the width follows
/// from the source aspect ratio.
///
/// # Errors
///
/// Returns [`Error::InvalidDimensions`] if the image has a zero dimension,
/// `target_height` is zero, or the result would exceed the resize budget.
pub fn scale_to_height(image: &DynamicImage, target_height: u32) -> Result<DynamicImage> {
    let (width, height) = image.dimensions();
    ensure_positive(width, height)?;
    if target_height == 0 {
        return Err(Error::InvalidDimensions {
            width,
            height: target_height,
        });
    }

    let new_width =
        round_dim(f64::from(width) * f64::from(target_height) / f64::from(height)).max(1);
    ensure_within_budget(new_width, target_height)?;
    Ok(image.resize_exact(new_width, target_height, FILTER))
}

/// Watermark height for a scaled base image: `round(height * percent / 100)`,
/// never less than one pixel.
#[must_use]
pub fn watermark_height(scaled_height: u32, percent: f32) -> u32 {
    round_dim(f64::from(scaled_height) * f64::from(percent) / 100.0).max(1)
}
