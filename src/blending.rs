//! Alpha blending of a centered watermark onto a base image.
//!
//! Each covered pixel is blended with the forward alpha equation:
//! `out = alpha * watermark + (1 - alpha) * base`, where
//! `alpha = (watermark_alpha / 255) * opacity`.

use image::{GenericImageView, Rgba, RgbaImage};

/// Opacity used when the caller passes `0.0`.
pub const DEFAULT_OPACITY: f32 = 0.5;

/// Resolve the opacity actually used for blending.
///
/// A zero opacity means "not configured" and falls back to
/// [`DEFAULT_OPACITY`]; it never means fully transparent.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn effective_opacity(opacity: f32) -> f32 {
    if opacity == 0.0 {
        DEFAULT_OPACITY
    } else {
        opacity
    }
}

/// Top-left offset that centers a `wm_w x wm_h` watermark on a
/// `base_w x base_h` image. Negative when the watermark is larger.
#[must_use]
pub fn center_offset(base_w: u32, base_h: u32, wm_w: u32, wm_h: u32) -> (i64, i64) {
    (
        (i64::from(base_w) - i64::from(wm_w)) / 2,
        (i64::from(base_h) - i64::from(wm_h)) / 2,
    )
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn mix(fg: u8, bg: u8, alpha: f32) -> u8 {
    (f32::from(fg) * alpha + f32::from(bg) * (1.0 - alpha)).clamp(0.0, 255.0) as u8
}

/// Blend `watermark` centered onto a copy of `base`.
///
/// The result always has the base's dimensions. Watermark pixels falling
/// outside the base on any side are clipped. Blended pixels come out fully
/// opaque; pixels the watermark does not cover keep the base's alpha.
pub fn blend<B, W>(base: &B, watermark: &W, opacity: f32) -> RgbaImage
where
    B: GenericImageView<Pixel = Rgba<u8>>,
    W: GenericImageView<Pixel = Rgba<u8>>,
{
    let opacity = effective_opacity(opacity);
    let (base_w, base_h) = base.dimensions();
    let (wm_w, wm_h) = watermark.dimensions();

    let mut out = RgbaImage::from_fn(base_w, base_h, |x, y| base.get_pixel(x, y));

    let (offset_x, offset_y) = center_offset(base_w, base_h, wm_w, wm_h);

    // Clip the watermark rectangle to the base on all four sides.
    let x_start = (-offset_x).max(0);
    let y_start = (-offset_y).max(0);
    let x_end = i64::from(wm_w).min(i64::from(base_w) - offset_x);
    let y_end = i64::from(wm_h).min(i64::from(base_h) - offset_y);
    if x_start >= x_end || y_start >= y_end {
        return out;
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    for wy in y_start..y_end {
        for wx in x_start..x_end {
            let wm_px = watermark.get_pixel(wx as u32, wy as u32);
            let (bx, by) = ((wx + offset_x) as u32, (wy + offset_y) as u32);
            let base_px = out.get_pixel_mut(bx, by);

            let alpha = (f32::from(wm_px[3]) / 255.0) * opacity;
            *base_px = Rgba([
                mix(wm_px[0], base_px[0], alpha),
                mix(wm_px[1], base_px[1], alpha),
                mix(wm_px[2], base_px[2], alpha),
                255,
            ]);
        }
    }

    out
}
