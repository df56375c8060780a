use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use wotermark::{
    encode_image, Error, OutputFormat, ProcessOptions, WatermarkConfig, WatermarkEngine,
};

const BLUE: [u8; 4] = [0, 0, 255, 255];
const RED: [u8; 4] = [255, 0, 0, 255];

fn config(opacity: f32) -> WatermarkConfig {
    WatermarkConfig {
        output_width: 500,
        output_height: 500,
        watermark_size: 20.0,
        watermark_opacity: opacity,
    }
}

fn png(width: u32, height: u32, px: [u8; 4]) -> Vec<u8> {
    encode_image(
        RgbaImage::from_pixel(width, height, Rgba(px)),
        OutputFormat::Png,
        &ProcessOptions::default(),
    )
    .unwrap()
}

fn engine(opacity: f32) -> WatermarkEngine {
    WatermarkEngine::new(&png(50, 10, RED), config(opacity), ProcessOptions::default()).unwrap()
}

fn is_close(px: Rgba<u8>, expected: [u8; 4]) -> bool {
    px.0.iter()
        .zip(expected)
        .all(|(&a, b)| (i16::from(a) - i16::from(b)).abs() <= 3)
}

#[test]
fn end_to_end_scales_and_centers_watermark() {
    let engine = engine(1.0);
    let base = DynamicImage::ImageRgba8(RgbaImage::from_pixel(1000, 800, Rgba(BLUE)));
    let out = engine.apply(&base).unwrap();

    // ratio = min(0.5, 0.625) = 0.5
    assert_eq!(out.dimensions(), (500, 400));

    // watermark 50x10 scaled to height 400 * 20% = 80 -> 400x80,
    // centered at ((500 - 400) / 2, (400 - 80) / 2) = (50, 160)
    assert!(is_close(*out.get_pixel(50, 160), RED));
    assert!(is_close(*out.get_pixel(449, 239), RED));
    assert!(is_close(*out.get_pixel(250, 200), RED));
    assert!(is_close(*out.get_pixel(49, 160), BLUE));
    assert!(is_close(*out.get_pixel(450, 239), BLUE));
    assert!(is_close(*out.get_pixel(250, 159), BLUE));
    assert!(is_close(*out.get_pixel(250, 240), BLUE));
}

#[test]
fn zero_opacity_behaves_like_half_opacity() {
    let base = DynamicImage::ImageRgba8(RgbaImage::from_fn(120, 90, |x, y| {
        Rgba([(x * 2) as u8, (y * 2) as u8, 77, 255])
    }));
    let zero = engine(0.0).apply(&base).unwrap();
    let half = engine(0.5).apply(&base).unwrap();
    assert_eq!(zero, half);
}

#[test]
fn batch_keeps_positions_when_one_image_is_corrupt() {
    let engine = engine(0.5);
    let batch = vec![
        png(200, 100, BLUE),
        b"this is not an image".to_vec(),
        png(100, 200, BLUE),
    ];

    let outcomes = engine.process_batch(&batch);
    assert_eq!(outcomes.len(), 3);

    let first = outcomes[0].as_ref().unwrap();
    assert_eq!((first.width, first.height), (500, 250));

    let failure = outcomes[1].as_ref().unwrap_err();
    assert_eq!(failure.index, 1);
    assert!(matches!(failure.source, Error::Decode(_)));
    assert!(failure.to_string().starts_with("image 1: failed to decode image"));

    let third = outcomes[2].as_ref().unwrap();
    assert_eq!((third.width, third.height), (250, 500));
}

#[test]
fn empty_batch_yields_no_results() {
    let batch: Vec<Vec<u8>> = Vec::new();
    assert!(engine(0.5).process_batch(&batch).is_empty());
}

#[test]
fn invalid_config_aborts_before_processing() {
    let mut bad = config(0.5);
    bad.output_height = 0;
    let result = WatermarkEngine::new(&png(10, 10, RED), bad, ProcessOptions::default());
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
}

#[test]
fn corrupt_watermark_aborts_before_processing() {
    let result = WatermarkEngine::new(b"\x89PNG broken", config(0.5), ProcessOptions::default());
    assert!(result.is_err());
}

#[test]
fn output_format_follows_input_format() {
    let engine = engine(0.5);

    let from_png = engine.process_image(&png(64, 64, BLUE)).unwrap();
    assert_eq!(from_png.format, OutputFormat::Png);
    assert_eq!(image::guess_format(&from_png.bytes).unwrap(), ImageFormat::Png);

    let jpeg = encode_image(
        RgbaImage::from_pixel(64, 64, Rgba(BLUE)),
        OutputFormat::Jpeg,
        &ProcessOptions::default(),
    )
    .unwrap();
    let from_jpeg = engine.process_image(&jpeg).unwrap();
    assert_eq!(from_jpeg.format, OutputFormat::Jpeg);
    assert_eq!(image::guess_format(&from_jpeg.bytes).unwrap(), ImageFormat::Jpeg);

    let mut gif = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(64, 64, Rgba(BLUE)))
        .write_to(&mut gif, ImageFormat::Gif)
        .unwrap();
    let from_gif = engine.process_image(gif.get_ref()).unwrap();
    assert_eq!(from_gif.format, OutputFormat::Jpeg);
    assert_eq!(image::guess_format(&from_gif.bytes).unwrap(), ImageFormat::Jpeg);
}

#[test]
fn png_output_keeps_alpha_outside_watermark() {
    let engine = engine(0.5);
    let processed = engine.process_image(&png(500, 500, [0, 0, 0, 0])).unwrap();
    let decoded = image::load_from_memory(&processed.bytes).unwrap().to_rgba8();
    assert_eq!(decoded.get_pixel(0, 0)[3], 0);
    assert_eq!(decoded.get_pixel(250, 250)[3], 255);
}

#[test]
fn upscales_small_images() {
    let engine = engine(0.5);
    let processed = engine.process_image(&png(50, 25, BLUE)).unwrap();
    assert_eq!((processed.width, processed.height), (500, 250));
}
