//! Fit images into an output box and overlay a centered, opacity-blended watermark.
//!
//! Each image of a batch is scaled with a single aspect-preserving ratio,
//! the watermark is scaled to a percentage of the scaled image's height, and
//! the two are combined with per-pixel alpha blending. Results are re-encoded
//! as PNG when the input was PNG and as JPEG otherwise.
//!
//! # Quick Start
//!
//! ```no_run
//! use wotermark::{ProcessOptions, WatermarkConfig, WatermarkEngine};
//!
//! let config = WatermarkConfig {
//!     output_width: 500,
//!     output_height: 500,
//!     watermark_size: 20.0,
//!     watermark_opacity: 0.5,
//! };
//! let logo = std::fs::read("logo.png").unwrap();
//! let engine = WatermarkEngine::new(&logo, config, ProcessOptions::default()).unwrap();
//!
//! let photo = std::fs::read("photo.jpg").unwrap();
//! for outcome in engine.process_batch(&[photo]) {
//!     match outcome {
//!         Ok(image) => println!("{}x{} {:?}", image.width, image.height, image.format),
//!         Err(failure) => eprintln!("{failure}"),
//!     }
//! }
//! ```
//!
//! # HTTP
//!
//! With the `server` feature the crate exposes an axum router that accepts a
//! multipart batch upload and answers with positionally aligned
//! `images`/`errors` lists; see [`server`].

#![deny(missing_docs)]

pub mod blending;
mod engine;
pub mod error;
pub mod resize;
#[cfg(feature = "server")]
pub mod server;

pub use engine::{
    encode_image, ImageFailure, ImageOutcome, OutputFormat, ProcessOptions, ProcessedImage,
    WatermarkConfig, WatermarkEngine, DEFAULT_JPEG_QUALITY,
};
pub use error::{Error, Result};
