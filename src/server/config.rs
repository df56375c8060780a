//! Server configuration from command-line flags and environment variables.

use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::engine::{ProcessOptions, DEFAULT_JPEG_QUALITY};

/// Request body limit used when none is configured (32 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 32 << 20;

/// Per-request processing timeout used when none is configured.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per event.
    Json,
}

/// Settings for the HTTP server.
///
/// Every flag falls back to an environment variable, which in turn may come
/// from a `.env` file loaded at startup.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "wotermark-server",
    about = "HTTP service that resizes uploaded images and blends a watermark onto them",
    version
)]
pub struct ServerConfig {
    /// Interface to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Maximum accepted request body size in bytes
    #[arg(long, env = "MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,

    /// Seconds a batch may take before the request is abandoned
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    pub request_timeout_secs: u64,

    /// Quality for JPEG output (1-100)
    #[arg(
        long,
        env = "JPEG_QUALITY",
        default_value_t = DEFAULT_JPEG_QUALITY,
        value_parser = clap::value_parser!(u8).range(1..=100)
    )]
    pub jpeg_quality: u8,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            log_format: LogFormat::Text,
        }
    }
}

impl ServerConfig {
    /// Socket address string to bind.
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Batch processing timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Encoding options handed to the engine.
    #[must_use]
    pub fn process_options(&self) -> ProcessOptions {
        ProcessOptions {
            jpeg_quality: self.jpeg_quality,
        }
    }
}
