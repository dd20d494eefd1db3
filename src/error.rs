// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for imagecat

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for imagecat operations
pub type Result<T> = std::result::Result<T, ImagecatError>;

/// imagecat error types
#[derive(Error, Debug)]
pub enum ImagecatError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("API error: {0}")]
    Api(#[from] reqwest::Error),

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Provider returned status {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("Model returned an empty response")]
    EmptyResponse,

    #[error("Invalid model response: {0}")]
    InvalidResponse(String),

    #[error("Input directory '{}' does not exist", .0.display())]
    InputDirMissing(PathBuf),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ImagecatError {
    /// Whether this error signals provider throttling and is worth retrying.
    ///
    /// Status 429 is mapped to [`ImagecatError::RateLimited`] by the client.
    /// Providers also report throttling inside error bodies
    /// (`rate_limit_exceeded`), so provider and transport error text is
    /// matched too. Local errors (JSON, I/O, config) are never retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited(_) => true,
            Self::Provider { status: 429, .. } => true,
            Self::Provider { message, .. } => mentions_rate_limit(message),
            Self::Api(e) => {
                e.status().map(|s| s.as_u16()) == Some(429) || mentions_rate_limit(&e.to_string())
            }
            _ => false,
        }
    }
}

fn mentions_rate_limit(text: &str) -> bool {
    let text = text.to_lowercase();
    text.contains("rate_limit") || text.contains("rate limit") || text.contains("429")
}
