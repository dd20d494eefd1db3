// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Stage 1: describe each image with a vision model

use base64::{engine::general_purpose, Engine as _};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{index_outcomes, StageReport};
use crate::checkpoint::CheckpointStore;
use crate::openai::{ChatMessage, ChatModel, ChatRequest};
use crate::records::DescriptionRecord;
use crate::retry::{call_with_retry, RetryPolicy};
use crate::runner::{run_all, WorkItem};
use crate::{AppConfig, ImagecatError, Result};

/// An image file queued for description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageItem {
    pub filename: String,
    pub path: PathBuf,
}

impl WorkItem for ImageItem {
    fn id(&self) -> &str {
        &self.filename
    }
}

/// List regular files in `dir` whose extension is in `extensions`
/// (case-insensitive), sorted by filename. Not recursive.
pub fn scan_images(dir: &Path, extensions: &[String]) -> Result<Vec<ImageItem>> {
    let mut images: Vec<ImageItem> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|ext| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
                .unwrap_or(false)
        })
        .filter_map(|path| {
            let filename = path.file_name()?.to_str()?.to_string();
            Some(ImageItem { filename, path })
        })
        .collect();

    images.sort_by(|a, b| a.filename.cmp(&b.filename));
    Ok(images)
}

fn mime_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    }
}

/// Downscale to fit `max_dimension` and re-encode as JPEG
fn prepare_image(path: &Path, max_dimension: u32) -> Result<Option<Vec<u8>>> {
    let img = image::open(path)?;

    if img.width() <= max_dimension && img.height() <= max_dimension {
        return Ok(None);
    }

    let img = img.resize(max_dimension, max_dimension, image::imageops::FilterType::Triangle);
    let rgb = image::DynamicImage::ImageRgb8(img.to_rgb8());

    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);
    rgb.write_to(&mut cursor, image::ImageFormat::Jpeg)?;

    Ok(Some(buffer))
}

/// Read an image and encode it as a base64 data URL
pub fn encode_image(path: &Path, max_dimension: Option<u32>) -> Result<String> {
    if let Some(max) = max_dimension {
        match prepare_image(path, max) {
            Ok(Some(jpeg)) => {
                return Ok(format!(
                    "data:image/jpeg;base64,{}",
                    general_purpose::STANDARD.encode(&jpeg)
                ))
            }
            Ok(None) => {}
            // Fallback to raw bytes
            Err(e) => debug!("Could not resize {:?}: {}", path, e),
        }
    }

    let data = std::fs::read(path)?;
    Ok(format!(
        "data:{};base64,{}",
        mime_type(path),
        general_purpose::STANDARD.encode(&data)
    ))
}

/// Describe every image, returning one record per input in input order.
/// Failed items carry `error` and no `description`.
pub async fn describe_images(
    model: &dyn ChatModel,
    images: Vec<ImageItem>,
    config: &AppConfig,
) -> Vec<DescriptionRecord> {
    let policy = RetryPolicy::new(config.limits.max_attempts, config.limits.base_delay());
    let max_dimension = config.images.max_dimension;
    let filenames: Vec<String> = images.iter().map(|i| i.filename.clone()).collect();

    let outcomes = run_all(images, config.limits.concurrency, |item: ImageItem| async move {
        let data_url = encode_image(&item.path, max_dimension)?;
        let request = ChatRequest {
            model: config.models.vision.clone(),
            messages: vec![ChatMessage::user_with_image(config.prompts.describe.clone(), data_url)],
            max_tokens: Some(config.limits.describe_max_tokens),
            response_format: None,
        };
        info!("Describing {}", item.filename);
        call_with_retry(policy, || model.complete(request.clone())).await
    })
    .await;

    let mut index = index_outcomes(outcomes);
    filenames
        .into_iter()
        .map(|filename| {
            let result = index
                .get_mut(&filename)
                .and_then(|results| results.pop_front())
                .unwrap_or(Err(ImagecatError::EmptyResponse));
            match result {
                Ok(text) => DescriptionRecord::described(filename, text),
                Err(e) => DescriptionRecord::failed(filename, e),
            }
        })
        .collect()
}

/// Run stage 1 over `input_dir` and write `descriptions.json`.
///
/// Only records with a description are written; failed images are dropped
/// here and never reach later stages.
pub async fn run(
    model: &dyn ChatModel,
    input_dir: &Path,
    store: &CheckpointStore,
    config: &AppConfig,
) -> Result<StageReport> {
    let images = scan_images(input_dir, &config.images.extensions)?;

    if images.is_empty() {
        warn!("No images found in {:?}", input_dir);
        return Ok(StageReport::skipped());
    }

    info!("Found {} images. Processing...", images.len());

    let processed = images.len();
    let records = describe_images(model, images, config).await;
    let valid: Vec<DescriptionRecord> = records
        .into_iter()
        .filter(|r| r.text().is_some())
        .collect();

    store.save_descriptions(&valid)?;
    info!("Saved {} descriptions to {:?}", valid.len(), store.descriptions_path());

    Ok(StageReport {
        processed,
        succeeded: valid.len(),
        failed: processed - valid.len(),
        written: true,
    })
}
