// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Stage 2: derive category labels from a sample of descriptions
//!
//! This is one aggregate call rather than a batch, so it uses a plain
//! fixed-count retry (no backoff) instead of the throttling-aware policy
//! used by the per-image stages.

use serde::Deserialize;
use tracing::{error, info, warn};

use super::StageReport;
use crate::checkpoint::CheckpointStore;
use crate::openai::{ChatMessage, ChatModel, ChatRequest, ResponseFormat};
use crate::records::{normalize_categories, DescriptionRecord};
use crate::retry::retry_fixed;
use crate::{AppConfig, ImagecatError, Result};

#[derive(Deserialize)]
struct CategoriesReply {
    #[serde(default)]
    categories: Vec<String>,
}

/// Fill the `{descriptions}` placeholder with a JSON array of descriptions
pub fn build_prompt(template: &str, descriptions: &[&str]) -> Result<String> {
    let json = serde_json::to_string(descriptions)?;
    Ok(template.replace("{descriptions}", &json))
}

/// Parse a `{"categories": [...]}` reply; a missing key yields no categories
pub fn parse_categories(content: &str) -> Result<Vec<String>> {
    let reply: CategoriesReply = serde_json::from_str(content.trim())
        .map_err(|e| ImagecatError::InvalidResponse(format!("expected a categories object: {}", e)))?;
    Ok(normalize_categories(reply.categories))
}

/// Ask the model for categories covering the first `cluster_sample`
/// descriptions
pub async fn generate_categories(
    model: &dyn ChatModel,
    records: &[DescriptionRecord],
    config: &AppConfig,
) -> Result<Vec<String>> {
    let sample: Vec<&str> = records
        .iter()
        .filter_map(|r| r.text())
        .take(config.limits.cluster_sample)
        .collect();

    let request = ChatRequest {
        model: config.models.cluster.clone(),
        messages: vec![
            ChatMessage::system(config.prompts.cluster_system.clone()),
            ChatMessage::user(build_prompt(&config.prompts.cluster_template, &sample)?),
        ],
        max_tokens: None,
        response_format: Some(ResponseFormat::json_object()),
    };

    info!("Clustering {} of {} descriptions", sample.len(), records.len());

    let content = retry_fixed(config.limits.cluster_attempts, || model.complete(request.clone())).await?;
    parse_categories(&content)
}

/// Run stage 2: read `descriptions.json`, write `categories.json`.
///
/// A missing or empty input, or a failed call, is logged and leaves no
/// output file behind.
pub async fn run(model: &dyn ChatModel, store: &CheckpointStore, config: &AppConfig) -> Result<StageReport> {
    let records = match store.load_descriptions()? {
        Some(records) if !records.is_empty() => records,
        _ => {
            warn!("No data found in {:?}", store.descriptions_path());
            return Ok(StageReport::skipped());
        }
    };

    let described = records.iter().filter(|r| r.text().is_some()).count();
    if described == 0 {
        warn!("No descriptions to analyze.");
        return Ok(StageReport::skipped());
    }

    match generate_categories(model, &records, config).await {
        Ok(categories) => {
            store.save_categories(&categories)?;
            info!("Generated {} categories: {:?}", categories.len(), categories);
            Ok(StageReport {
                processed: described,
                succeeded: categories.len(),
                failed: 0,
                written: true,
            })
        }
        Err(e) => {
            error!("Error generating clusters: {}", e);
            Ok(StageReport {
                processed: described,
                succeeded: 0,
                failed: described,
                written: false,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::testing::FakeModel;
    use tempfile::TempDir;

    fn store_with(records: &[DescriptionRecord]) -> (TempDir, CheckpointStore) {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::open(dir.path()).unwrap();
        store.save_descriptions(records).unwrap();
        (dir, store)
    }

    #[test]
    fn test_build_prompt_embeds_json() {
        let prompt = build_prompt("Descriptions:\n{descriptions}", &["a \"quoted\" logo", "banner"]).unwrap();
        assert_eq!(prompt, "Descriptions:\n[\"a \\\"quoted\\\" logo\",\"banner\"]");
    }

    #[test]
    fn test_parse_categories() {
        let categories = parse_categories(r#"{"categories": ["Logos", "Banners", "Logos"]}"#).unwrap();
        assert_eq!(categories, vec!["Logos", "Banners"]);
        assert!(parse_categories(r#"{"clusters": []}"#).unwrap().is_empty());
        assert!(matches!(parse_categories("Logos, Banners"), Err(ImagecatError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_samples_first_descriptions_and_requests_json() {
        let records: Vec<_> = (0..60)
            .map(|i| DescriptionRecord::described(format!("{}.png", i), format!("design {}", i)))
            .collect();
        let model = FakeModel::replying(r#"{"categories": ["Logos"]}"#);

        let categories = generate_categories(&model, &records, &AppConfig::default()).await.unwrap();

        assert_eq!(categories, vec!["Logos"]);
        let requests = model.requests.lock().unwrap();
        let request = &requests[0];
        assert_eq!(request.model, "gpt-4o");
        assert_eq!(request.response_format, Some(ResponseFormat::json_object()));
        let prompt = request.messages[1].text();
        assert!(prompt.contains("\"design 49\""));
        assert!(!prompt.contains("\"design 50\""));
    }

    #[tokio::test]
    async fn test_retries_any_error_three_times() {
        let (_dir, store) = store_with(&[DescriptionRecord::described("a.jpg", "logo")]);
        let model = FakeModel::replying(r#"{"categories": ["Logos"]}"#)
            .fail_next(ImagecatError::Provider { status: 500, message: "server error".into() })
            .fail_next(ImagecatError::Provider { status: 401, message: "bad key".into() });

        let report = run(&model, &store, &AppConfig::default()).await.unwrap();

        assert!(report.written);
        assert_eq!(model.calls(), 3);
        assert_eq!(store.load_categories().unwrap(), Some(vec!["Logos".to_string()]));
    }

    #[tokio::test]
    async fn test_exhausted_retries_write_nothing() {
        let (_dir, store) = store_with(&[DescriptionRecord::described("a.jpg", "logo")]);
        let model = FakeModel::new(|_| Err(ImagecatError::Provider { status: 500, message: "down".into() }));

        let report = run(&model, &store, &AppConfig::default()).await.unwrap();

        assert!(!report.written);
        assert_eq!(model.calls(), 3);
        assert!(!store.categories_path().exists());
    }

    #[tokio::test]
    async fn test_unparseable_reply_writes_nothing() {
        let (_dir, store) = store_with(&[DescriptionRecord::described("a.jpg", "logo")]);
        let model = FakeModel::replying("Logos and banners");

        let report = run(&model, &store, &AppConfig::default()).await.unwrap();

        assert!(!report.written);
        assert_eq!(model.calls(), 1);
        assert!(!store.categories_path().exists());
    }

    #[tokio::test]
    async fn test_missing_descriptions_skip_stage() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::open(dir.path()).unwrap();
        let model = FakeModel::replying("{}");

        let report = run(&model, &store, &AppConfig::default()).await.unwrap();

        assert_eq!(report, StageReport::skipped());
        assert_eq!(model.calls(), 0);
    }
}
