// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Stage 3: assign each description one of the discovered categories

use tracing::{info, warn};

use super::{index_outcomes, StageReport};
use crate::checkpoint::CheckpointStore;
use crate::openai::{ChatMessage, ChatModel, ChatRequest};
use crate::records::{ClassificationRecord, DescriptionRecord, ERROR_CATEGORY, UNCATEGORIZED};
use crate::retry::{call_with_retry, RetryPolicy};
use crate::runner::{run_all, WorkItem};
use crate::{AppConfig, ImagecatError, Result};

impl WorkItem for DescriptionRecord {
    fn id(&self) -> &str {
        &self.filename
    }
}

/// Trim a model reply and strip surrounding double then single quotes
pub fn clean_category(raw: &str) -> String {
    raw.trim()
        .trim_matches('"')
        .trim_matches('\'')
        .to_string()
}

fn build_request(description: &str, categories_json: &str, config: &AppConfig) -> ChatRequest {
    ChatRequest {
        model: config.models.classify.clone(),
        messages: vec![
            ChatMessage::system(config.prompts.classify_system.replace("{categories}", categories_json)),
            ChatMessage::user(format!("Description: {}\n\nReturn ONLY the category name.", description)),
        ],
        max_tokens: Some(config.limits.classify_max_tokens),
        response_format: None,
    }
}

/// Classify every record, returning one result per input in input order.
///
/// Records without a description become `Uncategorized` without a remote
/// call; failed calls become `Error`.
pub async fn classify_records(
    model: &dyn ChatModel,
    records: Vec<DescriptionRecord>,
    categories: &[String],
    config: &AppConfig,
) -> Result<Vec<ClassificationRecord>> {
    let categories_json = serde_json::to_string(categories)?;
    let policy = RetryPolicy::new(config.limits.max_attempts, config.limits.base_delay());
    let originals = records.clone();
    let categories_json = categories_json.as_str();

    let outcomes = run_all(records, config.limits.concurrency, |record: DescriptionRecord| async move {
        let Some(description) = record.text() else {
            return Ok(UNCATEGORIZED.to_string());
        };
        let request = build_request(description, categories_json, config);
        let reply = call_with_retry(policy, || model.complete(request.clone())).await?;
        Ok(clean_category(&reply))
    })
    .await;

    let mut index = index_outcomes(outcomes);
    let classified = originals
        .into_iter()
        .map(|record| {
            let result = index
                .get_mut(&record.filename)
                .and_then(|results| results.pop_front())
                .unwrap_or(Err(ImagecatError::EmptyResponse));
            match result {
                Ok(category) => ClassificationRecord::new(record, category),
                Err(_) => ClassificationRecord::new(record, ERROR_CATEGORY),
            }
        })
        .collect();

    Ok(classified)
}

/// Run stage 3: read descriptions and categories, write
/// `classified_projects.json`
pub async fn run(model: &dyn ChatModel, store: &CheckpointStore, config: &AppConfig) -> Result<StageReport> {
    let records = match store.load_descriptions()? {
        Some(records) if !records.is_empty() => records,
        _ => {
            warn!("No descriptions found.");
            return Ok(StageReport::skipped());
        }
    };
    let categories = match store.load_categories()? {
        Some(categories) if !categories.is_empty() => categories,
        _ => {
            warn!("No categories found.");
            return Ok(StageReport::skipped());
        }
    };

    info!(
        "Assigning categories to {} items using {} clusters...",
        records.len(),
        categories.len()
    );

    let processed = records.len();
    let classified = classify_records(model, records, &categories, config).await?;
    let failed = classified.iter().filter(|r| r.category == ERROR_CATEGORY).count();

    store.save_classified(&classified)?;
    info!("Saved classified projects to {:?}", store.classified_path());

    Ok(StageReport {
        processed,
        succeeded: processed - failed,
        failed,
        written: true,
    })
}
