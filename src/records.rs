// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Record types persisted between pipeline stages

use serde::{Deserialize, Serialize};

/// Category assigned when an item has no description to classify
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Category assigned when the classification call failed
pub const ERROR_CATEGORY: &str = "Error";

/// Output of the describe stage for one image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptionRecord {
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DescriptionRecord {
    pub fn described(filename: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            description: Some(description.into()),
            error: None,
        }
    }

    pub fn failed(filename: impl Into<String>, error: impl ToString) -> Self {
        Self {
            filename: filename.into(),
            description: None,
            error: Some(error.to_string()),
        }
    }

    /// Description text, if present and non-empty. Whitespace-only text
    /// still counts as a description.
    pub fn text(&self) -> Option<&str> {
        self.description
            .as_deref()
            .filter(|d| !d.is_empty())
    }
}

/// Output of the classify stage: a description plus its assigned category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRecord {
    #[serde(flatten)]
    pub record: DescriptionRecord,
    pub category: String,
}

impl ClassificationRecord {
    pub fn new(record: DescriptionRecord, category: impl Into<String>) -> Self {
        Self {
            record,
            category: category.into(),
        }
    }

    pub fn filename(&self) -> &str {
        &self.record.filename
    }
}

/// Trim, drop blanks and drop duplicates while keeping first-seen order
pub fn normalize_categories<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut categories: Vec<String> = Vec::new();
    for name in raw {
        let name = name.as_ref().trim();
        if name.is_empty() || categories.iter().any(|c| c == name) {
            continue;
        }
        categories.push(name.to_string());
    }
    categories
}
