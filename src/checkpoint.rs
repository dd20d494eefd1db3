// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! JSON checkpoint files written between pipeline stages

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::records::{normalize_categories, ClassificationRecord, DescriptionRecord};
use crate::Result;

pub const DESCRIPTIONS_FILE: &str = "descriptions.json";
pub const CATEGORIES_FILE: &str = "categories.json";
pub const CLASSIFIED_FILE: &str = "classified_projects.json";

/// Checkpoint files living in a pipeline's results directory
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    /// Create a store rooted at `dir`, creating the directory if needed
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn descriptions_path(&self) -> PathBuf {
        self.dir.join(DESCRIPTIONS_FILE)
    }

    pub fn categories_path(&self) -> PathBuf {
        self.dir.join(CATEGORIES_FILE)
    }

    pub fn classified_path(&self) -> PathBuf {
        self.dir.join(CLASSIFIED_FILE)
    }

    pub fn load_descriptions(&self) -> Result<Option<Vec<DescriptionRecord>>> {
        load_json(&self.descriptions_path())
    }

    pub fn save_descriptions(&self, records: &[DescriptionRecord]) -> Result<()> {
        save_json(&self.descriptions_path(), &records)
    }

    /// Load the category list, normalized to distinct non-blank names
    pub fn load_categories(&self) -> Result<Option<Vec<String>>> {
        let raw: Option<Vec<String>> = load_json(&self.categories_path())?;
        Ok(raw.map(normalize_categories))
    }

    pub fn save_categories(&self, categories: &[String]) -> Result<()> {
        save_json(&self.categories_path(), &categories)
    }

    pub fn load_classified(&self) -> Result<Option<Vec<ClassificationRecord>>> {
        load_json(&self.classified_path())
    }

    pub fn save_classified(&self, records: &[ClassificationRecord]) -> Result<()> {
        save_json(&self.classified_path(), &records)
    }
}

/// Load a JSON file; a missing file is `Ok(None)`
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        debug!("Checkpoint not found: {:?}", path);
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&content)?))
}

/// Write pretty-printed JSON (4-space indent) through a temporary file so a
/// reader never observes a partially written checkpoint
pub fn save_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    value.serialize(&mut serializer)?;
    buffer.push(b'\n');

    let tmp_path = path.with_extension("json.tmp");
    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(&buffer)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    debug!("Wrote checkpoint {:?} ({} bytes)", path, buffer.len());
    Ok(())
}
