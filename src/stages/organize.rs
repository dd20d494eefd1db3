// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Stage 4: copy images into per-category folders

use std::path::Path;
use tracing::{error, info, warn};

use super::StageReport;
use crate::checkpoint::CheckpointStore;
use crate::records::{ClassificationRecord, UNCATEGORIZED};
use crate::Result;

/// Make a category name safe to use as a directory name.
///
/// Keeps alphanumerics, space, underscore and hyphen, then trims; an empty
/// result becomes `Uncategorized`.
pub fn sanitize_category(raw: &str) -> String {
    let clean: String = raw
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '_' || *c == '-')
        .collect();
    let clean = clean.trim();

    if clean.is_empty() {
        UNCATEGORIZED.to_string()
    } else {
        clean.to_string()
    }
}

/// Copy each classified file from `source_dir` into
/// `results_dir/<category>/`, overwriting earlier copies.
///
/// Missing sources and copy failures are logged and skipped.
pub fn organize_files(
    records: &[ClassificationRecord],
    source_dir: &Path,
    results_dir: &Path,
) -> Result<StageReport> {
    let mut report = StageReport {
        processed: records.len(),
        ..StageReport::default()
    };

    for record in records {
        let filename = record.filename();

        // Only bare file names; never follow a path out of the source directory
        if filename.is_empty() || Path::new(filename).file_name().and_then(|n| n.to_str()) != Some(filename) {
            warn!("Skipping invalid filename: {:?}", filename);
            report.failed += 1;
            continue;
        }

        let category_dir = results_dir.join(sanitize_category(&record.category));
        std::fs::create_dir_all(&category_dir)?;

        let source_path = source_dir.join(filename);
        let dest_path = category_dir.join(filename);

        if !source_path.exists() {
            warn!("Source file not found: {:?}", source_path);
            report.failed += 1;
            continue;
        }

        match std::fs::copy(&source_path, &dest_path) {
            Ok(_) => report.succeeded += 1,
            Err(e) => {
                error!("Failed to copy {}: {}", filename, e);
                report.failed += 1;
            }
        }
    }

    report.written = report.succeeded > 0;
    Ok(report)
}

/// Run stage 4 from `classified_projects.json`
pub fn run(store: &CheckpointStore, source_dir: &Path) -> Result<StageReport> {
    let records = match store.load_classified()? {
        Some(records) if !records.is_empty() => records,
        _ => {
            warn!("No classified data found in {:?}", store.classified_path());
            return Ok(StageReport::skipped());
        }
    };

    info!("Organizing {} files into {:?}...", records.len(), store.dir());
    let report = organize_files(&records, source_dir, store.dir())?;
    info!("Organization complete.");

    Ok(report)
}
