// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Four-stage categorization pipeline over one input directory

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::checkpoint::CheckpointStore;
use crate::openai::ChatModel;
use crate::stages::{classify, cluster, describe, organize, StageReport};
use crate::{AppConfig, ImagecatError, Result};

/// Name of the directory created inside the input directory for outputs
pub const RESULTS_DIR: &str = "results";

/// Pipeline stage, numbered as on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Step {
    Describe = 1,
    Cluster = 2,
    Classify = 3,
    Organize = 4,
}

impl Step {
    pub const ALL: [Step; 4] = [Step::Describe, Step::Cluster, Step::Classify, Step::Organize];

    pub fn from_number(n: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|s| *s as u8 == n)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Describe => "Image Description",
            Step::Cluster => "Clustering",
            Step::Classify => "Classification",
            Step::Organize => "Organization",
        };
        write!(f, "Step {}: {}", *self as u8, name)
    }
}

/// One pipeline run: the input directory, its checkpoint store and the
/// model client shared by every stage
pub struct Pipeline {
    config: AppConfig,
    model: Arc<dyn ChatModel>,
    input_dir: PathBuf,
    store: CheckpointStore,
}

impl Pipeline {
    /// Prepare a run over `input_dir`, creating `input_dir/results`
    pub fn new(config: AppConfig, model: Arc<dyn ChatModel>, input_dir: impl Into<PathBuf>) -> Result<Self> {
        let input_dir = input_dir.into();
        if !input_dir.is_dir() {
            return Err(ImagecatError::InputDirMissing(input_dir));
        }
        let store = CheckpointStore::open(input_dir.join(RESULTS_DIR))?;
        Ok(Self { config, model, input_dir, store })
    }

    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    pub async fn describe(&self) -> Result<StageReport> {
        describe::run(self.model.as_ref(), &self.input_dir, &self.store, &self.config).await
    }

    pub async fn cluster(&self) -> Result<StageReport> {
        cluster::run(self.model.as_ref(), &self.store, &self.config).await
    }

    pub async fn classify(&self) -> Result<StageReport> {
        classify::run(self.model.as_ref(), &self.store, &self.config).await
    }

    pub fn organize(&self) -> Result<StageReport> {
        organize::run(&self.store, &self.input_dir)
    }

    /// Run a single stage
    pub async fn run(&self, step: Step) -> Result<StageReport> {
        info!("--- {} (Input: {:?}) ---", step, self.input_dir);
        let report = match step {
            Step::Describe => self.describe().await?,
            Step::Cluster => self.cluster().await?,
            Step::Classify => self.classify().await?,
            Step::Organize => self.organize()?,
        };
        info!(
            "{} finished: {} processed, {} succeeded, {} failed",
            step, report.processed, report.succeeded, report.failed
        );
        Ok(report)
    }

    /// Run every stage in order. Each stage reads the previous stage's
    /// checkpoint, so a skipped stage simply leaves the next with no input.
    pub async fn run_all(&self) -> Result<Vec<(Step, StageReport)>> {
        let mut reports = Vec::with_capacity(Step::ALL.len());
        for step in Step::ALL {
            reports.push((step, self.run(step).await?));
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::testing::FakeModel;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    /// Stand-in for the provider: describes images by file extension, answers
    /// the clustering prompt with two categories and classifies by keyword
    fn scripted_model() -> FakeModel {
        FakeModel::new(|req| {
            let prompt = serde_json::to_string(&req.messages).unwrap_or_default();
            if req.response_format.is_some() {
                return Ok(r#"{"categories": ["Logos", "Banners"]}"#.to_string());
            }
            if prompt.contains("data:image/png") {
                return Ok("A wide promotional banner".to_string());
            }
            if prompt.contains("data:image/") {
                return Ok("A small emblem logo".to_string());
            }
            if prompt.contains("banner") {
                Ok("\"Banners\"".to_string())
            } else {
                Ok("Logos".to_string())
            }
        })
    }

    #[test]
    fn test_step_numbers() {
        assert_eq!(Step::from_number(1), Some(Step::Describe));
        assert_eq!(Step::from_number(4), Some(Step::Organize));
        assert_eq!(Step::from_number(5), None);
        assert_eq!(Step::Cluster.to_string(), "Step 2: Clustering");
    }

    #[test]
    fn test_missing_input_dir() {
        let dir = TempDir::new().unwrap();
        let result = Pipeline::new(
            AppConfig::default(),
            Arc::new(FakeModel::replying("x")),
            dir.path().join("nope"),
        );
        assert!(matches!(result, Err(ImagecatError::InputDirMissing(_))));
    }

    #[tokio::test]
    async fn test_full_run_sorts_images() {
        let dir = TempDir::new().unwrap();
        for name in ["a.jpg", "b.png", "c.webp"] {
            std::fs::write(dir.path().join(name), name.as_bytes()).unwrap();
        }
        let model = Arc::new(scripted_model());
        let pipeline = Pipeline::new(AppConfig::default(), model.clone(), dir.path()).unwrap();

        let reports = pipeline.run_all().await.unwrap();
        assert!(reports.iter().all(|(_, r)| r.failed == 0));

        let descriptions = pipeline.store().load_descriptions().unwrap().unwrap();
        assert_eq!(descriptions.len(), 3);
        assert_eq!(
            pipeline.store().load_categories().unwrap(),
            Some(vec!["Logos".to_string(), "Banners".to_string()])
        );

        let classified = pipeline.store().load_classified().unwrap().unwrap();
        let assigned: Vec<_> = classified
            .iter()
            .map(|r| (r.filename().to_string(), r.category.clone()))
            .collect();
        assert_eq!(
            assigned,
            vec![
                ("a.jpg".to_string(), "Logos".to_string()),
                ("b.png".to_string(), "Banners".to_string()),
                ("c.webp".to_string(), "Logos".to_string()),
            ]
        );

        let results = dir.path().join(RESULTS_DIR);
        let copied: BTreeSet<_> = ["Logos/a.jpg", "Logos/c.webp", "Banners/b.png"]
            .into_iter()
            .filter(|rel| results.join(rel).is_file())
            .collect();
        assert_eq!(copied.len(), 3);
        assert_eq!(std::fs::read(results.join("Banners/b.png")).unwrap(), b"b.png");

        // 3 describe + 1 cluster + 3 classify
        assert_eq!(model.calls(), 7);
    }

    #[tokio::test]
    async fn test_stages_rerun_from_checkpoints() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"a").unwrap();
        let pipeline = Pipeline::new(AppConfig::default(), Arc::new(scripted_model()), dir.path()).unwrap();

        pipeline.run(Step::Describe).await.unwrap();
        pipeline.run(Step::Cluster).await.unwrap();

        // A fresh pipeline picks up where the previous one stopped
        let rerun = Pipeline::new(AppConfig::default(), Arc::new(scripted_model()), dir.path()).unwrap();
        let report = rerun.run(Step::Classify).await.unwrap();
        assert_eq!(report.succeeded, 1);
        let organized = rerun.run(Step::Organize).await.unwrap();
        assert_eq!(organized.succeeded, 1);
        assert!(dir.path().join("results/Logos/a.jpg").is_file());
    }
}
