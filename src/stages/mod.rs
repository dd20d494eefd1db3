// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Pipeline stages: describe, cluster, classify and organize

pub mod classify;
pub mod cluster;
pub mod describe;
pub mod organize;

use serde::Serialize;
use std::collections::{HashMap, VecDeque};

use crate::runner::Outcome;
use crate::Result;

/// Summary of one stage run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageReport {
    /// Items the stage looked at
    pub processed: usize,
    /// Items that produced a usable result
    pub succeeded: usize,
    /// Items that failed or were skipped
    pub failed: usize,
    /// Whether a checkpoint file was written
    pub written: bool,
}

impl StageReport {
    /// Report for a stage that stopped before doing any work
    pub fn skipped() -> Self {
        Self::default()
    }
}

/// Group outcomes by item id so results can be matched back to inputs
/// regardless of completion order. Duplicate ids are served first-in,
/// first-out.
pub(crate) fn index_outcomes<T>(outcomes: Vec<Outcome<T>>) -> HashMap<String, VecDeque<Result<T>>> {
    let mut index: HashMap<String, VecDeque<Result<T>>> = HashMap::new();
    for outcome in outcomes {
        index.entry(outcome.id).or_default().push_back(outcome.result);
    }
    index
}
