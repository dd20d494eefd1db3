// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! imagecat: AI Image Categorization Pipeline
//!
//! Describes images with a hosted vision model, clusters the descriptions
//! into categories, classifies every image against them and copies the
//! files into per-category folders. Each stage checkpoints its output as
//! JSON so stages can be rerun independently.

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod openai;
pub mod pipeline;
pub mod records;
pub mod retry;
pub mod runner;
pub mod stages;

pub use config::AppConfig;
pub use error::{ImagecatError, Result};
pub use pipeline::{Pipeline, Step};
