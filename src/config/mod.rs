// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for imagecat

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    /// Remote model provider
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Model identifiers per stage
    #[serde(default)]
    pub models: ModelConfig,

    /// Concurrency, retry and token limits
    #[serde(default)]
    pub limits: LimitConfig,

    /// Prompt templates
    #[serde(default)]
    pub prompts: PromptConfig,

    /// Image discovery and encoding
    #[serde(default)]
    pub images: ImageConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_small_model")]
    pub vision: String,
    #[serde(default = "default_cluster_model")]
    pub cluster: String,
    #[serde(default = "default_small_model")]
    pub classify: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LimitConfig {
    /// Maximum in-flight requests per stage
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Total attempts per request when throttled
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// First backoff delay, doubled on each retry
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Attempts for the single clustering call (no backoff)
    #[serde(default = "default_cluster_attempts")]
    pub cluster_attempts: u32,
    /// Number of descriptions sent to the clustering call
    #[serde(default = "default_cluster_sample")]
    pub cluster_sample: usize,
    #[serde(default = "default_describe_max_tokens")]
    pub describe_max_tokens: u32,
    #[serde(default = "default_classify_max_tokens")]
    pub classify_max_tokens: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PromptConfig {
    #[serde(default = "default_describe_prompt")]
    pub describe: String,
    #[serde(default = "default_cluster_system_prompt")]
    pub cluster_system: String,
    /// `{descriptions}` is replaced by the JSON array of sampled descriptions
    #[serde(default = "default_cluster_template")]
    pub cluster_template: String,
    /// `{categories}` is replaced by the JSON array of category names
    #[serde(default = "default_classify_system_prompt")]
    pub classify_system: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ImageConfig {
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Downscale images whose longest side exceeds this before upload
    #[serde(default)]
    pub max_dimension: Option<u32>,
}

// Default value functions
fn default_base_url() -> String { "https://api.openai.com/v1".to_string() }
fn default_api_key_env() -> String { "OPENAI_API_KEY".to_string() }
fn default_timeout() -> u64 { 120 }
fn default_small_model() -> String { "gpt-4o-mini".to_string() }
fn default_cluster_model() -> String { "gpt-4o".to_string() }
fn default_concurrency() -> usize { 2 }
fn default_max_attempts() -> u32 { 5 }
fn default_base_delay_ms() -> u64 { 2000 }
fn default_cluster_attempts() -> u32 { 3 }
fn default_cluster_sample() -> usize { 50 }
fn default_describe_max_tokens() -> u32 { 300 }
fn default_classify_max_tokens() -> u32 { 50 }

fn default_extensions() -> Vec<String> {
    vec!["png", "jpg", "jpeg", "webp"].into_iter().map(String::from).collect()
}

fn default_describe_prompt() -> String {
    "Describe this image in detail. Identify if it's a business card, banner, logo, \
     or other graphic design. Describe the visual style, colors, and key elements.".to_string()
}

fn default_cluster_system_prompt() -> String {
    "You are a helpful assistant that categorizes design projects.".to_string()
}

fn default_cluster_template() -> String {
    "Analyze the following list of image descriptions from a graphic design portfolio.\n\
     Identify distinct logical categories or clusters that these projects fall into \
     (e.g., \"Minimalist Business Cards\", \"Restaurant Menus\", \"Tech Logos\").\n\n\
     Return a JSON object with a single key \"categories\" containing a list of strings.\n\
     Example: { \"categories\": [\"Category 1\", \"Category 2\"] }\n\n\
     Descriptions:\n{descriptions}".to_string()
}

fn default_classify_system_prompt() -> String {
    "You are a helpful assistant. Assign the most fitting category from the provided \
     list to the description. Categories: {categories}".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            vision: default_small_model(),
            cluster: default_cluster_model(),
            classify: default_small_model(),
        }
    }
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            cluster_attempts: default_cluster_attempts(),
            cluster_sample: default_cluster_sample(),
            describe_max_tokens: default_describe_max_tokens(),
            classify_max_tokens: default_classify_max_tokens(),
        }
    }
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            describe: default_describe_prompt(),
            cluster_system: default_cluster_system_prompt(),
            cluster_template: default_cluster_template(),
            classify_system: default_classify_system_prompt(),
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            max_dimension: None,
        }
    }
}

impl LimitConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| crate::ImagecatError::Config(format!("Failed to parse config: {}", e)))?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
