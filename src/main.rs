// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! imagecat: AI Image Categorization Pipeline
//!
//! Describe, cluster, classify and organize a directory of images.

use clap::{CommandFactory, Parser};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use imagecat::config::AppConfig;
use imagecat::openai::OpenAiClient;
use imagecat::{ImagecatError, Pipeline, Result, Step};

const DEFAULT_INPUT_DIR: &str = "data/input";

/// imagecat CLI - AI Image Categorization Pipeline
#[derive(Parser, Debug)]
#[command(name = "imagecat")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version = "1.0.0")]
#[command(about = "AI Image Categorization Pipeline", long_about = None)]
struct Cli {
    /// Path to the directory containing images
    input_dir: Option<PathBuf>,

    /// Run a specific step (1-4)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=4))]
    step: Option<u8>,

    /// Run all steps sequentially
    #[arg(long)]
    all: bool,

    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "imagecat.json")]
    config: PathBuf,

    /// Override the number of concurrent model requests
    #[arg(long)]
    concurrency: Option<usize>,

    /// Write the default configuration to this path and exit
    #[arg(long, value_name = "PATH")]
    write_config: Option<PathBuf>,

    /// Enable verbose logging (debug level)
    #[arg(short, long)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long)]
    trace: bool,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long)]
    quiet: bool,
}

/// What a parsed command line asks for
#[derive(Debug, PartialEq, Eq)]
enum Invocation {
    /// Input directory does not exist; exit with status 1
    Missing(PathBuf),
    /// No step selected
    Help,
    Run { input_dir: PathBuf, steps: Vec<Step> },
}

impl Cli {
    fn input_dir(&self) -> PathBuf {
        self.input_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_INPUT_DIR))
    }

    /// The input directory is checked before anything else, help included
    fn invocation(&self) -> Invocation {
        let input_dir = self.input_dir();
        if !input_dir.is_dir() {
            return Invocation::Missing(input_dir);
        }

        let steps = self.steps();
        if steps.is_empty() {
            Invocation::Help
        } else {
            Invocation::Run { input_dir, steps }
        }
    }

    /// Steps selected on the command line, in execution order
    fn steps(&self) -> Vec<Step> {
        if self.all {
            Step::ALL.to_vec()
        } else {
            self.step.and_then(Step::from_number).into_iter().collect()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if let Some(path) = &cli.write_config {
        AppConfig::default().save(path)?;
        println!("Generated config at {:?}", path);
        return Ok(());
    }

    if cli.input_dir.is_none() {
        warn!("No input directory specified, defaulting to '{}'", DEFAULT_INPUT_DIR);
    }

    let (input_dir, steps) = match cli.invocation() {
        Invocation::Missing(dir) => {
            eprintln!("Error: {}", ImagecatError::InputDirMissing(dir));
            std::process::exit(1);
        }
        Invocation::Help => {
            Cli::command().print_help()?;
            return Ok(());
        }
        Invocation::Run { input_dir, steps } => (input_dir, steps),
    };

    // Load configuration
    let mut config = AppConfig::load(&cli.config)?;
    if let Some(concurrency) = cli.concurrency {
        config.limits.concurrency = concurrency;
    }

    let client = OpenAiClient::from_config(&config.provider)?;
    info!("Using provider at {}", client.base_url());

    let pipeline = Pipeline::new(config, Arc::new(client), input_dir)?;
    for step in steps {
        pipeline.run(step).await?;
    }

    Ok(())
}
