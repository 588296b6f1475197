// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeKind {
    /// OS threads in a scoped pool
    Threads,
    /// Tokio tasks
    Tasks,
}

/// Runs a simulated workload through the parallel-for.
#[derive(Debug, Parser)]
#[command(name = "parfor-demo", version)]
pub struct Cli {
    /// JSON config file; flags below override its values
    #[arg(long, default_value = "config.json")]
    pub config: PathBuf,

    /// Number of items to process
    #[arg(long)]
    pub items: Option<usize>,

    /// Worker count; zero or negative runs sequentially on the main thread
    #[arg(long, allow_negative_numbers = true)]
    pub workers: Option<i64>,

    /// Mean simulated work per item, in milliseconds
    #[arg(long)]
    pub work_ms: Option<u64>,

    #[arg(long, value_enum)]
    pub runtime: Option<RuntimeKind>,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// Stop claiming items after the first failure
    #[arg(long)]
    pub fail_fast: bool,

    /// Make the handler fail on this item
    #[arg(long)]
    pub fail_on: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub num_items: usize,
    pub num_workers: i64,
    pub work_ms: u64,
    pub show_progress: bool,
    pub runtime: RuntimeKind,
    pub fail_fast: bool,
    #[serde(skip)]
    pub fail_on: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_items: 100,
            num_workers: 3,
            work_ms: 100,
            show_progress: true,
            runtime: RuntimeKind::Threads,
            fail_fast: false,
            fail_on: None,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        Ok(config)
    }

    /// File values (or defaults when the file cannot be read), then flags.
    pub fn resolve(cli: &Cli) -> Self {
        let mut config = match Config::load(&cli.config) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(
                    path = %cli.config.display(),
                    error = %e,
                    "using default configuration"
                );
                Config::default()
            }
        };

        if let Some(items) = cli.items {
            config.num_items = items;
        }
        if let Some(workers) = cli.workers {
            config.num_workers = workers;
        }
        if let Some(work_ms) = cli.work_ms {
            config.work_ms = work_ms;
        }
        if let Some(runtime) = cli.runtime {
            config.runtime = runtime;
        }
        if cli.no_progress {
            config.show_progress = false;
        }
        if cli.fail_fast {
            config.fail_fast = true;
        }
        config.fail_on = cli.fail_on;
        config
    }
}
