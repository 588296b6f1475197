// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

mod config;
mod console_progress;
mod workload;

use clap::Parser;
use config::{Cli, Config, RuntimeKind};
use parfor_core::ExecutionMode;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use workload::Tally;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::resolve(&cli);
    let mode = ExecutionMode::from_worker_count(config.num_workers)?;

    println!("=== PARFOR DEMO ===");
    println!("Configuration:");
    println!("  - Items: {}", config.num_items);
    println!("  - Mode: {}", mode);
    println!("  - Runtime: {:?}", config.runtime);
    println!("  - Work per item: ~{} ms", config.work_ms);
    println!("  - Progress bar: {}", config.show_progress);
    if let Some(index) = config.fail_on {
        println!("  - Injected failure on item {}", index);
    }

    let start_time = Instant::now();
    let tally = Arc::new(Tally::new(mode));
    let outcome = match config.runtime {
        RuntimeKind::Threads => workload::run_threads(&config, mode, &tally),
        RuntimeKind::Tasks => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(workload::run_tasks(&config, mode, Arc::clone(&tally)))
        }
    };

    println!("\n=== RESULTS ===");
    println!("Counter: {} of {} items", tally.total(), config.num_items);
    for (worker, processed) in tally.per_worker.iter().enumerate() {
        println!("Worker {}: {} items", worker, processed.load(Ordering::Relaxed));
    }
    println!("Total time: {:.2}s", start_time.elapsed().as_secs_f64());

    outcome?;
    Ok(())
}
