// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::config::Config;
use crate::console_progress::ConsoleProgress;
use parfor_core::{ExecutionMode, FailurePolicy, WorkDistributor, WorkerHandle};
use parfor_task_pool::TaskDistributor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Caller-owned results: a total behind the caller's own lock, plus one
/// slot per worker indexed by `WorkerHandle`.
pub struct Tally {
    pub counter: Mutex<usize>,
    pub per_worker: Vec<AtomicUsize>,
}

impl Tally {
    pub fn new(mode: ExecutionMode) -> Self {
        Self {
            counter: Mutex::new(0),
            per_worker: (0..mode.worker_count()).map(|_| AtomicUsize::new(0)).collect(),
        }
    }

    fn record(&self, worker: WorkerHandle) {
        if let Ok(mut counter) = self.counter.lock() {
            *counter += 1;
        }
        if let Some(slot) = self.per_worker.get(worker.index()) {
            slot.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn total(&self) -> usize {
        self.counter.lock().map(|counter| *counter).unwrap_or_default()
    }
}

fn simulated_work(work_ms: u64) -> Duration {
    let jitter = work_ms / 2;
    Duration::from_millis(fastrand::u64(work_ms - jitter..=work_ms.saturating_add(jitter)))
}

fn check_item(item: usize, fail_on: Option<usize>) -> Result<(), String> {
    if fail_on == Some(item) {
        return Err(format!("injected failure on item {}", item));
    }
    Ok(())
}

fn failure_policy(config: &Config) -> FailurePolicy {
    if config.fail_fast {
        FailurePolicy::FailFast
    } else {
        FailurePolicy::FailLate
    }
}

pub fn run_threads(config: &Config, mode: ExecutionMode, tally: &Tally) -> parfor_core::Result<()> {
    let items: Vec<usize> = (0..config.num_items).collect();
    let mut distributor = WorkDistributor::new(mode).with_failure_policy(failure_policy(config));
    if config.show_progress {
        distributor = distributor.with_progress(ConsoleProgress::new(items.len()));
    }

    let (work_ms, fail_on) = (config.work_ms, config.fail_on);
    distributor.run(&items, |worker, item| {
        thread::sleep(simulated_work(work_ms));
        check_item(*item, fail_on)?;
        tally.record(worker);
        Ok::<_, String>(())
    })
}

pub async fn run_tasks(
    config: &Config,
    mode: ExecutionMode,
    tally: Arc<Tally>,
) -> parfor_core::Result<()> {
    let items: Vec<usize> = (0..config.num_items).collect();
    let mut distributor = TaskDistributor::new(mode).with_failure_policy(failure_policy(config));
    if config.show_progress {
        distributor = distributor.with_progress(ConsoleProgress::new(items.len()));
    }

    let (work_ms, fail_on) = (config.work_ms, config.fail_on);
    distributor
        .run(items, move |worker, item| {
            let tally = Arc::clone(&tally);
            async move {
                tokio::time::sleep(simulated_work(work_ms)).await;
                check_item(item, fail_on)?;
                tally.record(worker);
                Ok::<_, String>(())
            }
        })
        .await
}
