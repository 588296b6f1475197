// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use futures::FutureExt;
use parfor_core::failure_log::panic_message;
use parfor_core::{
    BoxError, ExecutionMode, FailureCause, FailureLog, FailurePolicy, HandlerFailure, ParforError,
    ProgressSink, Result, WorkCursor, WorkerHandle,
};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, debug_span, warn, Instrument};

/// Distributes items over a pool of tokio tasks.
///
/// Same claim-and-execute contract as `parfor_core::WorkDistributor`; the
/// handler returns a future. Concurrent workers spawn each invocation as its
/// own task so a panicking handler is caught without taking its worker down.
/// Sequential mode awaits every invocation inline on the calling task.
pub struct TaskDistributor {
    mode: ExecutionMode,
    failure_policy: FailurePolicy,
    progress: Option<Box<dyn ProgressSink>>,
}

impl TaskDistributor {
    pub fn new(mode: ExecutionMode) -> Self {
        Self {
            mode,
            failure_policy: FailurePolicy::default(),
            progress: None,
        }
    }

    pub fn with_progress(mut self, sink: impl ProgressSink + 'static) -> Self {
        self.progress = Some(Box::new(sink));
        self
    }

    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    /// Runs `handler` over `items` and resolves once every worker task has
    /// been joined. Errors follow the same precedence as the thread flavour.
    pub async fn run<T, F, Fut, E>(self, items: Vec<T>, handler: F) -> Result<()>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(WorkerHandle, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), E>> + Send + 'static,
        E: Into<BoxError> + Send + 'static,
    {
        let span = debug_span!("parfor_tasks", items = items.len(), mode = %self.mode);
        let pool = Arc::new(TaskPool {
            cursor: WorkCursor::new(items.len(), self.progress),
            items,
            failures: FailureLog::new(),
            failure_policy: self.failure_policy,
            inline: self.mode == ExecutionMode::Sequential,
            handler,
        });

        let outcome = match self.mode {
            ExecutionMode::Sequential => {
                let worker = WorkerHandle::new(0);
                let outcome = AssertUnwindSafe(pool.worker_loop(worker))
                    .catch_unwind()
                    .instrument(span.clone())
                    .await;
                match outcome {
                    Ok(_) => Ok(()),
                    Err(payload) => Err(lost_worker(worker, panic_message(payload.as_ref()))),
                }
            }
            ExecutionMode::Concurrent(workers) => {
                spawn_and_join(&pool, workers.get(), &span).await
            }
        };

        let claimed = pool.cursor.finalize();
        span.in_scope(|| debug!(claimed, failed = pool.failures.failed_items(), "run complete"));
        outcome?;
        pool.failures.take_result()
    }
}

async fn spawn_and_join<T, F, Fut, E>(
    pool: &Arc<TaskPool<T, F>>,
    workers: usize,
    span: &tracing::Span,
) -> Result<()>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(WorkerHandle, T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<(), E>> + Send + 'static,
    E: Into<BoxError> + Send + 'static,
{
    let mut tasks = JoinSet::new();
    for id in 0..workers {
        let worker = WorkerHandle::new(id);
        let pool = Arc::clone(pool);
        tasks.spawn(
            async move {
                let outcome = AssertUnwindSafe(pool.worker_loop(worker)).catch_unwind().await;
                (worker, outcome.map_err(|payload| panic_message(payload.as_ref())))
            }
            .instrument(span.clone()),
        );
    }

    let mut first_lost = None;
    while let Some(joined) = tasks.join_next().await {
        let lost = match joined {
            Ok((_, Ok(_))) => continue,
            Ok((worker, Err(message))) => lost_worker(worker, message),
            Err(error) => {
                let task = error.id().to_string();
                let message = join_error_message(error);
                warn!(%task, %message, "worker task stopped unexpectedly");
                ParforError::TaskLost { task, message }
            }
        };
        if pool.failure_policy == FailurePolicy::FailFast {
            pool.cursor.halt();
        }
        first_lost.get_or_insert(lost);
    }

    match first_lost {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

fn lost_worker(worker: WorkerHandle, message: String) -> ParforError {
    warn!(%worker, %message, "worker stopped outside its handler");
    ParforError::WorkerLost { worker, message }
}

fn join_error_message(error: JoinError) -> String {
    if error.is_panic() {
        panic_message(error.into_panic().as_ref())
    } else {
        error.to_string()
    }
}

struct TaskPool<T, F> {
    items: Vec<T>,
    cursor: WorkCursor<'static>,
    failures: FailureLog,
    failure_policy: FailurePolicy,
    inline: bool,
    handler: F,
}

impl<T, F, Fut, E> TaskPool<T, F>
where
    T: Clone,
    F: Fn(WorkerHandle, T) -> Fut,
    Fut: Future<Output = std::result::Result<(), E>> + Send + 'static,
    E: Into<BoxError> + Send + 'static,
{
    async fn worker_loop(&self, worker: WorkerHandle) -> usize {
        debug!(%worker, "worker started");
        let mut processed = 0;

        while let Some(index) = self.cursor.claim() {
            processed += 1;
            let invocation = (self.handler)(worker, self.items[index].clone());

            let cause = if self.inline {
                match AssertUnwindSafe(invocation).catch_unwind().await {
                    Ok(result) => result.err().map(|error| FailureCause::Error(error.into())),
                    Err(payload) => Some(FailureCause::Panic(panic_message(payload.as_ref()))),
                }
            } else {
                match tokio::spawn(invocation).await {
                    Ok(result) => result.err().map(|error| FailureCause::Error(error.into())),
                    Err(error) if error.is_panic() => Some(FailureCause::Panic(panic_message(
                        error.into_panic().as_ref(),
                    ))),
                    Err(error) => Some(FailureCause::Error(Box::new(error))),
                }
            };
            let Some(cause) = cause else {
                continue;
            };

            warn!(%worker, index, %cause, "handler failed");
            self.failures.record(HandlerFailure {
                worker,
                index,
                cause,
            });
            if self.failure_policy == FailurePolicy::FailFast {
                self.cursor.halt();
            }
        }

        debug!(%worker, processed, "worker finished");
        processed
    }
}
