// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::failure_log::panic_message;
use crate::{
    BoxError, ExecutionMode, FailureCause, FailureLog, FailurePolicy, HandlerFailure, ParforError,
    ProgressSink, Result, WorkCursor, WorkerHandle,
};
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use tracing::{debug, debug_span, warn, Span};

/// Distributes a slice of items over a fixed pool of workers.
///
/// Every worker runs the same loop: claim the next index from the shared
/// cursor, then call the handler on that item with the cursor lock released.
/// Workers pull work on demand, so slow items never hold up the rest.
///
/// ```
/// use parfor_core::{ExecutionMode, WorkDistributor};
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// let items: Vec<u32> = (0..100).collect();
/// let total = AtomicUsize::new(0);
/// WorkDistributor::new(ExecutionMode::concurrent(3).unwrap())
///     .run(&items, |_worker, item| {
///         total.fetch_add(*item as usize, Ordering::Relaxed);
///         Ok::<_, std::convert::Infallible>(())
///     })
///     .unwrap();
/// assert_eq!(total.into_inner(), 4950);
/// ```
pub struct WorkDistributor<'p> {
    mode: ExecutionMode,
    failure_policy: FailurePolicy,
    progress: Option<Box<dyn ProgressSink + 'p>>,
}

impl<'p> WorkDistributor<'p> {
    pub fn new(mode: ExecutionMode) -> Self {
        Self {
            mode,
            failure_policy: FailurePolicy::default(),
            progress: None,
        }
    }

    /// Advance `sink` once per claimed item and finalize it after the run.
    pub fn with_progress(mut self, sink: impl ProgressSink + 'p) -> Self {
        self.progress = Some(Box::new(sink));
        self
    }

    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    /// Calls `handler` exactly once per item (unless fail-fast stops the run
    /// early) and returns after every worker has exited.
    ///
    /// # Errors
    ///
    /// The first handler failure (error or panic) under either policy, or a
    /// worker that could not be spawned or died outside its handler. Worker
    /// errors take precedence over handler failures.
    pub fn run<T, F, E>(self, items: &[T], handler: F) -> Result<()>
    where
        T: Sync,
        F: Fn(WorkerHandle, &T) -> std::result::Result<(), E> + Sync,
        E: Into<BoxError>,
    {
        let span = debug_span!("parfor", items = items.len(), mode = %self.mode);
        let _entered = span.enter();

        let cursor = WorkCursor::new(items.len(), self.progress);
        let failures = FailureLog::new();
        let worker_loop = WorkerLoop {
            items,
            cursor: &cursor,
            failures: &failures,
            failure_policy: self.failure_policy,
            handler: &handler,
        };

        let outcome = match self.mode {
            ExecutionMode::Sequential => run_inline(&worker_loop),
            ExecutionMode::Concurrent(workers) => {
                run_threads(workers.get(), &worker_loop, &span)
            }
        };

        let claimed = cursor.finish();
        debug!(claimed, failed = failures.failed_items(), "run complete");
        outcome?;
        failures.into_result()
    }
}

/// Runs the loop on the caller's thread as worker 0. A panic outside the
/// handler is reported the same way a dead worker thread is.
fn run_inline<T, F, E>(worker_loop: &WorkerLoop<'_, '_, T, F>) -> Result<()>
where
    F: Fn(WorkerHandle, &T) -> std::result::Result<(), E>,
    E: Into<BoxError>,
{
    let worker = WorkerHandle::new(0);
    match panic::catch_unwind(AssertUnwindSafe(|| worker_loop.run(worker))) {
        Ok(_) => Ok(()),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!(%worker, %message, "worker stopped outside its handler");
            Err(ParforError::WorkerLost { worker, message })
        }
    }
}

/// Spawns the workers in a thread scope and joins all of them, even when a
/// later spawn fails.
fn run_threads<T, F, E>(
    workers: usize,
    worker_loop: &WorkerLoop<'_, '_, T, F>,
    span: &Span,
) -> Result<()>
where
    T: Sync,
    F: Fn(WorkerHandle, &T) -> std::result::Result<(), E> + Sync,
    E: Into<BoxError>,
{
    thread::scope(|scope| {
        let mut handles = Vec::with_capacity(workers);
        let mut worker_error = None;

        for id in 0..workers {
            let worker = WorkerHandle::new(id);
            let span = span.clone();
            let spawned = thread::Builder::new()
                .name(format!("parfor-worker-{}", id))
                .spawn_scoped(scope, move || {
                    let _entered = span.enter();
                    worker_loop.run(worker)
                });
            match spawned {
                Ok(handle) => handles.push((worker, handle)),
                Err(source) => {
                    warn!(%worker, error = %source, "failed to spawn worker");
                    worker_loop.cursor.halt();
                    worker_error = Some(ParforError::SpawnFailed { worker, source });
                    break;
                }
            }
        }

        for (worker, handle) in handles {
            if let Err(payload) = handle.join() {
                let message = panic_message(payload.as_ref());
                warn!(%worker, %message, "worker stopped outside its handler");
                worker_error.get_or_insert(ParforError::WorkerLost { worker, message });
            }
        }

        match worker_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    })
}

/// Everything one worker needs; shared by reference across the pool.
struct WorkerLoop<'a, 'p, T, F> {
    items: &'a [T],
    cursor: &'a WorkCursor<'p>,
    failures: &'a FailureLog,
    failure_policy: FailurePolicy,
    handler: &'a F,
}

impl<T, F, E> WorkerLoop<'_, '_, T, F>
where
    F: Fn(WorkerHandle, &T) -> std::result::Result<(), E>,
    E: Into<BoxError>,
{
    /// Claim-and-execute until the cursor is exhausted or halted. Returns
    /// the number of items this worker processed.
    fn run(&self, worker: WorkerHandle) -> usize {
        debug!(%worker, "worker started");
        let mut processed = 0;

        while let Some(index) = self.cursor.claim() {
            processed += 1;
            let item = &self.items[index];

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| (self.handler)(worker, item)));
            let cause = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(error)) => FailureCause::Error(error.into()),
                Err(payload) => FailureCause::Panic(panic_message(payload.as_ref())),
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
