// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Pull-based parallel-for.
//!
//! Workers share a single cursor into the item slice and claim the next
//! index under one lock, then run the handler with the lock released.

mod worker_handle;
pub use worker_handle::WorkerHandle;

mod execution_mode;
pub use execution_mode::ExecutionMode;

mod parfor_error;
pub use parfor_error::{BoxError, ParforError, Result};

pub mod progress_sink;
pub use progress_sink::ProgressSink;

mod counting_progress;
pub use counting_progress::CountingProgress;

mod failure_policy;
pub use failure_policy::FailurePolicy;

pub mod failure_log;
pub use failure_log::{FailureCause, FailureLog, HandlerFailure};

pub mod work_cursor;
pub use work_cursor::WorkCursor;

mod work_distributor;
pub use work_distributor::WorkDistributor;

/// Runs `handler` over every item with no progress reporting and the
/// default failure policy.
pub fn parfor<T, F, E>(items: &[T], mode: ExecutionMode, handler: F) -> Result<()>
where
    T: Sync,
    F: Fn(WorkerHandle, &T) -> std::result::Result<(), E> + Sync,
    E: Into<BoxError>,
{
    WorkDistributor::new(mode).run(items, handler)
}
