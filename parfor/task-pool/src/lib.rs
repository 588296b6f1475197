// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Tokio task flavour of the pull-based parallel-for, for handlers that await.

mod task_distributor;
pub use task_distributor::TaskDistributor;

pub use parfor_core::{
    BoxError, CountingProgress, ExecutionMode, FailurePolicy, ParforError, ProgressSink, Result,
    WorkerHandle,
};
