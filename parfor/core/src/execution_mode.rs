// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::ParforError;
use std::fmt;
use std::num::NonZeroUsize;

/// How a run executes its claim-and-execute loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Spawn this many OS threads (or tasks), each running the loop.
    Concurrent(NonZeroUsize),
    /// Run the loop on the caller's own thread as worker 0.
    Sequential,
}

impl ExecutionMode {
    /// Concurrent mode with `workers` workers. Zero workers is rejected.
    pub fn concurrent(workers: usize) -> Result<Self, ParforError> {
        NonZeroUsize::new(workers)
            .map(Self::Concurrent)
            .ok_or_else(|| ParforError::InvalidConfiguration {
                message: "concurrent mode needs at least one worker".to_string(),
            })
    }

    /// Maps a signed worker count: positive counts spawn that many workers,
    /// zero or negative counts run sequentially.
    pub fn from_worker_count(workers: i64) -> Result<Self, ParforError> {
        if workers <= 0 {
            return Ok(Self::Sequential);
        }
        let workers =
            usize::try_from(workers).map_err(|_| ParforError::InvalidConfiguration {
                message: format!("worker count {} does not fit this platform", workers),
            })?;
        Self::concurrent(workers)
    }

    /// One worker per unit of available parallelism on this host.
    pub fn available_parallelism() -> Self {
        let workers = std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN);
        Self::Concurrent(workers)
    }

    /// Number of worker routines a run in this mode uses.
    pub fn worker_count(self) -> usize {
        match self {
            Self::Concurrent(workers) => workers.get(),
            Self::Sequential => 1,
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Concurrent(workers) => write!(f, "concurrent({})", workers),
            Self::Sequential => write!(f, "sequential"),
        }
    }
}
