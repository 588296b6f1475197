// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Error types for parfor runs.

use crate::WorkerHandle;
use thiserror::Error;

/// Error type handlers may return; anything convertible into it is accepted.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for parfor operations.
pub type Result<T> = std::result::Result<T, ParforError>;

/// Errors surfaced to the caller of a run.
#[derive(Debug, Error)]
pub enum ParforError {
    /// Rejected before any worker was spawned.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// A handler returned an error. `failed_items` counts every failure of the run.
    #[error("handler failed on item {index} in worker {worker} ({failed_items} failed): {source}")]
    HandlerFailed {
        worker: WorkerHandle,
        index: usize,
        source: BoxError,
        failed_items: usize,
    },

    /// A handler panicked. `failed_items` counts every failure of the run.
    #[error("handler panicked on item {index} in worker {worker} ({failed_items} failed): {message}")]
    HandlerPanicked {
        worker: WorkerHandle,
        index: usize,
        message: String,
        failed_items: usize,
    },

    /// The OS refused to start a worker thread.
    #[error("failed to spawn worker {worker}: {source}")]
    SpawnFailed {
        worker: WorkerHandle,
        source: std::io::Error,
    },

    /// A worker routine ended abnormally outside of a handler call.
    #[error("worker {worker} stopped unexpectedly: {message}")]
    WorkerLost {
        worker: WorkerHandle,
        message: String,
    },

    /// A pool task ended before reporting which worker it ran, e.g. because
    /// its runtime shut down.
    #[error("task {task} stopped unexpectedly: {message}")]
    TaskLost { task: String, message: String },
}

impl ParforError {
    /// Index of the failing item, for handler failures.
    pub fn item_index(&self) -> Option<usize> {
        match self {
            Self::HandlerFailed { index, .. } | Self::HandlerPanicked { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// Total number of items whose handler failed, for handler failures.
    pub fn failed_items(&self) -> Option<usize> {
        match self {
            Self::HandlerFailed { failed_items, .. }
            | Self::HandlerPanicked { failed_items, .. } => Some(*failed_items),
            _ => None,
        }
    }
}
