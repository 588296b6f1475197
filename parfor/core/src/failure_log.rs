// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Collects handler failures across workers.

use crate::{BoxError, ParforError, WorkerHandle};
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// Why a handler invocation failed.
#[derive(Debug)]
pub enum FailureCause {
    Error(BoxError),
    Panic(String),
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::Error(error) => write!(f, "{}", error),
            FailureCause::Panic(message) => write!(f, "panic: {}", message),
        }
    }
}

/// One failed handler invocation.
#[derive(Debug)]
pub struct HandlerFailure {
    pub worker: WorkerHandle,
    pub index: usize,
    pub cause: FailureCause,
}

impl HandlerFailure {
    pub fn into_error(self, failed_items: usize) -> ParforError {
        let HandlerFailure {
            worker,
            index,
            cause,
        } = self;
        match cause {
            FailureCause::Error(source) => ParforError::HandlerFailed {
                worker,
                index,
                source,
                failed_items,
            },
            FailureCause::Panic(message) => ParforError::HandlerPanicked {
                worker,
                index,
                message,
                failed_items,
            },
        }
    }
}

/// Keeps the first failure recorded during a run plus a running count.
#[derive(Debug, Default)]
pub struct FailureLog {
    first: Mutex<Option<HandlerFailure>>,
    count: AtomicUsize,
}

impl FailureLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failure; only the first one is kept in full.
    pub fn record(&self, failure: HandlerFailure) {
        let mut first = self.first.lock().unwrap_or_else(PoisonError::into_inner);
        if first.is_none() {
            *first = Some(failure);
        }
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    pub fn failed_items(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// `Ok` when nothing failed, otherwise takes the first failure out of the log.
    pub fn take_result(&self) -> Result<(), ParforError> {
        let first = self
            .first
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match first {
            Some(failure) => Err(failure.into_error(self.failed_items())),
            None => Ok(()),
        }
    }

    pub fn into_result(self) -> Result<(), ParforError> {
        self.take_result()
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
