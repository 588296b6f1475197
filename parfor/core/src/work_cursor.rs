// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! The shared claim point of a run.

use crate::ProgressSink;
use std::sync::{Mutex, MutexGuard, PoisonError};

struct CursorState<'p> {
    next: usize,
    len: usize,
    halted: bool,
    sink: Option<Box<dyn ProgressSink + 'p>>,
}

/// Single cursor into a sequence of `len` items, guarded by one lock.
///
/// Each index in `0..len` is handed out by [`claim`](Self::claim) at most
/// once, in ascending order. The optional progress sink advances under the
/// same lock, so advances never race each other and always precede the
/// handler call for the claimed item.
pub struct WorkCursor<'p> {
    state: Mutex<CursorState<'p>>,
}

impl<'p> WorkCursor<'p> {
    pub fn new(len: usize, sink: Option<Box<dyn ProgressSink + 'p>>) -> Self {
        Self {
            state: Mutex::new(CursorState {
                next: 0,
                len,
                halted: false,
                sink,
            }),
        }
    }

    // A panic inside a sink leaves the state consistent, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, CursorState<'p>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claims the next index, or `None` once the sequence is exhausted or
    /// the cursor was halted.
    pub fn claim(&self) -> Option<usize> {
        let mut state = self.lock();
        if state.halted || state.next >= state.len {
            return None;
        }
        let index = state.next;
        state.next += 1;
        if let Some(sink) = state.sink.as_mut() {
            sink.advance();
        }
        Some(index)
    }

    /// Stops handing out indices. Already claimed items are unaffected.
    pub fn halt(&self) {
        self.lock().halted = true;
    }

    pub fn is_halted(&self) -> bool {
        self.lock().halted
    }

    /// Number of indices claimed so far.
    pub fn claimed(&self) -> usize {
        self.lock().next
    }

    pub fn len(&self) -> usize {
        self.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Halts the cursor and finalizes the progress sink, returning the number
    /// of claimed indices. The sink is dropped from the cursor here, so no
    /// advance can follow its finalization. Call it once every worker exited.
    pub fn finalize(&self) -> usize {
        let mut state = self.lock();
        state.halted = true;
        if let Some(mut sink) = state.sink.take() {
            sink.finalize();
        }
        state.next
    }

    /// Consuming form of [`finalize`](Self::finalize) for callers that own the cursor.
    pub fn finish(self) -> usize {
        self.finalize()
    }
}
