// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::ProgressSink;

/// Progress sink that only counts.
///
/// Pass it by `&mut` to keep ownership and read the totals after the run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CountingProgress {
    advances: u64,
    advances_after_finalize: u64,
    finalized: bool,
}

impl CountingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advances(&self) -> u64 {
        self.advances
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Advances that arrived after `finalize`; always zero for a correct run.
    pub fn advances_after_finalize(&self) -> u64 {
        self.advances_after_finalize
    }
}

impl ProgressSink for CountingProgress {
    fn advance(&mut self) {
        self.advances += 1;
        if self.finalized {
            self.advances_after_finalize += 1;
        }
    }

    fn finalize(&mut self) {
        self.finalized = true;
    }
}
