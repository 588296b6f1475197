// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

/// What a run does after a handler fails on an item.
///
/// Failed items are never retried under either policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Keep processing every remaining item, then report the first failure
    /// after all workers have been joined.
    #[default]
    FailLate,
    /// Stop handing out items at the first failure. Workers finish the item
    /// they are on, exit, and the first failure is reported.
    FailFast,
}
