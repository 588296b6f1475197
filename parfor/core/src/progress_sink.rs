// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

/// Receives one `advance` per claimed item and a single `finalize` once
/// every worker of the run has exited.
///
/// Calls are serialized by the run's cursor lock, so implementations need
/// no synchronization of their own. `advance` is invoked while that lock is
/// held and should return quickly.
pub trait ProgressSink: Send {
    /// One more item has been claimed.
    fn advance(&mut self);

    /// The run is over; no further `advance` follows.
    fn finalize(&mut self) {}
}

impl<S: ProgressSink + ?Sized> ProgressSink for &mut S {
    fn advance(&mut self) {
        (**self).advance();
    }

    fn finalize(&mut self) {
        (**self).finalize();
    }
}

impl<S: ProgressSink + ?Sized> ProgressSink for Box<S> {
    fn advance(&mut self) {
        (**self).advance();
    }

    fn finalize(&mut self) {
        (**self).finalize();
    }
}
