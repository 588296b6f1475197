// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use indicatif::{ProgressBar, ProgressStyle};
use parfor_core::ProgressSink;

const BAR_TEMPLATE: &str = "{bar:40.cyan/blue} {pos}/{len} [{elapsed_precise}] eta {eta}";

/// Terminal progress bar fed by the distributor.
pub struct ConsoleProgress {
    bar: ProgressBar,
}

impl ConsoleProgress {
    pub fn new(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::with_template(BAR_TEMPLATE).unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Self { bar }
    }
}

impl ProgressSink for ConsoleProgress {
    fn advance(&mut self) {
        self.bar.inc(1);
    }

    fn finalize(&mut self) {
        self.bar.finish();
    }
}
