//! Progress tracking for a conversion run
//!
//! Updated only from the orchestrating thread as worker results are drained,
//! so plain counters suffice. Log lines written while the bar is drawn go
//! through [`LogWriter`], which clears the bar around each write.

use std::io::{self, Write};
use std::sync::RwLock;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use crate::processing::ItemOutcome;

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({per_sec}, {eta})";

/// Bar currently drawn on stderr
static ACTIVE_BAR: RwLock<Option<ProgressBar>> = RwLock::new(None);

fn set_active_bar(bar: Option<ProgressBar>) {
    if let Ok(mut active) = ACTIVE_BAR.write() {
        *active = bar;
    }
}

fn active_bar() -> Option<ProgressBar> {
    ACTIVE_BAR.read().ok().and_then(|active| (*active).clone())
}

/// Stderr writer for log output that keeps the live progress bar intact
#[derive(Debug, Default, Clone, Copy)]
pub struct LogWriter;

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match active_bar() {
            Some(bar) => bar.suspend(|| io::stderr().write(buf)),
            None => io::stderr().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

/// Counts processed items and drives the optional progress bar
pub struct ConversionProgress {
    bar: ProgressBar,
    total: u64,
    converted: usize,
    failed: usize,
}

/// Final tally of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressTally {
    pub total: usize,
    pub converted: usize,
    pub failed: usize,
}

impl ConversionProgress {
    /// Start tracking `total` items; the bar is drawn only when `visible`
    pub fn new(total: u64, visible: bool) -> Self {
        let bar = if visible {
            let bar = ProgressBar::new(total);
            let style = ProgressStyle::default_bar()
                .template(BAR_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-");
            bar.set_style(style);
            bar.set_message("Processing images ...");
            set_active_bar(Some(bar.clone()));
            bar
        } else {
            ProgressBar::hidden()
        };

        Self {
            bar,
            total,
            converted: 0,
            failed: 0,
        }
    }

    /// Record one finished item
    pub fn record(&mut self, outcome: &ItemOutcome) {
        if outcome.is_converted() {
            self.converted += 1;
        } else {
            self.failed += 1;
        }
        self.bar.inc(1);

        debug!(
            "Progress {}/{} ({:.1}%): {}",
            self.processed(),
            self.total,
            self.completion_percentage(),
            outcome.source_path().display()
        );
    }

    /// Items finished so far, successful or not
    pub fn processed(&self) -> usize {
        self.converted + self.failed
    }

    /// Completion percentage
    pub fn completion_percentage(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.processed() as f64 / self.total as f64) * 100.0
    }

    /// Close the bar and return the counts
    pub fn finish(self) -> ProgressTally {
        set_active_bar(None);
        self.bar.finish_and_clear();

        ProgressTally {
            total: self.total as usize,
            converted: self.converted,
            failed: self.failed,
        }
    }
}
