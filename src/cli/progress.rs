//! Progress reporting for the terminal

use crate::services::{ConsoleProgressReporter, ProcessingStage, ProgressReporter, ProgressUpdate};
use crate::types::ProcessingTimings;
use indicatif::{ProgressBar, ProgressStyle};

/// Console reporter that also drives a batch progress bar
///
/// The bar advances once per finished input, successful or not. Log output is
/// printed above the bar.
pub(crate) struct CliProgressReporter {
    console: ConsoleProgressReporter,
    bar: Option<ProgressBar>,
}

impl CliProgressReporter {
    /// Create a reporter; a bar is only shown for more than one input
    pub(crate) fn new(verbose: bool, item_count: usize) -> Self {
        let bar = (item_count > 1).then(|| {
            let pb = ProgressBar::new(item_count as u64);
            if let Ok(style) = ProgressStyle::default_bar().template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
            ) {
                pb.set_style(style.progress_chars("#>-"));
            }
            pb
        });

        Self {
            console: ConsoleProgressReporter::new(verbose),
            bar,
        }
    }

    fn print<F: FnOnce()>(&self, f: F) {
        match &self.bar {
            Some(bar) => bar.suspend(f),
            None => f(),
        }
    }

    /// Finish the bar, leaving the final state on screen
    pub(crate) fn finish(&self, message: String) {
        if let Some(bar) = &self.bar {
            bar.finish_with_message(message);
        }
    }
}

impl ProgressReporter for CliProgressReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(bar) = &self.bar {
            bar.set_message(format!("{}: {}", update.item, update.description));
        }
        self.print(|| self.console.report_progress(update));
    }

    fn report_remote_log(&self, item: &str, message: &str) {
        self.print(|| self.console.report_remote_log(item, message));
    }

    fn report_completion(&self, item: &str, timings: ProcessingTimings) {
        self.print(|| self.console.report_completion(item, timings));
        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
    }

    fn report_error(&self, item: &str, stage: ProcessingStage, error: &str) {
        self.print(|| self.console.report_error(item, stage, error));
        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
    }
}
