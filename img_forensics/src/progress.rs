//! indicatif progress reporting for single-file and batch runs.

use forensic_core::{ProgressSink, Stage};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

pub const STAGE_TEMPLATE: &str = "{spinner:.cyan} {prefix:.bold} [{bar:30.cyan/blue}] {pos}/{len} {msg}";
pub const BATCH_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.green/white}] {pos}/{len} files ({eta}) {msg}";
pub const PROGRESS_CHARS: &str = "█▓░";

fn styled(total: u64, template: &str, visible: bool) -> ProgressBar {
    let pb = ProgressBar::new(total);
    if !visible {
        pb.set_draw_target(ProgressDrawTarget::hidden());
        return pb;
    }
    let style = ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars(PROGRESS_CHARS);
    pb.set_style(style);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// One tick per pipeline stage of a single file.
pub struct StageProgress {
    bar: ProgressBar,
}

impl StageProgress {
    pub fn new(file_name: &str, visible: bool) -> Self {
        let bar = styled(Stage::ALL.len() as u64, STAGE_TEMPLATE, visible);
        bar.set_prefix(file_name.to_string());
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressSink for StageProgress {
    fn stage_started(&self, stage: Stage) {
        self.bar.set_message(format!("{} checks", stage));
    }

    fn stage_finished(&self, stage: Stage, emitted: usize) {
        tracing::trace!(stage = %stage, emitted, "stage done");
        self.bar.inc(1);
    }
}

/// Files-processed bar for folder runs.
pub fn batch_bar(total: u64, visible: bool) -> ProgressBar {
    let bar = styled(total, BATCH_TEMPLATE, visible);
    bar.set_message("analyzing");
    bar
}
