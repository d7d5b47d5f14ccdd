use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::IsTerminal;
use tracing::debug;

const TEMPLATE: &str = "  [{bar:40}] {pos}/{len} {msg}";

/// Progress of the version lookups. Drawn on stderr, and only when asked
/// for and attached to a terminal.
pub struct LookupProgress {
    bar: ProgressBar,
}

impl LookupProgress {
    pub fn new(total: usize, enabled: bool) -> Self {
        let bar = ProgressBar::new(total as u64);
        if !enabled || !std::io::stderr().is_terminal() {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }

        match ProgressStyle::default_bar().template(TEMPLATE) {
            Ok(style) => bar.set_style(style.progress_chars("=>-")),
            Err(e) => debug!(error = %e, "progress template rejected, using default style"),
        }

        Self { bar }
    }

    pub fn lookup_finished(&self, coordinate: &str) {
        self.bar.set_message(format!("Checked {coordinate}"));
        self.bar.inc(1);
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
