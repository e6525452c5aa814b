use indicatif::{ProgressBar, ProgressStyle};
use jsindex_indexer::ProgressListener;

/// Renders job progress on stderr. Hidden when stderr is not a terminal.
pub struct BarListener {
    bar: ProgressBar,
}

impl BarListener {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::with_template("{spinner} [{bar:30}] {percent:>3}% {msg}") {
            bar.set_style(style.progress_chars("=> "));
        }
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressListener for BarListener {
    fn progress(&self, done: u64, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(done);
    }

    fn task(&self, name: &str) {
        self.bar.set_message(name.to_string());
    }
}
