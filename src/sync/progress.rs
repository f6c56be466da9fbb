use indicatif::{ProgressBar, ProgressStyle};

use crate::git::Notifier;

/// Spinner style used during ongoing operations.
/// - Yellow spinner with animated braille-style frames.
/// - Displays the current message (`{wide_msg}`) next to the spinner.
pub fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("\x1b[33m{spinner}\x1b[0m {wide_msg}")
        .unwrap()
        .tick_strings(&["⣾", "⣽", "⣻", "⢿", "⡿", "⣟", "⣯", "⣷"])
}

/// Style used when an operation finishes successfully.
pub fn ok_style() -> ProgressStyle {
    ProgressStyle::with_template("\x1b[32m✔\x1b[0m {wide_msg}").unwrap()
}

/// Style used when an operation finishes without applying anything.
pub fn warn_style() -> ProgressStyle {
    ProgressStyle::with_template("\x1b[33m!\x1b[0m {wide_msg}").unwrap()
}

/// Style used when an operation fails with an error.
pub fn err_style() -> ProgressStyle {
    ProgressStyle::with_template("\x1b[31m✘\x1b[0m {wide_msg}").unwrap()
}

/// Prints engine diagnostics above a repository's spinner line.
pub struct ProgressNotifier {
    pub display: String,
    pub pb: ProgressBar,
}

impl Notifier for ProgressNotifier {
    fn notify(&self, message: &str) {
        for line in message.lines() {
            self.pb.println(format!("{}: {}", self.display, line));
        }
    }
}
