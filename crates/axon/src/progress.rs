use std::fmt::Write;

/// Width of the bar between the brackets.
pub const BAR_LENGTH: usize = 30;

/// Receiver for progress lines during batch iteration and validation.
pub trait ProgressSink {
    fn progress(&mut self, line: &str);
}

/// Forwards progress lines to the `log` facade at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn progress(&mut self, line: &str) {
        log::debug!("{line}");
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn progress(&mut self, _line: &str) {}
}

/// Render `"  n/N [=====>.....]"`.
///
/// The counter is right-aligned to the width of `total`; the bar ends in
/// `>` until `completed == total`.
pub fn progress_string(completed: usize, total: usize) -> String {
    let completed = completed.min(total);
    let steps = if total == 0 {
        BAR_LENGTH
    } else {
        (completed * BAR_LENGTH).div_ceil(total).min(BAR_LENGTH)
    };
    let filled = steps.max(1);
    let head = if completed == total { '=' } else { '>' };

    let width = total.to_string().len();
    let mut s = String::with_capacity(width * 2 + BAR_LENGTH + 4);
    let _ = write!(s, "{completed:>width$}/{total} [");
    s.push_str(&"=".repeat(filled - 1));
    s.push(head);
    s.push_str(&".".repeat(BAR_LENGTH - filled));
    s.push(']');
    s
}
