/// Display value of a cleared stopwatch.
pub const ZERO_DISPLAY: &str = "00:00:00";

/// Formats elapsed milliseconds as `MM:SS:HH` (minutes, seconds, hundredths).
///
/// Minutes wrap past 99 so the string always stays eight characters wide.
pub fn format_elapsed(elapsed_millis: u64) -> String {
    let minutes = (elapsed_millis / 60_000) % 100;
    let seconds = (elapsed_millis / 1_000) % 60;
    let hundredths = (elapsed_millis % 1_000) / 10;
    format!("{:02}:{:02}:{:02}", minutes, seconds, hundredths)
}
