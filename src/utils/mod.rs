const MB: f64 = 1_000_000.0;
const GB: f64 = 1_000_000_000.0;

/// Formats a byte count in megabytes with one decimal, e.g. `12.3 MB`.
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.1} MB", bytes as f64 / MB)
}

/// Formats a byte count in gigabytes with two decimals, e.g. `1.95 GB`.
pub fn format_gigabytes(bytes: u64) -> String {
    format!("{:.2} GB", bytes as f64 / GB)
}

/// Formats a transfer rate given in bytes per second.
pub fn format_rate(bytes_per_sec: f64) -> String {
    let rate = if bytes_per_sec.is_finite() && bytes_per_sec > 0.0 {
        bytes_per_sec
    } else {
        0.0
    };
    format!("{:.1} MB/s", rate / MB)
}

/// Cuts `text` down to at most `max_chars` characters, marking the cut with an ellipsis.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let mut result: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    result.push('…');
    result
}
