use crate::utils::{format_gigabytes, format_megabytes, format_rate};

pub const STARTING_TEXT: &str = "⏳ Starting download...";
pub const PROCESSING_TEXT: &str = "✅ Download complete. Processing...";
pub const UPLOADING_TEXT: &str = "📤 Uploading...";
pub const FINISHED_TEXT: &str = "🎉 Finished!";

/// Share of `total` already downloaded, in percent. Unknown or zero totals give 0.
pub fn percentage(downloaded: u64, total: Option<u64>) -> f64 {
    match total {
        Some(total) if total > 0 => (downloaded as f64 / total as f64 * 100.0).min(100.0),
        _ => 0.0,
    }
}

pub fn downloading_text(downloaded: u64, total: Option<u64>, speed: Option<f64>) -> String {
    format!(
        "⬇️ Downloading... {:.1}%\n{} / {}\n{}",
        percentage(downloaded, total),
        format_megabytes(downloaded).trim_end_matches(" MB"),
        format_megabytes(total.unwrap_or(0)),
        format_rate(speed.unwrap_or(0.0)),
    )
}

pub fn too_large_text(size_bytes: u64) -> String {
    format!(
        "❌ File is too large (≈ {}). Try a shorter video or pick a lower quality.",
        format_gigabytes(size_bytes)
    )
}
