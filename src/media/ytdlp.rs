use super::{
    fetcher::{FetchRequest, Fetcher, ProgressSink},
    types::{MediaMetadata, ProgressEvent},
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::Command,
};
use tracing::{debug, info, warn};

const PROGRESS_MARKER: &str = "reelbot-progress";

// Fields: status, downloaded, total, total estimate, speed. yt-dlp prints "NA" for unknown values.
const PROGRESS_TEMPLATE: &str = "download:reelbot-progress %(progress.status)s %(progress.downloaded_bytes)s %(progress.total_bytes)s %(progress.total_bytes_estimate)s %(progress.speed)s";

pub struct YtDlpFetcher {
    binary: String,
    retries: u32,
}

impl YtDlpFetcher {
    pub fn new(binary: impl Into<String>, retries: u32) -> Self {
        Self {
            binary: binary.into(),
            retries,
        }
    }

    fn build_command(&self, request: &FetchRequest) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .arg("--newline")
            .arg("--progress")
            .arg("--progress-template")
            .arg(PROGRESS_TEMPLATE)
            .arg("--dump-json")
            .arg("--no-simulate")
            .arg("--playlist-items")
            .arg("1")
            .arg("--retries")
            .arg(self.retries.to_string())
            .arg("--no-warnings")
            .arg("--output")
            .arg(request.output_template())
            .args(request.format.ytdlp_args())
            .arg("--")
            .arg(&request.url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

/// Parses one line printed through [`PROGRESS_TEMPLATE`].
pub fn parse_progress_line(line: &str) -> Option<ProgressEvent> {
    let mut fields = line.split_whitespace();
    if fields.next()? != PROGRESS_MARKER {
        return None;
    }

    let status = fields.next()?;
    let downloaded = fields.next().and_then(|v| v.parse::<f64>().ok());
    let total = fields.next().and_then(|v| v.parse::<f64>().ok());
    let estimate = fields.next().and_then(|v| v.parse::<f64>().ok());
    let speed = fields.next().and_then(|v| v.parse::<f64>().ok());

    match status {
        "downloading" => Some(ProgressEvent::Downloading {
            downloaded_bytes: downloaded.map(|b| b as u64).unwrap_or(0),
            total_bytes: total.or(estimate).map(|b| b as u64).filter(|b| *b > 0),
            speed,
        }),
        "finished" => Some(ProgressEvent::Finished),
        _ => None,
    }
}

/// Picks the most telling line out of yt-dlp's stderr for an error message.
fn summarize_stderr(lines: &[String]) -> String {
    lines
        .iter()
        .rev()
        .find(|line| line.starts_with("ERROR"))
        .or_else(|| lines.last())
        .map(|line| line.trim_start_matches("ERROR:").trim().to_string())
        .unwrap_or_else(|| "unknown error".to_string())
}

#[async_trait]
impl Fetcher for YtDlpFetcher {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn fetch(&self, request: &FetchRequest, progress: ProgressSink) -> Result<MediaMetadata> {
        info!(
            "Downloading with yt-dlp: {} (format {})",
            request.url, request.format
        );

        let mut child = self
            .build_command(request)
            .spawn()
            .with_context(|| format!("Failed to spawn {}", self.binary))?;

        let stdout = child.stdout.take().context("Failed to get yt-dlp stdout")?;
        let stderr = child.stderr.take().context("Failed to get yt-dlp stderr")?;

        let stdout_progress = progress.clone();
        let read_stdout = async move {
            let mut metadata = None;
            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines.next_line().await? {
                if let Some(event) = parse_progress_line(&line) {
                    let _ = stdout_progress.send(event);
                } else if line.starts_with('{') {
                    match serde_json::from_str::<Value>(&line) {
                        Ok(json) => metadata = Some(MediaMetadata::from_info_json(&json)),
                        Err(e) => debug!("Ignoring unparsable yt-dlp JSON line: {}", e),
                    }
                } else {
                    debug!("yt-dlp: {}", line);
                }
            }
            Ok::<_, std::io::Error>(metadata)
        };

        let read_stderr = async move {
            let mut collected = Vec::new();
            let mut lines = BufReader::new(stderr).lines();
            while let Some(line) = lines.next_line().await? {
                if let Some(event) = parse_progress_line(&line) {
                    let _ = progress.send(event);
                } else if !line.trim().is_empty() {
                    debug!("yt-dlp stderr: {}", line);
                    collected.push(line);
                }
            }
            Ok::<_, std::io::Error>(collected)
        };

        let (metadata, stderr_lines) = tokio::join!(read_stdout, read_stderr);
        let metadata = metadata.context("Failed to read yt-dlp output")?;
        let stderr_lines = stderr_lines.context("Failed to read yt-dlp stderr")?;

        let status = child.wait().await.context("Failed to wait for yt-dlp")?;
        if !status.success() {
            return Err(anyhow::anyhow!(
                "yt-dlp exited with {}: {}",
                status,
                summarize_stderr(&stderr_lines)
            ));
        }

        Ok(metadata.unwrap_or_else(|| {
            warn!("yt-dlp produced no metadata for {}", request.url);
            MediaMetadata::default()
        }))
    }

    async fn test_availability(&self) -> bool {
        let ytdlp_available = match Command::new(&self.binary).arg("--version").output().await {
            Ok(output) => {
                if output.status.success() {
                    let version = String::from_utf8_lossy(&output.stdout);
                    info!("✅ yt-dlp is available, version: {}", version.trim());
                    true
                } else {
                    warn!("❌ yt-dlp command failed");
                    false
                }
            }
            Err(e) => {
                warn!("❌ yt-dlp not found at {}: {}", self.binary, e);
                false
            }
        };

        // Merging and conversion need ffmpeg
        let ffmpeg_available = match Command::new("ffmpeg").arg("-version").output().await {
            Ok(output) if output.status.success() => {
                let version_line = String::from_utf8_lossy(&output.stdout)
                    .lines()
                    .next()
                    .unwrap_or("unknown")
                    .to_string();
                info!("✅ ffmpeg is available: {}", version_line);
                true
            }
            Ok(_) => {
                warn!("❌ ffmpeg command failed");
                false
            }
            Err(e) => {
                warn!("❌ ffmpeg not found: {} (required for merging and conversion)", e);
                false
            }
        };

        if ytdlp_available && !ffmpeg_available {
            warn!("⚠️  yt-dlp will work but merged formats and conversion will fail");
        }

        ytdlp_available
    }
}
