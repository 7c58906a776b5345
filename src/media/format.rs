use std::{fmt, str::FromStr};

use anyhow::anyhow;

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm", "mov"];
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a", "opus", "ogg"];

const CALLBACK_PREFIX: &str = "fmt:";

/// Heights offered on the selection keyboard next to "best" and "audio".
pub const OFFERED_HEIGHTS: &[u32] = &[1080, 720, 480];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
}

/// Quality/container policy handed to the fetcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatSelector {
    /// Best video and audio merged into mp4.
    #[default]
    Best,
    /// Audio track only, transcoded to mp3.
    AudioOnly,
    /// Best video no taller than the given height, merged into mp4.
    MaxHeight(u32),
}

impl FormatSelector {
    pub fn kind(&self) -> MediaKind {
        match self {
            FormatSelector::AudioOnly => MediaKind::Audio,
            FormatSelector::Best | FormatSelector::MaxHeight(_) => MediaKind::Video,
        }
    }

    /// Extensions a finished artifact may carry for this selector.
    pub fn allowed_extensions(&self) -> &'static [&'static str] {
        match self.kind() {
            MediaKind::Video => VIDEO_EXTENSIONS,
            MediaKind::Audio => AUDIO_EXTENSIONS,
        }
    }

    /// yt-dlp arguments implementing this selector.
    pub fn ytdlp_args(&self) -> Vec<String> {
        let args: Vec<&str> = match self {
            FormatSelector::Best => vec![
                "--format",
                "bv*+ba/b",
                "--merge-output-format",
                "mp4",
                "--recode-video",
                "mp4",
            ],
            FormatSelector::AudioOnly => vec![
                "--format",
                "ba/b",
                "--extract-audio",
                "--audio-format",
                "mp3",
                "--audio-quality",
                "0",
            ],
            FormatSelector::MaxHeight(height) => {
                return vec![
                    "--format".to_string(),
                    format!("bv*[height<={height}]+ba/b[height<={height}]"),
                    "--merge-output-format".to_string(),
                    "mp4".to_string(),
                    "--recode-video".to_string(),
                    "mp4".to_string(),
                ];
            }
        };
        args.into_iter().map(String::from).collect()
    }

    pub fn label(&self) -> String {
        match self {
            FormatSelector::Best => "🎬 Best".to_string(),
            FormatSelector::AudioOnly => "🎵 Audio".to_string(),
            FormatSelector::MaxHeight(height) => format!("📺 {height}p"),
        }
    }

    pub fn to_callback_data(self) -> String {
        format!("{CALLBACK_PREFIX}{self}")
    }

    pub fn from_callback_data(data: &str) -> Option<Self> {
        data.strip_prefix(CALLBACK_PREFIX)?.parse().ok()
    }

    /// Every selector offered on the selection keyboard, in display order.
    pub fn offered() -> Vec<Self> {
        let mut selectors = vec![FormatSelector::Best];
        selectors.extend(OFFERED_HEIGHTS.iter().map(|h| FormatSelector::MaxHeight(*h)));
        selectors.push(FormatSelector::AudioOnly);
        selectors
    }
}

impl fmt::Display for FormatSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatSelector::Best => write!(f, "best"),
            FormatSelector::AudioOnly => write!(f, "audio"),
            FormatSelector::MaxHeight(height) => write!(f, "{height}"),
        }
    }
}

impl FromStr for FormatSelector {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "best" => Ok(FormatSelector::Best),
            "audio" => Ok(FormatSelector::AudioOnly),
            other => other
                .trim_end_matches('p')
                .parse::<u32>()
                .ok()
                .filter(|height| *height > 0)
                .map(FormatSelector::MaxHeight)
                .ok_or_else(|| anyhow!("Unknown format selector: {s}")),
        }
    }
}
