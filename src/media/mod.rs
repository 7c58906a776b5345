mod artifact;
mod fetcher;
mod format;
mod types;
mod ytdlp;

pub use artifact::{check_size, resolve_artifact, SizeCheck};
pub use fetcher::{FetchRequest, Fetcher, ProgressSink};
pub use format::{FormatSelector, MediaKind};
pub use types::{MediaMetadata, ProgressEvent};
pub use ytdlp::YtDlpFetcher;
