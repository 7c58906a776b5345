use super::{
    format::FormatSelector,
    types::{MediaMetadata, ProgressEvent},
};
use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::sync::mpsc::UnboundedSender;

/// File name template inside a workspace: title (capped at 80 chars), id, extension.
pub const OUTPUT_TEMPLATE: &str = "%(title).80s-%(id)s.%(ext)s";

pub type ProgressSink = UnboundedSender<ProgressEvent>;

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    /// Directory the fetcher must write its output into.
    pub workspace: PathBuf,
    pub format: FormatSelector,
}

impl FetchRequest {
    pub fn output_template(&self) -> PathBuf {
        self.workspace.join(OUTPUT_TEMPLATE)
    }
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Human-readable name of the fetcher
    fn name(&self) -> &'static str;

    /// Download the requested media into `request.workspace`, reporting progress on `progress`.
    ///
    /// Sending on `progress` never blocks; a closed receiver is not an error.
    async fn fetch(&self, request: &FetchRequest, progress: ProgressSink) -> Result<MediaMetadata>;

    /// Test if this fetcher is usable on the system
    async fn test_availability(&self) -> bool;
}
