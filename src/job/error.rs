use super::progress::too_large_text;
use std::path::PathBuf;
use thiserror::Error;

/// Everything that can end a job early.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("workspace error: {0}")]
    Workspace(#[from] std::io::Error),

    #[error("download failed: {0:#}")]
    Fetch(anyhow::Error),

    #[error("no media file was produced in {}", .workspace.display())]
    ArtifactNotFound { workspace: PathBuf },

    #[error("file is {size} bytes, over the {limit} byte upload limit")]
    TooLarge { size: u64, limit: u64 },

    #[error("delivery failed: {0:#}")]
    Delivery(anyhow::Error),
}

impl JobError {
    /// The single message shown to the user when the job ends with this error.
    pub fn user_message(&self) -> String {
        match self {
            JobError::TooLarge { size, .. } => too_large_text(*size),
            other => format!("❌ Error: {other}"),
        }
    }
}
