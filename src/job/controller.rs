use super::{
    delivery::{DeliveryOutcome, DeliveryStrategy},
    error::JobError,
    progress::{downloading_text, FINISHED_TEXT, PROCESSING_TEXT, STARTING_TEXT, UPLOADING_TEXT},
    throttle::ProgressThrottler,
};
use crate::{
    bot::{ChatRef, MessageRef, Messenger},
    media::{
        check_size, resolve_artifact, FetchRequest, Fetcher, FormatSelector, MediaMetadata,
        ProgressEvent, SizeCheck,
    },
};
use anyhow::anyhow;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tempfile::TempDir;
use tokio::{sync::mpsc, time::Instant};
use tracing::{debug, error, info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Starting,
    Downloading,
    Processing,
    Uploading,
    Done,
    Failed,
}

impl JobStatus {
    fn rank(self) -> u8 {
        match self {
            JobStatus::Starting => 0,
            JobStatus::Downloading => 1,
            JobStatus::Processing => 2,
            JobStatus::Uploading => 3,
            JobStatus::Done => 4,
            JobStatus::Failed => 5,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }

    /// Forward moves only; `Failed` is reachable from any non-terminal state.
    pub fn can_advance_to(self, next: JobStatus) -> bool {
        !self.is_terminal() && (next == JobStatus::Failed || next.rank() > self.rank())
    }
}

/// One user-initiated download.
#[derive(Debug)]
pub struct Job {
    pub id: String,
    pub chat: ChatRef,
    /// The user's message, replied to by status and error messages.
    pub request_message: Option<MessageRef>,
    pub source_url: String,
    pub format: FormatSelector,
    status: JobStatus,
    progress_message: Option<MessageRef>,
    throttler: ProgressThrottler,
}

impl Job {
    pub fn new(
        id: impl Into<String>,
        chat: ChatRef,
        request_message: Option<MessageRef>,
        source_url: impl Into<String>,
        format: FormatSelector,
        min_interval: Duration,
    ) -> Self {
        Self {
            id: id.into(),
            chat,
            request_message,
            source_url: source_url.into(),
            format,
            status: JobStatus::Starting,
            progress_message: None,
            throttler: ProgressThrottler::new(min_interval),
        }
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    fn advance(&mut self, next: JobStatus) -> bool {
        if !self.status.can_advance_to(next) {
            warn!(job = %self.id, "Ignoring transition {:?} -> {:?}", self.status, next);
            return false;
        }
        debug!(job = %self.id, "{:?} -> {:?}", self.status, next);
        self.status = next;
        true
    }
}

/// Exclusively owned scratch directory, removed exactly once.
pub struct Workspace {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl Workspace {
    pub fn create(parent: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(parent)?;
        let dir = tempfile::Builder::new().prefix("dl_").tempdir_in(parent)?;
        let path = dir.path().to_path_buf();
        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the directory. Never fails; errors are logged. Later calls do nothing.
    pub fn teardown(&mut self) {
        if let Some(dir) = self.dir.take() {
            match dir.close() {
                Ok(()) => debug!("Removed workspace {}", self.path.display()),
                Err(e) => warn!("Failed to remove workspace {}: {}", self.path.display(), e),
            }
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[derive(Debug, Clone)]
pub struct JobSettings {
    pub min_interval: Duration,
    pub max_upload_bytes: u64,
    pub work_dir: PathBuf,
}

pub struct JobController {
    messenger: Arc<dyn Messenger>,
    fetcher: Arc<dyn Fetcher>,
    settings: JobSettings,
}

impl JobController {
    pub fn new(
        messenger: Arc<dyn Messenger>,
        fetcher: Arc<dyn Fetcher>,
        settings: JobSettings,
    ) -> Self {
        Self {
            messenger,
            fetcher,
            settings,
        }
    }

    pub fn settings(&self) -> &JobSettings {
        &self.settings
    }

    /// Drives `job` to `Done` or `Failed`. The workspace is gone when this returns.
    pub async fn run(&self, mut job: Job) -> JobStatus {
        info!(job = %job.id, "Starting job for {} ({})", job.source_url, job.format);

        let result = match Workspace::create(&self.settings.work_dir) {
            Ok(mut workspace) => {
                let result = self.execute(&mut job, &workspace).await;
                workspace.teardown();
                result
            }
            Err(e) => Err(JobError::Workspace(e)),
        };

        match result {
            Ok(()) => info!(job = %job.id, "Job finished"),
            Err(err) => {
                job.advance(JobStatus::Failed);
                match &err {
                    JobError::TooLarge { size, limit } => {
                        info!(job = %job.id, "Artifact too large: {} > {}", size, limit)
                    }
                    other => error!(job = %job.id, "Job failed: {}", other),
                }
                if let Err(e) = self
                    .messenger
                    .send_text(job.chat, job.request_message, &err.user_message())
                    .await
                {
                    error!(job = %job.id, "Failed to report error to user: {:#}", e);
                }
            }
        }

        job.status()
    }

    async fn execute(&self, job: &mut Job, workspace: &Workspace) -> Result<(), JobError> {
        if let Err(e) = self.messenger.indicate_typing(job.chat).await {
            debug!(job = %job.id, "Typing indicator failed: {:#}", e);
        }
        self.notify(job, STARTING_TEXT).await;
        job.advance(JobStatus::Downloading);

        let metadata = self.download(job, workspace).await?;

        if job.status() == JobStatus::Downloading {
            job.advance(JobStatus::Processing);
            self.notify(job, PROCESSING_TEXT).await;
        }

        let path = resolve_artifact(workspace.path(), job.format.allowed_extensions())?;
        let size = tokio::fs::metadata(&path).await?.len();
        info!(job = %job.id, "Resolved artifact {} ({} bytes)", path.display(), size);

        if let SizeCheck::TooLarge(size) = check_size(size, self.settings.max_upload_bytes) {
            return Err(JobError::TooLarge {
                size,
                limit: self.settings.max_upload_bytes,
            });
        }

        job.advance(JobStatus::Uploading);
        self.notify(job, UPLOADING_TEXT).await;

        let strategy = DeliveryStrategy::new(self.messenger.as_ref(), job.chat);
        match strategy
            .deliver(&path, job.format.kind(), &metadata, &job.source_url)
            .await
        {
            DeliveryOutcome::Primary => {}
            DeliveryOutcome::Fallback => info!(job = %job.id, "Delivered via document fallback"),
            DeliveryOutcome::Failed(e) => return Err(JobError::Delivery(e)),
        }

        job.advance(JobStatus::Done);
        self.notify(job, FINISHED_TEXT).await;
        Ok(())
    }

    /// Runs the fetcher on its own task and applies its progress events on this one.
    async fn download(&self, job: &mut Job, workspace: &Workspace) -> Result<MediaMetadata, JobError> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let fetcher = Arc::clone(&self.fetcher);
        let request = FetchRequest {
            url: job.source_url.clone(),
            workspace: workspace.path().to_path_buf(),
            format: job.format,
        };
        debug!(job = %job.id, "Fetching with {}", fetcher.name());

        let mut handle = tokio::spawn(async move { fetcher.fetch(&request, tx).await });

        let joined = loop {
            tokio::select! {
                Some(event) = rx.recv() => self.on_progress(job, event).await,
                joined = &mut handle => break joined,
            }
        };

        while let Ok(event) = rx.try_recv() {
            self.on_progress(job, event).await;
        }

        match joined {
            Ok(Ok(metadata)) => Ok(metadata),
            Ok(Err(e)) => Err(JobError::Fetch(e)),
            Err(e) => Err(JobError::Fetch(anyhow!("fetch task aborted: {e}"))),
        }
    }

    async fn on_progress(&self, job: &mut Job, event: ProgressEvent) {
        if job.status() != JobStatus::Downloading {
            trace!(job = %job.id, "Ignoring progress in {:?}: {:?}", job.status(), event);
            return;
        }

        match event {
            ProgressEvent::Downloading {
                downloaded_bytes,
                total_bytes,
                speed,
            } => {
                let now = Instant::now();
                if !job.throttler.allow(now) {
                    return;
                }
                let text = downloading_text(downloaded_bytes, total_bytes, speed);
                self.show(job, &text, now).await;
            }
            ProgressEvent::Finished => {
                job.advance(JobStatus::Processing);
                self.notify(job, PROCESSING_TEXT).await;
            }
        }
    }

    /// Shows `text` immediately, bypassing the throttle.
    async fn notify(&self, job: &mut Job, text: &str) {
        self.show(job, text, Instant::now()).await;
    }

    /// Puts `text` into the job's status message, creating it on first use.
    /// Only successful sends count towards the throttle.
    async fn show(&self, job: &mut Job, text: &str, now: Instant) {
        match job.progress_message {
            None => match self
                .messenger
                .send_text(job.chat, job.request_message, text)
                .await
            {
                Ok(message) => {
                    job.progress_message = Some(message);
                    job.throttler.record(now);
                }
                Err(e) => warn!(job = %job.id, "Failed to send status message: {:#}", e),
            },
            Some(message) => match self.messenger.edit_text(job.chat, message, text).await {
                Ok(()) => job.throttler.record(now),
                Err(e) => debug!(job = %job.id, "Status edit ignored: {:#}", e),
            },
        }
    }
}
