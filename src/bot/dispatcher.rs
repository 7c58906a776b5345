use super::messenger::{ChatRef, Choice, MessageRef, Messenger};
use crate::{
    job::{Job, JobController, JobStatus},
    media::FormatSelector,
};
use anyhow::Result;
use dashmap::DashMap;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)https?://\S+").expect("URL pattern is valid"));

pub const INVALID_INPUT_TEXT: &str = "Please send a valid video URL.";
pub const CHOOSE_FORMAT_TEXT: &str = "Choose a format:";
pub const EXPIRED_SELECTION_TEXT: &str =
    "This selection has expired. Please send the link again.";

/// First well-formed http(s) URL in `text`.
pub fn extract_url(text: &str) -> Option<String> {
    URL_RE
        .find_iter(text)
        .map(|m| m.as_str())
        .find(|candidate| url::Url::parse(candidate).is_ok())
        .map(str::to_string)
}

#[derive(Debug, Clone, Copy)]
pub struct DispatchOptions {
    /// Offer format buttons instead of starting right away.
    pub ask_format: bool,
    pub default_format: FormatSelector,
}

/// Turns inbound messages and button presses into jobs.
///
/// Each job runs on its own task. The only state shared between users is the
/// pending-selection map, where a newer URL simply replaces an older one.
pub struct Dispatcher {
    messenger: Arc<dyn Messenger>,
    controller: Arc<JobController>,
    options: DispatchOptions,
    pending: DashMap<u64, String>,
}

impl Dispatcher {
    pub fn new(
        messenger: Arc<dyn Messenger>,
        controller: Arc<JobController>,
        options: DispatchOptions,
    ) -> Self {
        Self {
            messenger,
            controller,
            options,
            pending: DashMap::new(),
        }
    }

    /// Handles a free-text message. Returns the spawned job, if one was started.
    pub async fn handle_text(
        &self,
        user: u64,
        chat: ChatRef,
        message: MessageRef,
        text: &str,
    ) -> Result<Option<JoinHandle<JobStatus>>> {
        let Some(url) = extract_url(text) else {
            debug!("No URL in message {:?} from user {}", message, user);
            self.messenger
                .send_text(chat, Some(message), INVALID_INPUT_TEXT)
                .await?;
            return Ok(None);
        };

        if !self.options.ask_format {
            return Ok(Some(self.spawn_job(
                chat,
                Some(message),
                url,
                self.options.default_format,
            )));
        }

        if let Some(previous) = self.pending.insert(user, url) {
            debug!("Replacing pending URL {} for user {}", previous, user);
        }

        let choices = FormatSelector::offered()
            .into_iter()
            .map(|selector| Choice {
                label: selector.label(),
                data: selector.to_callback_data(),
            })
            .collect::<Vec<_>>();
        self.messenger
            .send_choices(chat, Some(message), CHOOSE_FORMAT_TEXT, &choices)
            .await?;

        Ok(None)
    }

    /// Handles a format button press by starting a job for the user's pending URL.
    pub async fn handle_selection(
        &self,
        user: u64,
        chat: ChatRef,
        message: Option<MessageRef>,
        data: &str,
    ) -> Result<Option<JoinHandle<JobStatus>>> {
        let Some(format) = FormatSelector::from_callback_data(data) else {
            warn!("Unknown callback data from user {}: {}", user, data);
            return Ok(None);
        };

        match self.pending.remove(&user) {
            Some((_, url)) => Ok(Some(self.spawn_job(chat, message, url, format))),
            None => {
                self.messenger
                    .send_text(chat, message, EXPIRED_SELECTION_TEXT)
                    .await?;
                Ok(None)
            }
        }
    }

    #[cfg(test)]
    pub fn pending_url(&self, user: u64) -> Option<String> {
        self.pending.get(&user).map(|entry| entry.value().clone())
    }

    fn spawn_job(
        &self,
        chat: ChatRef,
        reply_to: Option<MessageRef>,
        url: String,
        format: FormatSelector,
    ) -> JoinHandle<JobStatus> {
        let id = format!("{}:{}", chat.0, reply_to.map(|m| m.0).unwrap_or_default());
        info!("Dispatching job {} for {}", id, url);

        let controller = Arc::clone(&self.controller);
        let job = Job::new(
            id,
            chat,
            reply_to,
            url,
            format,
            controller.settings().min_interval,
        );
        tokio::spawn(async move { controller.run(job).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        job::JobSettings,
        testing::{RecordingMessenger, ScriptedFetcher, Sent},
    };
    use std::time::Duration;

    struct Fixture {
        messenger: Arc<RecordingMessenger>,
        fetcher: Arc<ScriptedFetcher>,
        dispatcher: Arc<Dispatcher>,
        _work_dir: tempfile::TempDir,
    }

    fn fixture(ask_format: bool) -> Fixture {
        let work_dir = tempfile::tempdir().unwrap();
        let messenger = Arc::new(RecordingMessenger::new());
        let fetcher = Arc::new(ScriptedFetcher::new().produces("clip.mp4", 16));
        let controller = Arc::new(JobController::new(
            messenger.clone(),
            fetcher.clone(),
            JobSettings {
                min_interval: Duration::from_millis(2500),
                max_upload_bytes: 1_950_000_000,
                work_dir: work_dir.path().to_path_buf(),
            },
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            messenger.clone(),
            controller,
            DispatchOptions {
                ask_format,
                default_format: FormatSelector::Best,
            },
        ));
        Fixture {
            messenger,
            fetcher,
            dispatcher,
            _work_dir: work_dir,
        }
    }

    #[test]
    fn test_extract_url() {
        assert_eq!(
            extract_url("look https://youtu.be/abc and http://x.com/1"),
            Some("https://youtu.be/abc".to_string())
        );
        assert_eq!(
            extract_url("HTTPS://EXAMPLE.COM/Video"),
            Some("HTTPS://EXAMPLE.COM/Video".to_string())
        );
        assert_eq!(extract_url("no links here"), None);
        assert_eq!(extract_url("ftp://example.com/file"), None);
        assert_eq!(
            extract_url("https:// broken then https://ok.example/v"),
            Some("https://ok.example/v".to_string())
        );
    }

    #[tokio::test]
    async fn test_message_without_url_is_rejected() {
        let f = fixture(false);
        let job = f
            .dispatcher
            .handle_text(7, ChatRef(1), MessageRef(5), "hello there")
            .await
            .unwrap();

        assert!(job.is_none());
        assert_eq!(f.messenger.texts(), vec![INVALID_INPUT_TEXT.to_string()]);
        assert!(f.fetcher.requests().is_empty());
    }

    #[tokio::test]
    async fn test_url_starts_job_with_default_format() {
        let f = fixture(false);
        let job = f
            .dispatcher
            .handle_text(7, ChatRef(1), MessageRef(5), "get https://example.com/v/1 please")
            .await
            .unwrap()
            .expect("job spawned");

        assert_eq!(job.await.unwrap(), JobStatus::Done);
        let requests = f.fetcher.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, "https://example.com/v/1");
        assert_eq!(requests[0].format, FormatSelector::Best);
    }

    #[tokio::test]
    async fn test_format_selection_flow() {
        let f = fixture(true);
        let job = f
            .dispatcher
            .handle_text(7, ChatRef(1), MessageRef(5), "https://example.com/first")
            .await
            .unwrap();
        assert!(job.is_none());

        // A newer link replaces the pending one.
        f.dispatcher
            .handle_text(7, ChatRef(1), MessageRef(6), "https://example.com/second")
            .await
            .unwrap();
        assert_eq!(
            f.dispatcher.pending_url(7),
            Some("https://example.com/second".to_string())
        );

        let choices = f
            .messenger
            .sent()
            .into_iter()
            .filter(|s| matches!(s, Sent::Choices { .. }))
            .count();
        assert_eq!(choices, 2);

        let job = f
            .dispatcher
            .handle_selection(7, ChatRef(1), Some(MessageRef(101)), "fmt:720")
            .await
            .unwrap()
            .expect("job spawned");
        assert_eq!(job.await.unwrap(), JobStatus::Done);
        assert_eq!(f.dispatcher.pending_url(7), None);

        let requests = f.fetcher.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, "https://example.com/second");
        assert_eq!(requests[0].format, FormatSelector::MaxHeight(720));
    }

    #[tokio::test]
    async fn test_selection_without_pending_url() {
        let f = fixture(true);
        let job = f
            .dispatcher
            .handle_selection(9, ChatRef(1), None, "fmt:best")
            .await
            .unwrap();

        assert!(job.is_none());
        assert_eq!(
            f.messenger.texts(),
            vec![EXPIRED_SELECTION_TEXT.to_string()]
        );
    }

    #[tokio::test]
    async fn test_pending_urls_are_per_user() {
        let f = fixture(true);
        f.dispatcher
            .handle_text(1, ChatRef(1), MessageRef(1), "https://example.com/a")
            .await
            .unwrap();
        f.dispatcher
            .handle_text(2, ChatRef(2), MessageRef(1), "https://example.com/b")
            .await
            .unwrap();

        assert_eq!(f.dispatcher.pending_url(1).as_deref(), Some("https://example.com/a"));
        assert_eq!(f.dispatcher.pending_url(2).as_deref(), Some("https://example.com/b"));

        let unknown = f
            .dispatcher
            .handle_selection(1, ChatRef(1), None, "garbage")
            .await
            .unwrap();
        assert!(unknown.is_none());
        assert!(f.dispatcher.pending_url(1).is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_jobs_use_separate_workspaces() {
        let f = fixture(false);
        let mut handles = Vec::new();
        for user in 0..4u64 {
            let dispatcher = Arc::clone(&f.dispatcher);
            handles.push(tokio::spawn(async move {
                dispatcher
                    .handle_text(
                        user,
                        ChatRef(user as i64),
                        MessageRef(1),
                        &format!("https://example.com/{user}"),
                    )
                    .await
                    .unwrap()
                    .expect("job spawned")
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), JobStatus::Done);
        }

        let mut workspaces: Vec<_> = f
            .fetcher
            .requests()
            .into_iter()
            .map(|r| r.workspace)
            .collect();
        workspaces.sort();
        workspaces.dedup();
        assert_eq!(workspaces.len(), 4);
        assert!(workspaces.iter().all(|w| !w.exists()));
    }
}
