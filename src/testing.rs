//! In-memory stand-ins for the chat platform and the fetcher.

use crate::{
    bot::{ChatRef, Choice, MessageRef, Messenger},
    media::{FetchRequest, Fetcher, MediaMetadata, ProgressEvent, ProgressSink},
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text { id: MessageRef, text: String },
    Edit { id: MessageRef, text: String },
    Video { file: PathBuf, caption: String },
    Audio { file: PathBuf, caption: String },
    Document { file: PathBuf, caption: String },
    Choices { id: MessageRef, text: String, choices: Vec<Choice> },
}

#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<Sent>>,
    next_id: AtomicUsize,
    typing: AtomicUsize,
    media_attempts: AtomicUsize,
    document_attempts: AtomicUsize,
    fail_media: AtomicBool,
    fail_documents: AtomicBool,
    fail_edits: AtomicBool,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_media_sends(&self) {
        self.fail_media.store(true, Ordering::SeqCst);
    }

    pub fn fail_document_sends(&self) {
        self.fail_documents.store(true, Ordering::SeqCst);
    }

    pub fn fail_edits(&self) {
        self.fail_edits.store(true, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn edits(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Edit { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn typing_count(&self) -> usize {
        self.typing.load(Ordering::SeqCst)
    }

    pub fn media_attempts(&self) -> usize {
        self.media_attempts.load(Ordering::SeqCst)
    }

    pub fn document_attempts(&self) -> usize {
        self.document_attempts.load(Ordering::SeqCst)
    }

    fn push(&self, sent: Sent) {
        self.sent.lock().unwrap().push(sent);
    }

    fn next_id(&self) -> MessageRef {
        MessageRef(self.next_id.fetch_add(1, Ordering::SeqCst) as i32 + 100)
    }

    fn media_send(&self, sent: Sent) -> Result<()> {
        self.media_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_media.load(Ordering::SeqCst) {
            return Err(anyhow!("Bad Request: wrong file type"));
        }
        self.push(sent);
        Ok(())
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(
        &self,
        _chat: ChatRef,
        _reply_to: Option<MessageRef>,
        text: &str,
    ) -> Result<MessageRef> {
        let id = self.next_id();
        self.push(Sent::Text {
            id,
            text: text.to_string(),
        });
        Ok(id)
    }

    async fn edit_text(&self, _chat: ChatRef, message: MessageRef, text: &str) -> Result<()> {
        if self.fail_edits.load(Ordering::SeqCst) {
            return Err(anyhow!("Bad Request: message to edit not found"));
        }
        self.push(Sent::Edit {
            id: message,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_video(&self, _chat: ChatRef, file: &Path, caption: &str) -> Result<()> {
        self.media_send(Sent::Video {
            file: file.to_path_buf(),
            caption: caption.to_string(),
        })
    }

    async fn send_audio(&self, _chat: ChatRef, file: &Path, caption: &str) -> Result<()> {
        self.media_send(Sent::Audio {
            file: file.to_path_buf(),
            caption: caption.to_string(),
        })
    }

    async fn send_document(&self, _chat: ChatRef, file: &Path, caption: &str) -> Result<()> {
        self.document_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_documents.load(Ordering::SeqCst) {
            return Err(anyhow!("Request Entity Too Large"));
        }
        self.push(Sent::Document {
            file: file.to_path_buf(),
            caption: caption.to_string(),
        });
        Ok(())
    }

    async fn indicate_typing(&self, _chat: ChatRef) -> Result<()> {
        self.typing.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn send_choices(
        &self,
        _chat: ChatRef,
        _reply_to: Option<MessageRef>,
        text: &str,
        choices: &[Choice],
    ) -> Result<MessageRef> {
        let id = self.next_id();
        self.push(Sent::Choices {
            id,
            text: text.to_string(),
            choices: choices.to_vec(),
        });
        Ok(id)
    }
}

/// Plays back a fixed sequence of progress events, then writes files into the workspace.
pub struct ScriptedFetcher {
    events: Vec<(Duration, ProgressEvent)>,
    files: Vec<(String, usize)>,
    failure: Option<String>,
    seen: Mutex<Vec<FetchRequest>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            files: Vec::new(),
            failure: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Emits `event` after waiting `delay`.
    pub fn event(mut self, delay: Duration, event: ProgressEvent) -> Self {
        self.events.push((delay, event));
        self
    }

    /// Writes `name` with `len` bytes once the events are played.
    pub fn produces(mut self, name: &str, len: usize) -> Self {
        self.files.push((name.to_string(), len));
        self
    }

    pub fn fails_with(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn fetch(&self, request: &FetchRequest, progress: ProgressSink) -> Result<MediaMetadata> {
        self.seen.lock().unwrap().push(request.clone());

        for (delay, event) in &self.events {
            tokio::time::sleep(*delay).await;
            let _ = progress.send(event.clone());
        }

        if let Some(message) = &self.failure {
            return Err(anyhow!(message.clone()));
        }

        for (name, len) in &self.files {
            std::fs::write(request.workspace.join(name), vec![0u8; *len])?;
        }

        Ok(MediaMetadata {
            title: "Test clip".to_string(),
            id: "test".to_string(),
            ..MediaMetadata::default()
        })
    }

    async fn test_availability(&self) -> bool {
        true
    }
}
