use crate::{
    bot::{ChatRef, Messenger},
    media::{MediaKind, MediaMetadata},
    utils::truncate_chars,
};
use std::path::Path;
use tracing::{info, warn};

/// Telegram rejects captions longer than this.
pub const CAPTION_LIMIT: usize = 1024;

/// How a finished artifact reached the user.
#[derive(Debug)]
pub enum DeliveryOutcome {
    /// Sent as video/audio with the regular caption.
    Primary,
    /// The media send failed and the file went out as a document.
    Fallback,
    /// Both attempts failed; carries the fallback error.
    Failed(anyhow::Error),
}

pub fn caption(metadata: &MediaMetadata, source_url: &str, fallback: bool) -> String {
    let header = if fallback { "✅ Done (as file)" } else { "✅ Done" };
    truncate_chars(
        &format!(
            "{header}\nTitle: {}\nSource: {source_url}",
            metadata.title
        ),
        CAPTION_LIMIT,
    )
}

/// Sends an artifact with the media method for its kind and falls back to a
/// document upload once if that fails.
pub struct DeliveryStrategy<'a> {
    messenger: &'a dyn Messenger,
    chat: ChatRef,
}

impl<'a> DeliveryStrategy<'a> {
    pub fn new(messenger: &'a dyn Messenger, chat: ChatRef) -> Self {
        Self { messenger, chat }
    }

    pub async fn deliver(
        &self,
        path: &Path,
        kind: MediaKind,
        metadata: &MediaMetadata,
        source_url: &str,
    ) -> DeliveryOutcome {
        let primary_caption = caption(metadata, source_url, false);
        let primary = match kind {
            MediaKind::Video => {
                self.messenger
                    .send_video(self.chat, path, &primary_caption)
                    .await
            }
            MediaKind::Audio => {
                self.messenger
                    .send_audio(self.chat, path, &primary_caption)
                    .await
            }
        };

        let primary_error = match primary {
            Ok(()) => return DeliveryOutcome::Primary,
            Err(e) => e,
        };
        warn!(
            "Sending {} as {:?} failed, retrying as document: {:#}",
            path.display(),
            kind,
            primary_error
        );

        let fallback_caption = caption(metadata, source_url, true);
        match self
            .messenger
            .send_document(self.chat, path, &fallback_caption)
            .await
        {
            Ok(()) => {
                info!("Delivered {} as document", path.display());
                DeliveryOutcome::Fallback
            }
            Err(e) => DeliveryOutcome::Failed(e.context(format!(
                "document fallback failed after media send error: {primary_error:#}"
            ))),
        }
    }
}
