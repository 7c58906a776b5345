use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use teloxide::{
    prelude::*,
    types::{
        ChatAction, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, MessageId,
        ReplyParameters,
    },
};

/// Chat a job reports into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChatRef(pub i64);

/// A message previously sent by the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef(pub i32);

/// A button offered to the user: label and the data returned when it is pressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub label: String,
    pub data: String,
}

/// Chat platform operations used by jobs and the dispatcher.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(
        &self,
        chat: ChatRef,
        reply_to: Option<MessageRef>,
        text: &str,
    ) -> Result<MessageRef>;

    async fn edit_text(&self, chat: ChatRef, message: MessageRef, text: &str) -> Result<()>;

    /// Sends a playable video; the platform is asked to allow streaming playback.
    async fn send_video(&self, chat: ChatRef, file: &Path, caption: &str) -> Result<()>;

    async fn send_audio(&self, chat: ChatRef, file: &Path, caption: &str) -> Result<()>;

    /// Sends the file as a plain document, no media handling on the platform side.
    async fn send_document(&self, chat: ChatRef, file: &Path, caption: &str) -> Result<()>;

    async fn indicate_typing(&self, chat: ChatRef) -> Result<()>;

    async fn send_choices(
        &self,
        chat: ChatRef,
        reply_to: Option<MessageRef>,
        text: &str,
        choices: &[Choice],
    ) -> Result<MessageRef>;
}

pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn input_file(file: &Path) -> InputFile {
    InputFile::file(file.to_path_buf())
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send_text(
        &self,
        chat: ChatRef,
        reply_to: Option<MessageRef>,
        text: &str,
    ) -> Result<MessageRef> {
        let mut request = self.bot.send_message(ChatId(chat.0), text);
        if let Some(reply_to) = reply_to {
            request = request.reply_parameters(ReplyParameters::new(MessageId(reply_to.0)));
        }
        let message = request.await.context("Failed to send message")?;
        Ok(MessageRef(message.id.0))
    }

    async fn edit_text(&self, chat: ChatRef, message: MessageRef, text: &str) -> Result<()> {
        self.bot
            .edit_message_text(ChatId(chat.0), MessageId(message.0), text)
            .await
            .context("Failed to edit message")?;
        Ok(())
    }

    async fn send_video(&self, chat: ChatRef, file: &Path, caption: &str) -> Result<()> {
        self.bot
            .send_video(ChatId(chat.0), input_file(file))
            .caption(caption)
            .supports_streaming(true)
            .await
            .context("Failed to send video")?;
        Ok(())
    }

    async fn send_audio(&self, chat: ChatRef, file: &Path, caption: &str) -> Result<()> {
        self.bot
            .send_audio(ChatId(chat.0), input_file(file))
            .caption(caption)
            .await
            .context("Failed to send audio")?;
        Ok(())
    }

    async fn send_document(&self, chat: ChatRef, file: &Path, caption: &str) -> Result<()> {
        self.bot
            .send_document(ChatId(chat.0), input_file(file))
            .caption(caption)
            .disable_content_type_detection(true)
            .await
            .context("Failed to send document")?;
        Ok(())
    }

    async fn indicate_typing(&self, chat: ChatRef) -> Result<()> {
        self.bot
            .send_chat_action(ChatId(chat.0), ChatAction::Typing)
            .await
            .context("Failed to send chat action")?;
        Ok(())
    }

    async fn send_choices(
        &self,
        chat: ChatRef,
        reply_to: Option<MessageRef>,
        text: &str,
        choices: &[Choice],
    ) -> Result<MessageRef> {
        let keyboard = InlineKeyboardMarkup::new(choices.chunks(3).map(|row| {
            row.iter()
                .map(|choice| InlineKeyboardButton::callback(choice.label.clone(), choice.data.clone()))
                .collect::<Vec<_>>()
        }));

        let mut request = self
            .bot
            .send_message(ChatId(chat.0), text)
            .reply_markup(keyboard);
        if let Some(reply_to) = reply_to {
            request = request.reply_parameters(ReplyParameters::new(MessageId(reply_to.0)));
        }
        let message = request.await.context("Failed to send format choices")?;
        Ok(MessageRef(message.id.0))
    }
}
