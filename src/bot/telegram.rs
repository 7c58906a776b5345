use super::{
    dispatcher::Dispatcher,
    messenger::{ChatRef, MessageRef},
};
use std::sync::Arc;
use teloxide::{
    dispatching::{UpdateFilterExt, UpdateHandler},
    prelude::*,
    utils::command::BotCommands,
};
use tracing::{debug, error, info, warn};

pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

const START_TEXT: &str = "👋 Video Downloader Bot\n\n\
Send me a link and I will download the video and post it here.\n\n\
Commands:\n\
• /start – this message\n\
• /help – usage and tips\n\n\
⚠️ Only download content you have the right to.";

const HELP_TEXT: &str = "How to use\n\n\
1) Paste a YouTube/TikTok/Instagram/X link.\n\
2) The bot shows the download progress.\n\
3) The video is sent as soon as it is ready.\n\n\
Notes\n\
• Very large files (over ~1.95 GB) cannot be sent.\n\
• Some sites need an up-to-date yt-dlp.\n\
• Private or age-restricted content will not download.";

#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    #[command(description = "show the welcome message")]
    Start,
    #[command(description = "usage and tips")]
    Help,
}

/// Update handler tree: commands, then plain text, then format buttons.
pub fn schema(dispatcher: Arc<Dispatcher>) -> UpdateHandler<HandlerError> {
    let text_dispatcher = Arc::clone(&dispatcher);
    let callback_dispatcher = dispatcher;

    dptree::entry()
        .branch(command_handler())
        .branch(text_handler(text_dispatcher))
        .branch(callback_handler(callback_dispatcher))
}

fn command_handler() -> UpdateHandler<HandlerError> {
    Update::filter_message().branch(dptree::entry().filter_command::<Command>().endpoint(
        |bot: Bot, msg: Message, cmd: Command| async move {
            info!("Received command {:?} from chat {}", cmd, msg.chat.id);
            let text = match cmd {
                Command::Start => START_TEXT,
                Command::Help => HELP_TEXT,
            };
            bot.send_message(msg.chat.id, text).await?;
            Ok::<(), HandlerError>(())
        },
    ))
}

fn text_handler(dispatcher: Arc<Dispatcher>) -> UpdateHandler<HandlerError> {
    Update::filter_message().endpoint(move |msg: Message| {
        let dispatcher = Arc::clone(&dispatcher);
        async move {
            let Some(text) = msg.text() else {
                debug!("Ignoring non-text message in chat {}", msg.chat.id);
                return Ok(());
            };
            let user = msg.from.as_ref().map(|u| u.id.0).unwrap_or_default();

            if let Err(e) = dispatcher
                .handle_text(user, ChatRef(msg.chat.id.0), MessageRef(msg.id.0), text)
                .await
            {
                error!("Failed to handle message in chat {}: {:#}", msg.chat.id, e);
            }
            Ok::<(), HandlerError>(())
        }
    })
}

fn callback_handler(dispatcher: Arc<Dispatcher>) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
        let dispatcher = Arc::clone(&dispatcher);
        async move {
            if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
                debug!("Failed to answer callback query: {}", e);
            }

            let (Some(data), Some(message)) = (q.data.as_deref(), q.message.as_ref()) else {
                warn!("Callback query from user {} without data or message", q.from.id);
                return Ok(());
            };

            if let Err(e) = dispatcher
                .handle_selection(
                    q.from.id.0,
                    ChatRef(message.chat().id.0),
                    Some(MessageRef(message.id().0)),
                    data,
                )
                .await
            {
                error!("Failed to handle selection from user {}: {:#}", q.from.id, e);
            }
            Ok::<(), HandlerError>(())
        }
    })
}

pub async fn set_commands(bot: &Bot) {
    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("Failed to register bot commands: {}", e);
    }
}
