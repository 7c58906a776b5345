mod dispatcher;
mod messenger;
pub mod telegram;

pub use dispatcher::{DispatchOptions, Dispatcher};
pub use messenger::{ChatRef, Choice, MessageRef, Messenger, TelegramMessenger};

use crate::{
    config::Settings,
    job::JobController,
    media::{Fetcher, YtDlpFetcher},
};
use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{info, warn};

pub async fn run(settings: Settings) -> Result<()> {
    let mut bot = Bot::new(settings.token.clone());
    if let Some(api_url) = &settings.api_url {
        info!("Using Bot API server at {}", api_url);
        bot = bot.set_api_url(api_url.clone());
    }

    let fetcher = Arc::new(YtDlpFetcher::new(
        settings.ytdlp_path.clone(),
        settings.retries,
    ));
    if !fetcher.test_availability().await {
        warn!("{} is not available, downloads will fail", fetcher.name());
    }

    let messenger = Arc::new(TelegramMessenger::new(bot.clone()));
    let controller = Arc::new(JobController::new(
        messenger.clone(),
        fetcher,
        settings.job_settings(),
    ));
    let dispatcher = Arc::new(Dispatcher::new(
        messenger,
        controller,
        DispatchOptions {
            ask_format: settings.ask_format,
            default_format: settings.default_format,
        },
    ));

    telegram::set_commands(&bot).await;

    info!("Bot started");
    teloxide::dispatching::Dispatcher::builder(bot, telegram::schema(dispatcher))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Bot stopped");
    Ok(())
}
