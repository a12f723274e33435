use std::sync::Arc;

use teloxide::{dispatching::Dispatcher as UpdateDispatcher, dptree, prelude::*};
use tracing::{info, warn};

use relay_core::{
    config::Config,
    conversation::ConversationStore,
    dispatcher::Dispatcher,
    messaging::{
        port::MessagingPort,
        throttled::{ThrottleConfig, ThrottledMessenger},
    },
    ports::CompletionClient,
    processor::{MessageProcessor, ProcessorOptions},
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub messenger: Arc<dyn MessagingPort>,
    pub dispatcher: Dispatcher,
}

impl AppState {
    pub fn new(
        cfg: Arc<Config>,
        messenger: Arc<dyn MessagingPort>,
        completion: Arc<dyn CompletionClient>,
    ) -> Self {
        let processor = MessageProcessor::new(ProcessorOptions {
            typing_enabled: cfg.typing_enabled,
            ..ProcessorOptions::default()
        });
        let dispatcher = Dispatcher::new(
            completion,
            processor,
            Arc::new(ConversationStore::new()),
        );
        Self {
            cfg,
            messenger,
            dispatcher,
        }
    }
}

pub async fn run_polling(
    cfg: Arc<Config>,
    completion: Arc<dyn CompletionClient>,
) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    match bot.get_me().await {
        Ok(me) => info!(username = %me.username(), "relay bot started"),
        Err(e) => warn!(error = %e, "could not fetch bot identity"),
    }

    // Reply chunks go out back to back; throttle them below Telegram's flood limits.
    // 429 RetryAfter is still retried once at the adapter layer.
    let raw_messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        raw_messenger,
        ThrottleConfig::default(),
    ));

    let state = Arc::new(AppState::new(cfg, messenger, completion));

    let handler = Update::filter_message().endpoint(handlers::handle_message);

    UpdateDispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("relay bot stopped");
    Ok(())
}
