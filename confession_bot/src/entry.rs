use std::sync::Arc;
use teloxide::{dptree::deps, prelude::*};

use crate::{
    config::Config,
    database::Database,
    handlers::{commands::Command, handle_message, reviews::handle_callback_query},
    moderation::Moderation,
    outlet::TelegramOutlet,
};

/// The moderation pipeline as wired up to Telegram.
pub type BotModeration = Moderation<TelegramOutlet>;

/// # Panics
///
/// Panics if the config is bad, or if the bot or the database fail to start.
pub async fn entry() {
    log::info!("ASYNC WOOOO");

    let config = match Config::from_env() {
        Ok(config) => Arc::new(config),
        Err(e) => panic!("Failed to load the config: {e}"),
    };

    let bot = Bot::new(config.bot_token.clone());

    bot.set_my_commands(Command::generate_bot_commands())
        .await
        .expect("Failed to set bot commands!");

    let db = Database::new(&config.database_path)
        .await
        .expect("Failed to create database!");

    match db.count_pending().await {
        Ok(count) => log::info!("{count} submissions are waiting for review."),
        Err(e) => log::warn!("Failed to count pending submissions: {e}"),
    }
    log::info!("Content filter has {} terms.", config.filter.len());

    let outlet = TelegramOutlet::new(bot.clone(), &config);
    let moderation: Arc<BotModeration> = Arc::new(Moderation::new(db, config, outlet));

    log::info!("Creating the handler...");

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handle_message))
        .branch(Update::filter_callback_query().endpoint(handle_callback_query));

    log::info!("Dispatching the dispatcher!");

    Dispatcher::builder(bot, handler)
        .default_handler(|_| async {})
        .dependencies(deps![moderation])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    log::info!("it appears we have been bonked.");
}
