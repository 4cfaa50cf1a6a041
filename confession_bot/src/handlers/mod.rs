use std::sync::Arc;

use bot_commons::{teloxide_retry, useful_methods::*};
use chrono::Utc;
use teloxide::{
    payloads::SendMessageSetters,
    requests::Requester,
    types::{Me, Message, ParseMode},
    Bot, RequestError,
};

use crate::{
    moderation::IngestionError,
    texts,
    BotModeration,
};

use self::commands::{Command, CommandKind};

pub mod commands;
pub mod reviews;

async fn reply_html(bot: &Bot, message: &Message, text: &str) -> Result<(), RequestError> {
    teloxide_retry!(
        bot.send_message(message.chat.id, text)
            .parse_mode(ParseMode::Html)
            .await
    )?;
    Ok(())
}

pub async fn handle_message(
    bot: Bot,
    me: Me,
    message: Message,
    moderation: Arc<BotModeration>,
) -> Result<(), RequestError> {
    if message.chat.id == moderation.config.admin_chat {
        return handle_admin_chat_message(&bot, &me, &message, &moderation).await;
    }

    // Submissions only come in through DMs.
    if !message.chat.is_private() {
        return Ok(());
    }

    if message.is_command() {
        return handle_command(&bot, &me, &message).await;
    }

    handle_submission(&bot, &message, &moderation).await
}

async fn handle_command(bot: &Bot, me: &Me, message: &Message) -> Result<(), RequestError> {
    let command = message.text().and_then(|text| Command::parse(text, me));

    let reply = match command.map(|x| x.kind) {
        Some(CommandKind::Start) => texts::START.to_string(),
        Some(CommandKind::Rules) => texts::RULES.to_string(),
        // Anything unknown gets the help message.
        Some(CommandKind::Help | CommandKind::Pending) | None => Command::generate_help(),
    };

    reply_html(bot, message, &reply).await
}

async fn handle_submission(
    bot: &Bot,
    message: &Message,
    moderation: &BotModeration,
) -> Result<(), RequestError> {
    let Some(user) = &message.from else {
        return Ok(());
    };

    let media_ref = message.find_biggest_photo().map(|photo| photo.file.id.0.as_str());
    if media_ref.is_none() && message.text().is_none() {
        return reply_html(bot, message, texts::ONLY_TEXT_AND_PHOTOS).await;
    }
    // Text of a text message, or caption of a photo.
    let content = message.text_full();

    let reply = match moderation
        .submit(user.id, message.chat.id, content, media_ref, Utc::now())
        .await
    {
        Ok(Ok(submission)) => match submission.has_media() {
            true => texts::RECEIVED_IMAGE.to_string(),
            false => texts::RECEIVED_TEXT.to_string(),
        },
        Ok(Err(reason)) => reason.to_string(),
        Err(e) => {
            match &e {
                IngestionError::Malformed(reason) => {
                    log::debug!("Malformed submission: {reason}");
                }
                // Already logged where it failed.
                IngestionError::Transport(_) => {}
                IngestionError::Storage(e) => {
                    log::error!("Database failed while taking a submission: {e}");
                }
            }
            texts::ingestion_failure(&e)
        }
    };

    reply_html(bot, message, &reply).await
}

/// Only `/pending` is answered in the admin chat. Everything else there is
/// the moderators talking.
async fn handle_admin_chat_message(
    bot: &Bot,
    me: &Me,
    message: &Message,
    moderation: &BotModeration,
) -> Result<(), RequestError> {
    let Some(text) = message.text() else {
        return Ok(());
    };

    if Command::parse(text, me).map(|x| x.kind) != Some(CommandKind::Pending) {
        return Ok(());
    }

    let reply = match moderation.db.count_pending().await {
        Ok(count) => texts::pending_count(count),
        Err(e) => {
            log::error!("Failed to count pending submissions: {e}");
            texts::SOMETHING_WENT_WRONG.to_string()
        }
    };

    reply_html(bot, message, &reply).await
}
