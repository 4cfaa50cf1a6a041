use std::future::Future;

use bot_commons::teloxide_retry;
use html_escape::encode_text;
use teloxide::{
    payloads::{
        EditMessageCaptionSetters, EditMessageTextSetters, SendMessageSetters, SendPhotoSetters,
    },
    requests::Requester,
    types::{
        ChatId, FileId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, ParseMode, UserId,
    },
    Bot, RequestError,
};

use crate::{
    config::Config,
    types::{Notice, ReviewCallbackData, ReviewCard, Submission, Verdict},
};

/// Everything the moderation pipeline needs to say to the outside world.
pub trait ModerationOutlet {
    /// Post a review card with approve/reject buttons for moderators.
    fn send_for_review(
        &self,
        submission: &Submission,
        strike_count: u32,
    ) -> impl Future<Output = Result<ReviewCard, RequestError>> + Send;

    /// Publish an approved submission to the channel.
    fn publish(
        &self,
        content: Option<&str>,
        media_ref: Option<&str>,
        display_id: i64,
    ) -> impl Future<Output = Result<(), RequestError>> + Send;

    /// Tell the original sender about their submission.
    fn notify(
        &self,
        sender: ChatId,
        notice: Notice,
    ) -> impl Future<Output = Result<(), RequestError>> + Send;

    /// Edit a review card into its final state, without buttons.
    fn close_review_card(
        &self,
        card: ReviewCard,
        has_media: bool,
        text: &str,
    ) -> impl Future<Output = Result<(), RequestError>> + Send;

    /// Whether this user is in the admin chat, and so can make decisions.
    fn is_moderator(&self, user: UserId) -> impl Future<Output = Result<bool, RequestError>> + Send;
}

/// Text of the review card for a fresh submission.
pub fn review_card_text(submission: &Submission, strike_count: u32) -> String {
    let kind = if submission.has_media() {
        "🖼️ New image confession"
    } else {
        "📩 New confession"
    };

    let body = match &submission.content {
        Some(content) => encode_text(content).into_owned(),
        None => "<i>(no caption)</i>".to_string(),
    };

    format!(
        "{kind} <b>#{}</b>\n<b>Sender strikes</b>: {strike_count}\n\n{body}",
        submission.id
    )
}

/// Text of a review card after the decision was made.
pub fn closed_review_card_text(
    submission: &Submission,
    verdict: Verdict,
    moderator: &str,
    tier_text: Option<&str>,
) -> String {
    let mut text = match verdict {
        Verdict::Approve => format!("✅ <b>APPROVED</b> by {}", encode_text(moderator)),
        Verdict::Reject => format!("❌ <b>REJECTED</b> by {}", encode_text(moderator)),
    };

    if let Some(tier_text) = tier_text {
        text.push('\n');
        text.push_str(&encode_text(tier_text));
    }

    text.push_str(&format!("\n\n<b>#{}</b>\n", submission.id));
    match &submission.content {
        Some(content) => text.push_str(&encode_text(content)),
        None => text.push_str("<i>(Image)</i>"),
    }

    text
}

/// Text of a channel post.
pub fn channel_post_text(content: Option<&str>, display_id: i64) -> String {
    let mut text = format!("💬 <b>Anonymous Confession #{display_id}</b>");
    if let Some(content) = content {
        text.push_str("\n\n");
        text.push_str(&encode_text(content));
    }
    text
}

fn review_keyboard(submission_id: i64) -> InlineKeyboardMarkup {
    let data = |verdict| {
        ReviewCallbackData {
            verdict,
            submission_id,
        }
        .to_string()
    };

    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("✅ Approve", data(Verdict::Approve)),
        InlineKeyboardButton::callback("❌ Reject", data(Verdict::Reject)),
    ]])
}

/// [`ModerationOutlet`] that talks to Telegram.
pub struct TelegramOutlet {
    bot: Bot,
    admin_chat: ChatId,
    channel: ChatId,
}

impl TelegramOutlet {
    pub fn new(bot: Bot, config: &Config) -> Self {
        Self {
            bot,
            admin_chat: config.admin_chat,
            channel: config.channel,
        }
    }
}

impl ModerationOutlet for TelegramOutlet {
    async fn send_for_review(
        &self,
        submission: &Submission,
        strike_count: u32,
    ) -> Result<ReviewCard, RequestError> {
        let text = review_card_text(submission, strike_count);
        let keyboard = review_keyboard(submission.id);

        let message = if let Some(media_ref) = &submission.media_ref {
            teloxide_retry!(
                self.bot
                    .send_photo(self.admin_chat, InputFile::file_id(FileId(media_ref.clone())))
                    .caption(&text)
                    .parse_mode(ParseMode::Html)
                    .reply_markup(keyboard.clone())
                    .await
            )?
        } else {
            teloxide_retry!(
                self.bot
                    .send_message(self.admin_chat, &text)
                    .parse_mode(ParseMode::Html)
                    .reply_markup(keyboard.clone())
                    .await
            )?
        };

        Ok(ReviewCard {
            chat_id: message.chat.id,
            message_id: message.id,
        })
    }

    async fn publish(
        &self,
        content: Option<&str>,
        media_ref: Option<&str>,
        display_id: i64,
    ) -> Result<(), RequestError> {
        let text = channel_post_text(content, display_id);

        if let Some(media_ref) = media_ref {
            teloxide_retry!(
                self.bot
                    .send_photo(self.channel, InputFile::file_id(FileId(media_ref.to_string())))
                    .caption(&text)
                    .parse_mode(ParseMode::Html)
                    .await
            )?;
        } else {
            teloxide_retry!(
                self.bot
                    .send_message(self.channel, &text)
                    .parse_mode(ParseMode::Html)
                    .await
            )?;
        }
        Ok(())
    }

    async fn notify(&self, sender: ChatId, notice: Notice) -> Result<(), RequestError> {
        let text = notice.to_string();
        teloxide_retry!(
            self.bot
                .send_message(sender, &text)
                .parse_mode(ParseMode::Html)
                .await
        )?;
        Ok(())
    }

    async fn close_review_card(
        &self,
        card: ReviewCard,
        has_media: bool,
        text: &str,
    ) -> Result<(), RequestError> {
        let no_buttons = InlineKeyboardMarkup {
            inline_keyboard: Vec::new(),
        };

        if has_media {
            teloxide_retry!(
                self.bot
                    .edit_message_caption(card.chat_id, card.message_id)
                    .caption(text)
                    .parse_mode(ParseMode::Html)
                    .reply_markup(no_buttons.clone())
                    .await
            )?;
        } else {
            teloxide_retry!(
                self.bot
                    .edit_message_text(card.chat_id, card.message_id, text)
                    .parse_mode(ParseMode::Html)
                    .reply_markup(no_buttons.clone())
                    .await
            )?;
        }
        Ok(())
    }

    async fn is_moderator(&self, user: UserId) -> Result<bool, RequestError> {
        let member = teloxide_retry!(self.bot.get_chat_member(self.admin_chat, user).await)?;
        Ok(member.is_present())
    }
}


#[cfg(test)]
mod tests {
    use teloxide::types::MessageId;

    use super::*;
    use crate::types::{SubmissionStatus, SubmitterHash};

    fn submission(content: Option<&str>, media_ref: Option<&str>) -> Submission {
        Submission {
            id: 42,
            submitter_hash: SubmitterHash::from_stored("0123456789abcdef".to_string()),
            sender_id: ChatId(1366743555),
            content: content.map(str::to_string),
            media_ref: media_ref.map(str::to_string),
            status: SubmissionStatus::Pending,
            review_card: Some(ReviewCard {
                chat_id: ChatId(-1000),
                message_id: MessageId(1),
            }),
            created_at: chrono::DateTime::from_timestamp(1_760_000_000, 0).unwrap(),
            decided_at: None,
            decided_by: None,
        }
    }

    #[test]
    fn review_card_shows_number_and_escaped_content_but_not_sender() {
        let text = review_card_text(&submission(Some("I <3 cats & dogs"), None), 2);
        assert!(text.contains("#42"));
        assert!(text.contains("I &lt;3 cats &amp; dogs"));
        assert!(text.contains("strikes</b>: 2"));
        assert!(!text.contains("1366743555"));
        assert!(!text.contains("0123456789abcdef"));

        let text = review_card_text(&submission(None, Some("photo")), 0);
        assert!(text.contains("image confession"));
        assert!(text.contains("(no caption)"));
    }

    #[test]
    fn closed_card_names_moderator_and_tier() {
        let text = closed_review_card_text(
            &submission(Some("hello"), None),
            Verdict::Reject,
            "@some_mod",
            Some("Strike 5: blocked for 24h"),
        );
        assert!(text.starts_with("❌ <b>REJECTED</b> by @some_mod"));
        assert!(text.contains("Strike 5: blocked for 24h"));
        assert!(text.ends_with("hello"));

        let text = closed_review_card_text(
            &submission(None, Some("photo")),
            Verdict::Approve,
            "Some <Mod>",
            None,
        );
        assert!(text.starts_with("✅ <b>APPROVED</b> by Some &lt;Mod&gt;"));
        assert!(text.ends_with("(Image)</i>"));
    }

    #[test]
    fn channel_post() {
        assert_eq!(
            channel_post_text(Some("a > b"), 7),
            "💬 <b>Anonymous Confession #7</b>\n\na &gt; b"
        );
        assert_eq!(
            channel_post_text(None, 8),
            "💬 <b>Anonymous Confession #8</b>"
        );
    }

    #[test]
    fn keyboard_carries_callback_data() {
        let keyboard = review_keyboard(42);
        assert_eq!(keyboard.inline_keyboard.len(), 1);
        assert_eq!(keyboard.inline_keyboard[0].len(), 2);
    }
}
