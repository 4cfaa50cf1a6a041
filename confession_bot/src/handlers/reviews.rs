use std::sync::Arc;

use chrono::{DateTime, Utc};
use teloxide::{
    payloads::AnswerCallbackQuerySetters,
    requests::Requester,
    types::{CallbackQuery, User},
    Bot, RequestError,
};

use crate::{
    misc::user_name_prettyprint,
    moderation::{DecisionError, Moderation},
    outlet::ModerationOutlet,
    texts,
    types::ReviewCallbackData,
    BotModeration,
};

/// Work out a button press on a review card. Returns the text to answer the
/// press with, which is all the moderator gets to see of it.
pub async fn review_answer<O: ModerationOutlet>(
    moderation: &Moderation<O>,
    query_data: Option<&str>,
    user: &User,
    now: DateTime<Utc>,
) -> String {
    let Some(query_data) = query_data else {
        return "No query data.".to_string();
    };

    let data: ReviewCallbackData = match query_data.parse() {
        Ok(data) => data,
        Err(e) => {
            log::warn!("Got invalid callback data {query_data:?}: {e}");
            return "Invalid query data.".to_string();
        }
    };

    match moderation.outlet.is_moderator(user.id).await {
        Ok(true) => {}
        Ok(false) => {
            log::info!(
                "Unauthorized user trying to decide on submissions: {}",
                user_name_prettyprint(user, true)
            );
            return texts::ACCESS_DENIED.to_string();
        }
        Err(e) => {
            log::error!(
                "Failed to check if {} is a moderator: {e}",
                user_name_prettyprint(user, true)
            );
            return texts::SOMETHING_WENT_WRONG.to_string();
        }
    }

    let moderator = user_name_prettyprint(user, false);

    match moderation
        .decide(data.submission_id, data.verdict, &moderator, now)
        .await
    {
        Ok(outcome) => outcome.summary(),
        Err(e) => {
            match &e {
                DecisionError::Storage(e) => log::error!(
                    "Database failed while deciding on #{}: {e}",
                    data.submission_id
                ),
                _ => log::debug!("Decision by {moderator} not applied: {e}"),
            }
            texts::decision_failure(&e)
        }
    }
}

pub async fn handle_callback_query(
    bot: Bot,
    query: CallbackQuery,
    moderation: Arc<BotModeration>,
) -> Result<(), RequestError> {
    let answer = review_answer(&moderation, query.data.as_deref(), &query.from, Utc::now()).await;
    bot.answer_callback_query(query.id).text(answer).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use teloxide::types::UserId;

    use super::*;
    use crate::{
        moderation::testing::{moderation, now, pending},
        types::SubmissionStatus,
    };

    fn moderator() -> User {
        User {
            id: UserId(777),
            is_bot: false,
            first_name: "Mod".to_string(),
            last_name: None,
            username: Some("some_mod".to_string()),
            language_code: None,
            is_premium: false,
            added_to_attachment_menu: false,
        }
    }

    #[tokio::test]
    async fn moderator_presses_approve() {
        let moderation = moderation(1).await;
        let submission = pending(&moderation, 1, "hello").await;

        let data = format!("approve_{}", submission.id);
        let answer = review_answer(&moderation, Some(&data), &moderator(), now()).await;
        assert_eq!(answer, format!("Approved #{}.", submission.id));

        let answer = review_answer(&moderation, Some(&data), &moderator(), now()).await;
        assert_eq!(answer, "This submission was already approved.");
    }

    #[tokio::test]
    async fn failed_moderator_check_still_gets_an_answer() {
        let moderation = moderation(1).await;
        let submission = pending(&moderation, 1, "hello").await;
        moderation.outlet.fail_auth.store(true, Ordering::SeqCst);

        let data = format!("reject_{}", submission.id);
        let answer = review_answer(&moderation, Some(&data), &moderator(), now()).await;
        assert_eq!(answer, texts::SOMETHING_WENT_WRONG);

        let stored = moderation
            .db
            .get_submission(submission.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, SubmissionStatus::Pending);
    }

    #[tokio::test]
    async fn outsiders_and_garbage_are_turned_away() {
        let moderation = moderation(1).await;
        let submission = pending(&moderation, 1, "hello").await;
        moderation.outlet.outsiders.lock().unwrap().push(UserId(777));

        let data = format!("approve_{}", submission.id);
        let answer = review_answer(&moderation, Some(&data), &moderator(), now()).await;
        assert_eq!(answer, texts::ACCESS_DENIED);

        let answer = review_answer(&moderation, Some("approve_-1"), &moderator(), now()).await;
        assert_eq!(answer, "Invalid query data.");
        let answer = review_answer(&moderation, None, &moderator(), now()).await;
        assert_eq!(answer, "No query data.");

        assert!(moderation.outlet.published().is_empty());
    }
}
