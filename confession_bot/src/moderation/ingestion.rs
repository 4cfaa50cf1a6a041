use std::fmt::Display;

use chrono::{DateTime, Utc};
use teloxide::{
    types::{ChatId, UserId},
    RequestError,
};

use super::Moderation;
use crate::{
    database,
    outlet::ModerationOutlet,
    policy::{days_until_reset, quota_window_expired, BlockState, StrikeTier, QUOTA_WINDOW_DAYS},
    types::{RejectionReason, Submission, Submitter, SubmitterHash},
};

/// Longest text submission, in characters. Leaves room for the review card
/// header within Telegram's message length limit.
pub const MAX_TEXT_LEN: usize = 3500;
/// Longest photo caption, in characters. Same as above, for captions.
pub const MAX_CAPTION_LEN: usize = 900;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedReason {
    /// Neither text nor media.
    Empty,
    TooLong { limit: usize },
}

impl Display for MalformedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MalformedReason::Empty => write!(f, "no text and no media"),
            MalformedReason::TooLong { limit } => write!(f, "longer than {limit} characters"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IngestionError {
    #[error("malformed submission: {0}")]
    Malformed(MalformedReason),
    #[error("storage failure: {0}")]
    Storage(#[from] database::Error),
    #[error("failed to forward for review: {0}")]
    Transport(#[from] RequestError),
}

fn validate(content: Option<&str>, media_ref: Option<&str>) -> Result<(), MalformedReason> {
    let limit = match media_ref {
        Some(_) => MAX_CAPTION_LEN,
        None => MAX_TEXT_LEN,
    };

    match content {
        None if media_ref.is_none() => Err(MalformedReason::Empty),
        Some(text) if text.chars().count() > limit => Err(MalformedReason::TooLong { limit }),
        _ => Ok(()),
    }
}

impl<O: ModerationOutlet> Moderation<O> {
    /// When the submitter's block runs out, if they have one.
    ///
    /// This is the later of the stored block and the one their strike count
    /// calls for since their last rejection, in case storing the latter
    /// failed back then. A missing block is stored again here.
    async fn effective_block(
        &self,
        submitter: &Submitter,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, database::Error> {
        let hash = &submitter.hash;
        let tier = StrikeTier::for_strike_count(submitter.strike_count);
        if !matches!(tier, StrikeTier::Blocked { .. }) {
            return Ok(submitter.blocked_until);
        }

        let owed = self
            .db
            .last_rejection_at(hash)
            .await?
            .and_then(|rejected_at| tier.block_until(rejected_at))
            .filter(|owed| *owed > now);

        match (submitter.blocked_until, owed) {
            (stored, Some(owed)) if stored.map_or(true, |until| until < owed) => {
                log::warn!("Submitter {hash} is missing their block until {owed}, storing it again.");
                if let Err(e) = self.db.apply_temporary_block(hash, owed).await {
                    log::warn!("Failed to store the block of {hash}: {e}");
                }
                Ok(Some(owed))
            }
            (stored, _) => Ok(stored),
        }
    }

    /// Take back a submission that couldn't be sent to the moderators, so
    /// that the submitter can send it again.
    async fn undo_submission(&self, submission: &Submission) {
        let id = submission.id;
        match self.db.delete_unforwarded_submission(id).await {
            Ok(true) => {}
            Ok(false) => {
                log::warn!("Submission #{id} was already gone or forwarded, leaving its quota as is.");
                return;
            }
            Err(e) => {
                log::error!("Failed to delete unforwarded submission #{id}: {e}");
                return;
            }
        }
        if let Err(e) = self
            .db
            .release_weekly_submission(&submission.submitter_hash)
            .await
        {
            log::error!("Failed to give back the quota of submission #{id}: {e}");
        }
    }

    /// Run a new submission through the policy gates, in order: ban,
    /// temporary block, content filter, weekly quota. The first gate that
    /// fails decides the [`RejectionReason`], and the rest are not checked.
    ///
    /// A submission that passes is stored as pending, counted against the
    /// quota, and sent to the moderators.
    ///
    /// `sender` is the chat to notify the submitter in later on.
    ///
    /// # Errors
    ///
    /// Errors on malformed input before touching the database, or if the
    /// database or Telegram fail. If sending the review card fails, the
    /// submission is deleted and its quota slot given back.
    pub async fn submit(
        &self,
        user: UserId,
        sender: ChatId,
        content: Option<&str>,
        media_ref: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Result<Submission, RejectionReason>, IngestionError> {
        let content = content.map(str::trim).filter(|text| !text.is_empty());
        validate(content, media_ref).map_err(IngestionError::Malformed)?;

        let hash = SubmitterHash::from_user_id(user);
        let submitter = self.db.get_or_create(&hash, now).await?;

        if submitter.is_banned {
            log::debug!("Banned submitter {hash} tried to submit.");
            return Ok(Err(RejectionReason::Banned));
        }
        if StrikeTier::for_strike_count(submitter.strike_count) == StrikeTier::Banned {
            log::warn!("Submitter {hash} has enough strikes for a ban but isn't banned, banning.");
            if let Err(e) = self.db.apply_ban(&hash).await {
                log::warn!("Failed to store the ban of {hash}: {e}");
            }
            return Ok(Err(RejectionReason::Banned));
        }

        match BlockState::of(self.effective_block(&submitter, now).await?, now) {
            BlockState::Clear => {}
            BlockState::Active { remaining_hours } => {
                log::debug!("Blocked submitter {hash} tried to submit, {remaining_hours}h left.");
                return Ok(Err(RejectionReason::TemporarilyBlocked { remaining_hours }));
            }
            BlockState::Expired => {
                if self.db.clear_expired_block(&hash, now).await? {
                    log::debug!("Block of submitter {hash} has run out, cleared it.");
                }
            }
        }

        if let Some(text) = content {
            let verdict = self.config.filter.check(text);
            if verdict.is_banned {
                let matched_term = verdict.matched_term.unwrap_or_default();
                log::info!("Submission by {hash} tripped the filter on {matched_term:?}.");
                return Ok(Err(RejectionReason::ContentRejected { matched_term }));
            }
        }

        let mut window_start = submitter.weekly_reset_date;
        let mut used = submitter.weekly_submissions;
        if quota_window_expired(window_start, now) {
            if self.db.reset_weekly_window(&hash, now).await? {
                window_start = Some(now);
                used = 0;
            } else {
                // Reset concurrently by someone else. Take their numbers.
                let fresh = self
                    .db
                    .get_submitter(&hash)
                    .await?
                    .ok_or(database::Error::RowNotFound)?;
                window_start = fresh.weekly_reset_date;
                used = fresh.weekly_submissions;
            }
        }

        let quota_exceeded = || {
            let days_until_reset = window_start.map_or(QUOTA_WINDOW_DAYS as u32, |start| {
                days_until_reset(start, now)
            });
            log::debug!("Submitter {hash} is over quota, {days_until_reset} days left.");
            RejectionReason::QuotaExceeded { days_until_reset }
        };

        let limit = self.config.weekly_limit;
        if used >= limit {
            return Ok(Err(quota_exceeded()));
        }
        if !self.db.increment_weekly_submission(&hash, limit).await? {
            // A concurrent submission took the last slot.
            return Ok(Err(quota_exceeded()));
        }

        let mut submission = self
            .db
            .insert_submission(&hash, sender, content, media_ref, now)
            .await?;

        log::info!(
            "Accepted submission #{} by {hash} (strikes: {}, media: {})",
            submission.id,
            submitter.strike_count,
            submission.has_media()
        );

        let card = match self
            .outlet
            .send_for_review(&submission, submitter.strike_count)
            .await
        {
            Ok(card) => card,
            Err(e) => {
                log::error!(
                    "Failed to send submission #{} for review: {e}",
                    submission.id
                );
                self.undo_submission(&submission).await;
                return Err(IngestionError::Transport(e));
            }
        };

        self.db.set_review_card(submission.id, card).await?;
        submission.review_card = Some(card);

        Ok(Ok(submission))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use chrono::TimeDelta;

    use super::*;
    use crate::{
        moderation::testing::{moderation, now},
        outlet::testing::{RecordingOutlet, Sent},
        types::SubmissionStatus,
    };

    const USER: u64 = 1366743555;

    fn hash() -> SubmitterHash {
        SubmitterHash::from_user_id(UserId(USER))
    }

    async fn submit_text(
        moderation: &Moderation<RecordingOutlet>,
        text: &str,
        at: DateTime<Utc>,
    ) -> Result<Submission, RejectionReason> {
        moderation
            .submit(UserId(USER), ChatId(USER as i64), Some(text), None, at)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn accepted_submission_is_stored_and_forwarded() {
        let moderation = moderation(1).await;

        let submission = submit_text(&moderation, "  I ate the last cookie  ", now())
            .await
            .unwrap();
        assert_eq!(submission.status, SubmissionStatus::Pending);
        assert_eq!(submission.content.as_deref(), Some("I ate the last cookie"));
        assert_eq!(submission.sender_id, ChatId(USER as i64));
        assert_eq!(submission.submitter_hash, hash());
        assert!(submission.review_card.is_some());

        let stored = moderation
            .db
            .get_submission(submission.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, submission);

        assert_eq!(
            moderation.outlet.sent(),
            vec![Sent::ReviewCard {
                submission_id: submission.id,
                strike_count: 0
            }]
        );

        let submitter = moderation.db.get_submitter(&hash()).await.unwrap().unwrap();
        assert_eq!(submitter.weekly_submissions, 1);
        assert_eq!(submitter.weekly_reset_date, Some(now()));
    }

    #[tokio::test]
    async fn photo_without_caption_is_fine() {
        let moderation = moderation(1).await;
        let submission = moderation
            .submit(UserId(USER), ChatId(USER as i64), None, Some("AgACAgIAAx0"), now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(submission.content, None);
        assert_eq!(submission.media_ref.as_deref(), Some("AgACAgIAAx0"));
    }

    #[tokio::test]
    async fn malformed_submissions_never_reach_the_database() {
        let moderation = moderation(1).await;

        for content in [None, Some(""), Some("  \n ")] {
            let result = moderation
                .submit(UserId(USER), ChatId(USER as i64), content, None, now())
                .await;
            assert!(matches!(
                result,
                Err(IngestionError::Malformed(MalformedReason::Empty))
            ));
        }

        let long = "a".repeat(MAX_TEXT_LEN + 1);
        let result = moderation
            .submit(UserId(USER), ChatId(USER as i64), Some(&long), None, now())
            .await;
        assert!(matches!(
            result,
            Err(IngestionError::Malformed(MalformedReason::TooLong { limit: MAX_TEXT_LEN }))
        ));

        let long = "a".repeat(MAX_CAPTION_LEN + 1);
        let result = moderation
            .submit(UserId(USER), ChatId(USER as i64), Some(&long), Some("photo"), now())
            .await;
        assert!(matches!(
            result,
            Err(IngestionError::Malformed(MalformedReason::TooLong { limit: MAX_CAPTION_LEN }))
        ));

        assert_eq!(moderation.db.get_submitter(&hash()).await.unwrap(), None);
        assert_eq!(moderation.db.count_pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn gates_go_in_order() {
        let moderation = moderation(1).await;

        // Use up the quota first.
        submit_text(&moderation, "first", now()).await.unwrap();
        let later = now() + TimeDelta::hours(1);

        // Over quota, but the filter comes first.
        assert!(matches!(
            submit_text(&moderation, "oh shit", later).await,
            Err(RejectionReason::ContentRejected { .. })
        ));

        // Blocked, which comes before the filter.
        moderation
            .db
            .apply_temporary_block(&hash(), later + TimeDelta::hours(2))
            .await
            .unwrap();
        assert_eq!(
            submit_text(&moderation, "oh shit", later).await,
            Err(RejectionReason::TemporarilyBlocked { remaining_hours: 2 })
        );

        // Banned, which comes before everything.
        moderation.db.apply_ban(&hash()).await.unwrap();
        assert_eq!(
            submit_text(&moderation, "oh shit", later).await,
            Err(RejectionReason::Banned)
        );

        assert_eq!(moderation.db.count_pending().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn filtered_submissions_leave_no_trace() {
        let moderation = moderation(1).await;

        assert_eq!(
            submit_text(&moderation, "you are a BITCH", now()).await,
            Err(RejectionReason::ContentRejected {
                matched_term: "bitch".to_string()
            })
        );

        let submitter = moderation.db.get_submitter(&hash()).await.unwrap().unwrap();
        assert_eq!(submitter.strike_count, 0);
        assert_eq!(submitter.weekly_submissions, 0);
        assert_eq!(moderation.db.count_pending().await.unwrap(), 0);
        assert!(moderation.outlet.sent().is_empty());

        // Captions get checked too.
        let result = moderation
            .submit(
                UserId(USER),
                ChatId(USER as i64),
                Some("what the fuck"),
                Some("photo"),
                now(),
            )
            .await
            .unwrap();
        assert!(matches!(result, Err(RejectionReason::ContentRejected { .. })));

        // The quota is still there to use.
        submit_text(&moderation, "I love my shirt", now()).await.unwrap();
    }

    #[tokio::test]
    async fn weekly_quota() {
        let moderation = moderation(1).await;
        submit_text(&moderation, "first", now()).await.unwrap();

        let three_days_later = now() + TimeDelta::days(3);
        assert_eq!(
            submit_text(&moderation, "second", three_days_later).await,
            Err(RejectionReason::QuotaExceeded { days_until_reset: 4 })
        );

        let eight_days_later = now() + TimeDelta::days(8);
        let submission = submit_text(&moderation, "second", eight_days_later)
            .await
            .unwrap();
        assert_eq!(submission.content.as_deref(), Some("second"));

        let submitter = moderation.db.get_submitter(&hash()).await.unwrap().unwrap();
        assert_eq!(submitter.weekly_submissions, 1);
        assert_eq!(submitter.weekly_reset_date, Some(eight_days_later));
    }

    #[tokio::test]
    async fn higher_weekly_limit() {
        let moderation = moderation(2).await;
        submit_text(&moderation, "first", now()).await.unwrap();
        submit_text(&moderation, "second", now()).await.unwrap();
        assert_eq!(
            submit_text(&moderation, "third", now()).await,
            Err(RejectionReason::QuotaExceeded { days_until_reset: 7 })
        );
    }

    #[tokio::test]
    async fn concurrent_submissions_share_the_quota() {
        let moderation = moderation(1).await;
        moderation.db.get_or_create(&hash(), now()).await.unwrap();

        let (a, b) = tokio::join!(
            submit_text(&moderation, "first", now()),
            submit_text(&moderation, "second", now()),
        );
        assert_eq!([&a, &b].iter().filter(|x| x.is_ok()).count(), 1);
        assert_eq!(moderation.db.count_pending().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn blocks_round_up_and_run_out() {
        let moderation = moderation(1).await;
        moderation.db.get_or_create(&hash(), now()).await.unwrap();

        let until = now() + TimeDelta::hours(5) + TimeDelta::minutes(1);
        moderation
            .db
            .apply_temporary_block(&hash(), until)
            .await
            .unwrap();

        assert_eq!(
            submit_text(&moderation, "let me in", now()).await,
            Err(RejectionReason::TemporarilyBlocked { remaining_hours: 6 })
        );

        let after = until + TimeDelta::seconds(1);
        submit_text(&moderation, "let me in", after).await.unwrap();

        let submitter = moderation.db.get_submitter(&hash()).await.unwrap().unwrap();
        assert_eq!(submitter.blocked_until, None);
    }

    #[tokio::test]
    async fn forwarding_failure_lets_the_submitter_resend() {
        let moderation = moderation(1).await;
        moderation.outlet.fail_review.store(true, Ordering::SeqCst);

        let result = moderation
            .submit(UserId(USER), ChatId(USER as i64), Some("hello"), None, now())
            .await;
        assert!(matches!(result, Err(IngestionError::Transport(_))));

        assert_eq!(moderation.db.count_pending().await.unwrap(), 0);
        assert_eq!(moderation.db.get_submission(1).await.unwrap(), None);
        let submitter = moderation.db.get_submitter(&hash()).await.unwrap().unwrap();
        assert_eq!(submitter.weekly_submissions, 0);

        moderation.outlet.fail_review.store(false, Ordering::SeqCst);
        let later = now() + TimeDelta::hours(1);
        let submission = submit_text(&moderation, "hello", later).await.unwrap();
        assert!(submission.review_card.is_some());
        assert_eq!(
            moderation.outlet.sent(),
            vec![Sent::ReviewCard {
                submission_id: submission.id,
                strike_count: 0
            }]
        );

        // The quota is used up by the one that made it.
        assert!(matches!(
            submit_text(&moderation, "hello again", later).await,
            Err(RejectionReason::QuotaExceeded { .. })
        ));
    }

    #[tokio::test]
    async fn enough_strikes_mean_banned_even_without_the_flag() {
        let moderation = moderation(1).await;
        moderation.db.get_or_create(&hash(), now()).await.unwrap();
        for _ in 0..10 {
            moderation.db.record_rejection_strike(&hash()).await.unwrap();
        }

        assert_eq!(
            submit_text(&moderation, "hi", now()).await,
            Err(RejectionReason::Banned)
        );
        let submitter = moderation.db.get_submitter(&hash()).await.unwrap().unwrap();
        assert!(submitter.is_banned);
    }
}
