use std::{fmt::Display, future::Future};

use chrono::{DateTime, Utc};

use super::Moderation;
use crate::{
    database,
    outlet::{closed_review_card_text, ModerationOutlet},
    policy::StrikeTier,
    types::{Notice, SubmissionStatus, Verdict},
};

#[derive(Debug, thiserror::Error)]
pub enum DecisionError {
    #[error("submission #{0} does not exist")]
    NotFound(i64),
    #[error("submission was already {0}")]
    AlreadyDecided(SubmissionStatus),
    #[error("storage failure: {0}")]
    Storage(#[from] database::Error),
}

/// How a best-effort side effect of a decision went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectResult {
    Done,
    Failed,
    /// Not attempted, as it didn't apply.
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SideEffects {
    pub published: EffectResult,
    /// Storing the block or ban a rejection called for.
    pub escalated: EffectResult,
    pub notified: EffectResult,
    pub card_updated: EffectResult,
}

impl Default for SideEffects {
    fn default() -> Self {
        Self {
            published: EffectResult::Skipped,
            escalated: EffectResult::Skipped,
            notified: EffectResult::Skipped,
            card_updated: EffectResult::Skipped,
        }
    }
}

/// Strike added to the submitter by a rejection, and what it led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrikeDelta {
    pub strike_count: u32,
    pub tier: StrikeTier,
    /// Set if the submitter got temporarily blocked.
    pub blocked_until: Option<DateTime<Utc>>,
}

impl Display for StrikeDelta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Strike {}: {}", self.strike_count, self.tier)
    }
}

/// What a decision did. The verdict always stuck if this is returned; the
/// side effects may have failed independently of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionOutcome {
    pub submission_id: i64,
    pub verdict: Verdict,
    pub strike: Option<StrikeDelta>,
    pub effects: SideEffects,
}

impl DecisionOutcome {
    /// Short summary for the moderator who made the decision.
    pub fn summary(&self) -> String {
        let mut text = match self.verdict {
            Verdict::Approve => format!("Approved #{}.", self.submission_id),
            Verdict::Reject => format!("Rejected #{}.", self.submission_id),
        };

        if let Some(strike) = &self.strike {
            text.push(' ');
            text.push_str(&strike.to_string());
            text.push('.');
        }

        if self.effects.published == EffectResult::Failed {
            text.push_str(" Failed to post it to the channel!");
        }
        if self.effects.escalated == EffectResult::Failed {
            text.push_str(" Failed to store the block or ban, it gets enforced on their next submission.");
        }
        if self.effects.notified == EffectResult::Failed {
            text.push_str(" The sender could not be notified.");
        }

        text
    }
}

/// Await a side effect, logging and swallowing its failure.
async fn best_effort<E: Display>(
    what: &str,
    submission_id: i64,
    effect: impl Future<Output = Result<(), E>>,
) -> EffectResult {
    match effect.await {
        Ok(()) => EffectResult::Done,
        Err(e) => {
            log::warn!("Failed to {what} for submission #{submission_id}: {e}");
            EffectResult::Failed
        }
    }
}

impl<O: ModerationOutlet> Moderation<O> {
    /// Apply a moderator's verdict to a pending submission.
    ///
    /// Only the first decision on a submission goes through, even if several
    /// moderators press the buttons at the same time. The others get
    /// [`DecisionError::AlreadyDecided`] and change nothing.
    ///
    /// Approval posts the submission to the channel. Rejection gives the
    /// submitter a strike, and blocks or bans them if they have enough of
    /// those. Either way the sender is notified and the review card is closed,
    /// but failures to do so are only logged and reported in the outcome.
    ///
    /// # Errors
    ///
    /// Errors if there's no such submission, if it's been decided on already,
    /// or if the database fails. If the database fails after the verdict was
    /// stored, the verdict stays.
    pub async fn decide(
        &self,
        submission_id: i64,
        verdict: Verdict,
        moderator: &str,
        now: DateTime<Utc>,
    ) -> Result<DecisionOutcome, DecisionError> {
        let submission = self
            .db
            .get_submission(submission_id)
            .await?
            .ok_or(DecisionError::NotFound(submission_id))?;

        if submission.status != SubmissionStatus::Pending {
            return Err(DecisionError::AlreadyDecided(submission.status));
        }

        if !self
            .db
            .transition_submission(submission_id, verdict, moderator, now)
            .await?
        {
            // Lost the race to another moderator.
            let status = self
                .db
                .get_submission(submission_id)
                .await?
                .ok_or(DecisionError::NotFound(submission_id))?
                .status;
            log::debug!("Decision on #{submission_id} by {moderator} lost the race, it's {status}.");
            return Err(DecisionError::AlreadyDecided(status));
        }

        log::info!("Submission #{submission_id}: {verdict:?} by {moderator}.");

        let mut effects = SideEffects::default();

        let strike = match verdict {
            Verdict::Approve => {
                effects.published = best_effort(
                    "publish",
                    submission_id,
                    self.outlet.publish(
                        submission.content.as_deref(),
                        submission.media_ref.as_deref(),
                        submission_id,
                    ),
                )
                .await;

                // Don't claim it's posted when it isn't.
                if effects.published == EffectResult::Done {
                    effects.notified = best_effort(
                        "notify the sender",
                        submission_id,
                        self.outlet.notify(submission.sender_id, Notice::Approved),
                    )
                    .await;
                }
                None
            }
            Verdict::Reject => {
                let hash = &submission.submitter_hash;
                let submitter = self.db.record_rejection_strike(hash).await?;
                let strike_count = submitter.strike_count;
                let tier = StrikeTier::for_strike_count(strike_count);
                let blocked_until = tier.block_until(now);

                // A failure here is made up for by the ingestion gates, which
                // derive the tier from the strike count as well.
                effects.escalated = match (tier, blocked_until) {
                    (StrikeTier::Banned, _) => {
                        best_effort("ban the submitter", submission_id, self.db.apply_ban(hash))
                            .await
                    }
                    (_, Some(until)) => {
                        best_effort(
                            "block the submitter",
                            submission_id,
                            self.db.apply_temporary_block(hash, until),
                        )
                        .await
                    }
                    _ => EffectResult::Skipped,
                };
                if effects.escalated == EffectResult::Done {
                    log::info!("Submitter {hash} is now {tier} at {strike_count} strikes.");
                }

                effects.notified = best_effort(
                    "notify the sender",
                    submission_id,
                    self.outlet.notify(
                        submission.sender_id,
                        Notice::for_rejection(strike_count, tier),
                    ),
                )
                .await;

                Some(StrikeDelta {
                    strike_count,
                    tier,
                    blocked_until,
                })
            }
        };

        if let Some(card) = submission.review_card {
            let tier_text = strike.map(|strike| strike.to_string());
            let text =
                closed_review_card_text(&submission, verdict, moderator, tier_text.as_deref());
            effects.card_updated = best_effort(
                "close the review card",
                submission_id,
                self.outlet
                    .close_review_card(card, submission.has_media(), &text),
            )
            .await;
        }

        Ok(DecisionOutcome {
            submission_id,
            verdict,
            strike,
            effects,
        })
    }
}
