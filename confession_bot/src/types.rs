use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use teloxide::types::{ChatId, MessageId, UserId};

use crate::policy::StrikeTier;

/// One-way hash of a Telegram user ID. This is the only thing that identifies a
/// submitter in the `submitters` table.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct SubmitterHash(String);

impl SubmitterHash {
    /// Length of the hex prefix of the SHA-256 digest that is kept.
    const LEN: usize = 16;

    pub fn from_user_id(user: UserId) -> Self {
        let digest = Sha256::digest(user.0.to_string().as_bytes());
        let mut hex = hex::encode(digest);
        hex.truncate(Self::LEN);
        Self(hex)
    }

    /// Wraps a hash that was already computed, i.e. read from the database.
    pub(crate) fn from_stored(hash: String) -> Self {
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SubmitterHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionStatus {
    Pending = 0,
    Approved = 1,
    Rejected = 2,
}

impl TryFrom<u8> for SubmissionStatus {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use SubmissionStatus::*;
        match value {
            value if value == Pending as u8 => Ok(Pending),
            value if value == Approved as u8 => Ok(Approved),
            value if value == Rejected as u8 => Ok(Rejected),
            value => Err(value),
        }
    }
}

impl From<SubmissionStatus> for u8 {
    fn from(value: SubmissionStatus) -> Self {
        value as u8
    }
}

impl Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Approved => "approved",
            SubmissionStatus::Rejected => "rejected",
        })
    }
}

/// What a moderator decided about a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Approve,
    Reject,
}

impl Verdict {
    fn callback_prefix(self) -> &'static str {
        match self {
            Verdict::Approve => "approve",
            Verdict::Reject => "reject",
        }
    }
}

impl From<Verdict> for SubmissionStatus {
    fn from(value: Verdict) -> Self {
        match value {
            Verdict::Approve => SubmissionStatus::Approved,
            Verdict::Reject => SubmissionStatus::Rejected,
        }
    }
}

/// Per-submitter policy state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submitter {
    pub hash: SubmitterHash,
    pub strike_count: u32,
    pub is_banned: bool,
    pub blocked_until: Option<DateTime<Utc>>,
    pub weekly_submissions: u32,
    pub weekly_reset_date: Option<DateTime<Utc>>,
    pub last_submission_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Location of the moderator-facing message with the approve/reject buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewCard {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub id: i64,
    pub submitter_hash: SubmitterHash,
    /// Private chat to send notifications about this submission to.
    /// Never shown to moderators or published.
    pub sender_id: ChatId,
    pub content: Option<String>,
    pub media_ref: Option<String>,
    pub status: SubmissionStatus,
    pub review_card: Option<ReviewCard>,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decided_by: Option<String>,
}

impl Submission {
    pub fn has_media(&self) -> bool {
        self.media_ref.is_some()
    }
}

/// Why a submission was turned away by a policy gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    Banned,
    TemporarilyBlocked { remaining_hours: u32 },
    ContentRejected { matched_term: String },
    QuotaExceeded { days_until_reset: u32 },
}

impl Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectionReason::Banned => write!(f, "❌ You have been banned from using this bot."),
            RejectionReason::TemporarilyBlocked { remaining_hours } => write!(
                f,
                "⏳ You are temporarily blocked from sending confessions.\n\n\
                Please try again in {} {}.",
                remaining_hours,
                plural(*remaining_hours, "hour", "hours")
            ),
            // The matched term is deliberately not echoed back.
            RejectionReason::ContentRejected { .. } => {
                f.write_str(crate::filter::BANNED_CONTENT_MESSAGE)
            }
            RejectionReason::QuotaExceeded { days_until_reset } => write!(
                f,
                "📅 You have reached your weekly confession limit.\n\n\
                You can send a new confession in {} {}.",
                days_until_reset,
                plural(*days_until_reset, "day", "days")
            ),
        }
    }
}

/// Messages sent to the submitter about the fate of their submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Approved,
    RejectedPlain,
    RejectedWarning { strike_count: u32 },
    RejectedBlocked { strike_count: u32, hours: u32 },
    RejectedBanned { strike_count: u32 },
}

impl Notice {
    pub fn for_rejection(strike_count: u32, tier: StrikeTier) -> Self {
        match tier {
            StrikeTier::Notice => Notice::RejectedPlain,
            StrikeTier::Warning => Notice::RejectedWarning { strike_count },
            StrikeTier::Blocked { hours } => Notice::RejectedBlocked {
                strike_count,
                hours,
            },
            StrikeTier::Banned => Notice::RejectedBanned { strike_count },
        }
    }
}

impl Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        const NOT_APPROVED: &str = "😔 Unfortunately, your confession was not approved. \
            This could be due to content guidelines.";

        match self {
            Notice::Approved => f.write_str(
                "🎉 Great news! Your confession has been approved and posted to the channel. \
                Thank you for sharing! 💙",
            ),
            Notice::RejectedPlain => write!(
                f,
                "{NOT_APPROVED} Feel free to try again with a different message."
            ),
            Notice::RejectedWarning { strike_count } => write!(
                f,
                "{NOT_APPROVED}\n\n⚠️ <b>Warning:</b> you now have {strike_count} strikes. \
                Reaching 5 strikes will temporarily block you from sending confessions."
            ),
            Notice::RejectedBlocked {
                strike_count,
                hours,
            } => write!(
                f,
                "{NOT_APPROVED}\n\n⛔ You now have {strike_count} strikes and are blocked \
                from sending confessions for {hours} hours."
            ),
            Notice::RejectedBanned { strike_count } => write!(
                f,
                "{NOT_APPROVED}\n\n🚫 You have reached {strike_count} strikes and have been \
                permanently banned from using this bot."
            ),
        }
    }
}

/// Data attached to the approve/reject buttons of a review card, shaped as
/// `"<approve|reject>_<submission id>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewCallbackData {
    pub verdict: Verdict,
    pub submission_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallbackDataError {
    #[error("no separator in callback data")]
    NoSeparator,
    #[error("unknown action: {0}")]
    UnknownAction(String),
    #[error("invalid submission id: {0}")]
    InvalidId(String),
}

impl FromStr for ReviewCallbackData {
    type Err = CallbackDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (action, id) = s.split_once('_').ok_or(CallbackDataError::NoSeparator)?;

        let verdict = match action {
            "approve" => Verdict::Approve,
            "reject" => Verdict::Reject,
            _ => return Err(CallbackDataError::UnknownAction(action.to_string())),
        };

        // Only plain digits; `i64::from_str` would also take a leading sign.
        if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CallbackDataError::InvalidId(id.to_string()));
        }
        let submission_id = id
            .parse()
            .map_err(|_| CallbackDataError::InvalidId(id.to_string()))?;

        Ok(ReviewCallbackData {
            verdict,
            submission_id,
        })
    }
}

impl Display for ReviewCallbackData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.verdict.callback_prefix(), self.submission_id)
    }
}

fn plural<'a>(n: u32, one: &'a str, many: &'a str) -> &'a str {
    if n == 1 {
        one
    } else {
        many
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submitter_hash_is_stable_and_short() {
        let a = SubmitterHash::from_user_id(UserId(1366743555));
        let b = SubmitterHash::from_user_id(UserId(1366743555));
        let c = SubmitterHash::from_user_id(UserId(1366743556));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), 16);
        assert!(a.as_str().bytes().all(|b| b.is_ascii_hexdigit()));
        assert!(!a.as_str().contains("1366743555"));
    }

    #[test]
    fn submitter_hash_matches_sha256_prefix() {
        // sha256("42") = 73475cb40a568e8da8a045ced110137e159f890ac4da883b6b17dc651b3a8049
        let hash = SubmitterHash::from_user_id(UserId(42));
        assert_eq!(hash.as_str(), "73475cb40a568e8d");
    }

    #[test]
    fn parsing_callback_data() {
        let data: ReviewCallbackData = "approve_17".parse().unwrap();
        assert_eq!(data.verdict, Verdict::Approve);
        assert_eq!(data.submission_id, 17);

        let data: ReviewCallbackData = "reject_3".parse().unwrap();
        assert_eq!(data.verdict, Verdict::Reject);
        assert_eq!(data.submission_id, 3);
        assert_eq!(data.to_string(), "reject_3");

        assert_eq!(
            "approve".parse::<ReviewCallbackData>(),
            Err(CallbackDataError::NoSeparator)
        );
        assert!(matches!(
            "delete_3".parse::<ReviewCallbackData>(),
            Err(CallbackDataError::UnknownAction(_))
        ));
        assert!(matches!(
            "approve_".parse::<ReviewCallbackData>(),
            Err(CallbackDataError::InvalidId(_))
        ));
        assert!(matches!(
            "approve_+3".parse::<ReviewCallbackData>(),
            Err(CallbackDataError::InvalidId(_))
        ));
        assert!(matches!(
            "reject_1_2".parse::<ReviewCallbackData>(),
            Err(CallbackDataError::InvalidId(_))
        ));
    }

    #[test]
    fn status_roundtrips_through_storage_value() {
        for status in [
            SubmissionStatus::Pending,
            SubmissionStatus::Approved,
            SubmissionStatus::Rejected,
        ] {
            assert_eq!(SubmissionStatus::try_from(u8::from(status)), Ok(status));
        }
        assert_eq!(SubmissionStatus::try_from(7), Err(7));
    }

    #[test]
    fn user_facing_texts_have_no_enum_names() {
        let text = RejectionReason::TemporarilyBlocked { remaining_hours: 1 }.to_string();
        assert!(text.contains("1 hour."));
        assert!(!text.contains("TemporarilyBlocked"));

        let text = RejectionReason::QuotaExceeded { days_until_reset: 4 }.to_string();
        assert!(text.contains("4 days"));

        let text = Notice::RejectedBlocked {
            strike_count: 6,
            hours: 48,
        }
        .to_string();
        assert!(text.contains("6 strikes"));
        assert!(text.contains("48 hours"));
    }
}
