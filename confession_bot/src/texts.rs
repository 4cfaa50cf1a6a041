//! Static texts the bot replies with. All of it is HTML.

use crate::moderation::{DecisionError, IngestionError, MalformedReason};

pub const START: &str = "💭 <b>Welcome to the confession bot!</b>

This is a safe space where you can share your thoughts anonymously.

🔒 <b>Your identity is protected</b>: only a one-way hash of your account ID is stored, and it can't be traced back to you.

📝 <b>What you can share:</b>
• Relationship confessions
• Mental health experiences
• Personal stories
• Anything on your mind

✨ <b>How it works:</b>
1. Send me your message (text or a photo)
2. Your confession will be reviewed
3. If approved, it will be posted to our channel anonymously

Please read the /rules before sending anything.

Ready? Just type your confession and send it to me! 💬";

pub const RULES: &str = "📜 <b>Community Rules</b>

1️⃣ <b>Be Respectful</b>: treat others with kindness
2️⃣ <b>No Hate Speech</b>: discrimination is not tolerated
3️⃣ <b>No Harassment</b>: don't target individuals
4️⃣ <b>No Illegal Content</b>: keep it legal
5️⃣ <b>No Spam</b>: quality over quantity
6️⃣ <b>No Personal Info</b>: protect yourself and others

Every rejected confession counts as a strike.
• 3 strikes: a warning
• 5 strikes: blocked for 24 hours
• 6 strikes: blocked for 48 hours
• 7 to 9 strikes: blocked for 72 hours
• 10 strikes: banned for good";

pub const RECEIVED_TEXT: &str =
    "✅ Your confession has been received and is pending review. Thank you for sharing! 💙";

pub const RECEIVED_IMAGE: &str =
    "✅ Your image confession has been received and is pending review. Thank you for sharing! 💙";

pub const ONLY_TEXT_AND_PHOTOS: &str =
    "🤔 Only text and photo confessions are supported. Please send your confession as a text message or a photo.";

pub const SOMETHING_WENT_WRONG: &str = "❌ Sorry, something went wrong. Please try again later.";

pub const ACCESS_DENIED: &str = "Only moderators can do this.";

/// Reply to the submitter when their submission could not be taken in.
pub fn ingestion_failure(error: &IngestionError) -> String {
    match error {
        IngestionError::Malformed(MalformedReason::Empty) => {
            "🤔 Your confession seems to be empty. Please write something!".to_string()
        }
        IngestionError::Malformed(MalformedReason::TooLong { limit }) => format!(
            "✂️ Your confession is too long. Please keep it under {limit} characters."
        ),
        // Nothing was kept in either case, so trying again is fine.
        IngestionError::Storage(_) | IngestionError::Transport(_) => {
            SOMETHING_WENT_WRONG.to_string()
        }
    }
}

/// Answer to the moderator whose decision did not go through.
pub fn decision_failure(error: &DecisionError) -> String {
    match error {
        DecisionError::NotFound(id) => format!("Submission #{id} does not exist."),
        DecisionError::AlreadyDecided(status) => {
            format!("This submission was already {status}.")
        }
        DecisionError::Storage(_) => {
            "Something went wrong. The decision may be only partially applied.".to_string()
        }
    }
}

pub fn pending_count(count: u32) -> String {
    match count {
        0 => "📭 No confessions are waiting for review.".to_string(),
        1 => "📬 1 confession is waiting for review.".to_string(),
        n => format!("📬 {n} confessions are waiting for review."),
    }
}
