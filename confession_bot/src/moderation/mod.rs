//! The moderation pipeline: submissions come in through [`Moderation::submit`],
//! moderator verdicts through [`Moderation::decide`].

use std::sync::Arc;

use crate::{config::Config, database::Database};

mod decision;
mod ingestion;

pub use decision::DecisionError;
pub use ingestion::{IngestionError, MalformedReason};

/// Shared state of the pipeline. Holds no mutable state of its own besides
/// what's in the database.
pub struct Moderation<O> {
    pub db: Database,
    pub config: Arc<Config>,
    pub outlet: O,
}

impl<O> Moderation<O> {
    pub fn new(db: Database, config: Arc<Config>, outlet: O) -> Self {
        Self { db, config, outlet }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use chrono::{DateTime, Utc};
    use teloxide::types::{ChatId, UserId};

    use super::*;
    use crate::{
        filter::ContentFilter,
        outlet::testing::RecordingOutlet,
        types::{Submission, SubmitterHash},
    };

    pub fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_760_000_000, 0).unwrap()
    }

    pub async fn moderation(weekly_limit: u32) -> Moderation<RecordingOutlet> {
        let config = Config {
            bot_token: "123:abc".to_string(),
            admin_chat: crate::outlet::testing::ADMIN_CHAT,
            channel: ChatId(-2000),
            database_path: String::new(),
            weekly_limit,
            filter: ContentFilter::default_list(),
        };
        Moderation::new(
            Database::in_memory().await.unwrap(),
            Arc::new(config),
            RecordingOutlet::default(),
        )
    }

    /// Store a pending submission straight away, without going through the
    /// policy gates.
    pub async fn pending<O>(moderation: &Moderation<O>, user: u64, text: &str) -> Submission {
        let hash = SubmitterHash::from_user_id(UserId(user));
        moderation.db.get_or_create(&hash, now()).await.unwrap();
        moderation
            .db
            .insert_submission(&hash, ChatId(user as i64), Some(text), None, now())
            .await
            .unwrap()
    }
}
