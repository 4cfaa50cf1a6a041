use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};
use teloxide::types::{ChatId, MessageId};

use super::Error;
use crate::types::{ReviewCard, Submission, SubmissionStatus, Submitter, SubmitterHash};

/// Timestamps are stored as unix seconds, so that SQLite can compare them.
pub(super) fn to_db_time(time: DateTime<Utc>) -> i64 {
    time.timestamp()
}

fn from_db_time(seconds: i64) -> Result<DateTime<Utc>, Error> {
    DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| Error::Decode(format!("Timestamp out of range: {seconds}").into()))
}

pub(super) fn from_db_time_opt(seconds: Option<i64>) -> Result<Option<DateTime<Utc>>, Error> {
    seconds.map(from_db_time).transpose()
}

/// Columns of `submitters`, in the order [`submitter_from_row`] expects.
pub(super) const SUBMITTER_COLUMNS: &str = "
    submitter_hash,
    strike_count,
    is_banned,
    blocked_until,
    weekly_submissions,
    weekly_reset_date,
    last_submission_at,
    created_at";

pub(super) fn submitter_from_row(row: SqliteRow) -> Result<Submitter, Error> {
    Ok(Submitter {
        hash: SubmitterHash::from_stored(row.try_get(0)?),
        strike_count: row.try_get(1)?,
        is_banned: row.try_get(2)?,
        blocked_until: from_db_time_opt(row.try_get(3)?)?,
        weekly_submissions: row.try_get(4)?,
        weekly_reset_date: from_db_time_opt(row.try_get(5)?)?,
        last_submission_at: from_db_time_opt(row.try_get(6)?)?,
        created_at: from_db_time(row.try_get(7)?)?,
    })
}

/// Columns of `submissions`, in the order [`submission_from_row`] expects.
pub(super) const SUBMISSION_COLUMNS: &str = "
    id,
    submitter_hash,
    sender_id,
    content,
    media_ref,
    status,
    review_chat_id,
    review_message_id,
    created_at,
    decided_at,
    decided_by";

pub(super) fn submission_from_row(row: SqliteRow) -> Result<Submission, Error> {
    let status: u8 = row.try_get(5)?;
    let status = SubmissionStatus::try_from(status)
        .map_err(|value| Error::Decode(format!("Unknown submission status: {value}").into()))?;

    let review_chat_id: Option<i64> = row.try_get(6)?;
    let review_message_id: Option<i32> = row.try_get(7)?;
    let review_card = review_chat_id
        .zip(review_message_id)
        .map(|(chat_id, message_id)| ReviewCard {
            chat_id: ChatId(chat_id),
            message_id: MessageId(message_id),
        });

    Ok(Submission {
        id: row.try_get(0)?,
        submitter_hash: SubmitterHash::from_stored(row.try_get(1)?),
        sender_id: ChatId(row.try_get(2)?),
        content: row.try_get(3)?,
        media_ref: row.try_get(4)?,
        status,
        review_card,
        created_at: from_db_time(row.try_get(8)?)?,
        decided_at: from_db_time_opt(row.try_get(9)?)?,
        decided_by: row.try_get(10)?,
    })
}
