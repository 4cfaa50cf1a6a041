mod types;

use std::str::FromStr;

use chrono::{DateTime, Utc};
pub use sqlx::Error;
use sqlx::{
    migrate::MigrateDatabase,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Executor, Row, Sqlite,
};
use teloxide::types::ChatId;

use self::types::{
    from_db_time_opt, submission_from_row, submitter_from_row, to_db_time, SUBMISSION_COLUMNS,
    SUBMITTER_COLUMNS,
};
use crate::{
    policy::QUOTA_WINDOW_DAYS,
    types::{ReviewCard, Submission, SubmissionStatus, Submitter, SubmitterHash, Verdict},
};

type Pool = sqlx::Pool<Sqlite>;

/// Persistent state of submitters and their submissions.
///
/// Every method that mutates a row does so with a single statement, which
/// SQLite runs atomically. Conditional writes (`WHERE` on the current value)
/// take the place of read-modify-write sequences, so concurrent callers
/// touching the same submitter or submission never lose an update.
pub struct Database {
    pool: Pool,
}

impl Database {
    pub async fn new(path: &str) -> Result<Database, Error> {
        let url = format!("sqlite:{path}");
        if !Sqlite::database_exists(&url).await.unwrap_or(false) {
            Sqlite::create_database(&url).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(32)
            .connect_with(
                SqliteConnectOptions::from_str(&url)?
                    .pragma("cache_size", "-32768")
                    .foreign_keys(true)
                    .busy_timeout(std::time::Duration::from_secs(600)),
            )
            .await?;

        Self::with_pool(pool).await
    }

    /// Fresh database that lives in memory, for tests.
    #[cfg(test)]
    pub async fn in_memory() -> Result<Database, Error> {
        // An in-memory database exists per connection, so there must be only one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true))
            .await?;

        Self::with_pool(pool).await
    }

    /// Raw access for tests that need to make the database misbehave.
    #[cfg(test)]
    pub(crate) fn pool(&self) -> &sqlx::SqlitePool {
        &self.pool
    }

    async fn with_pool(pool: Pool) -> Result<Database, Error> {
        // SUBMITTERS:
        // submitter_hash (key, truncated hex SHA-256 of the user ID)
        // strike_count (rejected submissions, never decreases)
        // is_banned (0 for no, 1 for yes; never goes back to 0)
        // blocked_until (unix seconds, NULL if not blocked)
        // weekly_submissions (accepted submissions in the current window)
        // weekly_reset_date (unix seconds the current window started at, NULL if none yet)
        // last_submission_at (unix seconds)
        // created_at (unix seconds)
        pool.execute(sqlx::query(
            "CREATE TABLE IF NOT EXISTS submitters (
                submitter_hash TEXT PRIMARY KEY NOT NULL,
                strike_count INTEGER NOT NULL DEFAULT 0,
                is_banned INTEGER NOT NULL DEFAULT 0,
                blocked_until INTEGER NULL,
                weekly_submissions INTEGER NOT NULL DEFAULT 0,
                weekly_reset_date INTEGER NULL,
                last_submission_at INTEGER NULL,
                created_at INTEGER NOT NULL
            ) STRICT;",
        ))
        .await?;

        // SUBMISSIONS:
        // id (key, doubles as the public confession number)
        // submitter_hash (who sent it)
        // sender_id (chat ID to notify the sender in; never shown or published)
        // content (text or photo caption, may be NULL)
        // media_ref (Telegram file ID of the photo, may be NULL)
        // status (0 for pending, 1 for approved, 2 for rejected)
        // review_chat_id, review_message_id (where the review card is, may be NULL)
        // created_at (unix seconds)
        // decided_at (unix seconds, NULL while pending)
        // decided_by (name of the moderator, NULL while pending)
        pool.execute(sqlx::query(
            "CREATE TABLE IF NOT EXISTS submissions (
                id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
                submitter_hash TEXT NOT NULL REFERENCES submitters(submitter_hash),
                sender_id INTEGER NOT NULL,
                content TEXT NULL,
                media_ref TEXT NULL,
                status INTEGER NOT NULL DEFAULT 0,
                review_chat_id INTEGER NULL,
                review_message_id INTEGER NULL,
                created_at INTEGER NOT NULL,
                decided_at INTEGER NULL,
                decided_by TEXT NULL,
                CHECK (content IS NOT NULL OR media_ref IS NOT NULL)
            ) STRICT;",
        ))
        .await?;

        pool.execute(sqlx::query(
            "CREATE INDEX IF NOT EXISTS submissions_status ON submissions(status);",
        ))
        .await?;

        Ok(Database { pool })
    }

    /// Fetch the submitter, creating them with clean state if they're new.
    /// Either way, their last submission time is set to `now`.
    pub async fn get_or_create(
        &self,
        hash: &SubmitterHash,
        now: DateTime<Utc>,
    ) -> Result<Submitter, Error> {
        let now = to_db_time(now);
        sqlx::query(&format!(
            "INSERT INTO submitters(submitter_hash, last_submission_at, created_at)
                VALUES (?, ?, ?)
            ON CONFLICT(submitter_hash) DO
                UPDATE SET last_submission_at=excluded.last_submission_at
            RETURNING {SUBMITTER_COLUMNS};"
        ))
        .bind(hash.as_str())
        .bind(now)
        .bind(now)
        .try_map(submitter_from_row)
        .fetch_one(&self.pool)
        .await
    }

    /// Returns [`None`] if there's no such submitter.
    pub async fn get_submitter(&self, hash: &SubmitterHash) -> Result<Option<Submitter>, Error> {
        sqlx::query(&format!(
            "SELECT {SUBMITTER_COLUMNS} FROM submitters WHERE submitter_hash=?;"
        ))
        .bind(hash.as_str())
        .try_map(submitter_from_row)
        .fetch_optional(&self.pool)
        .await
    }

    /// Add a strike to the submitter and return their state after it.
    ///
    /// Errors with [`Error::RowNotFound`] if there's no such submitter.
    pub async fn record_rejection_strike(&self, hash: &SubmitterHash) -> Result<Submitter, Error> {
        sqlx::query(&format!(
            "UPDATE submitters SET strike_count=strike_count+1
            WHERE submitter_hash=?
            RETURNING {SUBMITTER_COLUMNS};"
        ))
        .bind(hash.as_str())
        .try_map(submitter_from_row)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(Error::RowNotFound)
    }

    /// Ban the submitter for good. Banning twice changes nothing.
    pub async fn apply_ban(&self, hash: &SubmitterHash) -> Result<(), Error> {
        sqlx::query("UPDATE submitters SET is_banned=1 WHERE submitter_hash=?;")
            .bind(hash.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Block the submitter until the given moment. Blocking twice with the
    /// same moment changes nothing.
    pub async fn apply_temporary_block(
        &self,
        hash: &SubmitterHash,
        until: DateTime<Utc>,
    ) -> Result<(), Error> {
        sqlx::query("UPDATE submitters SET blocked_until=? WHERE submitter_hash=?;")
            .bind(to_db_time(until))
            .bind(hash.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Remove the submitter's block if it has run out by `now`.
    ///
    /// Returns `true` if a block was cleared.
    pub async fn clear_expired_block(
        &self,
        hash: &SubmitterHash,
        now: DateTime<Utc>,
    ) -> Result<bool, Error> {
        let result = sqlx::query(
            "UPDATE submitters SET blocked_until=NULL
            WHERE submitter_hash=? AND blocked_until<=?;",
        )
        .bind(hash.as_str())
        .bind(to_db_time(now))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Start a new quota window at `now`, if the current one is over.
    ///
    /// Returns `true` if the window was reset by this call, `false` if it was
    /// still running, i.e. because a concurrent call has just reset it.
    pub async fn reset_weekly_window(
        &self,
        hash: &SubmitterHash,
        now: DateTime<Utc>,
    ) -> Result<bool, Error> {
        let now = to_db_time(now);
        let window_start_cutoff = now - QUOTA_WINDOW_DAYS * 24 * 60 * 60;
        let result = sqlx::query(
            "UPDATE submitters SET weekly_submissions=0, weekly_reset_date=?
            WHERE
                submitter_hash=? AND
                COALESCE(weekly_reset_date<=?, 1);",
        )
        .bind(now)
        .bind(hash.as_str())
        .bind(window_start_cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Count one accepted submission against the quota, unless it's already
    /// used up.
    ///
    /// Returns `false` if the quota was already at `limit`.
    pub async fn increment_weekly_submission(
        &self,
        hash: &SubmitterHash,
        limit: u32,
    ) -> Result<bool, Error> {
        let result = sqlx::query(
            "UPDATE submitters SET weekly_submissions=weekly_submissions+1
            WHERE submitter_hash=? AND weekly_submissions<?;",
        )
        .bind(hash.as_str())
        .bind(limit)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Give back one quota slot taken by [`Self::increment_weekly_submission`].
    /// Never goes below zero.
    pub async fn release_weekly_submission(&self, hash: &SubmitterHash) -> Result<(), Error> {
        sqlx::query(
            "UPDATE submitters SET weekly_submissions=weekly_submissions-1
            WHERE submitter_hash=? AND weekly_submissions>0;",
        )
        .bind(hash.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Store a new pending submission. Its ID is assigned here.
    pub async fn insert_submission(
        &self,
        hash: &SubmitterHash,
        sender_id: ChatId,
        content: Option<&str>,
        media_ref: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Submission, Error> {
        sqlx::query(&format!(
            "INSERT INTO submissions(submitter_hash, sender_id, content, media_ref, status, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
            RETURNING {SUBMISSION_COLUMNS};"
        ))
        .bind(hash.as_str())
        .bind(sender_id.0)
        .bind(content)
        .bind(media_ref)
        .bind::<u8>(SubmissionStatus::Pending.into())
        .bind(to_db_time(now))
        .try_map(submission_from_row)
        .fetch_one(&self.pool)
        .await
    }

    /// Delete a submission that never made it to the moderators, i.e. is
    /// still pending and has no review card.
    ///
    /// Returns `true` if it was deleted.
    pub async fn delete_unforwarded_submission(&self, id: i64) -> Result<bool, Error> {
        let result = sqlx::query(
            "DELETE FROM submissions
            WHERE id=? AND status=? AND review_chat_id IS NULL;",
        )
        .bind(id)
        .bind::<u8>(SubmissionStatus::Pending.into())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// When the latest rejected submission of this submitter was decided on.
    /// Returns [`None`] if they have none.
    pub async fn last_rejection_at(
        &self,
        hash: &SubmitterHash,
    ) -> Result<Option<DateTime<Utc>>, Error> {
        let seconds: Option<i64> = sqlx::query(
            "SELECT MAX(decided_at) FROM submissions WHERE submitter_hash=? AND status=?;",
        )
        .bind(hash.as_str())
        .bind::<u8>(SubmissionStatus::Rejected.into())
        .map(|row: SqliteRow| row.get(0))
        .fetch_one(&self.pool)
        .await?;
        from_db_time_opt(seconds)
    }

    /// Returns [`None`] if there's no such submission.
    pub async fn get_submission(&self, id: i64) -> Result<Option<Submission>, Error> {
        sqlx::query(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE id=?;"
        ))
        .bind(id)
        .try_map(submission_from_row)
        .fetch_optional(&self.pool)
        .await
    }

    /// Move a pending submission to the status the verdict calls for.
    ///
    /// Returns `true` if this call made the transition, and `false` if the
    /// submission doesn't exist or was not pending anymore, i.e. someone else
    /// decided on it first.
    pub async fn transition_submission(
        &self,
        id: i64,
        verdict: Verdict,
        decided_by: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, Error> {
        let result = sqlx::query(
            "UPDATE submissions SET status=?, decided_at=?, decided_by=?
            WHERE id=? AND status=?;",
        )
        .bind::<u8>(SubmissionStatus::from(verdict).into())
        .bind(to_db_time(now))
        .bind(decided_by)
        .bind(id)
        .bind::<u8>(SubmissionStatus::Pending.into())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Remember where the review card of this submission is.
    pub async fn set_review_card(&self, id: i64, card: ReviewCard) -> Result<(), Error> {
        sqlx::query("UPDATE submissions SET review_chat_id=?, review_message_id=? WHERE id=?;")
            .bind(card.chat_id.0)
            .bind(card.message_id.0)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Amount of submissions awaiting a decision.
    pub async fn count_pending(&self) -> Result<u32, Error> {
        sqlx::query("SELECT COUNT(*) FROM submissions WHERE status=?;")
            .bind::<u8>(SubmissionStatus::Pending.into())
            .map(|row: SqliteRow| row.get(0))
            .fetch_one(&self.pool)
            .await
    }
}
