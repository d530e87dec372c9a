pub mod counts;

use crate::error::Result;
use crate::models::Poll;
use chrono::{DateTime, Utc};
use log::{info, warn};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::Row;
use std::str::FromStr;
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// A poll as stored, plus the version used for optimistic writes.
#[derive(Debug, Clone)]
pub struct PollRow {
    pub poll: Poll,
    pub version: i64,
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn connect(db_url: &str, max_connections: u32) -> Result<Self> {
        // Create the database file if it doesn't exist
        let options = SqliteConnectOptions::from_str(db_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT);

        let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections);

        // Every connection to an in-memory url gets its own empty database,
        // which disappears when that connection is closed
        if is_in_memory(db_url) {
            if max_connections > 1 {
                warn!("In-memory database url {}, limiting pool to one connection", db_url);
            }
            pool_options = pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options.connect_with(options).await?;

        Self::init_schema(&pool).await?;
        info!("Connected to {}", db_url);

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // Initialize the database schema
    async fn init_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS polls (
                id TEXT PRIMARY KEY,
                question TEXT NOT NULL,
                options TEXT NOT NULL,
                votes TEXT NOT NULL,
                created_at TEXT,
                version INTEGER NOT NULL DEFAULT 0
            );
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Inserts a new poll unless its id is taken. Returns `false` on collision.
    pub async fn insert_poll_if_absent(&self, poll: &Poll) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO polls (id, question, options, votes, created_at, version)
            VALUES (?, ?, ?, ?, ?, 0)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&poll.id)
        .bind(&poll.question)
        .bind(serde_json::to_string(&poll.options)?)
        .bind(counts::encode_votes(&poll.votes)?)
        .bind(poll.created_at.map(|dt| dt.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    // Get a poll by ID
    pub async fn fetch_poll(&self, poll_id: &str) -> Result<Option<PollRow>> {
        let row = sqlx::query(
            r#"
            SELECT id, question, options, votes, created_at, version
            FROM polls
            WHERE id = ?
            "#,
        )
        .bind(poll_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| decode_row(&row)).transpose()
    }

    // All polls, read by a single statement
    pub async fn fetch_polls(&self) -> Result<Vec<PollRow>> {
        sqlx::query(
            r#"
            SELECT id, question, options, votes, created_at, version
            FROM polls
            "#,
        )
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(decode_row)
        .collect()
    }

    /// Replaces the vote counts only if the row is still at `version`.
    ///
    /// Returns `false` when another writer got there first or the poll is gone.
    pub async fn update_votes_if_unchanged(
        &self,
        poll_id: &str,
        votes_json: &str,
        version: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE polls
            SET votes = ?, version = version + 1
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(votes_json)
        .bind(poll_id)
        .bind(version)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    // Delete a poll, returning whether it existed
    pub async fn delete_poll(&self, poll_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM polls WHERE id = ?")
            .bind(poll_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }
}

/// Both `sqlite::memory:` and `file:name?mode=memory` forms.
fn is_in_memory(db_url: &str) -> bool {
    db_url.contains(":memory:") || db_url.contains("mode=memory")
}

fn decode_row(row: &SqliteRow) -> Result<PollRow> {
    let id: String = row.try_get("id")?;
    let options: Vec<String> = serde_json::from_str(&row.try_get::<String, _>("options")?)?;
    let votes = counts::decode_votes(&row.try_get::<String, _>("votes")?)?;
    let created_at = match row.try_get::<Option<String>, _>("created_at")? {
        Some(raw) => match DateTime::parse_from_rfc3339(&raw) {
            Ok(dt) => Some(dt.with_timezone(&Utc)),
            Err(e) => {
                warn!("Poll {} has unreadable created_at {:?}: {}", id, raw, e);
                None
            }
        },
        None => None,
    };

    Ok(PollRow {
        poll: Poll {
            id,
            question: row.try_get("question")?,
            options,
            votes,
            created_at,
        },
        version: row.try_get("version")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_db() -> Database {
        Database::connect("sqlite::memory:", 5).await.unwrap()
    }

    fn poll(id: &str) -> Poll {
        Poll::new(id.into(), "Best color?".into(), vec!["Red".into(), "Blue".into()])
    }

    #[tokio::test]
    async fn insert_reports_collision() {
        let db = memory_db().await;
        assert!(db.insert_poll_if_absent(&poll("aaaaaaaa")).await.unwrap());
        assert!(!db.insert_poll_if_absent(&poll("aaaaaaaa")).await.unwrap());
        assert_eq!(db.fetch_polls().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stored_poll_reads_back() {
        let db = memory_db().await;
        let original = poll("bbbbbbbb");
        db.insert_poll_if_absent(&original).await.unwrap();

        let row = db.fetch_poll("bbbbbbbb").await.unwrap().unwrap();
        assert_eq!(row.version, 0);
        assert_eq!(row.poll.options, original.options);
        assert_eq!(row.poll.votes, original.votes);
        assert_eq!(
            row.poll.created_at.map(|dt| dt.timestamp()),
            original.created_at.map(|dt| dt.timestamp())
        );
    }

    #[tokio::test]
    async fn stale_version_does_not_write() {
        let db = memory_db().await;
        db.insert_poll_if_absent(&poll("cccccccc")).await.unwrap();

        assert!(db.update_votes_if_unchanged("cccccccc", r#"{"Red":1,"Blue":0}"#, 0).await.unwrap());
        assert!(!db.update_votes_if_unchanged("cccccccc", r#"{"Red":9,"Blue":9}"#, 0).await.unwrap());

        let row = db.fetch_poll("cccccccc").await.unwrap().unwrap();
        assert_eq!(row.version, 1);
        assert_eq!(row.poll.votes["Red"], 1);
    }

    #[tokio::test]
    async fn float_encoded_counts_are_read_as_integers() {
        let db = memory_db().await;
        db.insert_poll_if_absent(&poll("dddddddd")).await.unwrap();
        sqlx::query(r#"UPDATE polls SET votes = '{"Red": 3.0, "Blue": 1}' WHERE id = 'dddddddd'"#)
            .execute(db.pool())
            .await
            .unwrap();

        let row = db.fetch_poll("dddddddd").await.unwrap().unwrap();
        assert_eq!(row.poll.votes["Red"], 3);
        assert_eq!(row.poll.votes["Blue"], 1);
    }

    #[tokio::test]
    async fn delete_reports_missing_poll() {
        let db = memory_db().await;
        db.insert_poll_if_absent(&poll("eeeeeeee")).await.unwrap();
        assert!(db.delete_poll("eeeeeeee").await.unwrap());
        assert!(!db.delete_poll("eeeeeeee").await.unwrap());
        assert!(db.fetch_poll("eeeeeeee").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unreadable_created_at_is_dropped_not_fatal() {
        let db = memory_db().await;
        db.insert_poll_if_absent(&poll("ffffffff")).await.unwrap();
        sqlx::query("UPDATE polls SET created_at = 'garbage' WHERE id = 'ffffffff'")
            .execute(db.pool())
            .await
            .unwrap();

        let row = db.fetch_poll("ffffffff").await.unwrap().unwrap();
        assert_eq!(row.poll.created_at, None);
        assert_eq!(row.poll.question, "Best color?");
        assert_eq!(db.fetch_polls().await.unwrap().len(), 1);
    }

    #[test]
    fn recognises_in_memory_urls() {
        assert!(is_in_memory("sqlite::memory:"));
        assert!(is_in_memory("sqlite:file:polls?mode=memory"));
        assert!(is_in_memory("sqlite:file:polls?mode=memory&cache=shared"));
        assert!(!is_in_memory("sqlite:polls.db"));
        assert!(!is_in_memory("sqlite:file:polls.db?mode=rwc"));
    }

    #[tokio::test]
    async fn mode_memory_url_keeps_one_database() {
        let db = Database::connect("sqlite:file:polls-mem?mode=memory", 5).await.unwrap();
        assert_eq!(db.pool().options().get_max_connections(), 1);

        db.insert_poll_if_absent(&poll("gggggggg")).await.unwrap();
        for _ in 0..5 {
            assert!(db.fetch_poll("gggggggg").await.unwrap().is_some());
        }
    }
}
