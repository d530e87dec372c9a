use super::PollStore;
use super::optimistic::{self, Transaction};
use crate::db::{Database, PollRow, counts};
use crate::error::{RegistryError, Result};
use crate::models::Poll;
use async_trait::async_trait;
use std::collections::HashMap;

pub const DEFAULT_VOTE_ATTEMPTS: u32 = 64;

/// Polls persisted in SQLite. Votes go through a versioned conditional
/// update instead of a lock, so several processes may share one database.
pub struct SqliteStore {
    db: Database,
    max_vote_attempts: u32,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self::with_vote_attempts(db, DEFAULT_VOTE_ATTEMPTS)
    }

    pub fn with_vote_attempts(db: Database, max_vote_attempts: u32) -> Self {
        Self {
            db,
            max_vote_attempts: max_vote_attempts.max(1),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

/// One increment of one option, as an optimistic transaction.
struct CastVote<'a> {
    db: &'a Database,
    poll_id: &'a str,
    option: &'a str,
}

struct Tally {
    votes: HashMap<String, u64>,
    encoded: String,
}

impl Tally {
    fn count(&self, option: &str) -> u64 {
        self.votes.get(option).copied().unwrap_or_default()
    }
}

#[async_trait]
impl Transaction for CastVote<'_> {
    type Snapshot = PollRow;
    type Update = Tally;

    fn key(&self) -> &str {
        self.poll_id
    }

    async fn read(&self) -> Result<PollRow> {
        self.db
            .fetch_poll(self.poll_id)
            .await?
            .ok_or_else(|| RegistryError::NotFound(self.poll_id.to_string()))
    }

    fn compute(&self, current: &PollRow) -> Result<Tally> {
        // Checked against this read, which the version pins for the write
        if !current.poll.has_option(self.option) {
            return Err(RegistryError::InvalidOption {
                poll_id: self.poll_id.to_string(),
                option: self.option.to_string(),
            });
        }

        let mut votes = current.poll.votes.clone();
        *votes.entry(self.option.to_string()).or_default() += 1;
        let encoded = counts::encode_votes(&votes)?;
        Ok(Tally { votes, encoded })
    }

    async fn write(&self, current: &PollRow, tally: &Tally) -> Result<bool> {
        self.db
            .update_votes_if_unchanged(self.poll_id, &tally.encoded, current.version)
            .await
    }
}

#[async_trait]
impl PollStore for SqliteStore {
    async fn insert(&self, poll: Poll) -> Result<bool> {
        self.db.insert_poll_if_absent(&poll).await
    }

    async fn get(&self, poll_id: &str) -> Result<Option<Poll>> {
        Ok(self.db.fetch_poll(poll_id).await?.map(|row| row.poll))
    }

    async fn list(&self) -> Result<Vec<Poll>> {
        Ok(self
            .db
            .fetch_polls()
            .await?
            .into_iter()
            .map(|row| row.poll)
            .collect())
    }

    async fn vote(&self, poll_id: &str, option: &str) -> Result<u64> {
        let tx = CastVote {
            db: &self.db,
            poll_id,
            option,
        };
        let tally = optimistic::attempt(&tx, self.max_vote_attempts).await?;
        Ok(tally.count(option))
    }

    async fn remove(&self, poll_id: &str) -> Result<bool> {
        self.db.delete_poll(poll_id).await
    }
}
