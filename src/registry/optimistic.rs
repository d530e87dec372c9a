//! Read-compute-conditional-write retry loop.

use crate::error::{RegistryError, Result};
use async_trait::async_trait;
use log::warn;
use rand::Rng;
use std::time::Duration;

const BACKOFF_BASE: Duration = Duration::from_millis(2);
const BACKOFF_CAP: Duration = Duration::from_millis(100);

/// One optimistic update against a store that can detect concurrent writers.
#[async_trait]
pub trait Transaction: Send + Sync {
    /// Current state together with whatever marker `write` checks against.
    type Snapshot: Send + Sync;
    type Update: Send + Sync;

    /// Key reported in the `Conflict` error when attempts run out.
    fn key(&self) -> &str;

    async fn read(&self) -> Result<Self::Snapshot>;

    /// Pure. Errors here abort the loop without retrying.
    fn compute(&self, snapshot: &Self::Snapshot) -> Result<Self::Update>;

    /// Commits `update` only if nothing changed since `snapshot` was read.
    /// `Ok(false)` means another writer won and the cycle must start over.
    async fn write(&self, snapshot: &Self::Snapshot, update: &Self::Update) -> Result<bool>;
}

/// Runs `tx` until a write commits, at most `max_attempts` times.
///
/// Every attempt starts again from `read`, after a randomized pause that
/// grows with each lost write so contending writers spread out instead of
/// colliding again. Only a lost conditional write is retried; any error from
/// the three steps is returned as is.
pub async fn attempt<T: Transaction>(tx: &T, max_attempts: u32) -> Result<T::Update> {
    for attempt in 1..=max_attempts {
        let snapshot = tx.read().await?;
        let update = tx.compute(&snapshot)?;
        if tx.write(&snapshot, &update).await? {
            return Ok(update);
        }
        warn!("Write conflict on {} (attempt {}/{})", tx.key(), attempt, max_attempts);
        if attempt < max_attempts {
            tokio::time::sleep(backoff(attempt)).await;
        }
    }

    Err(RegistryError::Conflict {
        poll_id: tx.key().to_string(),
        attempts: max_attempts,
    })
}

/// Full jitter: uniform in `[0, min(cap, base * 2^attempt)]`.
fn backoff(attempt: u32) -> Duration {
    let ceiling = BACKOFF_BASE
        .saturating_mul(1 << attempt.min(16))
        .min(BACKOFF_CAP);
    rand::thread_rng().gen_range(Duration::ZERO..=ceiling)
}
