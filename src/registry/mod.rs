//! The poll registry: sole owner and mutator of poll state.
//!
//! [`Registry`] validates input, allocates ids and delegates storage to a
//! [`PollStore`]. Two stores implement the same contract:
//!
//! - [`MemoryStore`] holds every poll behind one lock, so each operation is a
//!   single atomic step.
//! - [`SqliteStore`] persists polls and applies votes with optimistic
//!   concurrency, retrying the read-compute-write cycle on conflict.
//!
//! Either way, N concurrent successful votes for one option raise its count
//! by exactly N.

pub mod memory;
pub mod optimistic;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::{RegistryError, Result};
use crate::ids::{IdAllocator, RandomIds};
use crate::models::{self, Poll};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::sync::Arc;

/// How many fresh ids `create` tries before giving up.
pub const MAX_ID_ATTEMPTS: u32 = 5;

/// Storage backend for polls. Implementations must make each method atomic
/// with respect to every other call.
#[async_trait]
pub trait PollStore: Send + Sync {
    /// Inserts `poll` unless its id is live. Returns `false` on collision,
    /// leaving the existing poll untouched.
    async fn insert(&self, poll: Poll) -> Result<bool>;

    async fn get(&self, poll_id: &str) -> Result<Option<Poll>>;

    async fn list(&self) -> Result<Vec<Poll>>;

    /// Adds one vote to `option`, returning the option's new count.
    async fn vote(&self, poll_id: &str, option: &str) -> Result<u64>;

    /// Returns `false` if no such poll was live.
    async fn remove(&self, poll_id: &str) -> Result<bool>;
}

#[derive(Clone)]
pub struct Registry {
    store: Arc<dyn PollStore>,
    ids: Arc<dyn IdAllocator>,
}

impl Registry {
    /// Registry over `store`, drawing ids from the process-wide allocator.
    pub fn new(store: impl PollStore + 'static) -> Self {
        Self::with_allocator(store, RandomIds::shared())
    }

    pub fn with_allocator(store: impl PollStore + 'static, ids: Arc<dyn IdAllocator>) -> Self {
        Self {
            store: Arc::new(store),
            ids,
        }
    }

    pub async fn create(&self, question: String, options: Vec<String>) -> Result<Poll> {
        models::validate(&question, &options)?;

        let mut poll = Poll::new(String::new(), question, options);
        for attempt in 1..=MAX_ID_ATTEMPTS {
            poll.id = self.ids.allocate();
            if self.store.insert(poll.clone()).await? {
                info!("Created poll {} with {} options", poll.id, poll.options.len());
                return Ok(poll);
            }
            warn!("Poll id {} already live (attempt {}/{})", poll.id, attempt, MAX_ID_ATTEMPTS);
        }

        Err(RegistryError::AlreadyExists(MAX_ID_ATTEMPTS))
    }

    pub async fn get(&self, poll_id: &str) -> Result<Poll> {
        self.store
            .get(poll_id)
            .await?
            .ok_or_else(|| RegistryError::NotFound(poll_id.to_string()))
    }

    // Order is unspecified
    pub async fn list(&self) -> Result<Vec<Poll>> {
        self.store.list().await
    }

    pub async fn vote(&self, poll_id: &str, option: &str) -> Result<()> {
        let count = self.store.vote(poll_id, option).await?;
        debug!("Vote on poll {} for '{}', now {}", poll_id, option, count);
        Ok(())
    }

    pub async fn delete(&self, poll_id: &str) -> Result<()> {
        if !self.store.remove(poll_id).await? {
            return Err(RegistryError::NotFound(poll_id.to_string()));
        }
        info!("Deleted poll {}", poll_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Hands out ids from a fixed list, repeating the last one.
    struct ScriptedIds(Mutex<Vec<&'static str>>);

    impl ScriptedIds {
        fn new(ids: &[&'static str]) -> Arc<Self> {
            let mut ids = ids.to_vec();
            ids.reverse();
            Arc::new(Self(Mutex::new(ids)))
        }
    }

    impl IdAllocator for ScriptedIds {
        fn allocate(&self) -> String {
            let mut ids = self.0.lock().unwrap();
            if ids.len() > 1 {
                ids.pop().unwrap().to_string()
            } else {
                ids[0].to_string()
            }
        }
    }

    fn colors() -> Vec<String> {
        vec!["Red".into(), "Blue".into()]
    }

    #[tokio::test]
    async fn retries_colliding_id() {
        let registry = Registry::with_allocator(
            MemoryStore::new(),
            ScriptedIds::new(&["taken000", "taken000", "fresh000"]),
        );

        let first = registry.create("q1".into(), colors()).await.unwrap();
        let second = registry.create("q2".into(), colors()).await.unwrap();

        assert_eq!(first.id, "taken000");
        assert_eq!(second.id, "fresh000");
        assert_eq!(registry.get("taken000").await.unwrap().question, "q1");
    }

    #[tokio::test]
    async fn persistent_collision_is_already_exists() {
        let registry = Registry::with_allocator(MemoryStore::new(), ScriptedIds::new(&["same0000"]));
        registry.create("q1".into(), colors()).await.unwrap();

        let err = registry.create("q2".into(), colors()).await.unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyExists(MAX_ID_ATTEMPTS)));
        assert_eq!(registry.list().await.unwrap().len(), 1);
        assert_eq!(registry.get("same0000").await.unwrap().question, "q1");
    }

    #[tokio::test]
    async fn invalid_poll_allocates_nothing() {
        let registry = Registry::new(MemoryStore::new());
        let err = registry.create(String::new(), colors()).await.unwrap_err();
        assert!(matches!(err, RegistryError::Invalid(_)));
        assert!(registry.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn clones_share_state() {
        let registry = Registry::new(MemoryStore::new());
        let handle = registry.clone();
        let poll = registry.create("q".into(), colors()).await.unwrap();
        handle.vote(&poll.id, "Blue").await.unwrap();
        assert_eq!(registry.get(&poll.id).await.unwrap().votes["Blue"], 1);
    }
}
