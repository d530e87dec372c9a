use super::PollStore;
use crate::error::{RegistryError, Result};
use crate::models::Poll;
use async_trait::async_trait;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tokio::sync::Mutex;

/// All polls in one map behind one lock, held for the whole of every call.
#[derive(Default)]
pub struct MemoryStore {
    polls: Mutex<HashMap<String, Poll>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PollStore for MemoryStore {
    async fn insert(&self, poll: Poll) -> Result<bool> {
        let mut polls = self.polls.lock().await;
        match polls.entry(poll.id.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(poll);
                Ok(true)
            }
        }
    }

    async fn get(&self, poll_id: &str) -> Result<Option<Poll>> {
        Ok(self.polls.lock().await.get(poll_id).cloned())
    }

    async fn list(&self) -> Result<Vec<Poll>> {
        Ok(self.polls.lock().await.values().cloned().collect())
    }

    async fn vote(&self, poll_id: &str, option: &str) -> Result<u64> {
        let mut polls = self.polls.lock().await;
        let poll = polls
            .get_mut(poll_id)
            .ok_or_else(|| RegistryError::NotFound(poll_id.to_string()))?;

        let count = poll
            .votes
            .get_mut(option)
            .ok_or_else(|| RegistryError::InvalidOption {
                poll_id: poll_id.to_string(),
                option: option.to_string(),
            })?;
        *count += 1;
        Ok(*count)
    }

    async fn remove(&self, poll_id: &str) -> Result<bool> {
        Ok(self.polls.lock().await.remove(poll_id).is_some())
    }
}
