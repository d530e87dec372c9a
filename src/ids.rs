use lazy_static::lazy_static;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex, PoisonError};

pub const ID_LEN: usize = 8;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

lazy_static! {
    static ref SHARED: Arc<RandomIds> = Arc::new(RandomIds::from_entropy());
}

/// Source of poll identifiers. Knows nothing about which ids are live.
pub trait IdAllocator: Send + Sync {
    fn allocate(&self) -> String;
}

/// Random ids of `ID_LEN` alphanumeric characters.
///
/// The RNG is seeded once and then drawn from on every call, so rapid
/// successive allocations don't produce correlated ids.
pub struct RandomIds {
    rng: Mutex<StdRng>,
}

impl RandomIds {
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    // Deterministic sequence, for tests.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// The process-wide allocator, seeded on first use.
    pub fn shared() -> Arc<RandomIds> {
        Arc::clone(&SHARED)
    }
}

impl IdAllocator for RandomIds {
    fn allocate(&self) -> String {
        // A panic while holding the lock can't leave the RNG in a bad state.
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        (0..ID_LEN)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_eight_alphanumerics() {
        let ids = RandomIds::from_entropy();
        for _ in 0..100 {
            let id = ids.allocate();
            assert_eq!(id.len(), ID_LEN);
            assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn same_seed_same_sequence() {
        let a = RandomIds::seeded(42);
        let b = RandomIds::seeded(42);
        for _ in 0..10 {
            assert_eq!(a.allocate(), b.allocate());
        }
    }

    #[test]
    fn successive_ids_differ() {
        let ids = RandomIds::shared();
        let drawn: HashSet<String> = (0..1000).map(|_| ids.allocate()).collect();
        assert_eq!(drawn.len(), 1000);
    }

    #[test]
    fn shared_allocator_is_one_instance() {
        assert!(Arc::ptr_eq(&RandomIds::shared(), &RandomIds::shared()));
    }
}
