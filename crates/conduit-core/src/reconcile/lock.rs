//! Sharded per-key locks for checkpoint read-modify-write.
//!
//! A fixed array of async mutexes indexed by a hash of the logical key.
//! Distinct keys may share a shard.

use std::hash::{DefaultHasher, Hash, Hasher};

use tokio::sync::{Mutex, MutexGuard};

/// Fixed-size set of mutex shards owned by one engine instance.
#[derive(Debug)]
pub struct KeyedLocks {
    shards: Box<[Mutex<()>]>,
}

impl KeyedLocks {
    /// Create `shard_count` shards (minimum 1).
    pub fn new(shard_count: usize) -> Self {
        let shards = (0..shard_count.max(1)).map(|_| Mutex::new(())).collect();
        Self { shards }
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Shard index for a key. Stable for the life of the process.
    pub fn shard_index(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.shards.len() as u64) as usize
    }

    /// Acquire the shard guarding `key`.
    pub async fn lock(&self, key: &str) -> MutexGuard<'_, ()> {
        self.shards[self.shard_index(key)].lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_shard_index_is_stable_and_in_range() {
        let locks = KeyedLocks::new(8);
        let a = locks.shard_index("acme/platform/deploy/");
        assert_eq!(a, locks.shard_index("acme/platform/deploy/"));
        assert!(a < 8);
    }

    #[test]
    fn test_zero_shards_clamped() {
        let locks = KeyedLocks::new(0);
        assert_eq!(locks.shard_count(), 1);
        assert_eq!(locks.shard_index("anything"), 0);
    }

    #[tokio::test]
    async fn test_same_key_serializes() {
        let locks = Arc::new(KeyedLocks::new(4));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = Arc::clone(&locks);
            let in_flight = Arc::clone(&in_flight);
            let max_seen = Arc::clone(&max_seen);
            handles.push(tokio::spawn(async move {
                let _guard = locks.lock("same-key").await;
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_different_shards_do_not_block() {
        let locks = KeyedLocks::new(64);
        let first = "key-a";
        let second = (0..1000)
            .map(|i| format!("key-{i}"))
            .find(|k| locks.shard_index(k) != locks.shard_index(first))
            .unwrap();

        let _held = locks.lock(first).await;
        let acquired =
            tokio::time::timeout(Duration::from_millis(100), locks.lock(&second)).await;
        assert!(acquired.is_ok());
    }
}
