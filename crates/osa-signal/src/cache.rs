//! SHA-256 keyed signal cache with a 10-minute TTL.
//!
//! Sharded to spread lock contention across many concurrent channels
//! fanning in to the same classifier.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};

use osa_core::types::Signal;

const DEFAULT_TTL: Duration = Duration::from_secs(10 * 60);
const SHARD_COUNT: usize = 16;

struct Entry {
    signal: Signal,
    expires_at: Instant,
}

/// Cached classification results keyed by `sha256(channel || "\n" || message)`.
pub struct SignalCache {
    shards: Vec<Mutex<std::collections::HashMap<String, Entry>>>,
    ttl: Duration,
    hits: std::sync::atomic::AtomicU64,
    misses: std::sync::atomic::AtomicU64,
}

impl SignalCache {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        let shards = (0..SHARD_COUNT)
            .map(|_| Mutex::new(std::collections::HashMap::new()))
            .collect();
        Self {
            shards,
            ttl,
            hits: std::sync::atomic::AtomicU64::new(0),
            misses: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Cache key: `sha256(channel || "\n" || message)`.
    pub fn key(channel: &str, message: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(channel.as_bytes());
        hasher.update(b"\n");
        hasher.update(message.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn shard_for(&self, key: &str) -> &Mutex<std::collections::HashMap<String, Entry>> {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        std::hash::Hash::hash(key, &mut hasher);
        let idx = (std::hash::Hasher::finish(&hasher) as usize) % self.shards.len();
        &self.shards[idx]
    }

    /// Look up a cached signal. Returns `None` on miss or TTL expiry,
    /// pruning the expired entry eagerly.
    pub fn get(&self, key: &str) -> Option<Signal> {
        let shard = self.shard_for(key);
        let mut guard = shard.lock().expect("signal cache shard poisoned");
        match guard.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                self.hits.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                Some(entry.signal.clone())
            }
            Some(_) => {
                guard.remove(key);
                self.misses
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                None
            }
            None => {
                self.misses
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                None
            }
        }
    }

    pub fn put(&self, key: String, signal: Signal) {
        let shard = self.shard_for(&key);
        let mut guard = shard.lock().expect("signal cache shard poisoned");
        guard.insert(
            key,
            Entry {
                signal,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    /// Hit ratio, for dashboards and tuning the TTL.
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits.load(std::sync::atomic::Ordering::Relaxed) as f64;
        let misses = self.misses.load(std::sync::atomic::Ordering::Relaxed) as f64;
        if hits + misses == 0.0 {
            0.0
        } else {
            hits / (hits + misses)
        }
    }
}

impl Default for SignalCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Shareable handle — cheap to clone, shares the same shards.
pub type SharedSignalCache = Arc<SignalCache>;

#[cfg(test)]
mod tests {
    use super::*;
    use osa_core::types::{SignalFormat, SignalGenre, SignalMode, SignalType};

    fn sample_signal() -> Signal {
        Signal {
            mode: SignalMode::Assist,
            genre: SignalGenre::Inform,
            r#type: SignalType::General,
            format: SignalFormat::Message,
            weight: 0.5,
        }
    }

    #[test]
    fn key_is_deterministic() {
        let k1 = SignalCache::key("cli", "hello");
        let k2 = SignalCache::key("cli", "hello");
        assert_eq!(k1, k2);
        assert_ne!(k1, SignalCache::key("cli", "hello!"));
        assert_ne!(k1, SignalCache::key("slack", "hello"));
    }

    #[test]
    fn idempotent_lookup_increases_hits() {
        let cache = SignalCache::new();
        let key = SignalCache::key("cli", "hey");
        assert!(cache.get(&key).is_none());
        cache.put(key.clone(), sample_signal());
        assert!(cache.get(&key).is_some());
        assert!(cache.get(&key).is_some());
        assert!(cache.hit_ratio() > 0.0);
    }

    #[test]
    fn expired_entry_is_evicted() {
        let cache = SignalCache::with_ttl(Duration::from_millis(10));
        let key = SignalCache::key("cli", "hey");
        cache.put(key.clone(), sample_signal());
        std::thread::sleep(Duration::from_millis(25));
        assert!(cache.get(&key).is_none());
    }
}
