//! Sample digests and the read-side sample cache.
//!
//! Every stored sample carries a 16-byte content digest. The writer uses it
//! for constant detection (against the previous sample) and for content
//! deduplication of the stored bytes; readers expose it so consumers can
//! detect identical samples without fetching payloads.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// 128-bit content digest.
pub type SampleDigest = [u8; 16];

/// Digest of a sample payload (murmur3 x64 128, seed 0).
#[inline]
pub fn compute_digest(data: &[u8]) -> SampleDigest {
    let mut cursor = data;
    // Reading from a byte slice cannot fail.
    let h = murmur3::murmur3_x64_128(&mut cursor, 0).unwrap_or_default();
    h.to_le_bytes()
}

/// Position-based key for cached samples.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Debug)]
pub struct SampleKey {
    /// Byte position of the sample's data block in the file.
    pub data_pos: u64,
    /// Sample index within the property.
    pub sample_index: usize,
}

impl SampleKey {
    pub fn new(data_pos: u64, sample_index: usize) -> Self {
        Self {
            data_pos,
            sample_index,
        }
    }
}

struct CachedSample {
    data: Arc<Vec<u8>>,
    size: usize,
}

/// Bounded, thread-safe cache of decoded sample payloads.
///
/// Shared by all property readers of one archive. Eviction is coarse: when
/// the budget is exceeded roughly half the entries are dropped.
pub struct ReadSampleCache {
    entries: RwLock<HashMap<SampleKey, CachedSample>>,
    max_size: usize,
    current_size: AtomicUsize,
}

impl ReadSampleCache {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_size,
            current_size: AtomicUsize::new(0),
        }
    }

    /// Default budget: 64 MB.
    pub fn default_size() -> Self {
        Self::new(64 * 1024 * 1024)
    }

    #[inline]
    pub fn get(&self, key: &SampleKey) -> Option<Arc<Vec<u8>>> {
        self.entries.read().get(key).map(|s| Arc::clone(&s.data))
    }

    pub fn insert(&self, key: SampleKey, data: Vec<u8>) {
        let size = data.len();
        if size > self.max_size {
            return;
        }

        if self.current_size.load(Ordering::Relaxed) + size > self.max_size {
            self.evict_some();
        }

        let mut entries = self.entries.write();
        if entries.contains_key(&key) {
            return;
        }
        entries.insert(
            key,
            CachedSample {
                data: Arc::new(data),
                size,
            },
        );
        self.current_size.fetch_add(size, Ordering::Relaxed);
    }

    fn evict_some(&self) {
        let mut entries = self.entries.write();
        let victims: Vec<SampleKey> = entries
            .keys()
            .take(entries.len() / 2)
            .copied()
            .collect();
        let mut freed = 0;
        for key in victims {
            if let Some(s) = entries.remove(&key) {
                freed += s.size;
            }
        }
        let _ = self
            .current_size
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(v.saturating_sub(freed))
            });
    }

    pub fn clear(&self) {
        self.entries.write().clear();
        self.current_size.store(0, Ordering::Relaxed);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.current_size.load(Ordering::Relaxed)
    }
}

impl Default for ReadSampleCache {
    fn default() -> Self {
        Self::default_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable_and_distinguishes() {
        let a = compute_digest(b"abcdef");
        let b = compute_digest(b"abcdef");
        let c = compute_digest(b"abcdeg");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, [0u8; 16]);
    }

    #[test]
    fn cache_hit_and_miss() {
        let cache = ReadSampleCache::new(1024);
        let key = SampleKey::new(100, 0);
        assert!(cache.get(&key).is_none());
        cache.insert(key, vec![1, 2, 3]);
        assert_eq!(*cache.get(&key).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn cache_bounded() {
        let cache = ReadSampleCache::new(50);
        for i in 0..10u64 {
            cache.insert(SampleKey::new(i * 64, 0), vec![0u8; 10]);
        }
        assert!(cache.size() <= 50);

        // oversized payloads are not cached at all
        let big = SampleKey::new(9999, 0);
        cache.insert(big, vec![0u8; 200]);
        assert!(cache.get(&big).is_none());
    }

    #[test]
    fn cache_clear() {
        let cache = ReadSampleCache::new(1024);
        cache.insert(SampleKey::new(1, 0), vec![1]);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.size(), 0);
    }
}
