//! Document cache for uploaded PDFs and their extraction reports

use crate::extractor::ExtractionReport;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// A cached PDF together with the report produced from it, if any
#[derive(Debug, Clone)]
pub struct CachedDocument {
    pub pdf: Vec<u8>,
    pub report: Option<ExtractionReport>,
}

impl CachedDocument {
    pub fn new(pdf: Vec<u8>, report: Option<ExtractionReport>) -> Self {
        Self { pdf, report }
    }

    /// Bytes counted against the cache budget
    fn size(&self) -> usize {
        self.pdf.len()
    }
}

struct CacheInner {
    lru: LruCache<String, Arc<CachedDocument>>,
    total_bytes: usize,
}

/// LRU document cache with entry count and byte budget limits
pub struct CacheManager {
    inner: Mutex<CacheInner>,
    max_bytes: usize,
}

impl CacheManager {
    pub fn new(capacity: usize, max_bytes: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(CacheInner {
                lru: LruCache::new(capacity),
                total_bytes: 0,
            }),
            max_bytes,
        }
    }

    /// Store a document.
    ///
    /// Entries larger than the whole budget are rejected and `false` is
    /// returned. Least recently used entries are evicted to make room.
    pub fn put(&self, key: String, document: CachedDocument) -> bool {
        let new_size = document.size();
        if new_size > self.max_bytes {
            return false;
        }

        let mut inner = self.inner.lock();

        if let Some(old) = inner.lru.pop(&key) {
            inner.total_bytes = inner.total_bytes.saturating_sub(old.size());
        }

        while inner.total_bytes + new_size > self.max_bytes {
            match inner.lru.pop_lru() {
                Some((evicted_key, evicted)) => {
                    tracing::debug!(key = %evicted_key, bytes = evicted.size(), "Evicted cached document");
                    inner.total_bytes = inner.total_bytes.saturating_sub(evicted.size());
                }
                None => break,
            }
        }

        // Entry count eviction happens inside LruCache::push
        if let Some((_, evicted)) = inner.lru.push(key, Arc::new(document)) {
            inner.total_bytes = inner.total_bytes.saturating_sub(evicted.size());
        }
        inner.total_bytes += new_size;
        true
    }

    pub fn get(&self, key: &str) -> Option<Arc<CachedDocument>> {
        self.inner.lock().lru.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().lru.contains(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().lru.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().lru.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.inner.lock().total_bytes
    }

    /// Generate a key that does not collide with any cached entry
    pub fn generate_unique_key(&self) -> String {
        let inner = self.inner.lock();
        loop {
            let key = uuid::Uuid::new_v4().to_string();
            if !inner.lru.contains(&key) {
                return key;
            }
        }
    }
}
