//! Content-addressed OCR cache.
//!
//! Maps a digest of the raw file bytes to its `DocumentOcr` so re-analyzing
//! the same file never re-runs either OCR engine. Process-local, bounded,
//! FIFO-evicted.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use sha2::{Digest, Sha256};

use super::types::DocumentOcr;

/// Bounded FIFO cache from file content to OCR result.
pub struct OcrCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
}

struct CacheInner {
    entries: HashMap<String, DocumentOcr>,
    order: VecDeque<String>,
}

impl OcrCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity: capacity.max(1),
        }
    }

    /// Digest of raw file bytes used as the cache key.
    pub fn content_key(bytes: &[u8]) -> String {
        let digest = Sha256::digest(bytes);
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }

    pub fn get(&self, bytes: &[u8]) -> Option<DocumentOcr> {
        let key = Self::content_key(bytes);
        self.inner
            .lock()
            .ok()
            .and_then(|inner| inner.entries.get(&key).cloned())
    }

    /// Insert a result, evicting the oldest entry once past capacity.
    pub fn insert(&self, bytes: &[u8], document: DocumentOcr) {
        let key = Self::content_key(bytes);
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };

        if inner.entries.insert(key.clone(), document).is_none() {
            inner.order.push_back(key);
        }

        while inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|i| i.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
