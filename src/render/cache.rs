//! Byte-bounded tile cache
//!
//! LRU recency order with two twists the viewer needs: entries whose
//! generation stamp lags the page's current generation are evicted first
//! (even if recently used), and failed renders are held as short-TTL
//! error entries so a broken page does not hot-loop retries.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;

use crate::document::Generation;
use crate::source::PixelBuffer;

use super::request::{RenderFault, TileKey};

/// What a cache lookup yields
#[derive(Clone, Debug)]
pub enum TilePayload {
    Ready(Arc<PixelBuffer>),
    Failed(Arc<RenderFault>),
}

#[derive(Clone, Debug)]
struct TileEntry {
    payload: TilePayload,
    generation: Generation,
    bytes: usize,
    inserted_at: Instant,
}

/// Tile cache bounded by total pixel-buffer bytes
pub struct TileCache {
    entries: LruCache<TileKey, TileEntry>,
    total_bytes: usize,
    max_bytes: usize,
    error_ttl: Duration,
    page_generations: HashMap<usize, Generation>,
}

impl TileCache {
    #[must_use]
    pub fn new(max_bytes: usize, error_ttl: Duration) -> Self {
        Self {
            entries: LruCache::unbounded(),
            total_bytes: 0,
            max_bytes,
            error_ttl,
            page_generations: HashMap::new(),
        }
    }

    /// Record a page's current generation; entries stamped earlier
    /// become stale and are dropped lazily on lookup or eagerly on the
    /// next eviction pass.
    pub fn note_generation(&mut self, page: usize, generation: Generation) {
        if generation > 0 {
            self.page_generations.insert(page, generation);
        }
    }

    fn is_stale(&self, key: &TileKey, entry: &TileEntry) -> bool {
        self.page_generations
            .get(&key.page)
            .is_some_and(|&current| entry.generation < current)
    }

    /// Look up a tile, promoting it in LRU order. Stale entries and
    /// expired error entries are evicted here and report a miss.
    pub fn get(&mut self, key: &TileKey) -> Option<TilePayload> {
        let entry = self.entries.get(key)?.clone();

        if self.is_stale(key, &entry) {
            log::trace!("cache: dropping stale entry for {key:?}");
            self.pop(key);
            return None;
        }

        if let TilePayload::Failed(_) = entry.payload {
            if entry.inserted_at.elapsed() >= self.error_ttl {
                self.pop(key);
                return None;
            }
        }

        Some(entry.payload)
    }

    /// Peek without promoting
    #[must_use]
    pub fn contains_fresh(&self, key: &TileKey) -> bool {
        match self.entries.peek(key) {
            Some(entry) => {
                if self.is_stale(key, entry) {
                    return false;
                }
                match entry.payload {
                    TilePayload::Ready(_) => true,
                    TilePayload::Failed(_) => entry.inserted_at.elapsed() < self.error_ttl,
                }
            }
            None => false,
        }
    }

    /// Insert a rendered tile, then trim back to budget
    pub fn insert_ready(
        &mut self,
        key: TileKey,
        tile: Arc<PixelBuffer>,
        generation: Generation,
    ) -> Arc<PixelBuffer> {
        let bytes = tile.byte_len();
        self.insert_entry(
            key,
            TileEntry {
                payload: TilePayload::Ready(Arc::clone(&tile)),
                generation,
                bytes,
                inserted_at: Instant::now(),
            },
        );
        tile
    }

    /// Insert an error entry; kept only for the error TTL
    pub fn insert_failed(&mut self, key: TileKey, fault: Arc<RenderFault>, generation: Generation) {
        self.insert_entry(
            key,
            TileEntry {
                payload: TilePayload::Failed(fault),
                generation,
                bytes: 0,
                inserted_at: Instant::now(),
            },
        );
    }

    fn insert_entry(&mut self, key: TileKey, entry: TileEntry) {
        self.pop(&key);
        self.total_bytes += entry.bytes;
        self.entries.put(key, entry);
        self.evict_to_budget();
    }

    /// Shrink the budget at runtime; evicts immediately when lowering
    pub fn set_max_bytes(&mut self, max_bytes: usize) {
        self.max_bytes = max_bytes;
        self.evict_to_budget();
    }

    /// Drop every cached version of a page
    pub fn invalidate_page(&mut self, page: usize) {
        let keys: Vec<TileKey> = self
            .entries
            .iter()
            .filter(|(k, _)| k.page == page)
            .map(|(k, _)| *k)
            .collect();
        for key in keys {
            self.pop(&key);
        }
    }

    pub fn invalidate_all(&mut self) {
        self.entries.clear();
        self.total_bytes = 0;
    }

    /// Stale entries go first, regardless of recency; then strict LRU
    /// until the byte budget holds.
    pub fn evict_to_budget(&mut self) {
        if self.total_bytes <= self.max_bytes {
            return;
        }

        let stale: Vec<TileKey> = self
            .entries
            .iter()
            .filter(|(k, e)| self.is_stale(k, e))
            .map(|(k, _)| *k)
            .collect();
        for key in stale {
            self.pop(&key);
            if self.total_bytes <= self.max_bytes {
                return;
            }
        }

        while self.total_bytes > self.max_bytes {
            let Some((key, entry)) = self.entries.pop_lru() else {
                break;
            };
            log::trace!("cache: LRU evicting {key:?} ({} bytes)", entry.bytes);
            self.total_bytes = self.total_bytes.saturating_sub(entry.bytes);
        }
    }

    fn pop(&mut self, key: &TileKey) {
        if let Some(entry) = self.entries.pop(key) {
            self.total_bytes = self.total_bytes.saturating_sub(entry.bytes);
        }
    }

    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    #[must_use]
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
