use crate::config::ImageCacheConfig;
use crate::lru::{CacheStats, Insertion, LruBounds, LruStore};
use image::{DynamicImage, RgbaImage};
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use telemetry::metrics::{CACHE_EVICTIONS, CACHE_REQUESTS};
use tracing::{debug, warn};
use uuid::Uuid;

const RAW: &str = "raw";
const DECODED: &str = "decoded";

/// Estimated in-memory size of a decoded image: bytes per row times height.
pub fn decoded_cost(image: &RgbaImage) -> u64 {
    let bytes_per_row = image.width() as u64 * 4;
    bytes_per_row * image.height() as u64
}

/// A level-1 entry: an image as handed in, or one that arrived decoded.
///
/// Decoded entries share their buffer with level 2.
#[derive(Debug, Clone)]
pub enum RawImage {
    Encoded(Arc<DynamicImage>),
    Decoded(Arc<RgbaImage>),
}

impl RawImage {
    /// RGBA form; free for entries that arrived decoded
    pub fn decode(&self) -> Arc<RgbaImage> {
        match self {
            RawImage::Encoded(image) => Arc::new(image.to_rgba8()),
            RawImage::Decoded(image) => image.clone(),
        }
    }

    fn same_entry(&self, other: &RawImage) -> bool {
        match (self, other) {
            (RawImage::Encoded(a), RawImage::Encoded(b)) => Arc::ptr_eq(a, b),
            (RawImage::Decoded(a), RawImage::Decoded(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TieredStats {
    pub raw: CacheStats,
    pub decoded: CacheStats,
    pub raw_items: usize,
    pub decoded_items: usize,
    pub decoded_cost: u64,
}

struct Levels<K> {
    raw: LruStore<K, RawImage>,
    decoded: LruStore<K, Arc<RgbaImage>>,
}

/// Two-level image cache keyed by entity identifier.
///
/// Level 1 keeps the raw image and is bounded by count. Level 2 keeps the
/// decoded RGBA form and is bounded by summed byte cost. One mutex guards
/// both levels; decoding always happens with the lock released.
pub struct TieredImageCache<K = Uuid> {
    name: String,
    levels: Mutex<Levels<K>>,
}

impl<K> TieredImageCache<K>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
{
    pub fn new(name: impl Into<String>, config: &ImageCacheConfig) -> Self {
        Self {
            name: name.into(),
            levels: Mutex::new(Levels {
                raw: LruStore::new(LruBounds::by_count(config.count_limit)),
                decoded: LruStore::new(LruBounds::by_cost(config.memory_limit)),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, Levels<K>> {
        // Every operation leaves both levels consistent, so a poisoned lock is reused.
        self.levels.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, level: &str, hit: bool) {
        let result = if hit { "hit" } else { "miss" };
        CACHE_REQUESTS
            .with_label_values(&[self.name.as_str(), level, result])
            .inc();
    }

    fn record_evictions(&self, level: &str, outcome: &Insertion<K>) {
        match outcome {
            Insertion::Stored { evicted } if !evicted.is_empty() => {
                CACHE_EVICTIONS
                    .with_label_values(&[self.name.as_str(), level])
                    .inc_by(evicted.len() as u64);
                debug!(cache = %self.name, level, evicted = evicted.len(), "evicted entries");
            }
            Insertion::Rejected => {
                warn!(cache = %self.name, level, "entry exceeds cache bound, not stored");
            }
            _ => {}
        }
    }

    /// Decoded image for `id`.
    ///
    /// Level 2 is checked first. On a level-2 miss the raw image from level 1
    /// is decoded outside the lock and installed into level 2, unless another
    /// caller installed one meanwhile or the entry was removed.
    pub fn get(&self, id: &K) -> Option<Arc<RgbaImage>> {
        let raw = {
            let mut levels = self.lock();
            if let Some(decoded) = levels.decoded.get(id) {
                drop(levels);
                self.record(DECODED, true);
                return Some(decoded);
            }
            levels.raw.get(id)
        };
        self.record(DECODED, false);
        self.record(RAW, raw.is_some());
        let raw = raw?;

        let decoded = raw.decode();
        let cost = decoded_cost(&decoded);

        let outcome = {
            let mut levels = self.lock();
            if let Some(existing) = levels.decoded.peek(id) {
                return Some(existing.clone());
            }
            let still_cached = levels
                .raw
                .peek(id)
                .is_some_and(|current| current.same_entry(&raw));
            if !still_cached {
                return Some(decoded);
            }
            levels.decoded.insert(id.clone(), decoded.clone(), cost)
        };
        self.record_evictions(DECODED, &outcome);
        Some(decoded)
    }

    /// Level-1 entry for `id`
    pub fn get_raw(&self, id: &K) -> Option<RawImage> {
        let raw = self.lock().raw.get(id);
        self.record(RAW, raw.is_some());
        raw
    }

    /// Stores `image` under `id` in both levels; `None` removes the entry.
    pub fn insert(&self, image: Option<DynamicImage>, id: K) {
        match image {
            Some(image) => {
                let decoded = Arc::new(image.to_rgba8());
                self.insert_pair(RawImage::Encoded(Arc::new(image)), decoded, id);
            }
            None => self.remove(&id),
        }
    }

    /// Stores an already decoded image. Both levels share the one buffer.
    pub fn insert_decoded(&self, image: Arc<RgbaImage>, id: K) {
        self.insert_pair(RawImage::Decoded(image.clone()), image, id);
    }

    fn insert_pair(&self, raw: RawImage, decoded: Arc<RgbaImage>, id: K) {
        let cost = decoded_cost(&decoded);
        let (raw_outcome, decoded_outcome) = {
            let mut levels = self.lock();
            let raw_outcome = levels.raw.insert(id.clone(), raw, 1);
            let decoded_outcome = levels.decoded.insert(id, decoded, cost);
            (raw_outcome, decoded_outcome)
        };
        self.record_evictions(RAW, &raw_outcome);
        self.record_evictions(DECODED, &decoded_outcome);
    }

    pub fn remove(&self, id: &K) {
        let mut levels = self.lock();
        levels.raw.remove(id);
        levels.decoded.remove(id);
    }

    pub fn clear(&self) {
        let mut levels = self.lock();
        levels.raw.clear();
        levels.decoded.clear();
        debug!(cache = %self.name, "cache cleared");
    }

    pub fn contains(&self, id: &K) -> bool {
        let levels = self.lock();
        levels.raw.contains(id) || levels.decoded.contains(id)
    }

    pub fn stats(&self) -> TieredStats {
        let levels = self.lock();
        TieredStats {
            raw: levels.raw.stats(),
            decoded: levels.decoded.stats(),
            raw_items: levels.raw.len(),
            decoded_items: levels.decoded.len(),
            decoded_cost: levels.decoded.current_cost(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn image(width: u32, height: u32, shade: u8) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            Rgba([shade, shade, shade, 255]),
        ))
    }

    fn cache(count_limit: usize, memory_limit: u64) -> TieredImageCache<u32> {
        TieredImageCache::new(
            "test",
            &ImageCacheConfig {
                count_limit,
                memory_limit,
            },
        )
    }

    #[test]
    fn test_insert_then_get() {
        let cache = cache(10, 1 << 20);
        let source = image(4, 3, 7);
        cache.insert(Some(source.clone()), 1);

        let decoded = cache.get(&1).unwrap();
        assert_eq!(*decoded, source.to_rgba8());
        assert_eq!(cache.stats().decoded_cost, 4 * 4 * 3);
    }

    #[test]
    fn test_insert_none_removes() {
        let cache = cache(10, 1 << 20);
        cache.insert(Some(image(2, 2, 1)), 1);
        cache.insert(None, 1);
        assert!(cache.get(&1).is_none());
        assert!(!cache.contains(&1));
    }

    #[test]
    fn test_clear_empties_both_levels() {
        let cache = cache(10, 1 << 20);
        for id in 0..5 {
            cache.insert(Some(image(2, 2, id as u8)), id);
        }
        cache.clear();
        for id in 0..5 {
            assert!(cache.get(&id).is_none());
        }
        let stats = cache.stats();
        assert_eq!((stats.raw_items, stats.decoded_items), (0, 0));
    }

    #[test]
    fn test_decode_on_read_from_raw_level() {
        // Each decoded image costs 64 bytes; only one fits level 2
        let cache = cache(10, 64);
        cache.insert(Some(image(4, 4, 1)), 1);
        cache.insert(Some(image(4, 4, 2)), 2);

        let stats = cache.stats();
        assert_eq!(stats.raw_items, 2);
        assert_eq!(stats.decoded_items, 1);

        let first = cache.get(&1).unwrap();
        assert_eq!(first.get_pixel(0, 0), &Rgba([1, 1, 1, 255]));
        let stats = cache.stats();
        assert_eq!(stats.decoded.misses, 1);
        assert_eq!(stats.raw.hits, 1);
        assert_eq!(stats.decoded_items, 1);
    }

    #[test]
    fn test_raw_level_bounded_by_count() {
        let cache = cache(2, 1 << 20);
        cache.insert(Some(image(1, 1, 1)), 1);
        cache.insert(Some(image(1, 1, 2)), 2);
        cache.insert(Some(image(1, 1, 3)), 3);

        assert!(cache.get_raw(&1).is_none());
        assert!(cache.get_raw(&3).is_some());
        assert_eq!(cache.stats().raw.evictions, 1);
    }

    #[test]
    fn test_insert_decoded() {
        let cache = cache(10, 1 << 20);
        let plate = Arc::new(RgbaImage::from_pixel(8, 2, Rgba([9, 9, 9, 255])));
        cache.insert_decoded(plate.clone(), 5);
        assert!(Arc::ptr_eq(&cache.get(&5).unwrap(), &plate));
        match cache.get_raw(&5) {
            Some(RawImage::Decoded(raw)) => assert!(Arc::ptr_eq(&raw, &plate)),
            other => panic!("expected a shared decoded entry, got {:?}", other),
        }
        // Caller's handle plus one per level
        assert_eq!(Arc::strong_count(&plate), 3);
    }

    #[test]
    fn test_decoded_entry_evicted_from_level_two_is_still_shared() {
        let cache = cache(10, 64);
        let first = Arc::new(RgbaImage::from_pixel(4, 4, Rgba([1, 1, 1, 255])));
        cache.insert_decoded(first.clone(), 1);
        cache.insert_decoded(Arc::new(RgbaImage::new(4, 4)), 2);

        assert_eq!(cache.stats().decoded_items, 1);
        let again = cache.get(&1).unwrap();
        assert!(Arc::ptr_eq(&again, &first));
    }

    #[test]
    fn test_concurrent_access() {
        let cache = Arc::new(cache(50, 1 << 20));
        let handles: Vec<_> = (0..8u32)
            .map(|t| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..20u32 {
                        let id = t * 100 + i;
                        cache.insert(Some(image(2, 2, i as u8)), id);
                        assert!(cache.get(&id).is_some() || cache.stats().raw_items <= 50);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(cache.stats().raw_items <= 50);
    }
}
