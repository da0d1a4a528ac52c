//! Two-level, identifier-keyed image cache.
//!
//! Level 1 holds raw images bounded by count, level 2 holds decoded RGBA
//! buffers bounded by estimated byte size.

pub mod config;
pub mod lru;
pub mod tiered;

pub use config::ImageCacheConfig;
pub use lru::{CacheStats, Insertion, LruBounds, LruStore};
pub use tiered::{decoded_cost, RawImage, TieredImageCache, TieredStats};
