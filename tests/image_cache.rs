/// Integration tests for the two-level image cache
use image::{DynamicImage, Rgba, RgbaImage};
use image_cache::{decoded_cost, ImageCacheConfig, TieredImageCache};
use std::sync::Arc;
use uuid::Uuid;

fn solid(width: u32, height: u32, shade: u8) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(
        width,
        height,
        Rgba([shade, 0, 0, 255]),
    ))
}

fn cache(count_limit: usize, memory_limit: u64) -> TieredImageCache {
    TieredImageCache::new(
        "integration",
        &ImageCacheConfig {
            count_limit,
            memory_limit,
        },
    )
}

#[test]
fn test_decoded_level_evicts_by_cost() {
    // 10x10 RGBA is 400 bytes; three fit in 1200
    let cache = cache(100, 1200);
    let ids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
    for (i, id) in ids.iter().enumerate() {
        cache.insert(Some(solid(10, 10, i as u8)), *id);
    }

    let stats = cache.stats();
    assert_eq!(stats.raw_items, 4);
    assert_eq!(stats.decoded_items, 3);
    assert!(stats.decoded_cost <= 1200);
    assert_eq!(stats.decoded.evictions, 1);

    // The evicted image is decoded again from the raw level
    let first = cache.get(&ids[0]).unwrap();
    assert_eq!(first.get_pixel(0, 0), &Rgba([0, 0, 0, 255]));
    assert_eq!(cache.stats().decoded_items, 3);
}

#[test]
fn test_oversized_entry_not_decoded() {
    let cache = cache(10, 100);
    let id = Uuid::new_v4();
    cache.insert(Some(solid(10, 10, 1)), id);

    assert_eq!(cache.stats().decoded_items, 0);
    assert!(cache.get_raw(&id).is_some());
    // Still served, decoded on each read
    assert_eq!(cache.get(&id).unwrap().dimensions(), (10, 10));
}

#[test]
fn test_count_bound_on_raw_level() {
    let cache = cache(3, 1 << 20);
    let ids: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
    for id in &ids {
        cache.insert(Some(solid(2, 2, 9)), *id);
    }
    assert_eq!(cache.stats().raw_items, 3);
    assert!(cache.get_raw(&ids[0]).is_none());
    assert!(cache.get_raw(&ids[4]).is_some());
}

#[test]
fn test_parallel_readers_share_entry() {
    let cache = Arc::new(cache(10, 1 << 20));
    let id = Uuid::new_v4();
    cache.insert_decoded(Arc::new(RgbaImage::from_pixel(16, 8, Rgba([1, 2, 3, 4]))), id);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = cache.clone();
            std::thread::spawn(move || cache.get(&id).map(|img| decoded_cost(&img)))
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), Some(16 * 4 * 8));
    }
    assert_eq!(cache.stats().decoded.hits, 8);
}
