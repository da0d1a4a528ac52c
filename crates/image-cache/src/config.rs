use serde::{Deserialize, Serialize};

/// Bounds for one [`crate::TieredImageCache`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageCacheConfig {
    /// Maximum number of raw images kept (level 1)
    #[serde(default = "default_count_limit")]
    pub count_limit: usize,

    /// Maximum summed byte cost of decoded images (level 2)
    #[serde(default = "default_memory_limit")]
    pub memory_limit: u64,
}

fn default_count_limit() -> usize {
    100
}

fn default_memory_limit() -> u64 {
    100 * 1024 * 1024
}

impl Default for ImageCacheConfig {
    fn default() -> Self {
        Self {
            count_limit: default_count_limit(),
            memory_limit: default_memory_limit(),
        }
    }
}
