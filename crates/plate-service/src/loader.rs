use anyhow::{Context, Result};
use async_trait::async_trait;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Where a whole image comes from. Opaque to the pipeline; only the loader
/// interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageSource(String);

impl ImageSource {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ImageSource {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<&Path> for ImageSource {
    fn from(value: &Path) -> Self {
        Self::new(value.to_string_lossy())
    }
}

impl From<PathBuf> for ImageSource {
    fn from(value: PathBuf) -> Self {
        Self::from(value.as_path())
    }
}

#[async_trait]
pub trait ImageLoader: Send + Sync {
    async fn load(&self, source: &ImageSource) -> Result<Arc<DynamicImage>>;
}

/// Decodes image files from disk on the blocking pool.
#[derive(Debug, Clone, Default)]
pub struct FsImageLoader {
    root: Option<PathBuf>,
}

impl FsImageLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves relative sources against `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, source: &ImageSource) -> PathBuf {
        let path = PathBuf::from(source.as_str());
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path,
        }
    }
}

#[async_trait]
impl ImageLoader for FsImageLoader {
    async fn load(&self, source: &ImageSource) -> Result<Arc<DynamicImage>> {
        let path = self.resolve(source);
        let image = tokio::task::spawn_blocking(move || {
            image::open(&path).with_context(|| format!("Failed to open image {}", path.display()))
        })
        .await
        .context("Image decode worker stopped")??;
        Ok(Arc::new(image))
    }
}

/// Serves images registered in memory; used by tests and embedding callers
/// that already hold decoded frames.
#[derive(Default)]
pub struct MemoryImageLoader {
    images: RwLock<HashMap<ImageSource, Arc<DynamicImage>>>,
}

impl MemoryImageLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, source: impl Into<ImageSource>, image: DynamicImage) {
        let mut images = self.images.write().unwrap_or_else(|e| e.into_inner());
        images.insert(source.into(), Arc::new(image));
    }

    pub fn remove(&self, source: &ImageSource) {
        let mut images = self.images.write().unwrap_or_else(|e| e.into_inner());
        images.remove(source);
    }
}

#[async_trait]
impl ImageLoader for MemoryImageLoader {
    async fn load(&self, source: &ImageSource) -> Result<Arc<DynamicImage>> {
        let images = self.images.read().unwrap_or_else(|e| e.into_inner());
        images
            .get(source)
            .cloned()
            .with_context(|| format!("No image registered for {}", source))
    }
}
