pub mod mock;
#[cfg(feature = "onnx")]
pub mod onnx;

use anyhow::Result;
use async_trait::async_trait;
use common::{NormalizedRect, TensorBuffer};
use image::{DynamicImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One classified box from the vehicle detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleObservation {
    /// Top-ranked label, e.g. "car"
    pub category: String,
    pub confidence: f32,
    /// Box relative to the whole image, origin top-left
    pub bbox: NormalizedRect,
}

impl VehicleObservation {
    pub fn new(category: impl Into<String>, confidence: f32, bbox: NormalizedRect) -> Self {
        Self {
            category: category.into(),
            confidence,
            bbox,
        }
    }
}

/// Raw plate detector output for one vehicle crop.
#[derive(Debug, Clone, PartialEq)]
pub struct PlateDetection {
    /// Has-plate feature; compared against the configured threshold
    pub has_plate: f32,
    /// Corner tensor, expected shape `[2, 4]` in coordinates normalized to the crop
    pub quad: TensorBuffer<f32>,
}

/// Finds vehicles in whole images.
#[async_trait]
pub trait VehicleDetector: Send + Sync {
    /// Stable identifier used in logs and metric labels
    fn id(&self) -> &'static str;

    async fn detect(&self, image: Arc<DynamicImage>) -> Result<Vec<VehicleObservation>>;

    /// Called after a batch so heavyweight models can be unloaded.
    async fn release(&self) -> Result<()> {
        Ok(())
    }
}

/// Finds a plate inside a vehicle crop.
///
/// Implementations receive their thresholds at construction time.
#[async_trait]
pub trait PlateDetector: Send + Sync {
    fn id(&self) -> &'static str;

    async fn detect(&self, crop: Arc<RgbaImage>) -> Result<PlateDetection>;
}
