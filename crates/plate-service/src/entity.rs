use crate::loader::ImageSource;
use common::{NormalizedQuad, PixelRect, PlateRegion, Size};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use uuid::Uuid;

pub type VehicleId = Uuid;
pub type PlateId = Uuid;

/// A plate attached to a vehicle once detection succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicensePlate {
    /// Key of the rectified image in the plate cache
    pub id: PlateId,
    /// Corners normalized to the vehicle crop
    pub quad: NormalizedQuad,
    pub region: PlateRegion,
    /// False when rectification failed and no plate image exists
    pub rectified: bool,
}

impl LicensePlate {
    pub fn new(quad: NormalizedQuad, region: PlateRegion) -> Self {
        Self {
            id: Uuid::new_v4(),
            quad,
            region,
            rectified: false,
        }
    }
}

/// Decided result of plate detection. Written once, then read-only.
#[derive(Debug, Clone, PartialEq)]
pub struct PlateOutcome {
    pub plates: Vec<LicensePlate>,
}

impl PlateOutcome {
    pub fn none() -> Self {
        Self { plates: Vec::new() }
    }

    pub fn single(plate: LicensePlate) -> Self {
        Self {
            plates: vec![plate],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "plates", rename_all = "snake_case")]
pub enum DetectionState {
    Unknown,
    HasDetections(Vec<LicensePlate>),
    NoDetections,
}

impl DetectionState {
    pub fn is_decided(&self) -> bool {
        !matches!(self, DetectionState::Unknown)
    }

    pub fn plates(&self) -> &[LicensePlate] {
        match self {
            DetectionState::HasDetections(plates) => plates,
            _ => &[],
        }
    }
}

/// A vehicle found by the vehicle pass.
///
/// Everything but the outcome is fixed at construction. The outcome cell
/// moves from unset to set exactly once and is owned by the pipeline.
#[derive(Debug)]
pub struct VehicleEntity {
    pub id: VehicleId,
    pub source: ImageSource,
    /// Size of the whole source image
    pub image_size: Size,
    /// Region in source pixels, already clamped to the image
    pub roi: PixelRect,
    pub category: String,
    pub confidence: f32,
    pub(crate) outcome: OnceCell<PlateOutcome>,
}

impl VehicleEntity {
    pub fn new(
        source: ImageSource,
        image_size: Size,
        roi: PixelRect,
        category: impl Into<String>,
        confidence: f32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            image_size,
            roi,
            category: category.into(),
            confidence,
            outcome: OnceCell::new(),
        }
    }

    pub fn state(&self) -> DetectionState {
        match self.outcome.get() {
            None => DetectionState::Unknown,
            Some(outcome) if outcome.plates.is_empty() => DetectionState::NoDetections,
            Some(outcome) => DetectionState::HasDetections(outcome.plates.clone()),
        }
    }

    pub fn snapshot(&self) -> VehicleSnapshot {
        VehicleSnapshot {
            id: self.id,
            source: self.source.clone(),
            roi: self.roi,
            category: self.category.clone(),
            confidence: self.confidence,
            state: self.state(),
        }
    }
}

/// Immutable copy of a vehicle handed to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleSnapshot {
    pub id: VehicleId,
    pub source: ImageSource,
    pub roi: PixelRect,
    pub category: String,
    pub confidence: f32,
    pub state: DetectionState,
}

/// Result of the vehicle pass over one image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageModel {
    pub source: ImageSource,
    pub size: Size,
    pub vehicles: Vec<VehicleSnapshot>,
}
