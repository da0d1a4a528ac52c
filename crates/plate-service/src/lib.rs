//! Vehicle and license plate detection over still images.
//!
//! A [`PlatePipeline`] finds vehicles in source images, runs plate
//! inference on each vehicle crop at most once, and serves the crop and the
//! rectified plate from two-level image caches.

pub mod config;
pub mod crop;
pub mod engine;
pub mod entity;
pub mod error;
pub mod loader;
pub mod orchestrator;
pub mod overlay;
pub mod rectify;

pub use config::{DisplayProps, PipelineConfig, PlateDetectorThresholds, RectifierConfig};
pub use engine::{PlateDetection, PlateDetector, VehicleDetector, VehicleObservation};
pub use entity::{
    DetectionState, ImageModel, LicensePlate, PlateId, PlateOutcome, VehicleEntity, VehicleId,
    VehicleSnapshot,
};
pub use error::{PipelineError, PipelineResult};
pub use loader::{FsImageLoader, ImageLoader, ImageSource, MemoryImageLoader};
pub use orchestrator::{PipelineStats, PlatePipeline, PlateView, VehicleView};
pub use overlay::{OverlayConfig, OverlayLayout};
pub use rectify::Rectifier;
