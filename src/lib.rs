//! Vehicle and license-plate geometry pipeline.
//!
//! Umbrella crate re-exporting the workspace members so integration tests and
//! downstream users can depend on a single package.

pub use common;
pub use image_cache;
pub use plate_service;
pub use telemetry;
