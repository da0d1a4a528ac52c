//! Shared geometry contracts for the plate pipeline.
//!
//! Coordinates live in one of two spaces, normalized (`0.0..=1.0`, origin
//! top-left) or pixel. The space is part of the type, so a normalized point
//! cannot be handed to code expecting pixels without an explicit conversion.

pub mod error;
pub mod geometry;
pub mod hull;
pub mod quad;
pub mod region;
pub mod sizing;
pub mod tensor;

pub use error::{GeometryError, TensorError};
pub use geometry::{
    CoordinateSpace, Normalized, NormalizedPoint, NormalizedRect, Pixel, PixelPoint, PixelRect,
    Point, Rect, Size,
};
pub use hull::convex_hull;
pub use quad::{NormalizedQuad, PixelQuad, Quad, Quadrant};
pub use region::PlateRegion;
pub use sizing::{AdaptiveSizing, PixelSize};
pub use tensor::{tensor_to_normalized_quad, StridedTensor, TensorBuffer, TensorElement};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
