use crate::error::GeometryError;
use serde::{Deserialize, Serialize};

/// Whole-pixel dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelSize {
    pub width: u32,
    pub height: u32,
}

impl PixelSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Smallest multiple of `multiple` that is `>= value`.
pub fn round_up_to_multiple(value: u32, multiple: u32) -> u32 {
    if multiple == 0 {
        return value;
    }
    value.div_ceil(multiple) * multiple
}

/// Input sizing for the plate detector.
///
/// Keeps the crop's aspect ratio, scales the short side towards
/// `base_side * ratio` capped at `max_dimension`, and snaps both sides up to
/// a multiple of `stride`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdaptiveSizing {
    #[serde(default = "default_base_side")]
    pub base_side: u32,
    #[serde(default = "default_stride")]
    pub stride: u32,
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,
}

fn default_base_side() -> u32 {
    288
}

fn default_stride() -> u32 {
    16
}

fn default_max_dimension() -> u32 {
    608
}

impl Default for AdaptiveSizing {
    fn default() -> Self {
        Self {
            base_side: default_base_side(),
            stride: default_stride(),
            max_dimension: default_max_dimension(),
        }
    }
}

impl AdaptiveSizing {
    pub fn size_for(&self, width: u32, height: u32) -> Result<PixelSize, GeometryError> {
        if width == 0 || height == 0 {
            return Err(GeometryError::validation(format!(
                "cannot size a {}x{} crop",
                width, height
            )));
        }

        let (w, h) = (width as f64, height as f64);
        let short = w.min(h);
        let ratio = w.max(h) / short;
        let side = (ratio * self.base_side as f64).round() as u32;
        let bound = round_up_to_multiple(side, self.stride).min(self.max_dimension);
        let factor = bound as f64 / short;

        let new_w = round_up_to_multiple((w * factor).round() as u32, self.stride);
        let new_h = round_up_to_multiple((h * factor).round() as u32, self.stride);
        Ok(PixelSize::new(new_w, new_h))
    }
}
