//! Cropping and resampling of vehicle regions.

use crate::config::DisplayProps;
use crate::error::{PipelineError, PipelineResult};
use common::{AdaptiveSizing, PixelRect, Size};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, RgbaImage};

/// Vehicle crop resampled for the plate detector, plus the display copy.
#[derive(Debug, Clone)]
pub struct PreparedCrop {
    /// Input for the plate detector; plate quads are normalized to this image
    pub detector_input: RgbaImage,
    /// Image cached for display
    pub display: RgbaImage,
}

pub fn image_size(image: &DynamicImage) -> Size {
    Size::from(image.dimensions())
}

/// Cuts `roi` out of `image`, clamped to the image bounds.
pub fn crop_region(image: &DynamicImage, roi: &PixelRect) -> PipelineResult<DynamicImage> {
    let size = image_size(image);
    size.validate("source image")?;
    let clamped = roi.clamped_to(size).ok_or_else(|| {
        PipelineError::validation(format!(
            "region ({}, {}, {}x{}) lies outside the {}x{} image",
            roi.x, roi.y, roi.width, roi.height, size.width, size.height
        ))
    })?;
    let (x, y, w, h) = clamped.pixel_bounds();
    let w = w.min(image.width().saturating_sub(x));
    let h = h.min(image.height().saturating_sub(y));
    if w == 0 || h == 0 {
        return Err(PipelineError::validation("cropped region has zero extent"));
    }
    Ok(image.crop_imm(x, y, w, h))
}

/// Resamples a crop to the adaptive detector input size.
pub fn resize_for_detector(crop: &DynamicImage, sizing: &AdaptiveSizing) -> PipelineResult<RgbaImage> {
    let target = sizing.size_for(crop.width(), crop.height())?;
    Ok(image::imageops::resize(
        &crop.to_rgba8(),
        target.width,
        target.height,
        FilterType::Lanczos3,
    ))
}

/// Largest size with the aspect ratio of `(width, height)` that fits `bounds`.
pub fn aspect_fit(width: u32, height: u32, bounds: (u32, u32)) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (0, 0);
    }
    let scale = (bounds.0 as f64 / width as f64).min(bounds.1 as f64 / height as f64);
    let w = ((width as f64 * scale).round() as u32).max(1);
    let h = ((height as f64 * scale).round() as u32).max(1);
    (w, h)
}

/// Downsamples to the display area; images that already fit are returned as is.
pub fn fit_to_display(image: RgbaImage, display: &DisplayProps) -> RgbaImage {
    let (width, height) = image.dimensions();
    let bounds = display.pixel_size();
    if width <= bounds.0 && height <= bounds.1 {
        return image;
    }
    let (w, h) = aspect_fit(width, height, bounds);
    image::imageops::resize(&image, w, h, FilterType::Triangle)
}

/// Full crop preparation for one vehicle region.
pub fn prepare_crop(
    image: &DynamicImage,
    roi: &PixelRect,
    sizing: &AdaptiveSizing,
    display: Option<&DisplayProps>,
) -> PipelineResult<PreparedCrop> {
    let crop = crop_region(image, roi)?;
    let detector_input = resize_for_detector(&crop, sizing)?;
    let display = match display {
        Some(props) => fit_to_display(detector_input.clone(), props),
        None => detector_input.clone(),
    };
    Ok(PreparedCrop {
        detector_input,
        display,
    })
}
