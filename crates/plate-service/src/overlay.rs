//! Placement of the plate outline, inset thumbnail and the callout shape
//! joining them, in the coordinates of the view showing a vehicle image.

use crate::entity::LicensePlate;
use common::{
    convex_hull, GeometryError, NormalizedPoint, NormalizedQuad, PixelPoint, PixelQuad, PixelRect,
    PlateRegion, Quad, Quadrant, Size,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlayConfig {
    #[serde(default = "default_inset_height")]
    pub inset_height: u32,
    #[serde(default = "default_inset_padding")]
    pub inset_padding: f64,
}

fn default_inset_height() -> u32 {
    65
}

fn default_inset_padding() -> f64 {
    10.0
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            inset_height: default_inset_height(),
            inset_padding: default_inset_padding(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayLayout {
    pub inset_quadrant: Quadrant,
    pub inset: PixelRect,
    pub outline: PixelQuad,
    /// Convex hull around outline and inset
    pub callout: Vec<PixelPoint>,
    pub gradient_start: NormalizedPoint,
    pub gradient_end: NormalizedPoint,
}

/// The inset goes diagonally opposite the plate.
pub fn inset_quadrant(plate: &NormalizedQuad) -> Quadrant {
    plate.quadrant().opposite()
}

pub fn inset_size(region: PlateRegion, height: u32) -> Size {
    Size::new(region.width_for_height(height) as f64, height as f64)
}

/// Inset rectangle anchored `padding` pixels inside the quadrant's corner.
pub fn inset_frame(view: Size, quadrant: Quadrant, inset: Size, padding: f64) -> PixelRect {
    let left = padding;
    let right = view.width - inset.width - padding;
    let top = padding;
    let bottom = view.height - inset.height - padding;
    let (x, y) = match quadrant {
        Quadrant::TopLeft => (left, top),
        Quadrant::TopRight => (right, top),
        Quadrant::BottomRight => (right, bottom),
        Quadrant::BottomLeft => (left, bottom),
    };
    PixelRect::new(x, y, inset.width, inset.height)
}

/// Rectangle an image of `image` size occupies when aspect-fitted and
/// centred in `view`.
pub fn content_rect(image: Size, view: Size) -> Result<PixelRect, GeometryError> {
    image.validate("displayed image")?;
    view.validate("view")?;
    let scale = (view.width / image.width).min(view.height / image.height);
    let (w, h) = (image.width * scale, image.height * scale);
    Ok(PixelRect::new(
        (view.width - w) / 2.0,
        (view.height - h) / 2.0,
        w,
        h,
    ))
}

/// Plate outline in view coordinates.
pub fn outline_quad(plate: &NormalizedQuad, content: &PixelRect) -> PixelQuad {
    plate.denormalize_in(content, 0.0)
}

pub fn callout_polygon(outline: &PixelQuad, inset: &PixelRect) -> Vec<PixelPoint> {
    let mut points = outline.points().to_vec();
    points.extend(Quad::from_rect(inset).points());
    convex_hull(&points)
}

pub fn layout(
    view: Size,
    image: Size,
    plate: &LicensePlate,
    config: &OverlayConfig,
) -> Result<OverlayLayout, GeometryError> {
    let content = content_rect(image, view)?;
    let quadrant = inset_quadrant(&plate.quad);
    let inset = inset_frame(
        view,
        quadrant,
        inset_size(plate.region, config.inset_height),
        config.inset_padding,
    );
    let outline = outline_quad(&plate.quad, &content);
    let callout = callout_polygon(&outline, &inset);

    let gradient_start = outline.centroid().normalized(view)?;
    let gradient_end = PixelQuad::from_rect(&inset).centroid().normalized(view)?;

    Ok(OverlayLayout {
        inset_quadrant: quadrant,
        inset,
        outline,
        callout,
        gradient_start,
        gradient_end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plate_at(x: f64, y: f64) -> LicensePlate {
        let quad = NormalizedQuad::from_rect(&common::NormalizedRect::new(x, y, 0.2, 0.05));
        LicensePlate::new(quad, PlateRegion::Europe)
    }

    #[test]
    fn test_inset_quadrant_is_opposite() {
        assert_eq!(
            inset_quadrant(&plate_at(0.6, 0.7).quad),
            Quadrant::TopLeft
        );
        assert_eq!(
            inset_quadrant(&plate_at(0.1, 0.1).quad),
            Quadrant::BottomRight
        );
        assert_eq!(
            inset_quadrant(&plate_at(0.6, 0.1).quad),
            Quadrant::BottomLeft
        );
    }

    #[test]
    fn test_inset_size() {
        assert_eq!(inset_size(PlateRegion::Europe, 65), Size::new(307.0, 65.0));
        assert_eq!(inset_size(PlateRegion::Usa, 65), Size::new(130.0, 65.0));
    }

    #[test]
    fn test_inset_frame_corners() {
        let view = Size::new(800.0, 600.0);
        let inset = Size::new(130.0, 65.0);
        assert_eq!(
            inset_frame(view, Quadrant::TopLeft, inset, 10.0),
            PixelRect::new(10.0, 10.0, 130.0, 65.0)
        );
        assert_eq!(
            inset_frame(view, Quadrant::BottomRight, inset, 10.0),
            PixelRect::new(660.0, 525.0, 130.0, 65.0)
        );
        assert_eq!(
            inset_frame(view, Quadrant::TopRight, inset, 10.0).min_x(),
            660.0
        );
        assert_eq!(
            inset_frame(view, Quadrant::BottomLeft, inset, 10.0).min_y(),
            525.0
        );
    }

    #[test]
    fn test_content_rect_letterboxes() {
        let rect = content_rect(Size::new(400.0, 200.0), Size::new(400.0, 400.0)).unwrap();
        assert_eq!(rect, PixelRect::new(0.0, 100.0, 400.0, 200.0));
        assert!(content_rect(Size::new(0.0, 1.0), Size::new(1.0, 1.0)).is_err());
    }

    #[test]
    fn test_callout_spans_outline_and_inset() {
        let outline = PixelQuad::from_rect(&PixelRect::new(500.0, 400.0, 100.0, 20.0));
        let inset = PixelRect::new(10.0, 10.0, 130.0, 65.0);
        let hull = callout_polygon(&outline, &inset);

        let expected: Vec<PixelPoint> = [
            (10.0, 10.0),
            (140.0, 10.0),
            (600.0, 400.0),
            (600.0, 420.0),
            (500.0, 420.0),
            (10.0, 75.0),
        ]
        .iter()
        .map(|&(x, y)| PixelPoint::new(x, y))
        .collect();
        assert_eq!(hull, expected);
    }

    #[test]
    fn test_layout() {
        let plate = plate_at(0.6, 0.7);
        let layout = layout(
            Size::new(800.0, 400.0),
            Size::new(400.0, 200.0),
            &plate,
            &OverlayConfig::default(),
        )
        .unwrap();

        assert_eq!(layout.inset_quadrant, Quadrant::TopLeft);
        assert_eq!(layout.inset, PixelRect::new(10.0, 10.0, 307.0, 65.0));
        assert!(layout
            .outline
            .tl
            .approx_eq(&PixelPoint::new(480.0, 280.0), 1e-9));
        assert!(layout.gradient_start.x > 0.5 && layout.gradient_start.y > 0.5);
        assert!(layout.gradient_end.x < 0.5 && layout.gradient_end.y < 0.5);
    }
}
