use crate::config::RectifierConfig;
use common::{GeometryError, NormalizedQuad, PixelQuad, PlateRegion, Size};
use image::{Rgba, RgbaImage};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};

/// Corner triangles smaller than this fraction of the squared span are collinear
const COLLINEAR_TOLERANCE: f64 = 1e-6;

/// Maps a four-corner plate region onto an upright rectangle.
#[derive(Debug, Clone)]
pub struct Rectifier {
    config: RectifierConfig,
}

impl Rectifier {
    pub fn new(config: RectifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RectifierConfig {
        &self.config
    }

    /// Output dimensions for a region at the configured height.
    pub fn output_size(&self, region: PlateRegion) -> (u32, u32) {
        let height = self.config.output_height;
        (region.width_for_height(height), height)
    }

    /// Denormalizes `quad` against `source` with the configured padding and
    /// rectifies it for the configured region.
    pub fn rectify_normalized(
        &self,
        source: &RgbaImage,
        quad: &NormalizedQuad,
    ) -> Result<RgbaImage, GeometryError> {
        let size = Size::from(source.dimensions());
        let pixel_quad = quad.denormalize_with_padding(size, self.config.padding);
        self.rectify(source, &pixel_quad, self.config.region)
    }

    /// Projects the pixels inside `quad` onto a `width_for_height(H) x H`
    /// image. Corners outside the source sample as transparent black.
    pub fn rectify(
        &self,
        source: &RgbaImage,
        quad: &PixelQuad,
        region: PlateRegion,
    ) -> Result<RgbaImage, GeometryError> {
        let (src_w, src_h) = source.dimensions();
        if src_w == 0 || src_h == 0 {
            return Err(GeometryError::validation("source image has zero extent"));
        }
        let (width, height) = self.output_size(region);
        if width == 0 || height == 0 {
            return Err(GeometryError::validation(format!(
                "rectified size {}x{} is empty",
                width, height
            )));
        }
        check_non_degenerate(quad)?;

        let from = quad.points().map(|p| (p.x as f32, p.y as f32));
        let (w, h) = (width as f32, height as f32);
        let to = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)];
        let projection = Projection::from_control_points(from, to).ok_or_else(|| {
            GeometryError::transform("no projective mapping for the plate corners")
        })?;

        let mut out = RgbaImage::new(width, height);
        warp_into(
            source,
            &projection,
            Interpolation::Bilinear,
            Rgba([0, 0, 0, 0]),
            &mut out,
        );
        Ok(out)
    }
}

/// Rejects quads with repeated, collinear or non-finite corners.
fn check_non_degenerate(quad: &PixelQuad) -> Result<(), GeometryError> {
    let pts = quad.points();
    if pts.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return Err(GeometryError::transform("plate corners are not finite"));
    }

    let span = pts
        .iter()
        .flat_map(|a| pts.iter().map(move |b| a.distance_to(b)))
        .fold(0.0_f64, f64::max);
    if span == 0.0 {
        return Err(GeometryError::transform("plate corners coincide"));
    }

    let tolerance = COLLINEAR_TOLERANCE * span * span;
    for i in 0..4 {
        let a = pts[i];
        let b = pts[(i + 1) % 4];
        let c = pts[(i + 2) % 4];
        let cross = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x);
        if cross.abs() <= tolerance {
            return Err(GeometryError::transform(format!(
                "plate corners {}, {}, {} are collinear",
                a, b, c
            )));
        }
    }
    Ok(())
}
