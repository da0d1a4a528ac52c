//! Points, sizes and rectangles tagged with their coordinate space.

use crate::error::GeometryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// Marker trait for the two coordinate spaces used by the pipeline.
pub trait CoordinateSpace:
    Copy + Clone + fmt::Debug + Default + PartialEq + Send + Sync + 'static
{
    const NAME: &'static str;
}

/// Coordinates relative to an image's width and height, origin top-left.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Normalized;

/// Coordinates in image-pixel units, origin top-left.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pixel;

impl CoordinateSpace for Normalized {
    const NAME: &'static str = "normalized";
}

impl CoordinateSpace for Pixel {
    const NAME: &'static str = "pixel";
}

/// Width and height in pixel units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// True when either side is zero, negative or not finite
    pub fn is_empty(&self) -> bool {
        !(self.width.is_finite() && self.height.is_finite())
            || self.width <= 0.0
            || self.height <= 0.0
    }

    pub fn validate(&self, what: &str) -> Result<(), GeometryError> {
        if self.is_empty() {
            return Err(GeometryError::validation(format!(
                "{} has zero extent ({}x{})",
                what, self.width, self.height
            )));
        }
        Ok(())
    }
}

impl From<(u32, u32)> for Size {
    fn from((width, height): (u32, u32)) -> Self {
        Self::new(width as f64, height as f64)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point<S> {
    pub x: f64,
    pub y: f64,
    #[serde(skip)]
    space: PhantomData<S>,
}

pub type NormalizedPoint = Point<Normalized>;
pub type PixelPoint = Point<Pixel>;

impl<S: CoordinateSpace> Point<S> {
    pub const fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            space: PhantomData,
        }
    }

    pub fn distance_to(&self, other: &Self) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    pub fn approx_eq(&self, other: &Self, tolerance: f64) -> bool {
        (self.x - other.x).abs() <= tolerance && (self.y - other.y).abs() <= tolerance
    }
}

impl<S: CoordinateSpace> fmt::Display for Point<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl NormalizedPoint {
    /// Scales the point into a frame of the given size.
    ///
    /// (0.25, 0.75) denormalized to 200x400 is (50, 300).
    pub fn denormalized(&self, size: Size) -> PixelPoint {
        PixelPoint::new(self.x * size.width, self.y * size.height)
    }
}

impl PixelPoint {
    /// Position of the point relative to a frame of the given size.
    ///
    /// (50, 300) normalized to 200x400 is (0.25, 0.75).
    pub fn normalized(&self, size: Size) -> Result<NormalizedPoint, GeometryError> {
        size.validate("normalization frame")?;
        Ok(NormalizedPoint::new(self.x / size.width, self.y / size.height))
    }
}

/// Axis-aligned rectangle, origin at its top-left corner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect<S> {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(skip)]
    space: PhantomData<S>,
}

pub type NormalizedRect = Rect<Normalized>;
pub type PixelRect = Rect<Pixel>;

impl<S: CoordinateSpace> Rect<S> {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            space: PhantomData,
        }
    }

    pub fn min_x(&self) -> f64 {
        self.x
    }

    pub fn min_y(&self) -> f64 {
        self.y
    }

    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    pub fn origin(&self) -> Point<S> {
        Point::new(self.x, self.y)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.size().is_empty()
    }
}

impl NormalizedRect {
    /// Scales the rectangle into a parent frame of the given size.
    pub fn denormalized(&self, parent: Size) -> PixelRect {
        PixelRect::new(
            self.x * parent.width,
            self.y * parent.height,
            self.width * parent.width,
            self.height * parent.height,
        )
    }
}

impl PixelRect {
    /// Intersection with the frame `(0, 0, bounds)`, or `None` when nothing
    /// of the rectangle lies inside it.
    pub fn clamped_to(&self, bounds: Size) -> Option<PixelRect> {
        let min_x = self.min_x().max(0.0);
        let min_y = self.min_y().max(0.0);
        let max_x = self.max_x().min(bounds.width);
        let max_y = self.max_y().min(bounds.height);

        let clamped = PixelRect::new(min_x, min_y, max_x - min_x, max_y - min_y);
        if clamped.is_empty() {
            None
        } else {
            Some(clamped)
        }
    }

    /// Smallest whole-pixel rectangle covering this one, as `(x, y, w, h)`.
    pub fn pixel_bounds(&self) -> (u32, u32, u32, u32) {
        let x0 = self.min_x().floor().max(0.0);
        let y0 = self.min_y().floor().max(0.0);
        let x1 = self.max_x().ceil().max(x0);
        let y1 = self.max_y().ceil().max(y0);
        (x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_denormalized() {
        let point = NormalizedPoint::new(0.25, 0.75);
        let scaled = point.denormalized(Size::new(400.0, 600.0));
        assert_eq!(scaled, PixelPoint::new(100.0, 450.0));
    }

    #[test]
    fn test_point_normalized() {
        let point = PixelPoint::new(50.0, 300.0);
        let normalized = point.normalized(Size::new(200.0, 400.0)).unwrap();
        assert_eq!(normalized, NormalizedPoint::new(0.25, 0.75));
    }

    #[test]
    fn test_normalize_rejects_empty_frame() {
        let point = PixelPoint::new(1.0, 1.0);
        let result = point.normalized(Size::new(0.0, 10.0));
        assert!(matches!(result, Err(GeometryError::Validation(_))));
    }

    #[test]
    fn test_point_round_trip() {
        let size = Size::new(1280.0, 720.0);
        for (x, y) in [(0.0, 0.0), (0.13, 0.87), (0.5, 0.5), (1.0, 1.0)] {
            let p = NormalizedPoint::new(x, y);
            let back = p.denormalized(size).normalized(size).unwrap();
            assert!(back.approx_eq(&p, 1e-12));
        }
        for (x, y) in [(3.0, 700.0), (640.5, 1.25)] {
            let p = PixelPoint::new(x, y);
            let back = p.normalized(size).unwrap().denormalized(size);
            assert!(back.approx_eq(&p, 1e-9));
        }
    }

    #[test]
    fn test_rect_denormalized() {
        let rect = NormalizedRect::new(0.5, 0.5, 0.75, 0.25);
        let denormalized = rect.denormalized(Size::new(400.0, 600.0));
        assert_eq!(denormalized, PixelRect::new(200.0, 300.0, 300.0, 150.0));
    }

    #[test]
    fn test_rect_clamped() {
        let rect = PixelRect::new(-10.0, 20.0, 50.0, 100.0);
        let clamped = rect.clamped_to(Size::new(30.0, 60.0)).unwrap();
        assert_eq!(clamped, PixelRect::new(0.0, 20.0, 30.0, 40.0));

        let outside = PixelRect::new(100.0, 100.0, 5.0, 5.0);
        assert!(outside.clamped_to(Size::new(30.0, 60.0)).is_none());
    }

    #[test]
    fn test_pixel_bounds_cover_fractional_rect() {
        let rect = PixelRect::new(10.4, 5.6, 20.2, 9.9);
        assert_eq!(rect.pixel_bounds(), (10, 5, 21, 11));
    }
}
