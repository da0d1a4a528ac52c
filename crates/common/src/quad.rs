//! Four-corner regions and their geometric operations.

use crate::geometry::{
    CoordinateSpace, Normalized, NormalizedPoint, Pixel, PixelPoint, PixelRect, Point, Rect, Size,
};
use serde::{Deserialize, Serialize};

/// Screen quadrant a region's centroid falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quadrant {
    TopLeft,
    TopRight,
    BottomRight,
    BottomLeft,
}

impl Quadrant {
    /// The diagonally opposite quadrant
    pub fn opposite(self) -> Self {
        match self {
            Quadrant::TopLeft => Quadrant::BottomRight,
            Quadrant::TopRight => Quadrant::BottomLeft,
            Quadrant::BottomRight => Quadrant::TopLeft,
            Quadrant::BottomLeft => Quadrant::TopRight,
        }
    }
}

/// A quadrilateral given by its corners in clockwise order starting top-left.
///
/// Convexity is not validated; callers supply geometrically sensible corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quad<S> {
    pub tl: Point<S>,
    pub tr: Point<S>,
    pub br: Point<S>,
    pub bl: Point<S>,
}

pub type NormalizedQuad = Quad<Normalized>;
pub type PixelQuad = Quad<Pixel>;

impl<S: CoordinateSpace> Quad<S> {
    pub fn new(tl: Point<S>, tr: Point<S>, br: Point<S>, bl: Point<S>) -> Self {
        Self { tl, tr, br, bl }
    }

    pub fn from_rect(rect: &Rect<S>) -> Self {
        Self {
            tl: Point::new(rect.min_x(), rect.min_y()),
            tr: Point::new(rect.max_x(), rect.min_y()),
            br: Point::new(rect.max_x(), rect.max_y()),
            bl: Point::new(rect.min_x(), rect.max_y()),
        }
    }

    /// Arithmetic mean of the four corners
    pub fn centroid(&self) -> Point<S> {
        let cx = (self.tl.x + self.tr.x + self.br.x + self.bl.x) / 4.0;
        let cy = (self.tl.y + self.tr.y + self.br.y + self.bl.y) / 4.0;
        Point::new(cx, cy)
    }

    /// Corners in the fixed order tl, tr, br, bl
    pub fn points(&self) -> [Point<S>; 4] {
        [self.tl, self.tr, self.br, self.bl]
    }

    /// Shoelace area; positive when the corners run clockwise on screen (y down).
    pub fn signed_area(&self) -> f64 {
        let pts = self.points();
        let mut twice = 0.0;
        for i in 0..4 {
            let a = pts[i];
            let b = pts[(i + 1) % 4];
            twice += a.x * b.y - b.x * a.y;
        }
        twice / 2.0
    }

    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    pub fn approx_eq(&self, other: &Self, tolerance: f64) -> bool {
        self.points()
            .iter()
            .zip(other.points().iter())
            .all(|(a, b)| a.approx_eq(b, tolerance))
    }
}

impl NormalizedQuad {
    /// Scales every corner into a frame of the given size.
    pub fn denormalize(&self, size: Size) -> PixelQuad {
        self.denormalize_with_padding(size, 0.0)
    }

    /// Scales into `size`, then pushes each corner `padding` pixels outward
    /// along its own axes: top corners up, bottom corners down, left corners
    /// left, right corners right.
    pub fn denormalize_with_padding(&self, size: Size, padding: f64) -> PixelQuad {
        let mut tl = self.tl.denormalized(size);
        let mut tr = self.tr.denormalized(size);
        let mut br = self.br.denormalized(size);
        let mut bl = self.bl.denormalized(size);

        if padding != 0.0 {
            tl.x -= padding;
            tl.y -= padding;
            tr.x += padding;
            tr.y -= padding;
            br.x += padding;
            br.y += padding;
            bl.x -= padding;
            bl.y += padding;
        }

        PixelQuad::new(tl, tr, br, bl)
    }

    /// Denormalizes against a sub-rectangle of a larger frame: scale by the
    /// rectangle's size, pad, then translate by its origin.
    pub fn denormalize_in(&self, rect: &PixelRect, padding: f64) -> PixelQuad {
        let scaled = self.denormalize_with_padding(rect.size(), padding);
        let offset = |p: PixelPoint| PixelPoint::new(p.x + rect.min_x(), p.y + rect.min_y());
        PixelQuad::new(
            offset(scaled.tl),
            offset(scaled.tr),
            offset(scaled.br),
            offset(scaled.bl),
        )
    }

    /// Quadrant of the centroid, split at 0.5 on each axis.
    pub fn quadrant(&self) -> Quadrant {
        let centroid = self.centroid();
        match (centroid.x < 0.5, centroid.y < 0.5) {
            (true, true) => Quadrant::TopLeft,
            (false, true) => Quadrant::TopRight,
            (false, false) => Quadrant::BottomRight,
            (true, false) => Quadrant::BottomLeft,
        }
    }
}

impl PixelQuad {
    /// Offsets the polygon outward by `delta` pixels.
    ///
    /// Each edge is translated along its outward normal and the new corners
    /// are the intersections of adjacent translated edges (miter joins), so
    /// rotated and skewed quads keep parallel edges at distance `delta`.
    /// A non-positive `delta` returns the quad unchanged.
    pub fn expand(&self, delta: f64) -> PixelQuad {
        if delta <= 0.0 || !delta.is_finite() {
            return *self;
        }

        let pts = self.points();
        let orientation = if self.signed_area() >= 0.0 { 1.0 } else { -1.0 };

        // (point on translated edge, edge direction) for edge i: pts[i] -> pts[i + 1]
        let mut edges = [(PixelPoint::new(0.0, 0.0), (0.0, 0.0)); 4];
        for (i, edge) in edges.iter_mut().enumerate() {
            let a = pts[i];
            let b = pts[(i + 1) % 4];
            let (dx, dy) = (b.x - a.x, b.y - a.y);
            let len = dx.hypot(dy);
            if len == 0.0 {
                *edge = (a, (0.0, 0.0));
                continue;
            }
            let (nx, ny) = (orientation * dy / len, -orientation * dx / len);
            *edge = (PixelPoint::new(a.x + nx * delta, a.y + ny * delta), (dx, dy));
        }

        let mut corners = pts;
        for (j, corner) in corners.iter_mut().enumerate() {
            let (p1, d1) = edges[(j + 3) % 4];
            let (p2, d2) = edges[j];
            let cross = d1.0 * d2.1 - d1.1 * d2.0;
            if cross.abs() < f64::EPSILON {
                // Parallel neighbours: the corner sits on both lines, shift it
                // with the outgoing edge.
                *corner = p2;
                continue;
            }
            let t = ((p2.x - p1.x) * d2.1 - (p2.y - p1.y) * d2.0) / cross;
            *corner = PixelPoint::new(p1.x + t * d1.0, p1.y + t * d1.1);
        }

        PixelQuad::new(corners[0], corners[1], corners[2], corners[3])
    }
}
