/// Integration tests for the coordinate, quad and overlay geometry
use common::{
    convex_hull, tensor_to_normalized_quad, AdaptiveSizing, NormalizedPoint, NormalizedQuad,
    PixelPoint, PixelQuad, PixelRect, PlateRegion, Quadrant, Size, StridedTensor,
};
use plate_service::overlay::{self, OverlayConfig};
use plate_service::LicensePlate;

fn quad(points: [(f64, f64); 4]) -> NormalizedQuad {
    let [tl, tr, br, bl] = points.map(|(x, y)| NormalizedPoint::new(x, y));
    NormalizedQuad::new(tl, tr, br, bl)
}

#[test]
fn test_centroid_and_quadrant() {
    let plate = quad([(0.20, 0.20), (0.50, 0.20), (0.50, 0.60), (0.20, 0.60)]);
    let centroid = plate.centroid();
    assert!((centroid.x - 0.35).abs() < 1e-12);
    assert!((centroid.y - 0.35).abs() < 1e-12);
    assert_eq!(plate.quadrant(), Quadrant::TopLeft);
}

#[test]
fn test_plate_tensor_to_pixels() {
    // x row then y row, as the plate model emits corners
    let data = [0.1_f32, 0.9, 0.9, 0.1, 0.2, 0.2, 0.8, 0.8];
    let tensor = StridedTensor::new(&data, vec![2, 4], vec![4, 1]).unwrap();
    let plate = tensor_to_normalized_quad(&tensor).unwrap();

    let pixels = plate.denormalize(Size::new(200.0, 100.0));
    assert!(pixels.tl.approx_eq(&PixelPoint::new(20.0, 20.0), 1e-4));
    assert!(pixels.br.approx_eq(&PixelPoint::new(180.0, 80.0), 1e-4));

    let padded = plate.denormalize_with_padding(Size::new(200.0, 100.0), 3.0);
    assert!(padded.tl.approx_eq(&PixelPoint::new(17.0, 17.0), 1e-4));
    assert!(padded.br.approx_eq(&PixelPoint::new(183.0, 83.0), 1e-4));
}

#[test]
fn test_transposed_tensor_reads_by_strides() {
    // Column-major storage of the same corners
    let data = [0.1_f32, 0.2, 0.9, 0.2, 0.9, 0.8, 0.1, 0.8];
    let tensor = StridedTensor::new(&data, vec![2, 4], vec![1, 2]).unwrap();
    let plate = tensor_to_normalized_quad(&tensor).unwrap();
    assert!((plate.tr.x - 0.9).abs() < 1e-6);
    assert!((plate.tr.y - 0.2).abs() < 1e-6);
}

#[test]
fn test_expand_rotated_quad_keeps_edge_offset() {
    let diamond = PixelQuad::new(
        PixelPoint::new(50.0, 0.0),
        PixelPoint::new(100.0, 50.0),
        PixelPoint::new(50.0, 100.0),
        PixelPoint::new(0.0, 50.0),
    );
    let grown = diamond.expand(10.0);
    let offset = 10.0 * 2f64.sqrt();
    assert!(grown.tl.approx_eq(&PixelPoint::new(50.0, -offset), 1e-9));
    assert!(grown.tr.approx_eq(&PixelPoint::new(100.0 + offset, 50.0), 1e-9));
    assert!(grown.area() > diamond.area());
    assert_eq!(diamond.expand(-1.0), diamond);
}

#[test]
fn test_hull_drops_interior_and_collinear() {
    let points: Vec<PixelPoint> = [
        (0.0, 0.0),
        (5.0, 0.0),
        (10.0, 0.0),
        (10.0, 10.0),
        (0.0, 10.0),
        (5.0, 5.0),
        (0.0, 0.0),
    ]
    .iter()
    .map(|&(x, y)| PixelPoint::new(x, y))
    .collect();
    let hull = convex_hull(&points);
    assert_eq!(hull.len(), 4);
    assert!(!hull.contains(&PixelPoint::new(5.0, 0.0)));
    assert!(!hull.contains(&PixelPoint::new(5.0, 5.0)));
}

#[test]
fn test_adaptive_sizing_is_stride_aligned() {
    let sizing = AdaptiveSizing::default();
    for (w, h) in [(1, 1), (37, 913), (640, 480), (1920, 1080)] {
        let size = sizing.size_for(w, h).unwrap();
        assert_eq!(size.width % 16, 0);
        assert_eq!(size.height % 16, 0);
    }
    assert!(sizing.size_for(0, 10).is_err());
}

#[test]
fn test_overlay_places_inset_opposite_plate() {
    let plate = LicensePlate::new(
        quad([(0.10, 0.10), (0.30, 0.10), (0.30, 0.15), (0.10, 0.15)]),
        PlateRegion::Usa,
    );
    let view = Size::new(600.0, 400.0);
    let layout = overlay::layout(view, Size::new(600.0, 400.0), &plate, &OverlayConfig::default())
        .unwrap();

    assert_eq!(layout.inset_quadrant, Quadrant::BottomRight);
    assert_eq!(layout.inset, PixelRect::new(460.0, 325.0, 130.0, 65.0));
    assert!(layout.outline.tl.approx_eq(&PixelPoint::new(60.0, 40.0), 1e-9));
    assert!(layout.callout.len() >= 4);
    assert!(layout.callout.contains(&layout.outline.tl));
}
