/// End-to-end tests for the vehicle and plate passes over files on disk
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::future::join_all;
use image::{DynamicImage, Rgba, RgbaImage};
use plate_service::engine::mock::{MockPlateDetector, MockPlateResponse, MockVehicleDetector};
use plate_service::{
    DetectionState, FsImageLoader, ImageSource, PipelineConfig, PipelineError, PlatePipeline,
    PlateDetectorThresholds, VehicleDetector, VehicleObservation,
};
use common::{NormalizedRect, PlateRegion};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

fn init_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Writes a gradient street scene with a bright plate-like band
fn write_scene(dir: &TempDir, name: &str, width: u32, height: u32) {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        let in_band = y > height * 6 / 10 && y < height * 7 / 10 && x > width / 3 && x < width * 2 / 3;
        if in_band {
            Rgba([250, 250, 250, 255])
        } else {
            Rgba([(x % 200) as u8, (y % 200) as u8, 60, 255])
        }
    });
    img.save(dir.path().join(name)).unwrap();
}

/// Two cars per image; fails on the first call
struct FlakyDetector {
    calls: AtomicUsize,
}

#[async_trait]
impl VehicleDetector for FlakyDetector {
    fn id(&self) -> &'static str {
        "flaky_vehicle_detector"
    }

    async fn detect(&self, _image: Arc<DynamicImage>) -> Result<Vec<VehicleObservation>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(anyhow!("warming up"));
        }
        Ok(vec![
            VehicleObservation::new("car", 0.9, NormalizedRect::new(0.0, 0.0, 0.5, 1.0)),
            VehicleObservation::new("truck", 0.7, NormalizedRect::new(0.5, 0.0, 0.5, 1.0)),
            VehicleObservation::new("bicycle", 0.95, NormalizedRect::new(0.4, 0.4, 0.1, 0.1)),
        ])
    }
}

fn pipeline(dir: &TempDir, config: PipelineConfig) -> (PlatePipeline, Arc<MockPlateDetector>) {
    let plates = Arc::new(MockPlateDetector::with_plate(config.thresholds));
    let pipeline = PlatePipeline::new(
        config,
        Arc::new(FsImageLoader::with_root(dir.path())),
        Arc::new(MockVehicleDetector::single_car()),
        plates.clone(),
    )
    .unwrap();
    (pipeline, plates)
}

#[tokio::test]
async fn test_full_pass_from_disk() {
    init_logging();
    let dir = TempDir::new().unwrap();
    write_scene(&dir, "front.png", 640, 480);
    let (pipeline, plates) = pipeline(&dir, PipelineConfig::default());

    let models = pipeline
        .detect_vehicles(&[ImageSource::new("front.png")])
        .await;
    assert_eq!(models.len(), 1);
    assert_eq!(models[0].size, common::Size::new(640.0, 480.0));

    let views = pipeline.detect_plates_for_image(&models[0]).await;
    assert_eq!(views.len(), 1);
    let view = &views[0];
    let plate = view.plate.as_ref().unwrap();
    assert_eq!(plate.plate.region, PlateRegion::Europe);
    assert_eq!(plate.image.as_ref().unwrap().dimensions(), (425, 90));
    assert!(matches!(view.vehicle.state, DetectionState::HasDetections(ref p) if p.len() == 1));
    assert_eq!(plates.calls(), 1);
}

#[tokio::test]
async fn test_usa_region_and_display_bounds() {
    let dir = TempDir::new().unwrap();
    write_scene(&dir, "rear.png", 800, 600);
    let config = PipelineConfig::from_lookup(|name| match name {
        "PLATE_REGION" => Some("usa".to_string()),
        "PLATE_DISPLAY_WIDTH" => Some("120".to_string()),
        "PLATE_DISPLAY_HEIGHT" => Some("120".to_string()),
        _ => None,
    })
    .unwrap();
    let (pipeline, _) = pipeline(&dir, config);

    let models = pipeline.detect_vehicles(&[ImageSource::new("rear.png")]).await;
    let view = pipeline
        .detect_plates(models[0].vehicles[0].id)
        .await
        .unwrap();

    let (w, h) = view.image.dimensions();
    assert!(w <= 120 && h <= 120);
    let plate = view.plate.unwrap();
    assert_eq!(plate.plate.region, PlateRegion::Usa);
    assert_eq!(plate.image.unwrap().dimensions(), (180, 90));
}

#[tokio::test]
async fn test_batch_skips_failures_and_filters_categories() {
    let dir = TempDir::new().unwrap();
    write_scene(&dir, "a.png", 320, 240);
    write_scene(&dir, "b.png", 320, 240);
    std::fs::write(dir.path().join("broken.png"), b"not an image").unwrap();

    let pipeline = PlatePipeline::new(
        PipelineConfig::default(),
        Arc::new(FsImageLoader::with_root(dir.path())),
        Arc::new(FlakyDetector {
            calls: AtomicUsize::new(0),
        }),
        Arc::new(MockPlateDetector::with_plate(
            PlateDetectorThresholds::default(),
        )),
    )
    .unwrap();

    let models = pipeline
        .detect_vehicles(&[
            ImageSource::new("a.png"),
            ImageSource::new("broken.png"),
            ImageSource::new("b.png"),
        ])
        .await;

    assert_eq!(models.len(), 1);
    assert_eq!(models[0].source.as_str(), "b.png");
    let categories: Vec<_> = models[0].vehicles.iter().map(|v| v.category.clone()).collect();
    assert_eq!(categories, vec!["car", "truck"]);
    assert_eq!(pipeline.vehicles().len(), 2);
}

#[tokio::test]
async fn test_inference_memoized_across_cache_loss() {
    let dir = TempDir::new().unwrap();
    write_scene(&dir, "front.png", 640, 480);
    let (pipeline, plates) = pipeline(&dir, PipelineConfig::default());

    let models = pipeline
        .detect_vehicles(&[ImageSource::new("front.png")])
        .await;
    let id = models[0].vehicles[0].id;

    let requests = (0..4).map(|_| pipeline.detect_plates(id));
    let views: Vec<_> = join_all(requests)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();
    let plate_id = views[0].plate.as_ref().unwrap().plate.id;
    assert!(views
        .iter()
        .all(|v| v.plate.as_ref().unwrap().plate.id == plate_id));

    pipeline.clear_caches();
    let rebuilt = pipeline.detect_plates(id).await.unwrap();
    assert_eq!(rebuilt.plate.unwrap().plate.id, plate_id);
    assert_eq!(plates.calls(), 1);
}

#[tokio::test]
async fn test_no_plate_is_final() {
    let dir = TempDir::new().unwrap();
    write_scene(&dir, "empty.png", 200, 200);
    let plates = Arc::new(MockPlateDetector::new(
        PlateDetectorThresholds::default(),
        MockPlateResponse::NoPlate,
    ));
    let pipeline = PlatePipeline::new(
        PipelineConfig::default(),
        Arc::new(FsImageLoader::with_root(dir.path())),
        Arc::new(MockVehicleDetector::single_car()),
        plates.clone(),
    )
    .unwrap();

    let models = pipeline
        .detect_vehicles(&[ImageSource::new("empty.png")])
        .await;
    let id = models[0].vehicles[0].id;
    for _ in 0..3 {
        let view = pipeline.detect_plates(id).await.unwrap();
        assert!(view.plate.is_none());
        assert_eq!(view.vehicle.state, DetectionState::NoDetections);
    }
    assert_eq!(plates.calls(), 1);
}

#[tokio::test]
async fn test_forget_and_unknown_ids() {
    let dir = TempDir::new().unwrap();
    write_scene(&dir, "front.png", 320, 240);
    let (pipeline, _) = pipeline(&dir, PipelineConfig::default());

    let models = pipeline
        .detect_vehicles(&[ImageSource::new("front.png")])
        .await;
    let id = models[0].vehicles[0].id;
    pipeline.detect_plates(id).await.unwrap();

    assert!(pipeline.forget(id));
    assert!(matches!(
        pipeline.detect_plates(id).await,
        Err(PipelineError::EntityNotFound(_))
    ));
    assert!(matches!(
        pipeline.detect_plates(uuid::Uuid::new_v4()).await,
        Err(PipelineError::EntityNotFound(_))
    ));
}

#[test]
fn test_invalid_config_rejected() {
    let config = PipelineConfig {
        inference_timeout_secs: 0,
        ..PipelineConfig::default()
    };
    let result = PlatePipeline::new(
        config,
        Arc::new(FsImageLoader::new()),
        Arc::new(MockVehicleDetector::single_car()),
        Arc::new(MockPlateDetector::with_plate(
            PlateDetectorThresholds::default(),
        )),
    );
    assert!(matches!(result, Err(PipelineError::Validation(_))));
}

#[tokio::test]
async fn test_metrics_exported_after_pass() {
    let dir = TempDir::new().unwrap();
    write_scene(&dir, "front.png", 320, 240);
    let (pipeline, _) = pipeline(&dir, PipelineConfig::default());
    let models = pipeline
        .detect_vehicles(&[ImageSource::new("front.png")])
        .await;
    pipeline.detect_plates_for_image(&models[0]).await;

    let text = telemetry::encode_metrics().unwrap();
    assert!(text.contains("plate_inference_total"));
    assert!(text.contains("image_cache_requests_total"));
    assert!(text.contains("mock_plate_detector"));
}
