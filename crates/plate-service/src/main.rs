use anyhow::{Context, Result};
use clap::Parser;
use plate_service::engine::mock::{MockPlateDetector, MockVehicleDetector};
use plate_service::{
    FsImageLoader, ImageSource, PipelineConfig, PlatePipeline, PlateDetector, VehicleDetector,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Runs the vehicle and plate passes over image files and logs one JSON
/// summary per vehicle.
#[derive(Parser)]
#[command(name = "plate-service")]
struct Cli {
    /// Directory image paths are resolved against
    #[arg(long, env = "PLATE_IMAGE_ROOT")]
    root: Option<PathBuf>,

    /// ONNX plate model; the scripted detector is used when absent
    #[arg(long, env = "PLATE_MODEL_PATH")]
    model: Option<PathBuf>,

    /// Print Prometheus metrics when done
    #[arg(long)]
    metrics: bool,

    images: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _guard = telemetry::init_with_service("plate-service");
    let cli = Cli::parse();

    let config = PipelineConfig::from_env().context("Failed to load pipeline configuration")?;
    info!(
        categories = ?config.vehicle_categories,
        region = %config.rectifier.region,
        timeout_secs = config.inference_timeout_secs,
        "plate pipeline configured"
    );

    let loader = match &cli.root {
        Some(root) => FsImageLoader::with_root(root.clone()),
        None => FsImageLoader::new(),
    };
    let vehicle_detector: Arc<dyn VehicleDetector> = Arc::new(MockVehicleDetector::single_car());
    let plate_detector = plate_detector(&cli, &config)?;
    info!(
        vehicle_engine = vehicle_detector.id(),
        plate_engine = plate_detector.id(),
        "engines ready"
    );

    let pipeline = PlatePipeline::new(config, Arc::new(loader), vehicle_detector, plate_detector)?;
    let sources: Vec<ImageSource> = cli
        .images
        .iter()
        .map(|path| ImageSource::from(path.as_path()))
        .collect();
    if sources.is_empty() {
        warn!("no images given");
    }

    for model in pipeline.detect_vehicles(&sources).await {
        for view in pipeline.detect_plates_for_image(&model).await {
            let plate_image = view
                .plate
                .as_ref()
                .and_then(|p| p.image.as_ref())
                .map(|image| image.dimensions());
            let summary = serde_json::json!({
                "vehicle": view.vehicle,
                "crop": view.image.dimensions(),
                "plate_image": plate_image,
            });
            info!(source = %model.source, summary = %summary, "vehicle processed");
        }
    }

    let stats = pipeline.stats();
    info!(
        vehicles = stats.vehicles,
        vehicle_cache_items = stats.vehicle_cache.raw_items,
        plate_cache_items = stats.plate_cache.raw_items,
        "done"
    );

    if cli.metrics {
        println!("{}", telemetry::encode_metrics()?);
    }
    Ok(())
}

#[cfg(feature = "onnx")]
fn plate_detector(cli: &Cli, config: &PipelineConfig) -> Result<Arc<dyn PlateDetector>> {
    use plate_service::engine::onnx::{OnnxPlateConfig, OnnxPlateDetector};

    match &cli.model {
        Some(path) => {
            let detector =
                OnnxPlateDetector::load(OnnxPlateConfig::new(path), config.thresholds)?;
            Ok(Arc::new(detector))
        }
        None => Ok(Arc::new(MockPlateDetector::with_plate(config.thresholds))),
    }
}

#[cfg(not(feature = "onnx"))]
fn plate_detector(cli: &Cli, config: &PipelineConfig) -> Result<Arc<dyn PlateDetector>> {
    if cli.model.is_some() {
        warn!("built without the onnx feature, ignoring --model");
    }
    Ok(Arc::new(MockPlateDetector::with_plate(config.thresholds)))
}
