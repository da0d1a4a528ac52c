//! Vehicle and plate passes over source images.
//!
//! Each vehicle entity runs plate inference at most once in its lifetime. The
//! decided outcome lives in the entity's once-cell; later requests only read
//! the caches and, on a miss, rebuild the crop and plate image from the stored
//! geometry without calling the plate detector again.

use crate::config::PipelineConfig;
use crate::crop::{image_size, prepare_crop, PreparedCrop};
use crate::engine::{PlateDetection, PlateDetector, VehicleDetector, VehicleObservation};
use crate::entity::{
    ImageModel, LicensePlate, PlateOutcome, VehicleEntity, VehicleId, VehicleSnapshot,
};
use crate::error::{PipelineError, PipelineResult};
use crate::loader::{ImageLoader, ImageSource};
use crate::rectify::Rectifier;
use common::{tensor_to_normalized_quad, NormalizedQuad, Size};
use futures::future::join_all;
use image::{DynamicImage, RgbaImage};
use image_cache::{TieredImageCache, TieredStats};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;
use telemetry::metrics::{
    PLATE_INFERENCES, PLATE_INFERENCE_DURATION, TRACKED_VEHICLES, VEHICLE_DETECTIONS,
};
use tracing::{debug, info, warn};

/// A plate with its rectified image, if one could be produced.
#[derive(Debug, Clone)]
pub struct PlateView {
    pub plate: LicensePlate,
    pub image: Option<Arc<RgbaImage>>,
}

/// Display-ready result of the plate pass for one vehicle.
#[derive(Debug, Clone)]
pub struct VehicleView {
    pub vehicle: VehicleSnapshot,
    pub image: Arc<RgbaImage>,
    pub plate: Option<PlateView>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStats {
    pub vehicles: usize,
    pub vehicle_cache: TieredStats,
    pub plate_cache: TieredStats,
}

pub struct PlatePipeline {
    config: PipelineConfig,
    loader: Arc<dyn ImageLoader>,
    vehicle_detector: Arc<dyn VehicleDetector>,
    plate_detector: Arc<dyn PlateDetector>,
    rectifier: Rectifier,
    vehicle_images: TieredImageCache<VehicleId>,
    plate_images: TieredImageCache,
    registry: RwLock<HashMap<VehicleId, Arc<VehicleEntity>>>,
    /// Serialises whole-image vehicle passes
    vehicle_pass: tokio::sync::Mutex<()>,
}

impl PlatePipeline {
    pub fn new(
        config: PipelineConfig,
        loader: Arc<dyn ImageLoader>,
        vehicle_detector: Arc<dyn VehicleDetector>,
        plate_detector: Arc<dyn PlateDetector>,
    ) -> PipelineResult<Self> {
        config
            .validate()
            .map_err(|e| PipelineError::validation(format!("{:#}", e)))?;

        Ok(Self {
            rectifier: Rectifier::new(config.rectifier.clone()),
            vehicle_images: TieredImageCache::new("vehicle", &config.vehicle_cache),
            plate_images: TieredImageCache::new("plate", &config.plate_cache),
            config,
            loader,
            vehicle_detector,
            plate_detector,
            registry: RwLock::new(HashMap::new()),
            vehicle_pass: tokio::sync::Mutex::new(()),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn read_registry(&self) -> RwLockReadGuard<'_, HashMap<VehicleId, Arc<VehicleEntity>>> {
        self.registry.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_registry(&self) -> RwLockWriteGuard<'_, HashMap<VehicleId, Arc<VehicleEntity>>> {
        self.registry.write().unwrap_or_else(|e| e.into_inner())
    }

    fn entity(&self, id: VehicleId) -> PipelineResult<Arc<VehicleEntity>> {
        self.read_registry()
            .get(&id)
            .cloned()
            .ok_or(PipelineError::EntityNotFound(id))
    }

    pub fn vehicle(&self, id: VehicleId) -> Option<VehicleSnapshot> {
        self.read_registry().get(&id).map(|e| e.snapshot())
    }

    pub fn vehicles(&self) -> Vec<VehicleSnapshot> {
        self.read_registry().values().map(|e| e.snapshot()).collect()
    }

    /// Drops a vehicle and every image cached for it.
    pub fn forget(&self, id: VehicleId) -> bool {
        let removed = self.write_registry().remove(&id);
        let Some(entity) = removed else {
            return false;
        };
        self.vehicle_images.remove(&id);
        if let Some(outcome) = entity.outcome.get() {
            for plate in &outcome.plates {
                self.plate_images.remove(&plate.id);
            }
        }
        TRACKED_VEHICLES.set(self.read_registry().len() as i64);
        true
    }

    /// Empties both image caches. Detection outcomes are kept.
    pub fn clear_caches(&self) {
        self.vehicle_images.clear();
        self.plate_images.clear();
        info!("image caches cleared");
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            vehicles: self.read_registry().len(),
            vehicle_cache: self.vehicle_images.stats(),
            plate_cache: self.plate_images.stats(),
        }
    }

    async fn load(&self, source: &ImageSource) -> PipelineResult<Arc<DynamicImage>> {
        self.loader
            .load(source)
            .await
            .map_err(PipelineError::from_load)
    }

    /// Runs the vehicle detector over each source in turn.
    ///
    /// Only one batch runs at a time. Images that fail to load or detect are
    /// logged and left out of the result. The detector is released after
    /// the batch.
    pub async fn detect_vehicles(&self, sources: &[ImageSource]) -> Vec<ImageModel> {
        let _pass = self.vehicle_pass.lock().await;
        let mut models = Vec::with_capacity(sources.len());

        for source in sources {
            match self.detect_vehicles_in(source).await {
                Ok(model) => models.push(model),
                Err(e) => warn!(source = %source, error = %e, "dropping image from batch"),
            }
        }

        if let Err(e) = self.vehicle_detector.release().await {
            warn!(engine = self.vehicle_detector.id(), error = %e, "failed to release vehicle detector");
        }
        models
    }

    async fn detect_vehicles_in(&self, source: &ImageSource) -> PipelineResult<ImageModel> {
        let start = Instant::now();
        let image = self.load(source).await?;
        let size = image_size(&image);
        size.validate("source image")?;

        let observations = self.run_vehicle_detector(image).await?;
        let total = observations.len();

        let mut vehicles = Vec::new();
        for observation in observations {
            if let Some(entity) = self.register(source, size, observation) {
                vehicles.push(entity.snapshot());
            }
        }
        TRACKED_VEHICLES.set(self.read_registry().len() as i64);

        info!(
            source = %source,
            observations = total,
            vehicles = vehicles.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "vehicle pass complete"
        );
        Ok(ImageModel {
            source: source.clone(),
            size,
            vehicles,
        })
    }

    async fn run_vehicle_detector(
        &self,
        image: Arc<DynamicImage>,
    ) -> PipelineResult<Vec<VehicleObservation>> {
        let engine = self.vehicle_detector.id();
        let result =
            tokio::time::timeout(self.config.inference_timeout(), self.vehicle_detector.detect(image))
                .await;
        let (label, result) = match result {
            Err(_) => (
                "timeout",
                Err(PipelineError::engine(format!(
                    "vehicle detector timed out after {}s",
                    self.config.inference_timeout_secs
                ))),
            ),
            Ok(Err(e)) => ("error", Err(PipelineError::from_engine(e))),
            Ok(Ok(observations)) => ("ok", Ok(observations)),
        };
        VEHICLE_DETECTIONS.with_label_values(&[engine, label]).inc();
        result
    }

    fn register(
        &self,
        source: &ImageSource,
        size: Size,
        observation: VehicleObservation,
    ) -> Option<Arc<VehicleEntity>> {
        if !self.config.accepts_category(&observation.category) {
            debug!(category = %observation.category, "skipping non-vehicle observation");
            return None;
        }
        let Some(roi) = observation.bbox.denormalized(size).clamped_to(size) else {
            debug!(source = %source, "skipping box outside the image");
            return None;
        };

        let entity = Arc::new(VehicleEntity::new(
            source.clone(),
            size,
            roi,
            observation.category,
            observation.confidence,
        ));
        self.write_registry().insert(entity.id, entity.clone());
        Some(entity)
    }

    /// Plate pass for one vehicle.
    ///
    /// The first successful call decides the outcome; concurrent first calls
    /// share one inference. An engine failure or cancellation leaves the
    /// vehicle undecided so a later call may try again.
    pub async fn detect_plates(&self, id: VehicleId) -> PipelineResult<VehicleView> {
        let entity = self.entity(id)?;
        let outcome = entity
            .outcome
            .get_or_try_init(|| self.infer_plates(&entity))
            .await?;
        self.assemble_view(&entity, outcome).await
    }

    /// Plate pass for every vehicle of one image, run concurrently. Vehicles
    /// that fail are logged and left out.
    pub async fn detect_plates_for_image(&self, model: &ImageModel) -> Vec<VehicleView> {
        let results = join_all(model.vehicles.iter().map(|v| self.detect_plates(v.id))).await;
        results
            .into_iter()
            .zip(model.vehicles.iter())
            .filter_map(|(result, vehicle)| match result {
                Ok(view) => Some(view),
                Err(e) => {
                    warn!(vehicle_id = %vehicle.id, error = %e, "plate pass failed");
                    None
                }
            })
            .collect()
    }

    async fn prepare(&self, entity: &VehicleEntity) -> PipelineResult<PreparedCrop> {
        let image = self.load(&entity.source).await?;
        let roi = entity.roi;
        let sizing = self.config.sizing;
        let display = self.config.display;
        tokio::task::spawn_blocking(move || prepare_crop(&image, &roi, &sizing, display.as_ref()))
            .await?
    }

    /// Rectified plate image, or `None` when the quad cannot be warped.
    async fn rectify(
        &self,
        vehicle_id: VehicleId,
        input: Arc<RgbaImage>,
        quad: NormalizedQuad,
    ) -> Option<RgbaImage> {
        let rectifier = self.rectifier.clone();
        let result =
            tokio::task::spawn_blocking(move || rectifier.rectify_normalized(&input, &quad)).await;
        let error = match result {
            Ok(Ok(plate)) => return Some(plate),
            Ok(Err(e)) => PipelineError::from(e),
            Err(e) => PipelineError::from(e),
        };
        warn!(vehicle_id = %vehicle_id, error = %error, "no plate image produced");
        None
    }

    async fn run_plate_detector(&self, input: Arc<RgbaImage>) -> PipelineResult<PlateDetection> {
        let engine = self.plate_detector.id();
        let start = Instant::now();
        let result =
            tokio::time::timeout(self.config.inference_timeout(), self.plate_detector.detect(input))
                .await;
        let elapsed = start.elapsed().as_secs_f64();

        let (label, result) = match result {
            Err(_) => (
                "timeout",
                Err(PipelineError::engine(format!(
                    "plate detector timed out after {}s",
                    self.config.inference_timeout_secs
                ))),
            ),
            Ok(Err(e)) => ("error", Err(PipelineError::from_engine(e))),
            Ok(Ok(detection)) => {
                let label = if self.has_plate(&detection) {
                    "plate"
                } else {
                    "no_plate"
                };
                (label, Ok(detection))
            }
        };
        PLATE_INFERENCES.with_label_values(&[engine, label]).inc();
        PLATE_INFERENCE_DURATION
            .with_label_values(&[engine, label])
            .observe(elapsed);
        result
    }

    fn has_plate(&self, detection: &PlateDetection) -> bool {
        detection.has_plate >= self.config.thresholds.has_plate_threshold
    }

    /// Crop, inference, decode and rectification for an undecided vehicle.
    async fn infer_plates(&self, entity: &VehicleEntity) -> PipelineResult<PlateOutcome> {
        let start = Instant::now();
        let prepared = self.prepare(entity).await?;
        let input = Arc::new(prepared.detector_input);
        let detection = self.run_plate_detector(input.clone()).await?;

        self.vehicle_images
            .insert_decoded(Arc::new(prepared.display), entity.id);

        if !self.has_plate(&detection) {
            info!(vehicle_id = %entity.id, "no plate detected");
            return Ok(PlateOutcome::none());
        }

        // From here on the engine has answered; every path yields a final outcome.
        let tensor = match detection.quad.view() {
            Ok(tensor) => tensor,
            Err(e) => {
                warn!(vehicle_id = %entity.id, error = %e, "plate corner tensor is malformed");
                return Ok(PlateOutcome::none());
            }
        };
        let Some(quad) = tensor_to_normalized_quad(&tensor) else {
            warn!(
                vehicle_id = %entity.id,
                shape = ?tensor.shape(),
                "plate corner tensor has unexpected shape"
            );
            return Ok(PlateOutcome::none());
        };

        let mut plate = LicensePlate::new(quad, self.config.rectifier.region);
        if let Some(image) = self.rectify(entity.id, input, quad).await {
            self.plate_images.insert_decoded(Arc::new(image), plate.id);
            plate.rectified = true;
        }

        info!(
            vehicle_id = %entity.id,
            plate_id = %plate.id,
            rectified = plate.rectified,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "plate detected"
        );
        Ok(PlateOutcome::single(plate))
    }

    /// Reads the cached images for a decided vehicle, rebuilding whatever
    /// was evicted from the stored geometry.
    async fn assemble_view(
        &self,
        entity: &VehicleEntity,
        outcome: &PlateOutcome,
    ) -> PipelineResult<VehicleView> {
        let plate = outcome.plates.first();
        let cached_vehicle = self.vehicle_images.get(&entity.id);
        let cached_plate = plate
            .filter(|p| p.rectified)
            .map(|p| self.plate_images.get(&p.id));
        let plate_missing = matches!(cached_plate, Some(None));

        let rebuilt = if cached_vehicle.is_none() || plate_missing {
            debug!(vehicle_id = %entity.id, "cache miss, rebuilding crop");
            let prepared = self.prepare(entity).await?;
            Some((
                Arc::new(prepared.display),
                Arc::new(prepared.detector_input),
            ))
        } else {
            None
        };

        let vehicle_image = match (cached_vehicle, &rebuilt) {
            (Some(image), _) => image,
            (None, Some((display, _))) => {
                self.vehicle_images.insert_decoded(display.clone(), entity.id);
                display.clone()
            }
            (None, None) => {
                return Err(PipelineError::Worker(
                    "vehicle crop neither cached nor rebuilt".to_string(),
                ))
            }
        };

        let plate_view = match plate {
            None => None,
            Some(plate) => {
                let image = match (cached_plate, rebuilt) {
                    (Some(Some(image)), _) => Some(image),
                    (Some(None), Some((_, input))) => {
                        let image = self.rectify(entity.id, input, plate.quad).await.map(Arc::new);
                        if let Some(image) = &image {
                            self.plate_images.insert_decoded(image.clone(), plate.id);
                        }
                        image
                    }
                    _ => None,
                };
                Some(PlateView {
                    plate: plate.clone(),
                    image,
                })
            }
        };

        Ok(VehicleView {
            vehicle: entity.snapshot(),
            image: vehicle_image,
            plate: plate_view,
        })
    }
}
