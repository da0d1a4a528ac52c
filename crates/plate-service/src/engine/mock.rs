//! Deterministic engines for tests and the demo binary.

use super::{PlateDetection, PlateDetector, VehicleDetector, VehicleObservation};
use crate::config::PlateDetectorThresholds;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use common::{NormalizedQuad, NormalizedRect, TensorBuffer};
use image::{DynamicImage, RgbaImage};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted answer of [`MockVehicleDetector`].
#[derive(Debug, Clone)]
pub enum MockVehicleResponse {
    Detections(Vec<VehicleObservation>),
    Fail(String),
}

/// Vehicle detector that replays scripted responses, then a default one.
pub struct MockVehicleDetector {
    default: Vec<VehicleObservation>,
    script: Mutex<VecDeque<MockVehicleResponse>>,
    delay: Duration,
    calls: AtomicUsize,
    releases: AtomicUsize,
}

impl MockVehicleDetector {
    pub fn new(default: Vec<VehicleObservation>) -> Self {
        Self {
            default,
            script: Mutex::new(VecDeque::new()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
        }
    }

    /// One car filling the middle of every image
    pub fn single_car() -> Self {
        Self::new(vec![VehicleObservation::new(
            "car",
            0.92,
            NormalizedRect::new(0.25, 0.25, 0.5, 0.5),
        )])
    }

    /// Queues a response for the next unanswered call
    pub fn then(self, response: MockVehicleResponse) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(response);
        }
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VehicleDetector for MockVehicleDetector {
    fn id(&self) -> &'static str {
        "mock_vehicle_detector"
    }

    async fn detect(&self, _image: Arc<DynamicImage>) -> Result<Vec<VehicleObservation>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let next = self
            .script
            .lock()
            .map_err(|e| anyhow!("Failed to lock mock script: {}", e))?
            .pop_front();
        match next {
            Some(MockVehicleResponse::Detections(observations)) => Ok(observations),
            Some(MockVehicleResponse::Fail(msg)) => Err(anyhow!(msg)),
            None => Ok(self.default.clone()),
        }
    }

    async fn release(&self) -> Result<()> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Scripted answer of [`MockPlateDetector`].
#[derive(Debug, Clone)]
pub enum MockPlateResponse {
    Plate(NormalizedQuad),
    /// Candidate with a confidence, dropped below the score threshold
    Scored(NormalizedQuad, f32),
    NoPlate,
    /// Has-plate set but the corner tensor has the wrong shape
    Malformed,
    /// Has-plate set but the corner buffer is too short for its `[2, 4]` layout
    Truncated,
    Fail(String),
}

impl MockPlateResponse {
    fn into_detection(self, thresholds: &PlateDetectorThresholds) -> Result<PlateDetection> {
        match self {
            MockPlateResponse::Plate(quad) => Ok(PlateDetection {
                has_plate: 1.0,
                quad: quad_tensor(&quad),
            }),
            MockPlateResponse::Scored(quad, score) if score >= thresholds.score_threshold => {
                Ok(PlateDetection {
                    has_plate: score,
                    quad: quad_tensor(&quad),
                })
            }
            MockPlateResponse::Scored(..) | MockPlateResponse::NoPlate => Ok(PlateDetection {
                has_plate: 0.0,
                quad: TensorBuffer::contiguous(vec![0.0; 8], vec![2, 4]),
            }),
            MockPlateResponse::Malformed => Ok(PlateDetection {
                has_plate: 1.0,
                quad: TensorBuffer::contiguous(vec![0.5; 8], vec![8]),
            }),
            MockPlateResponse::Truncated => Ok(PlateDetection {
                has_plate: 1.0,
                quad: TensorBuffer::new(vec![0.5; 2], vec![2, 4], vec![4, 1]),
            }),
            MockPlateResponse::Fail(msg) => Err(anyhow!(msg)),
        }
    }
}

/// Encodes a quad the way the plate model emits it: x row, then y row.
pub fn quad_tensor(quad: &NormalizedQuad) -> TensorBuffer<f32> {
    let points = quad.points();
    let mut data = Vec::with_capacity(8);
    data.extend(points.iter().map(|p| p.x as f32));
    data.extend(points.iter().map(|p| p.y as f32));
    TensorBuffer::contiguous(data, vec![2, 4])
}

pub struct MockPlateDetector {
    thresholds: PlateDetectorThresholds,
    default: MockPlateResponse,
    script: Mutex<VecDeque<MockPlateResponse>>,
    delay: Duration,
    calls: AtomicUsize,
    last_input: Mutex<Option<(u32, u32)>>,
}

impl MockPlateDetector {
    pub fn new(thresholds: PlateDetectorThresholds, default: MockPlateResponse) -> Self {
        Self {
            thresholds,
            default,
            script: Mutex::new(VecDeque::new()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            last_input: Mutex::new(None),
        }
    }

    /// Always finds a slightly skewed plate in the lower half of the crop
    pub fn with_plate(thresholds: PlateDetectorThresholds) -> Self {
        use common::NormalizedPoint;
        let quad = NormalizedQuad::new(
            NormalizedPoint::new(0.30, 0.62),
            NormalizedPoint::new(0.70, 0.60),
            NormalizedPoint::new(0.71, 0.72),
            NormalizedPoint::new(0.31, 0.74),
        );
        Self::new(thresholds, MockPlateResponse::Plate(quad))
    }

    pub fn then(self, response: MockPlateResponse) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(response);
        }
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn thresholds(&self) -> PlateDetectorThresholds {
        self.thresholds
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Dimensions of the most recent crop handed to the detector
    pub fn last_input(&self) -> Option<(u32, u32)> {
        self.last_input.lock().ok().and_then(|guard| *guard)
    }
}

#[async_trait]
impl PlateDetector for MockPlateDetector {
    fn id(&self) -> &'static str {
        "mock_plate_detector"
    }

    async fn detect(&self, crop: Arc<RgbaImage>) -> Result<PlateDetection> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_input.lock() {
            *last = Some(crop.dimensions());
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let next = self
            .script
            .lock()
            .map_err(|e| anyhow!("Failed to lock mock script: {}", e))?
            .pop_front();
        next.unwrap_or_else(|| self.default.clone()).into_detection(&self.thresholds)
    }
}
