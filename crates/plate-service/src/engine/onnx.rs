//! Plate detector backed by ONNX Runtime.
//!
//! The model takes an NCHW float image sized by the adaptive sizing stage and
//! emits a has-plate score plus a `[2, 4]` corner tensor. When the graph
//! declares `iou_threshold` or `confidence_threshold` inputs they are fed
//! from the thresholds given at construction.

use super::{PlateDetection, PlateDetector};
use crate::config::PlateDetectorThresholds;
use anyhow::{Context, Result};
use async_trait::async_trait;
use common::TensorBuffer;
use image::RgbaImage;
use ndarray::{Array, IxDyn};
use ort::{
    session::{builder::GraphOptimizationLevel, Session, SessionInputValue},
    value::Value,
};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnnxPlateConfig {
    pub model_path: String,

    #[serde(default = "default_image_input")]
    pub image_input: String,

    #[serde(default = "default_flag_output")]
    pub flag_output: String,

    #[serde(default = "default_quad_output")]
    pub quad_output: String,

    #[serde(default = "default_intra_threads")]
    pub intra_threads: usize,
}

fn default_image_input() -> String {
    "image".to_string()
}

fn default_flag_output() -> String {
    "has_plate".to_string()
}

fn default_quad_output() -> String {
    "quad".to_string()
}

fn default_intra_threads() -> usize {
    4
}

impl OnnxPlateConfig {
    /// Config with the default tensor names for the model at `model_path`
    pub fn new(model_path: impl AsRef<std::path::Path>) -> Self {
        Self {
            model_path: model_path.as_ref().display().to_string(),
            image_input: default_image_input(),
            flag_output: default_flag_output(),
            quad_output: default_quad_output(),
            intra_threads: default_intra_threads(),
        }
    }
}

pub struct OnnxPlateDetector {
    inner: Arc<OnnxSession>,
}

struct OnnxSession {
    config: OnnxPlateConfig,
    thresholds: PlateDetectorThresholds,
    session: Mutex<Session>,
    input_names: Vec<String>,
}

impl OnnxPlateDetector {
    pub fn load(config: OnnxPlateConfig, thresholds: PlateDetectorThresholds) -> Result<Self> {
        tracing::info!(model = %config.model_path, "loading plate model on CPU");
        let session = Session::builder()
            .context("Failed to create session builder")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .with_intra_threads(config.intra_threads)
            .context("Failed to set intra threads")?
            .commit_from_file(&config.model_path)
            .with_context(|| format!("Failed to load plate model from {}", config.model_path))?;

        let input_names = session.inputs.iter().map(|i| i.name.clone()).collect();

        Ok(Self {
            inner: Arc::new(OnnxSession {
                config,
                thresholds,
                session: Mutex::new(session),
                input_names,
            }),
        })
    }
}

impl OnnxSession {
    /// RGB planes scaled to `[0, 1]`
    fn preprocess(crop: &RgbaImage) -> Array<f32, IxDyn> {
        let (width, height) = crop.dimensions();
        let mut input = Array::zeros(IxDyn(&[1, 3, height as usize, width as usize]));
        for (x, y, pixel) in crop.enumerate_pixels() {
            input[[0, 0, y as usize, x as usize]] = pixel[0] as f32 / 255.0;
            input[[0, 1, y as usize, x as usize]] = pixel[1] as f32 / 255.0;
            input[[0, 2, y as usize, x as usize]] = pixel[2] as f32 / 255.0;
        }
        input
    }

    fn scalar(value: f32) -> Result<SessionInputValue<'static>> {
        let array = Array::from_elem(IxDyn(&[1]), value);
        Ok(Value::from_array(array)?.into())
    }

    fn run(&self, crop: &RgbaImage) -> Result<PlateDetection> {
        let mut inputs: Vec<(Cow<'static, str>, SessionInputValue<'static>)> = Vec::new();
        let image = Value::from_array(Self::preprocess(crop))?;
        inputs.push((Cow::Owned(self.config.image_input.clone()), image.into()));

        for (name, value) in [
            ("iou_threshold", self.thresholds.iou_threshold),
            ("confidence_threshold", self.thresholds.score_threshold),
        ] {
            if self.input_names.iter().any(|n| n == name) {
                inputs.push((Cow::Borrowed(name), Self::scalar(value)?));
            }
        }

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("Failed to lock plate session: {}", e))?;
        let outputs = session.run(inputs)?;

        let flag = outputs
            .get(self.config.flag_output.as_str())
            .with_context(|| format!("No output named {}", self.config.flag_output))?;
        let (_, flag_data) = flag.try_extract_tensor::<f32>()?;
        let has_plate = flag_data.first().copied().unwrap_or(0.0);

        let quad = outputs
            .get(self.config.quad_output.as_str())
            .with_context(|| format!("No output named {}", self.config.quad_output))?;
        let (shape, data) = quad.try_extract_tensor::<f32>()?;
        let shape: Vec<usize> = shape.as_ref().iter().map(|&x| x as usize).collect();

        Ok(PlateDetection {
            has_plate,
            quad: TensorBuffer::contiguous(data.to_vec(), shape),
        })
    }
}

#[async_trait]
impl PlateDetector for OnnxPlateDetector {
    fn id(&self) -> &'static str {
        "onnx_plate_detector"
    }

    async fn detect(&self, crop: Arc<RgbaImage>) -> Result<PlateDetection> {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || inner.run(&crop))
            .await
            .context("Plate inference worker stopped")?
            .context("Plate inference failed")
    }
}
