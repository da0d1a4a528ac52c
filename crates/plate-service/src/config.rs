use anyhow::{Context, Result};
use common::{AdaptiveSizing, PlateRegion};
use image_cache::ImageCacheConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

/// Output shape of rectified plates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RectifierConfig {
    /// Height of every rectified plate in pixels; width follows the region ratio
    #[serde(default = "default_output_height")]
    pub output_height: u32,

    /// Pixels added around the detected corners before warping
    #[serde(default = "default_padding")]
    pub padding: f64,

    #[serde(default)]
    pub region: PlateRegion,
}

fn default_output_height() -> u32 {
    90
}

fn default_padding() -> f64 {
    3.0
}

impl Default for RectifierConfig {
    fn default() -> Self {
        Self {
            output_height: default_output_height(),
            padding: default_padding(),
            region: PlateRegion::default(),
        }
    }
}

/// Tunables handed to a plate detector when it is built.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlateDetectorThresholds {
    /// Overlap suppression threshold
    #[serde(default = "default_iou_threshold")]
    pub iou_threshold: f32,

    /// Minimum candidate confidence
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f32,

    /// The has-plate output must reach this value to count as a detection
    #[serde(default = "default_has_plate_threshold")]
    pub has_plate_threshold: f32,
}

fn default_iou_threshold() -> f32 {
    0.3
}

fn default_score_threshold() -> f32 {
    0.25
}

fn default_has_plate_threshold() -> f32 {
    0.5
}

impl Default for PlateDetectorThresholds {
    fn default() -> Self {
        Self {
            iou_threshold: default_iou_threshold(),
            score_threshold: default_score_threshold(),
            has_plate_threshold: default_has_plate_threshold(),
        }
    }
}

/// Target display area for cached vehicle crops.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayProps {
    pub width: u32,
    pub height: u32,
    /// Device pixel ratio
    #[serde(default = "default_scale")]
    pub scale: f64,
}

fn default_scale() -> f64 {
    1.0
}

impl DisplayProps {
    /// Display area in device pixels
    pub fn pixel_size(&self) -> (u32, u32) {
        (
            (self.width as f64 * self.scale).round() as u32,
            (self.height as f64 * self.scale).round() as u32,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Vehicle detector categories that become vehicle entities
    #[serde(default = "default_vehicle_categories")]
    pub vehicle_categories: Vec<String>,

    /// Upper bound for a single detector call
    #[serde(default = "default_inference_timeout_secs")]
    pub inference_timeout_secs: u64,

    #[serde(default)]
    pub display: Option<DisplayProps>,

    #[serde(default)]
    pub vehicle_cache: ImageCacheConfig,

    #[serde(default)]
    pub plate_cache: ImageCacheConfig,

    #[serde(default)]
    pub rectifier: RectifierConfig,

    #[serde(default)]
    pub thresholds: PlateDetectorThresholds,

    #[serde(default)]
    pub sizing: AdaptiveSizing,
}

fn default_vehicle_categories() -> Vec<String> {
    vec!["car".to_string(), "bus".to_string(), "truck".to_string()]
}

fn default_inference_timeout_secs() -> u64 {
    30
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            vehicle_categories: default_vehicle_categories(),
            inference_timeout_secs: default_inference_timeout_secs(),
            display: None,
            vehicle_cache: ImageCacheConfig::default(),
            plate_cache: ImageCacheConfig::default(),
            rectifier: RectifierConfig::default(),
            thresholds: PlateDetectorThresholds::default(),
            sizing: AdaptiveSizing::default(),
        }
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    lookup(name)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| anyhow::anyhow!("{}", e))
                .with_context(|| format!("Invalid {}: {:?}", name, raw))
        })
        .transpose()
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from `PLATE_*` variables resolved through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(raw) = lookup("PLATE_VEHICLE_CATEGORIES") {
            let categories: Vec<String> = raw
                .split(',')
                .map(|c| c.trim().to_lowercase())
                .filter(|c| !c.is_empty())
                .collect();
            if categories.is_empty() {
                anyhow::bail!("PLATE_VEHICLE_CATEGORIES must name at least one category");
            }
            config.vehicle_categories = categories;
        }

        if let Some(v) = parse_var(&lookup, "PLATE_INFERENCE_TIMEOUT_SECS")? {
            config.inference_timeout_secs = v;
        }
        if let Some(v) = parse_var(&lookup, "PLATE_CACHE_COUNT_LIMIT")? {
            config.vehicle_cache.count_limit = v;
            config.plate_cache.count_limit = v;
        }
        if let Some(v) = parse_var(&lookup, "PLATE_CACHE_MEMORY_LIMIT")? {
            config.vehicle_cache.memory_limit = v;
            config.plate_cache.memory_limit = v;
        }
        if let Some(v) = parse_var(&lookup, "PLATE_RECTIFY_HEIGHT")? {
            config.rectifier.output_height = v;
        }
        if let Some(v) = parse_var(&lookup, "PLATE_RECTIFY_PADDING")? {
            config.rectifier.padding = v;
        }
        if let Some(v) = parse_var(&lookup, "PLATE_REGION")? {
            config.rectifier.region = v;
        }
        if let Some(v) = parse_var(&lookup, "PLATE_IOU_THRESHOLD")? {
            config.thresholds.iou_threshold = v;
        }
        if let Some(v) = parse_var(&lookup, "PLATE_SCORE_THRESHOLD")? {
            config.thresholds.score_threshold = v;
        }
        if let Some(v) = parse_var(&lookup, "PLATE_HAS_PLATE_THRESHOLD")? {
            config.thresholds.has_plate_threshold = v;
        }

        let width: Option<u32> = parse_var(&lookup, "PLATE_DISPLAY_WIDTH")?;
        let height: Option<u32> = parse_var(&lookup, "PLATE_DISPLAY_HEIGHT")?;
        let scale: Option<f64> = parse_var(&lookup, "PLATE_DISPLAY_SCALE")?;
        config.display = match (width, height) {
            (Some(width), Some(height)) => Some(DisplayProps {
                width,
                height,
                scale: scale.unwrap_or_else(default_scale),
            }),
            (None, None) => None,
            _ => anyhow::bail!("PLATE_DISPLAY_WIDTH and PLATE_DISPLAY_HEIGHT must be set together"),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.inference_timeout_secs == 0 {
            anyhow::bail!("inference timeout must be at least one second");
        }
        if self.rectifier.output_height == 0 {
            anyhow::bail!("rectified plate height must be positive");
        }
        if let Some(display) = &self.display {
            if display.width == 0 || display.height == 0 || display.scale <= 0.0 {
                anyhow::bail!("display props must have a positive size and scale");
            }
        }
        Ok(())
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_secs(self.inference_timeout_secs)
    }

    pub fn accepts_category(&self, category: &str) -> bool {
        self.vehicle_categories
            .iter()
            .any(|c| c.eq_ignore_ascii_case(category))
    }
}
