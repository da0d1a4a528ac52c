use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Real-world plate format, used for its width:height ratio.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlateRegion {
    Usa,
    #[default]
    Europe,
}

impl PlateRegion {
    /// Width divided by height
    pub fn ratio(self) -> f64 {
        match self {
            PlateRegion::Usa => 2.0,
            PlateRegion::Europe => 520.0 / 110.0,
        }
    }

    /// Plate width for a given height, truncated to whole pixels.
    pub fn width_for_height(self, height: u32) -> u32 {
        (height as f64 * self.ratio()) as u32
    }

    /// Plate height for a given width, truncated to whole pixels.
    pub fn height_for_width(self, width: u32) -> u32 {
        (width as f64 / self.ratio()) as u32
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlateRegion::Usa => "usa",
            PlateRegion::Europe => "europe",
        }
    }
}

impl fmt::Display for PlateRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlateRegion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "usa" | "us" => Ok(PlateRegion::Usa),
            "europe" | "eu" => Ok(PlateRegion::Europe),
            other => Err(format!("unknown plate region: {}", other)),
        }
    }
}
