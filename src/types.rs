use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// Integer pixel dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}×{}", self.width, self.height)
    }
}

/// A detected face, in natural (original image) pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Face {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Face {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Normalized outcome of a successful detection call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub face_count: u32,
    pub faces: Vec<Face>,
}

/// A detection result together with the measured round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub result: DetectionResult,
    pub elapsed: Duration,
}

/// Tuning knobs forwarded to the remote detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionParameters {
    /// Minimum face size in pixels.
    pub min_size: u32,
    /// Image pyramid reduction per scale step, always > 1.0.
    pub scale_factor: f64,
    /// Neighbours a candidate rectangle needs to be kept.
    pub min_neighbors: u32,
}

impl Default for DetectionParameters {
    fn default() -> Self {
        Preset::Balanced.parameters()
    }
}

/// Named parameter sets offered next to the sliders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Accuracy,
    Balanced,
    Speed,
}

impl Preset {
    pub const ALL: [Preset; 3] = [Preset::Accuracy, Preset::Balanced, Preset::Speed];

    pub fn parameters(self) -> DetectionParameters {
        match self {
            Preset::Accuracy => DetectionParameters {
                min_size: 15,
                scale_factor: 1.05,
                min_neighbors: 5,
            },
            Preset::Balanced => DetectionParameters {
                min_size: 20,
                scale_factor: 1.1,
                min_neighbors: 4,
            },
            Preset::Speed => DetectionParameters {
                min_size: 30,
                scale_factor: 1.15,
                min_neighbors: 3,
            },
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Preset::Accuracy => "Accuracy",
            Preset::Balanced => "Balanced",
            Preset::Speed => "Speed",
        }
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "accuracy" => Ok(Preset::Accuracy),
            "balanced" => Ok(Preset::Balanced),
            "speed" => Ok(Preset::Speed),
            _ => Err(format!("unknown preset: {s} (expected accuracy, balanced or speed)")),
        }
    }
}

/// A file handed over by a picker, a drop or a sample fetch, before validation.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// An accepted image, with its decoded preview.
///
/// Assets are never mutated; selecting another file replaces the whole value.
#[derive(Debug, Clone)]
pub struct ImageAsset {
    pub name: String,
    pub raw_bytes: Arc<[u8]>,
    pub mime_type: String,
    pub natural_width: u32,
    pub natural_height: u32,
    pub byte_size: u64,
    pub preview: Arc<RgbaImage>,
}

impl ImageAsset {
    pub fn natural_size(&self) -> Size {
        Size::new(self.natural_width, self.natural_height)
    }
}
