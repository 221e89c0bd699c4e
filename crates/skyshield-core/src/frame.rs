use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SkyShieldError};
use crate::io::fits::FitsHeader;

/// A single-channel exposure.
/// Pixel values are raw f32 intensities (ADU or normalized, caller's choice).
#[derive(Clone, Debug)]
pub struct Frame {
    /// Pixel data, row-major, shape = (height, width)
    pub data: Array2<f32>,
    /// Per-frame acquisition metadata
    pub metadata: FrameMetadata,
}

impl Frame {
    pub fn new(data: Array2<f32>) -> Self {
        Self {
            data,
            metadata: FrameMetadata::default(),
        }
    }

    pub fn with_metadata(data: Array2<f32>, metadata: FrameMetadata) -> Self {
        Self { data, metadata }
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    pub fn pixel_count(&self) -> usize {
        self.data.len()
    }
}

/// Acquisition metadata resolved by the I/O layer.
#[derive(Clone, Debug, Default)]
pub struct FrameMetadata {
    /// Source file name (no directory).
    pub name: String,
    /// Exposure timestamp, UTC.
    pub timestamp: Option<DateTime<Utc>>,
    /// Observing site, when the header carries one.
    pub site: Option<SiteMetadata>,
    /// Telescope pointing, when the header carries one.
    pub pointing: Option<Pointing>,
    /// Exposure time in seconds.
    pub exposure_s: Option<f64>,
    /// Header cards of the source file, kept for mask provenance.
    pub header: FitsHeader,
}

/// Geographic location of the observatory.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SiteMetadata {
    /// Geodetic latitude, degrees north.
    pub latitude_deg: f64,
    /// Longitude, degrees east.
    pub longitude_deg: f64,
    /// Height above sea level, meters.
    #[serde(default)]
    pub altitude_m: f64,
}

/// Horizontal coordinates of the optical axis.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pointing {
    pub altitude_deg: f64,
    pub azimuth_deg: f64,
}

impl Pointing {
    pub fn zenith() -> Self {
        Self {
            altitude_deg: 90.0,
            azimuth_deg: 0.0,
        }
    }

    pub fn zenith_distance_deg(&self) -> f64 {
        90.0 - self.altitude_deg
    }
}

/// Binary contamination mask. `true` = contaminated pixel.
#[derive(Clone, Debug, PartialEq)]
pub struct Mask {
    pub data: Array2<bool>,
}

impl Mask {
    pub fn new(data: Array2<bool>) -> Self {
        Self { data }
    }

    /// An all-clean mask with the given (height, width).
    pub fn empty(shape: (usize, usize)) -> Self {
        Self {
            data: Array2::from_elem(shape, false),
        }
    }

    /// Build from a 0/1 array; any non-zero value is contaminated.
    pub fn from_u8(data: &Array2<u8>) -> Self {
        Self {
            data: data.mapv(|v| v != 0),
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Number of contaminated pixels.
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    /// Contaminated pixels over total pixels; 0 for an empty array.
    pub fn fraction(&self) -> f64 {
        let total = self.data.len();
        if total == 0 {
            return 0.0;
        }
        self.count() as f64 / total as f64
    }

    pub fn is_empty(&self) -> bool {
        !self.data.iter().any(|&v| v)
    }

    pub fn to_u8(&self) -> Array2<u8> {
        self.data.mapv(u8::from)
    }

    /// Fail unless the mask has the same shape as `frame`.
    pub fn check_congruent(&self, frame: &Frame) -> Result<()> {
        if self.shape() != frame.data.dim() {
            return Err(SkyShieldError::ShapeMismatch {
                frame: frame.data.dim(),
                mask: self.shape(),
            });
        }
        Ok(())
    }
}
