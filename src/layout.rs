//! Declarative sheet layout: named rectangular regions in fractional image
//! coordinates, each carrying a uniform row/column bubble grid.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Slack allowed on `x + w <= 1` style checks, so layouts written as decimal
/// fractions that sum to exactly 1 are not rejected over rounding.
const BOUNDS_EPSILON: f64 = 1e-9;

#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error("failed to read layout {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid layout json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("layout has no region named `{0}`")]
    MissingRegion(String),

    #[error("region `{name}`: {field} = {value} is outside [0, 1]")]
    FractionOutOfRange {
        name: String,
        field: &'static str,
        value: f64,
    },

    #[error("region `{name}` extends past the image ({axis} + extent = {end})")]
    ExtendsPastImage {
        name: String,
        axis: &'static str,
        end: f64,
    },

    #[error("region `{name}` has an empty grid ({rows}x{cols})")]
    EmptyGrid { name: String, rows: usize, cols: usize },

    #[error("region `{name}` has {got} {what}, at most {max} are supported")]
    GridTooLarge {
        name: String,
        what: &'static str,
        got: usize,
        max: usize,
    },
}

/// A rectangle given as fractions of the image size, split into a uniform
/// `rows x cols` grid of bubble cells.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    pub rows: usize,
    pub cols: usize,
}

/// Absolute pixel rectangle. Coordinates may lie outside the image; callers
/// clip before reading pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Region {
    /// Checks the fractional bounds and grid counts.
    pub fn validate(&self, name: &str) -> Result<(), LayoutError> {
        for (field, value) in [("x", self.x), ("y", self.y), ("w", self.w), ("h", self.h)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(LayoutError::FractionOutOfRange {
                    name: name.to_string(),
                    field,
                    value,
                });
            }
        }
        for (axis, end) in [("x", self.x + self.w), ("y", self.y + self.h)] {
            if end > 1.0 + BOUNDS_EPSILON {
                return Err(LayoutError::ExtendsPastImage {
                    name: name.to_string(),
                    axis,
                    end,
                });
            }
        }
        if self.rows == 0 || self.cols == 0 {
            return Err(LayoutError::EmptyGrid {
                name: name.to_string(),
                rows: self.rows,
                cols: self.cols,
            });
        }
        Ok(())
    }

    /// Scales the fractional bounds to `width x height`, truncating toward zero.
    pub fn to_pixels(&self, width: u32, height: u32) -> PixelRect {
        PixelRect {
            x: (self.x * width as f64) as u32,
            y: (self.y * height as f64) as u32,
            w: (self.w * width as f64) as u32,
            h: (self.h * height as f64) as u32,
        }
    }
}

/// Layout file contents: `{ "regions": { "<name>": Region, ... } }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub regions: BTreeMap<String, Region>,
}

impl Layout {
    pub fn from_json_str(s: &str) -> Result<Self, LayoutError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self, LayoutError> {
        let text = fs::read_to_string(path).map_err(|source| LayoutError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Looks up a region by name and validates it. Regions are only checked
    /// when first used, so unrelated entries in a shared layout file do not
    /// block decoding.
    pub fn region(&self, name: &str) -> Result<&Region, LayoutError> {
        let region = self
            .regions
            .get(name)
            .ok_or_else(|| LayoutError::MissingRegion(name.to_string()))?;
        region.validate(name)?;
        Ok(region)
    }
}
