//! End-to-end sheet reading: load, binarize, sample, decode, and optionally
//! draw the debug overlay and grade against an answer key.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use image::DynamicImage;
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::answer_key::{AnswerKey, AnswerKeyError, GradeSummary, grade};
use crate::fill_grid::{FillMatrix, sample_region};
use crate::kornia::{BinarizeConfig, BinarizeError, binarize};
use crate::layout::{Layout, LayoutError};
use crate::plot_overlay::{Axis, OverlayField, debug_image_path, render_overlay};
use crate::sheet_decode::{AnswerConfig, DecodedReport, FieldSelections, IdentifierConfig, decode_form};

/// Default layout names of the student-number and answer grids.
pub const IDENTIFIER_REGION: &str = "tc";
pub const ANSWER_REGION: &str = "turkish";
/// Digit values an identifier column can hold.
const MAX_IDENTIFIER_ROWS: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("failed to open image {path}: {source}")]
    ImageOpen {
        path: String,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to write debug image {path}: {source}")]
    OverlayWrite {
        path: String,
        #[source]
        source: image::ImageError,
    },

    #[error("overlay font failed to load: {0}")]
    OverlayFont(#[from] ab_glyph::InvalidFont),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error(transparent)]
    Binarize(#[from] BinarizeError),

    #[error(transparent)]
    AnswerKey(#[from] AnswerKeyError),

    #[error("failed to read config {path}: {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config json: {0}")]
    ConfigJson(#[from] serde_json::Error),

    #[error("failed to list {path}: {source}")]
    Dir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Everything that tunes how a sheet is read. Missing keys in a config file
/// fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    pub identifier_region: String,
    pub answer_region: String,
    pub binarize: BinarizeConfig,
    pub identifier: IdentifierConfig,
    pub answers: AnswerConfig,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            identifier_region: IDENTIFIER_REGION.to_string(),
            answer_region: ANSWER_REGION.to_string(),
            binarize: BinarizeConfig::default(),
            identifier: IdentifierConfig::default(),
            answers: AnswerConfig::default(),
        }
    }
}

impl DecoderConfig {
    pub fn load(path: &Path) -> Result<Self, ReadError> {
        let text = fs::read_to_string(path).map_err(|source| ReadError::ConfigIo {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Per-call switches for [`SheetReader::read_path`].
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Write `<stem>_debug.jpg` next to the image.
    pub debug_image: bool,
    /// Grade the decoded answers against this key.
    pub answer_key: Option<AnswerKey>,
}

/// Decoded report plus the intermediate matrices, for callers that want to
/// inspect or draw them.
#[derive(Debug, Clone)]
pub struct SheetScan {
    pub report: DecodedReport,
    pub selections: FieldSelections,
    pub identifier_fills: FillMatrix,
    pub answer_fills: FillMatrix,
}

/// What the CLI prints for one sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetOutput {
    #[serde(flatten)]
    pub report: DecodedReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_image: Option<PathBuf>,
    #[serde(flatten)]
    pub grade: Option<GradeSummary>,
}

/// Outcome for one file of a directory run.
#[derive(Debug, Serialize)]
pub struct BatchEntry {
    pub image: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<SheetOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Reads sheets against one layout and configuration. Holds no per-image
/// state and can be shared across threads.
#[derive(Debug, Clone)]
pub struct SheetReader {
    layout: Layout,
    config: DecoderConfig,
}

impl SheetReader {
    pub fn new(layout: Layout, config: DecoderConfig) -> Self {
        Self { layout, config }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decodes an already loaded image.
    pub fn read_image(&self, source: &DynamicImage) -> Result<SheetScan, ReadError> {
        let id_name = self.config.identifier_region.as_str();
        let answer_name = self.config.answer_region.as_str();
        let id_region = self.layout.region(id_name)?;
        let answer_region = self.layout.region(answer_name)?;
        if id_region.rows > MAX_IDENTIFIER_ROWS {
            return Err(LayoutError::GridTooLarge {
                name: id_name.to_string(),
                what: "rows",
                got: id_region.rows,
                max: MAX_IDENTIFIER_ROWS,
            }
            .into());
        }
        let options = self.config.answers.options.len();
        if answer_region.cols > options {
            return Err(LayoutError::GridTooLarge {
                name: answer_name.to_string(),
                what: "columns",
                got: answer_region.cols,
                max: options,
            }
            .into());
        }

        let mask = binarize(source, &self.config.binarize)?;
        let identifier_fills = sample_region(&mask, id_region);
        let answer_fills = sample_region(&mask, answer_region);
        let (report, selections) = decode_form(
            &identifier_fills,
            &answer_fills,
            &self.config.identifier,
            &self.config.answers,
        );
        debug!(
            "decoded student number {} with {} answers, {} warnings",
            report.student_number,
            report.total,
            report.warnings.len()
        );

        Ok(SheetScan {
            report,
            selections,
            identifier_fills,
            answer_fills,
        })
    }

    /// Loads and decodes the image at `path`, then applies `options`.
    pub fn read_path(&self, path: &Path, options: &ReadOptions) -> Result<SheetOutput, ReadError> {
        let source = image::open(path).map_err(|source| ReadError::ImageOpen {
            path: path.display().to_string(),
            source,
        })?;
        let scan = self.read_image(&source)?;

        let debug_image = if options.debug_image {
            let out = debug_image_path(path);
            self.write_overlay(&source, &scan, &out)?;
            Some(out)
        } else {
            None
        };

        let grade = options
            .answer_key
            .as_ref()
            .map(|key| grade(&scan.report.answers, key));

        info!(
            "{}: student {}, {} answers, {} warnings",
            path.display(),
            scan.report.student_number,
            scan.report.total,
            scan.report.warnings.len()
        );

        Ok(SheetOutput {
            report: scan.report,
            debug_image,
            grade,
        })
    }

    /// Draws `scan` over `source` and saves it to `out`.
    pub fn write_overlay(&self, source: &DynamicImage, scan: &SheetScan, out: &Path) -> Result<(), ReadError> {
        let fields = [
            OverlayField {
                region: self.layout.region(&self.config.identifier_region)?,
                axis: Axis::Column,
                picks: scan.selections.identifier.clone(),
            },
            OverlayField {
                region: self.layout.region(&self.config.answer_region)?,
                axis: Axis::Row,
                picks: scan.selections.answers.iter().copied().enumerate().collect(),
            },
        ];
        render_overlay(source, &self.layout, &fields, &scan.report)?
            .save(out)
            .map_err(|source| ReadError::OverlayWrite {
                path: out.display().to_string(),
                source,
            })?;
        debug!("wrote debug image {}", out.display());
        Ok(())
    }

    /// Reads every image in `dir` in parallel, in file-name order. A failing
    /// file is reported in its entry and does not stop the others.
    pub fn read_dir(&self, dir: &Path, options: &ReadOptions) -> Result<Vec<BatchEntry>, ReadError> {
        let images = list_images(dir)?;
        Ok(images
            .into_par_iter()
            .map(|image| match self.read_path(&image, options) {
                Ok(result) => BatchEntry {
                    image,
                    result: Some(result),
                    error: None,
                },
                Err(e) => {
                    warn!("{}: {e}", image.display());
                    BatchEntry {
                        image,
                        result: None,
                        error: Some(e.to_string()),
                    }
                }
            })
            .collect())
    }
}

pub fn is_image_file(path: &Path) -> bool {
    let Some(ext) = path.extension().and_then(OsStr::to_str) else {
        return false;
    };
    matches!(
        ext.to_ascii_lowercase().as_str(),
        "png" | "jpg" | "jpeg" | "bmp" | "gif" | "tif" | "tiff" | "webp"
    )
}

/// Image files directly inside `dir`, sorted. Previously written
/// `*_debug.jpg` overlays are skipped.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>, ReadError> {
    let entries = fs::read_dir(dir).map_err(|source| ReadError::Dir {
        path: dir.display().to_string(),
        source,
    })?;
    let mut images: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file() && is_image_file(p) && !is_debug_overlay(p))
        .collect();
    images.sort();
    Ok(images)
}

fn is_debug_overlay(path: &Path) -> bool {
    path.file_stem()
        .and_then(OsStr::to_str)
        .is_some_and(|stem| stem.ends_with("_debug"))
}
