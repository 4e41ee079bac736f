//! Samples a binarized sheet over a region's bubble grid, producing one fill
//! ratio per cell.

use image::GrayImage;
use log::debug;

use crate::layout::{PixelRect, Region};

/// Fraction of a cell's width/height trimmed from each side before sampling,
/// keeping printed bubble outlines and neighbouring marks out of the mean.
pub const CELL_PADDING: f64 = 0.2;

/// Row-major matrix of per-cell fill ratios, each in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct FillMatrix {
    rows: usize,
    cols: usize,
    values: Vec<f64>,
}

impl FillMatrix {
    /// Builds a matrix from nested rows. Every row must have the same length.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Option<Self> {
        let n_rows = rows.len();
        let n_cols = rows.first().map_or(0, Vec::len);
        if !rows.iter().all(|r| r.len() == n_cols) {
            return None;
        }
        Some(Self {
            rows: n_rows,
            cols: n_cols,
            values: rows.into_iter().flatten().collect(),
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.cols + col]
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.values[row * self.cols..(row + 1) * self.cols]
    }

    pub fn column(&self, col: usize) -> Vec<f64> {
        (0..self.rows).map(|r| self.get(r, col)).collect()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

/// Absolute geometry of one grid cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellGeometry {
    /// Full cell, as drawn on overlays.
    pub cell: PixelRect,
    /// Padded interior that is actually sampled.
    pub sample: PixelRect,
}

/// Splits `region` into its `rows x cols` cells for an image of the given
/// size. Cell size stays fractional so long rows do not drift; each cell's
/// origin and padding are truncated independently.
pub fn cell_geometry(region: &Region, width: u32, height: u32) -> Vec<Vec<CellGeometry>> {
    let bounds = region.to_pixels(width, height);
    let cell_w = bounds.w as f64 / region.cols as f64;
    let cell_h = bounds.h as f64 / region.rows as f64;
    let pad_x = (cell_w * CELL_PADDING) as u32;
    let pad_y = (cell_h * CELL_PADDING) as u32;
    let sample_w = (cell_w - 2.0 * pad_x as f64) as u32;
    let sample_h = (cell_h - 2.0 * pad_y as f64) as u32;

    (0..region.rows)
        .map(|r| {
            (0..region.cols)
                .map(|c| {
                    let cx = (bounds.x as f64 + c as f64 * cell_w) as u32;
                    let cy = (bounds.y as f64 + r as f64 * cell_h) as u32;
                    CellGeometry {
                        cell: PixelRect {
                            x: cx,
                            y: cy,
                            w: cell_w as u32,
                            h: cell_h as u32,
                        },
                        sample: PixelRect {
                            x: cx.saturating_add(pad_x),
                            y: cy.saturating_add(pad_y),
                            w: sample_w,
                            h: sample_h,
                        },
                    }
                })
                .collect()
        })
        .collect()
}

/// Samples every cell of `region` on a binarized image (ink bright).
pub fn sample_region(mask: &GrayImage, region: &Region) -> FillMatrix {
    let (width, height) = mask.dimensions();
    let cells = cell_geometry(region, width, height);
    let values: Vec<f64> = cells
        .iter()
        .flatten()
        .map(|g| mean_fill(mask, g.sample))
        .collect();
    debug!(
        "sampled {}x{} grid over {:?} on {}x{} image",
        region.rows,
        region.cols,
        region.to_pixels(width, height),
        width,
        height
    );
    FillMatrix {
        rows: region.rows,
        cols: region.cols,
        values,
    }
}

/// Mean intensity of `rect` (clipped to the image) divided by 255; 0 when the
/// clipped rectangle is empty.
pub fn mean_fill(mask: &GrayImage, rect: PixelRect) -> f64 {
    let (width, height) = mask.dimensions();
    let x0 = rect.x.min(width);
    let y0 = rect.y.min(height);
    let x1 = rect.x.saturating_add(rect.w).min(width);
    let y1 = rect.y.saturating_add(rect.h).min(height);
    if x1 <= x0 || y1 <= y0 {
        return 0.0;
    }

    let stride = width as usize;
    let raw = mask.as_raw();
    let mut sum = 0u64;
    for y in y0 as usize..y1 as usize {
        let row = &raw[y * stride + x0 as usize..y * stride + x1 as usize];
        sum += row.iter().map(|&v| v as u64).sum::<u64>();
    }
    let count = ((x1 - x0) as u64) * ((y1 - y0) as u64);
    sum as f64 / count as f64 / 255.0
}
