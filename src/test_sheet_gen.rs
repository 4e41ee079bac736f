//! Synthetic sheets for tests: a fixed layout and a renderer that fills the
//! requested bubbles on white paper. Not part of the reading API.

use std::path::Path;

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_circle_mut;

use crate::fill_grid::cell_geometry;
use crate::layout::{Layout, Region};
use crate::reader::{ANSWER_REGION, IDENTIFIER_REGION};

/// Page size of the generated sheet. Every region bound below lands on a
/// whole pixel at this size, with 30x30 px bubble cells.
pub const SHEET_WIDTH: u32 = 640;
pub const SHEET_HEIGHT: u32 = 1024;

const PAPER: Rgb<u8> = Rgb([255, 255, 255]);
const PENCIL: Rgb<u8> = Rgb([25, 25, 25]);

/// Layout of the generated sheet: a 10x12 student-number grid above a
/// 20-question, 5-option answer grid.
pub fn sample_layout() -> Layout {
    let mut layout = Layout::default();
    layout.regions.insert(
        IDENTIFIER_REGION.to_string(),
        Region {
            x: 0.0625,
            y: 0.03125,
            w: 0.5625,
            h: 0.29296875,
            rows: 10,
            cols: 12,
        },
    );
    layout.regions.insert(
        ANSWER_REGION.to_string(),
        Region {
            x: 0.0625,
            y: 0.375,
            w: 0.234375,
            h: 0.5859375,
            rows: 20,
            cols: 5,
        },
    );
    layout
}

/// Pencil marks to draw on a generated sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetMarks {
    /// One entry per identifier column; `None` leaves the column blank.
    pub identifier: Vec<Option<usize>>,
    /// Marked option columns per answer row; empty is blank, two is a double mark.
    pub answers: Vec<Vec<usize>>,
}

impl SheetMarks {
    /// `digits`: one char per identifier column, a digit marks that row and
    /// anything else leaves the column blank. `answers`: option letters per
    /// row (`""` blank, `"AD"` double mark).
    pub fn new(digits: &str, answers: &[&str]) -> Self {
        Self {
            identifier: digits
                .chars()
                .map(|c| c.to_digit(10).map(|d| d as usize))
                .collect(),
            answers: answers
                .iter()
                .map(|row| {
                    row.chars()
                        .filter(|c| c.is_ascii_uppercase())
                        .map(|c| (c as u8 - b'A') as usize)
                        .collect()
                })
                .collect(),
        }
    }
}

/// Renders a white sheet with filled bubbles for `marks`, using the grids of
/// the identifier and answer regions of `layout`.
pub fn render_sheet(layout: &Layout, marks: &SheetMarks) -> RgbImage {
    let mut img = RgbImage::from_pixel(SHEET_WIDTH, SHEET_HEIGHT, PAPER);

    if let Some(region) = layout.regions.get(IDENTIFIER_REGION) {
        let cells: Vec<(usize, usize)> = marks
            .identifier
            .iter()
            .enumerate()
            .filter_map(|(col, digit)| digit.map(|row| (row, col)))
            .collect();
        fill_cells(&mut img, region, &cells);
    }
    if let Some(region) = layout.regions.get(ANSWER_REGION) {
        let cells: Vec<(usize, usize)> = marks
            .answers
            .iter()
            .enumerate()
            .flat_map(|(row, cols)| cols.iter().map(move |&col| (row, col)))
            .collect();
        fill_cells(&mut img, region, &cells);
    }

    img
}

/// Renders `marks` on the sample layout and writes the sheet to `path`.
pub fn generate_test_sheet(path: &Path, marks: &SheetMarks) -> Result<(), image::ImageError> {
    render_sheet(&sample_layout(), marks).save(path)
}

fn fill_cells(img: &mut RgbImage, region: &Region, cells: &[(usize, usize)]) {
    let geometry = cell_geometry(region, img.width(), img.height());
    for &(row, col) in cells {
        let Some(cell) = geometry.get(row).and_then(|r| r.get(col)).map(|g| g.cell) else {
            continue;
        };
        let radius = (cell.w.min(cell.h) / 3) as i32;
        let center = (
            cell.x as i32 + cell.w as i32 / 2,
            cell.y as i32 + cell.h as i32 / 2,
        );
        draw_filled_circle_mut(img, center, radius, PENCIL);
    }
}
