//! Debug overlay: layout boxes, bubble grids and the decoder's picks drawn on
//! top of the scanned sheet.

use std::path::{Path, PathBuf};

use ab_glyph::{FontRef, InvalidFont, PxScale};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use log::warn;

use crate::decision::Selection;
use crate::fill_grid::{CellGeometry, cell_geometry};
use crate::layout::{Layout, PixelRect, Region};
use crate::sheet_decode::DecodedReport;

const FONT_DATA: &[u8] = include_bytes!("../assets/DejaVuSansMono.ttf");

const COLOR_REGION: Rgb<u8> = Rgb([0, 255, 0]);
const COLOR_GRID: Rgb<u8> = Rgb([170, 225, 170]);
const COLOR_PICK: Rgb<u8> = Rgb([40, 90, 230]);
const COLOR_UNCLEAR: Rgb<u8> = Rgb([230, 40, 40]);
const COLOR_REGION_LABEL: Rgb<u8> = Rgb([0, 200, 0]);
const COLOR_STUDENT_LABEL: Rgb<u8> = Rgb([0, 0, 255]);
const REGION_THICKNESS: i32 = 2;
const REGION_LABEL_SCALE: f32 = 16.0;
const STUDENT_LABEL_SCALE: f32 = 22.0;
/// Offset of a region's name from the region's top-left corner.
const REGION_LABEL_INSET: i32 = 4;
/// Top-left corner of the `student:<number>` label.
const STUDENT_LABEL_AT: (i32, i32) = (20, 22);

/// Which way a field's groups run through its grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Each column is a group; the selection names a row (digits).
    Column,
    /// Each row is a group; the selection names a column (answers).
    Row,
}

/// One decoded field to annotate.
#[derive(Debug, Clone)]
pub struct OverlayField<'a> {
    pub region: &'a Region,
    pub axis: Axis,
    /// `(group index, selection)` pairs; groups not listed are left plain.
    pub picks: Vec<(usize, Selection)>,
}

/// Draws every valid layout region with its name, the picks of `fields`
/// and the decoded student number onto an RGB copy of `source`. Regions that
/// fail validation are skipped.
pub fn render_overlay(
    source: &DynamicImage,
    layout: &Layout,
    fields: &[OverlayField<'_>],
    report: &DecodedReport,
) -> Result<RgbImage, InvalidFont> {
    let font = FontRef::try_from_slice(FONT_DATA)?;
    let mut canvas = source.to_rgb8();
    let (width, height) = canvas.dimensions();

    for name in layout.regions.keys() {
        let region = match layout.region(name) {
            Ok(region) => region,
            Err(e) => {
                warn!("overlay skips region: {e}");
                continue;
            }
        };
        let bounds = region.to_pixels(width, height);
        if region.rows > bounds.h.max(1) as usize || region.cols > bounds.w.max(1) as usize {
            warn!(
                "overlay skips region `{name}`: {}x{} grid in {}x{} px",
                region.rows, region.cols, bounds.w, bounds.h
            );
            continue;
        }
        for cell in cell_geometry(region, width, height).iter().flatten() {
            draw_box(&mut canvas, cell.cell, COLOR_GRID, 1);
        }
        draw_box(&mut canvas, bounds, COLOR_REGION, REGION_THICKNESS);
        draw_text_mut(
            &mut canvas,
            COLOR_REGION_LABEL,
            bounds.x as i32 + REGION_LABEL_INSET,
            bounds.y as i32 + REGION_LABEL_INSET,
            PxScale::from(REGION_LABEL_SCALE),
            &font,
            name,
        );
    }

    for field in fields {
        let cells = cell_geometry(field.region, width, height);
        for &(group, selection) in &field.picks {
            let line = group_cells(&cells, field.axis, group);
            if line.is_empty() {
                continue;
            }
            match selection {
                Selection::Resolved(i) => {
                    if let Some(cell) = line.get(i) {
                        draw_pick(&mut canvas, cell.cell);
                    }
                }
                Selection::Indeterminate(_) => {
                    draw_box(&mut canvas, union(&line), COLOR_UNCLEAR, REGION_THICKNESS);
                }
            }
        }
    }

    draw_text_mut(
        &mut canvas,
        COLOR_STUDENT_LABEL,
        STUDENT_LABEL_AT.0,
        STUDENT_LABEL_AT.1,
        PxScale::from(STUDENT_LABEL_SCALE),
        &font,
        &format!("student:{}", report.student_number),
    );

    Ok(canvas)
}

/// `<dir>/<stem>_debug.jpg` next to the scanned image.
pub fn debug_image_path(image_path: &Path) -> PathBuf {
    let stem = image_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "sheet".to_string());
    image_path.with_file_name(format!("{stem}_debug.jpg"))
}

fn group_cells(cells: &[Vec<CellGeometry>], axis: Axis, group: usize) -> Vec<CellGeometry> {
    match axis {
        Axis::Row => cells.get(group).cloned().unwrap_or_default(),
        Axis::Column => cells.iter().filter_map(|row| row.get(group).copied()).collect(),
    }
}

fn union(cells: &[CellGeometry]) -> PixelRect {
    let x0 = cells.iter().map(|c| c.cell.x).min().unwrap_or(0);
    let y0 = cells.iter().map(|c| c.cell.y).min().unwrap_or(0);
    let x1 = cells.iter().map(|c| c.cell.x + c.cell.w).max().unwrap_or(0);
    let y1 = cells.iter().map(|c| c.cell.y + c.cell.h).max().unwrap_or(0);
    PixelRect {
        x: x0,
        y: y0,
        w: x1.saturating_sub(x0),
        h: y1.saturating_sub(y0),
    }
}

fn draw_box(canvas: &mut RgbImage, rect: PixelRect, color: Rgb<u8>, thickness: i32) {
    for inset in 0..thickness {
        let w = rect.w as i32 - 2 * inset;
        let h = rect.h as i32 - 2 * inset;
        if w <= 0 || h <= 0 {
            return;
        }
        let r = Rect::at(rect.x as i32 + inset, rect.y as i32 + inset).of_size(w as u32, h as u32);
        draw_hollow_rect_mut(canvas, r, color);
    }
}

fn draw_pick(canvas: &mut RgbImage, cell: PixelRect) {
    let radius = (cell.w.min(cell.h) / 3) as i32;
    if radius == 0 {
        return;
    }
    let center = (
        cell.x as i32 + cell.w as i32 / 2,
        cell.y as i32 + cell.h as i32 / 2,
    );
    draw_filled_circle_mut(canvas, center, radius, COLOR_PICK);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::Indeterminate;

    fn layout_with(name: &str, region: Region) -> Layout {
        let mut layout = Layout::default();
        layout.regions.insert(name.to_string(), region);
        layout
    }

    fn report(student_number: &str) -> DecodedReport {
        DecodedReport {
            answers: Vec::new(),
            total: 0,
            warnings: Vec::new(),
            student_number: student_number.to_string(),
        }
    }

    fn white(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([255, 255, 255])))
    }

    /// Pixels inside `[x0, x1) x [y0, y1)` accepted by `is_ink`.
    fn ink_in(canvas: &RgbImage, (x0, y0, x1, y1): (u32, u32, u32, u32), is_ink: impl Fn(&Rgb<u8>) -> bool) -> usize {
        (y0..y1)
            .flat_map(|y| (x0..x1).map(move |x| (x, y)))
            .filter(|&(x, y)| is_ink(canvas.get_pixel(x, y)))
            .count()
    }

    #[test]
    fn debug_path_sits_next_to_image() {
        assert_eq!(
            debug_image_path(Path::new("/scans/sheet_01.png")),
            PathBuf::from("/scans/sheet_01_debug.jpg")
        );
        assert_eq!(debug_image_path(Path::new("a.jpeg")), PathBuf::from("a_debug.jpg"));
    }

    #[test]
    fn marks_picks_and_unclear_groups() {
        let region = Region { x: 0.0, y: 0.0, w: 1.0, h: 1.0, rows: 2, cols: 2 };
        let layout = layout_with("answers", region);
        let source = white(40, 40);
        let field = OverlayField {
            region: &region,
            axis: Axis::Row,
            picks: vec![
                (0, Selection::Resolved(1)),
                (1, Selection::Indeterminate(Indeterminate::NoMark)),
            ],
        };
        let canvas = render_overlay(&source, &layout, &[field], &report("")).unwrap();
        assert_eq!(canvas.dimensions(), (40, 40));
        // centre of cell (0, 1)
        assert_eq!(*canvas.get_pixel(30, 10), COLOR_PICK);
        // inner edge of the unclear row box, inside the region border
        assert_eq!(*canvas.get_pixel(10, 21), COLOR_UNCLEAR);
        // region border wins at the outer edge
        assert_eq!(*canvas.get_pixel(0, 0), COLOR_REGION);
        // untouched paper in cell (1, 0), left of the student label
        assert_eq!(*canvas.get_pixel(10, 30), Rgb([255, 255, 255]));
    }

    #[test]
    fn column_groups_pick_rows() {
        let region = Region { x: 0.0, y: 0.0, w: 1.0, h: 1.0, rows: 3, cols: 2 };
        let cells = cell_geometry(&region, 20, 30);
        let column = group_cells(&cells, Axis::Column, 1);
        assert_eq!(column.len(), 3);
        assert!(column.iter().all(|c| c.cell.x == 10));
        assert!(group_cells(&cells, Axis::Row, 5).is_empty());
    }

    #[test]
    fn labels_regions_and_student_number() {
        let region = Region { x: 0.25, y: 0.5, w: 0.5, h: 0.4, rows: 1, cols: 1 };
        let layout = layout_with("tc", region);
        let canvas = render_overlay(&white(240, 160), &layout, &[], &report("12345678")).unwrap();

        // region at (60, 80); its name starts just inside the corner
        let green = |p: &Rgb<u8>| p[1] > p[0].saturating_add(100) && p[1] > p[2].saturating_add(100);
        assert!(ink_in(&canvas, (63, 83, 110, 104), green) > 10);
        // nothing green outside the region
        assert_eq!(ink_in(&canvas, (0, 0, 240, 78), green), 0);

        let blue = |p: &Rgb<u8>| p[2] > p[0].saturating_add(100);
        assert!(ink_in(&canvas, (20, 22, 200, 50), blue) > 10);
    }

    #[test]
    fn invalid_regions_are_skipped_not_drawn() {
        let mut layout = layout_with("tc", Region { x: 0.0, y: 0.0, w: 0.5, h: 0.5, rows: 2, cols: 2 });
        layout
            .regions
            .insert("notes".into(), Region { x: 1e10, y: 0.1, w: 0.1, h: 0.1, rows: 1, cols: 1 });
        layout
            .regions
            .insert("strip".into(), Region { x: 0.6, y: 0.6, w: 0.1, h: 0.1, rows: 1_000_000_000, cols: 1 });

        let canvas = render_overlay(&white(640, 1024), &layout, &[], &report("?")).unwrap();
        assert_eq!(canvas.dimensions(), (640, 1024));
        assert_eq!(*canvas.get_pixel(0, 0), COLOR_REGION);
        // "strip" sits at (384, 614) and is left blank
        assert_eq!(*canvas.get_pixel(384, 614), Rgb([255, 255, 255]));
    }
}
