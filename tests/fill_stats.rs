use image::DynamicImage;

use omr_sheet_reader::decision::{Indeterminate, Selection, Thresholds, pick_index};
use omr_sheet_reader::fill_grid::sample_region;
use omr_sheet_reader::kornia::{BinarizeConfig, binarize};
use omr_sheet_reader::test_sheet_gen::{SheetMarks, render_sheet, sample_layout};

fn marks() -> SheetMarks {
    SheetMarks::new("012345678901", &["A", "B", "C", "D", "E", "", "AC"])
}

#[test]
fn fills_separate_marked_from_blank_cells() {
    let layout = sample_layout();
    let marks = marks();
    let img = DynamicImage::ImageRgb8(render_sheet(&layout, &marks));
    let mask = binarize(&img, &BinarizeConfig::default()).unwrap();

    let ids = sample_region(&mask, layout.region("tc").unwrap());
    assert_eq!((ids.rows(), ids.cols()), (10, 12));
    for col in 0..ids.cols() {
        let marked = marks.identifier[col];
        for row in 0..ids.rows() {
            let v = ids.get(row, col);
            assert!((0.0..=1.0).contains(&v));
            if marked == Some(row) {
                assert!(v > 0.6, "marked digit cell ({row},{col}) only {v}");
            } else {
                assert!(v < 0.1, "blank digit cell ({row},{col}) reads {v}");
            }
        }
    }

    let answers = sample_region(&mask, layout.region("turkish").unwrap());
    assert_eq!((answers.rows(), answers.cols()), (20, 5));
    for row in 0..answers.rows() {
        let marked = marks.answers.get(row).cloned().unwrap_or_default();
        for col in 0..answers.cols() {
            let v = answers.get(row, col);
            assert!((0.0..=1.0).contains(&v));
            if marked.contains(&col) {
                assert!(v > 0.6, "marked answer cell ({row},{col}) only {v}");
            } else {
                assert!(v < 0.1, "blank answer cell ({row},{col}) reads {v}");
            }
        }
    }
}

#[test]
fn sampled_rows_decide_like_the_marks() {
    let layout = sample_layout();
    let img = DynamicImage::ImageRgb8(render_sheet(&layout, &marks()));
    let mask = binarize(&img, &BinarizeConfig::default()).unwrap();
    let answers = sample_region(&mask, layout.region("turkish").unwrap());
    let t = Thresholds::default();

    for (row, want) in [0, 1, 2, 3, 4].into_iter().enumerate() {
        assert_eq!(pick_index(answers.row(row), &t), Selection::Resolved(want));
    }
    assert_eq!(
        pick_index(answers.row(5), &t),
        Selection::Indeterminate(Indeterminate::NoMark)
    );
    assert_eq!(
        pick_index(answers.row(6), &t),
        Selection::Indeterminate(Indeterminate::Ambiguous)
    );
}

#[test]
fn blank_sheet_has_no_ink() {
    let layout = sample_layout();
    let img = DynamicImage::ImageRgb8(render_sheet(&layout, &SheetMarks::default()));
    let mask = binarize(&img, &BinarizeConfig::default()).unwrap();
    assert!(mask.pixels().all(|p| p.0[0] == 0));
}
