//! Turns the two sampled fields of a sheet into the decoded report: the
//! student number read column by column and the answers read row by row.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::decision::{Selection, Thresholds, pick_index};
use crate::fill_grid::FillMatrix;

/// Character written in place of a digit or answer that could not be read.
pub const PLACEHOLDER: char = '?';
pub const WARN_STUDENT_NUMBER: &str = "Student number missing";
pub const WARN_UNCLEAR_ANSWER: &str = "Unclear answer";

const DIGIT_COUNT: usize = 8;
const TRUNCATE_FROM_COLS: usize = 11;
const DIGIT_ROWS: usize = 10;
const OPTIONS: [char; 5] = ['A', 'B', 'C', 'D', 'E'];

/// How the student-number grid is read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentifierConfig {
    /// Number of trailing columns kept once the grid is wide enough to carry
    /// leading series/check columns.
    pub digit_count: usize,
    /// Grids with at least this many columns are cut to `digit_count`.
    pub truncate_from_cols: usize,
    pub thresholds: Thresholds,
}

impl Default for IdentifierConfig {
    fn default() -> Self {
        Self {
            digit_count: DIGIT_COUNT,
            truncate_from_cols: TRUNCATE_FROM_COLS,
            thresholds: Thresholds::default(),
        }
    }
}

/// How the answer grid is read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerConfig {
    /// Option letters, one per grid column, left to right.
    pub options: Vec<char>,
    pub thresholds: Thresholds,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            options: OPTIONS.to_vec(),
            thresholds: Thresholds::default(),
        }
    }
}

/// Final result for one sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedReport {
    pub answers: Vec<String>,
    pub total: usize,
    pub warnings: Vec<String>,
    pub student_number: String,
}

/// Per-cell decisions, kept alongside the report for overlays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSelections {
    /// `(column, selection)` for each identifier column that was read.
    pub identifier: Vec<(usize, Selection)>,
    /// One selection per answer row.
    pub answers: Vec<Selection>,
}

/// Index of the first identifier column that takes part in the number.
pub fn first_identifier_column(cols: usize, config: &IdentifierConfig) -> usize {
    if cols >= config.truncate_from_cols {
        cols.saturating_sub(config.digit_count)
    } else {
        0
    }
}

/// Reads the student number. Each column is one digit position; rows are the
/// digit values 0-9.
pub fn decode_identifier(
    fills: &FillMatrix,
    config: &IdentifierConfig,
    warnings: &mut Vec<String>,
) -> (String, Vec<(usize, Selection)>) {
    let start = first_identifier_column(fills.cols(), config);
    let mut number = String::with_capacity(fills.cols() - start);
    let mut picks = Vec::with_capacity(fills.cols() - start);

    for col in start..fills.cols() {
        let mut column = fills.column(col);
        column.truncate(DIGIT_ROWS);
        let selection = pick_index(&column, &config.thresholds);
        match selection.index().and_then(|d| char::from_digit(d as u32, 10)) {
            Some(digit) => number.push(digit),
            None => {
                number.push(PLACEHOLDER);
                warnings.push(WARN_STUDENT_NUMBER.to_string());
            }
        }
        debug!("identifier column {col}: {selection:?}");
        picks.push((col, selection));
    }

    (number, picks)
}

/// Reads one answer per row; columns map to `config.options` in order.
pub fn decode_answers(
    fills: &FillMatrix,
    config: &AnswerConfig,
    warnings: &mut Vec<String>,
) -> (Vec<String>, Vec<Selection>) {
    let width = fills.cols().min(config.options.len());
    let mut answers = Vec::with_capacity(fills.rows());
    let mut picks = Vec::with_capacity(fills.rows());

    for row in 0..fills.rows() {
        let selection = pick_index(&fills.row(row)[..width], &config.thresholds);
        match selection.index() {
            Some(i) => answers.push(config.options[i].to_string()),
            None => {
                answers.push(PLACEHOLDER.to_string());
                warnings.push(WARN_UNCLEAR_ANSWER.to_string());
            }
        }
        debug!("answer row {row}: {selection:?}");
        picks.push(selection);
    }

    (answers, picks)
}

/// Decodes both fields. Identifier warnings come first, then answer warnings,
/// each in grid order.
pub fn decode_form(
    identifier: &FillMatrix,
    answers: &FillMatrix,
    identifier_config: &IdentifierConfig,
    answer_config: &AnswerConfig,
) -> (DecodedReport, FieldSelections) {
    let mut warnings = Vec::new();
    let (student_number, identifier_picks) = decode_identifier(identifier, identifier_config, &mut warnings);
    let (answers, answer_picks) = decode_answers(answers, answer_config, &mut warnings);

    let report = DecodedReport {
        total: answers.len(),
        answers,
        warnings,
        student_number,
    };
    let selections = FieldSelections {
        identifier: identifier_picks,
        answers: answer_picks,
    };
    (report, selections)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `rows x cols` matrix of 0.02 with one 0.9 per column at `marks[col]`.
    fn identifier_matrix(marks: &[Option<usize>]) -> FillMatrix {
        let mut rows = vec![vec![0.02; marks.len()]; 10];
        for (col, mark) in marks.iter().enumerate() {
            if let Some(r) = mark {
                rows[*r][col] = 0.9;
            }
        }
        FillMatrix::from_rows(rows).unwrap()
    }

    fn answer_matrix(rows: &[[f64; 5]]) -> FillMatrix {
        FillMatrix::from_rows(rows.iter().map(|r| r.to_vec()).collect()).unwrap()
    }

    fn placeholders(report: &DecodedReport) -> usize {
        report.student_number.chars().filter(|&c| c == PLACEHOLDER).count()
            + report.answers.iter().filter(|a| a.as_str() == "?").count()
    }

    #[test]
    fn scenarios_clean_blank_double() {
        let id = identifier_matrix(&[Some(1); 8]);
        let ans = answer_matrix(&[
            [0.9, 0.05, 0.05, 0.05, 0.05],
            [0.1, 0.1, 0.1, 0.1, 0.1],
            [0.5, 0.48, 0.1, 0.1, 0.1],
        ]);
        let (report, picks) = decode_form(&id, &ans, &IdentifierConfig::default(), &AnswerConfig::default());
        assert_eq!(report.answers, vec!["A", "?", "?"]);
        assert_eq!(report.total, 3);
        assert_eq!(report.warnings, vec![WARN_UNCLEAR_ANSWER, WARN_UNCLEAR_ANSWER]);
        assert_eq!(report.student_number, "11111111");
        assert_eq!(picks.answers[0], Selection::Resolved(0));
    }

    #[test]
    fn twelve_columns_keep_last_eight() {
        let marks: Vec<Option<usize>> = [9, 9, 9, 9, 2, 2, 2, 9, 0, 6, 8, 4].iter().map(|&r| Some(r)).collect();
        let mut warnings = Vec::new();
        let (number, picks) = decode_identifier(&identifier_matrix(&marks), &IdentifierConfig::default(), &mut warnings);
        assert_eq!(number, "22290684");
        assert_eq!(picks.first().map(|p| p.0), Some(4));
        assert!(warnings.is_empty());
    }

    #[test]
    fn discarded_columns_never_warn() {
        let mut marks = vec![None; 4];
        marks.extend([Some(3); 8]);
        let mut warnings = Vec::new();
        let (number, _) = decode_identifier(&identifier_matrix(&marks), &IdentifierConfig::default(), &mut warnings);
        assert_eq!(number, "33333333");
        assert!(warnings.is_empty());
    }

    #[test]
    fn narrow_grids_are_read_whole() {
        let marks = [Some(5), None, Some(7), Some(0), Some(1), Some(2), Some(3), Some(4), Some(9), Some(8)];
        let mut warnings = Vec::new();
        let (number, _) = decode_identifier(&identifier_matrix(&marks), &IdentifierConfig::default(), &mut warnings);
        assert_eq!(number, "5?70123498");
        assert_eq!(warnings, vec![WARN_STUDENT_NUMBER]);
    }

    #[test]
    fn truncation_follows_configuration() {
        let marks: Vec<Option<usize>> = (0..6).map(Some).collect();
        let config = IdentifierConfig {
            digit_count: 4,
            truncate_from_cols: 6,
            ..IdentifierConfig::default()
        };
        let mut warnings = Vec::new();
        let (number, _) = decode_identifier(&identifier_matrix(&marks), &config, &mut warnings);
        assert_eq!(number, "2345");
    }

    #[test]
    fn identifier_warnings_precede_answer_warnings() {
        let id = identifier_matrix(&[None, Some(2)]);
        let ans = answer_matrix(&[[0.0; 5]]);
        let (report, _) = decode_form(&id, &ans, &IdentifierConfig::default(), &AnswerConfig::default());
        assert_eq!(report.warnings, vec![WARN_STUDENT_NUMBER, WARN_UNCLEAR_ANSWER]);
        assert_eq!(placeholders(&report), report.warnings.len());
    }

    #[test]
    fn answers_stay_in_alphabet() {
        let ans = answer_matrix(&[
            [0.0, 0.0, 0.0, 0.0, 0.8],
            [0.0, 0.7, 0.0, 0.0, 0.0],
            [0.0, 0.0, 0.6, 0.61, 0.0],
            [0.3, 0.0, 0.0, 0.0, 0.0],
        ]);
        let config = AnswerConfig::default();
        let mut warnings = Vec::new();
        let (answers, _) = decode_answers(&ans, &config, &mut warnings);
        assert_eq!(answers, vec!["E", "B", "?", "A"]);
        for a in answers.iter().filter(|a| a.as_str() != "?") {
            let c = a.chars().next().unwrap();
            assert!(config.options.contains(&c));
        }
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn per_field_thresholds_apply() {
        let ans = answer_matrix(&[[0.2, 0.0, 0.0, 0.0, 0.0]]);
        let lenient = AnswerConfig {
            thresholds: Thresholds { min_fill: 0.15, min_delta: 0.08 },
            ..AnswerConfig::default()
        };
        let mut warnings = Vec::new();
        assert_eq!(decode_answers(&ans, &lenient, &mut warnings).0, vec!["A"]);
        assert_eq!(decode_answers(&ans, &AnswerConfig::default(), &mut warnings).0, vec!["?"]);
    }

    #[test]
    fn report_serializes_with_camel_case_keys() {
        let report = DecodedReport {
            answers: vec!["A".into(), "?".into()],
            total: 2,
            warnings: vec![WARN_UNCLEAR_ANSWER.into()],
            student_number: "12345678".into(),
        };
        let json = serde_json::to_string(&report).unwrap();
        assert_eq!(
            json,
            r#"{"answers":["A","?"],"total":2,"warnings":["Unclear answer"],"studentNumber":"12345678"}"#
        );
    }

    #[test]
    fn empty_fields_decode_to_empty_report() {
        let empty = FillMatrix::from_rows(Vec::new()).unwrap();
        let (report, _) = decode_form(&empty, &empty, &IdentifierConfig::default(), &AnswerConfig::default());
        assert_eq!(report.total, 0);
        assert!(report.student_number.is_empty());
        assert!(report.warnings.is_empty());
    }
}
