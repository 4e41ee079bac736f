//! Answer keys and scoring of decoded sheets against them.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::sheet_decode::PLACEHOLDER;

/// Question count assumed when a key has no entries.
pub const DEFAULT_TOTAL: usize = 20;

#[derive(Debug, thiserror::Error)]
pub enum AnswerKeyError {
    #[error("failed to access answer key {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid answer key json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Expected answers in question order, stored as a JSON array of strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerKey(pub Vec<String>);

impl AnswerKey {
    pub fn load(path: &Path) -> Result<Self, AnswerKeyError> {
        let text = fs::read_to_string(path).map_err(|source| AnswerKeyError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), AnswerKeyError> {
        let io_err = |source: std::io::Error| AnswerKeyError::Io {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(&self.0)?;
        fs::write(path, json).map_err(io_err)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Outcome of grading one sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeSummary {
    pub correct: usize,
    #[serde(rename = "keyTotal")]
    pub total: usize,
    /// Percentage of `total`, rounded to the nearest integer.
    pub score: u32,
}

/// Counts answers matching the key among the first `total` questions.
///
/// Unread answers (`?`) never score, even against a `?` key entry written
/// from an unclear answer sheet. A plain string comparison of answer and key
/// would count that pair as correct; this one does not.
pub fn grade(answers: &[String], key: &AnswerKey) -> GradeSummary {
    let total = if key.is_empty() { DEFAULT_TOTAL } else { key.len() };
    let correct = answers
        .iter()
        .take(total)
        .zip(&key.0)
        .filter(|(answer, expected)| is_scorable(answer) && answer == expected)
        .count();
    let score = (correct as f64 / total as f64 * 100.0).round() as u32;
    GradeSummary { correct, total, score }
}

fn is_scorable(answer: &str) -> bool {
    !answer.is_empty() && !answer.chars().eq([PLACEHOLDER])
}
