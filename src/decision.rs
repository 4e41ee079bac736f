//! Picks the single marked bubble out of a group of mutually exclusive cells.

use serde::{Deserialize, Serialize};

const MIN_FILL: f64 = 0.25;
const MIN_DELTA: f64 = 0.08;

/// Acceptance gates for one group of fill ratios.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// The darkest cell must reach this fill to count as a mark at all.
    pub min_fill: f64,
    /// The darkest cell must lead the runner-up by at least this much.
    pub min_delta: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_fill: MIN_FILL,
            min_delta: MIN_DELTA,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indeterminate {
    /// Nothing reached the fill threshold, or there was nothing to compare.
    NoMark,
    /// The top two cells are too close to tell apart.
    Ambiguous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Resolved(usize),
    Indeterminate(Indeterminate),
}

impl Selection {
    pub fn index(self) -> Option<usize> {
        match self {
            Selection::Resolved(i) => Some(i),
            Selection::Indeterminate(_) => None,
        }
    }

    pub fn is_resolved(self) -> bool {
        matches!(self, Selection::Resolved(_))
    }
}

/// Selects the index of the highest fill ratio, or reports why no single
/// choice can be made.
///
/// Equal maxima resolve to the lowest index. The runner-up is the second
/// value in descending order, so a tied maximum is its own runner-up and the
/// delta gate rejects it for any positive `min_delta`.
pub fn pick_index(values: &[f64], thresholds: &Thresholds) -> Selection {
    let Some((best_idx, best)) = values
        .iter()
        .copied()
        .enumerate()
        .fold(None, |acc: Option<(usize, f64)>, (i, v)| match acc {
            _ if v.is_nan() => acc,
            Some((_, top)) if v <= top => acc,
            _ => Some((i, v)),
        })
    else {
        return Selection::Indeterminate(Indeterminate::NoMark);
    };

    let second = values
        .iter()
        .enumerate()
        .filter(|&(i, v)| i != best_idx && !v.is_nan())
        .map(|(_, &v)| v)
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
        .unwrap_or(0.0);

    if best < thresholds.min_fill {
        return Selection::Indeterminate(Indeterminate::NoMark);
    }
    if best - second < thresholds.min_delta {
        return Selection::Indeterminate(Indeterminate::Ambiguous);
    }
    Selection::Resolved(best_idx)
}
