//! Line selection state for a tab.
//!
//! ## Learning: Enums Instead of Optional Pairs
//!
//! The engine reports a selection either as an explicit list of line
//! indices or as a contiguous range, never both. Two `Option` fields would
//! allow both to be set at once; a single enum makes that impossible.

use serde::{Deserialize, Serialize};

/// Which lines are selected.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SelectedLines {
    /// Nothing recorded (count may still be non-zero for select-all)
    #[default]
    None,
    /// Individually picked lines
    Indices { indices: Vec<usize> },
    /// A contiguous block of `count` lines starting at `start`
    Range { start: usize, count: usize },
}

impl SelectedLines {
    /// Builds the representation from the engine's raw fields.
    ///
    /// A positive range wins over indices, matching how the engine reports
    /// range selections (it also echoes an empty index list).
    pub fn from_parts(
        indices: Option<Vec<usize>>,
        range_start: Option<usize>,
        range_count: Option<usize>,
    ) -> Self {
        match (range_start, range_count) {
            (Some(start), Some(count)) if count > 0 => SelectedLines::Range { start, count },
            _ => match indices {
                Some(indices) if !indices.is_empty() => SelectedLines::Indices { indices },
                _ => SelectedLines::None,
            },
        }
    }

    /// Returns true if no lines are recorded.
    pub fn is_none(&self) -> bool {
        matches!(self, SelectedLines::None)
    }

    /// Returns the inclusive end line of a range selection.
    pub fn range_end(&self) -> Option<usize> {
        match self {
            SelectedLines::Range { start, count } if *count > 0 => Some(start + count - 1),
            _ => None,
        }
    }
}

/// Selection state of one tab.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LineSelection {
    /// Whether the tab is in selection mode
    pub mode: bool,
    /// Number of selected lines
    pub count: usize,
    /// The selected lines
    pub lines: SelectedLines,
}

impl LineSelection {
    /// An empty selection outside selection mode.
    pub fn cleared() -> Self {
        Self::default()
    }

    /// Returns true if at least one line is selected.
    pub fn has_lines(&self) -> bool {
        self.count > 0
    }

    /// Same selection with a different mode flag.
    pub fn with_mode(&self, mode: bool) -> Self {
        Self {
            mode,
            ..self.clone()
        }
    }
}
