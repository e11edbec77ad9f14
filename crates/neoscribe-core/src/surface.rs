//! Per-tab view state that is not part of the session snapshot.

use serde::{Deserialize, Serialize};

/// Latest search report for a tab.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStatus {
    pub current: usize,
    pub total: usize,
    pub line: Option<usize>,
    pub match_case: bool,
    /// The engine has finished counting matches
    pub complete: bool,
}

impl SearchStatus {
    pub fn is_active(&self) -> bool {
        self.total > 0 || self.line.is_some()
    }
}

/// Loading and search state for one tab surface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceState {
    pub loading: bool,
    pub total_lines: Option<usize>,
    pub file_size: Option<u64>,
    /// Saved scroll position and selection were already restored
    pub restored: bool,
    pub search: SearchStatus,
    /// A bulk replace is running
    pub replacing: bool,
}

impl SurfaceState {
    pub fn new() -> Self {
        Self {
            loading: true,
            ..Self::default()
        }
    }

    pub fn reset_search(&mut self) {
        self.search = SearchStatus::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_surface_is_loading() {
        let surface = SurfaceState::new();
        assert!(surface.loading);
        assert!(!surface.restored);
        assert!(!surface.search.is_active());
    }

    #[test]
    fn test_reset_search() {
        let mut surface = SurfaceState::new();
        surface.search.total = 3;
        surface.search.line = Some(10);
        assert!(surface.search.is_active());

        surface.reset_search();
        assert_eq!(surface.search, SearchStatus::default());
    }
}
