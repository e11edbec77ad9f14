//! Document engine adapter.
//!
//! ## Learning: Trait Objects at the Seam
//!
//! The engine that actually pages through multi-gigabyte files lives
//! outside this crate. We only need three things from it (attach, detach,
//! send a command), so it is a small trait held as `Box<dyn DocumentEngine>`.
//! Replies never come back through the trait: they arrive later as
//! `EngineEvent`s tagged with the tab they belong to.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use neoscribe_tabs::{Tab, TabId};

use crate::command::EngineCommand;

/// Opaque handle to one engine-side document surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EngineHandle(u64);

impl EngineHandle {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "engine#{}", self.0)
    }
}

/// Progress of a file load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    Loading,
    Success,
}

/// Outcome reported by save and replace completions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    Success,
    Error,
}

impl CompletionStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, CompletionStatus::Success)
    }
}

/// Where a completed save went.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveMode {
    /// Written to a storage handle; `detail` carries the handle
    Uri,
    /// Written back to the source file
    Sync,
}

/// Events emitted by the document engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    FileLoaded {
        status: LoadStatus,
        #[serde(default)]
        total_lines: Option<usize>,
        #[serde(default)]
        file_size: Option<u64>,
    },
    SelectionChanged {
        count: usize,
        total_line_count: usize,
        #[serde(default)]
        indices: Option<Vec<usize>>,
        #[serde(default)]
        range_start: Option<usize>,
        #[serde(default)]
        range_count: Option<usize>,
    },
    SelectionModeChanged {
        active: bool,
    },
    SaveComplete {
        status: CompletionStatus,
        mode: SaveMode,
        #[serde(default)]
        detail: Option<String>,
    },
    SearchProgress {
        current: usize,
        total: usize,
        #[serde(default)]
        line: Option<usize>,
        #[serde(default)]
        offset: Option<usize>,
        #[serde(default)]
        total_lines: Option<usize>,
        #[serde(default)]
        match_case: Option<bool>,
        #[serde(default)]
        is_full_report: bool,
    },
    ReplaceEnd {
        status: CompletionStatus,
        #[serde(default)]
        processed_count: Option<usize>,
        #[serde(default)]
        detail: Option<String>,
    },
    JumpResult {
        success: bool,
        line: usize,
        occurrence_index: usize,
        total_line_matches: usize,
        #[serde(default)]
        is_empty: bool,
    },
    HardReset,
    /// Reply to `GetSelectedText`
    SelectedText {
        text: String,
    },
    /// The engine refused to marshal the selection as text
    SelectionTooLarge,
    Scrolled {
        line: usize,
    },
}

impl EngineEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            EngineEvent::FileLoaded { .. } => "file_loaded",
            EngineEvent::SelectionChanged { .. } => "selection_changed",
            EngineEvent::SelectionModeChanged { .. } => "selection_mode_changed",
            EngineEvent::SaveComplete { .. } => "save_complete",
            EngineEvent::SearchProgress { .. } => "search_progress",
            EngineEvent::ReplaceEnd { .. } => "replace_end",
            EngineEvent::JumpResult { .. } => "jump_result",
            EngineEvent::HardReset => "hard_reset",
            EngineEvent::SelectedText { .. } => "selected_text",
            EngineEvent::SelectionTooLarge => "selection_too_large",
            EngineEvent::Scrolled { .. } => "scrolled",
        }
    }
}

/// Errors reported synchronously by an engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Engine could not open {0}")]
    Open(String),

    #[error("Engine rejected command: {0}")]
    Rejected(String),
}

/// The external document engine.
pub trait DocumentEngine: Send {
    /// Creates a document surface for a local file.
    fn attach(&mut self, tab: TabId, path: &Path) -> Result<EngineHandle, EngineError>;

    /// Tears a surface down. Unknown handles are ignored.
    fn detach(&mut self, tab: TabId, handle: EngineHandle);

    /// Queues a command. Results arrive later as events.
    fn send(&mut self, handle: EngineHandle, command: EngineCommand) -> Result<(), EngineError>;
}

/// Resolves tabs to engine handles and forwards commands.
///
/// Holds at most one handle per tab. Tabs without a path (OCR scans) and
/// tabs whose attach failed simply have no handle.
pub struct EngineAdapter {
    engine: Box<dyn DocumentEngine>,
    handles: HashMap<TabId, EngineHandle>,
}

impl EngineAdapter {
    pub fn new(engine: Box<dyn DocumentEngine>) -> Self {
        Self {
            engine,
            handles: HashMap::new(),
        }
    }

    /// Attaches a surface for the tab if it has a path and none exists yet.
    ///
    /// `Ok(None)` means the tab has nothing to attach (no path).
    pub fn attach(&mut self, tab: &Tab) -> Result<Option<EngineHandle>, EngineError> {
        if let Some(handle) = self.handles.get(&tab.id) {
            return Ok(Some(*handle));
        }
        let Some(path) = tab.path() else {
            return Ok(None);
        };
        let handle = self.engine.attach(tab.id, path)?;
        tracing::debug!("Attached {} to tab {}", handle, tab.id);
        self.handles.insert(tab.id, handle);
        Ok(Some(handle))
    }

    /// Detaches the tab's surface, if any.
    pub fn detach(&mut self, tab: TabId) {
        if let Some(handle) = self.handles.remove(&tab) {
            tracing::debug!("Detached {} from tab {}", handle, tab);
            self.engine.detach(tab, handle);
        }
    }

    /// Returns the live handle for a tab.
    pub fn handle(&self, tab: TabId) -> Option<EngineHandle> {
        self.handles.get(&tab).copied()
    }

    /// Sends a command to the tab's surface.
    ///
    /// Returns `false` when the tab has no handle or the engine refused.
    pub fn send(&mut self, tab: TabId, command: EngineCommand) -> bool {
        let Some(handle) = self.handle(tab) else {
            tracing::trace!("No engine surface for tab {}, dropping {}", tab, command.display_name());
            return false;
        };
        tracing::debug!("{} -> {}", command.display_name(), handle);
        match self.engine.send(handle, command) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Engine send failed for tab {}: {}", tab, e);
                false
            }
        }
    }

    pub fn attached_count(&self) -> usize {
        self.handles.len()
    }
}
