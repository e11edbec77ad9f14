//! Commands sent to collaborators and accepted from the host.
//!
//! ## Learning: The Command Pattern
//!
//! Commands are plain values:
//! - `EngineCommand` goes out to the document engine, fire-and-forget
//! - `EditorCommand` goes out to the embedded editor
//! - `TabCommand` comes in from the host and is executed against one tab
//!
//! Because they are values they can be logged, recorded by the headless
//! collaborators, and read from replay scripts with serde.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::engine::EngineHandle;
use crate::export::{ConfirmChoice, ExportIntent};

/// Commands understood by the document engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum EngineCommand {
    Search { query: String, match_case: bool },
    FindNext { query: String, match_case: bool },
    FindPrev { query: String, match_case: bool },
    FinishSearch,
    Replace { text: String },
    ReplaceAll {
        query: String,
        replacement: String,
        match_case: bool,
        apply_limit: bool,
    },
    JumpToLine { line: usize },
    JumpToOccurrence {
        line: usize,
        occurrence: usize,
        query: String,
        match_case: bool,
    },
    SelectAll,
    /// Inclusive line range
    SelectRange { start: usize, end: usize },
    SetSelectedLines { indices: Vec<usize> },
    ClearSelection,
    SaveToHandle { handle: String },
    Reload,
    ExportSelectionToFile { path: PathBuf },
    GetSelectedText,
}

impl EngineCommand {
    /// Returns the command's display name.
    pub fn display_name(&self) -> &str {
        match self {
            EngineCommand::Search { .. } => "Search",
            EngineCommand::FindNext { .. } => "Find Next",
            EngineCommand::FindPrev { .. } => "Find Previous",
            EngineCommand::FinishSearch => "Finish Search",
            EngineCommand::Replace { .. } => "Replace",
            EngineCommand::ReplaceAll { .. } => "Replace All",
            EngineCommand::JumpToLine { .. } => "Jump to Line",
            EngineCommand::JumpToOccurrence { .. } => "Jump to Occurrence",
            EngineCommand::SelectAll => "Select All",
            EngineCommand::SelectRange { .. } => "Select Range",
            EngineCommand::SetSelectedLines { .. } => "Set Selected Lines",
            EngineCommand::ClearSelection => "Clear Selection",
            EngineCommand::SaveToHandle { .. } => "Save",
            EngineCommand::Reload => "Reload",
            EngineCommand::ExportSelectionToFile { .. } => "Export Selection",
            EngineCommand::GetSelectedText => "Get Selected Text",
        }
    }
}

/// Commands understood by the embedded editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum EditorCommand {
    PullFrom { handle: EngineHandle },
    PushTo { handle: EngineHandle },
    SetText { text: String },
    InsertText { text: String },
    SetTheme { theme: String },
    Undo,
    Redo,
}

impl EditorCommand {
    /// Commands that would act on content that may not have arrived yet.
    pub fn is_destructive(&self) -> bool {
        matches!(
            self,
            EditorCommand::SetText { .. }
                | EditorCommand::InsertText { .. }
                | EditorCommand::SetTheme { .. }
                | EditorCommand::Undo
                | EditorCommand::Redo
        )
    }
}

/// Host-level operations on one tab.
///
/// ## Learning: Exhaustive Enums
///
/// With `#[non_exhaustive]`, downstream matches must include `_ =>`,
/// so new host operations can be added without breaking them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
#[non_exhaustive]
pub enum TabCommand {
    // File
    Save,
    Reload,

    // Search
    Search { query: String, match_case: bool },
    FindNext { query: String, match_case: bool },
    FindPrev { query: String, match_case: bool },
    FinishSearch,
    Replace { text: String },
    ReplaceAll {
        query: String,
        replacement: String,
        match_case: bool,
        apply_limit: bool,
    },

    // Navigation
    JumpToLine { line: usize },
    JumpToOccurrence {
        line: usize,
        occurrence: usize,
        query: String,
        match_case: bool,
    },

    // Selection
    SelectAll,
    SelectRange { start: usize, end: usize },
    SetSelectedLines { indices: Vec<usize> },
    ClearSelection,
    ExportSelection { intent: ExportIntent },
    ResolveExport { choice: ConfirmChoice },

    // Embedded editor
    OpenEditor,
    ApplyEditorChanges,
    CloseEditor,
    EditorUndo,
    EditorRedo,
    EditorInsertText { text: String },
    EditorSetTheme { theme: String },

    // Layout
    Pulse,
}

impl TabCommand {
    /// Returns the command's display name.
    pub fn display_name(&self) -> &str {
        match self {
            TabCommand::Save => "Save",
            TabCommand::Reload => "Reload",
            TabCommand::Search { .. } => "Search",
            TabCommand::FindNext { .. } => "Find Next",
            TabCommand::FindPrev { .. } => "Find Previous",
            TabCommand::FinishSearch => "Finish Search",
            TabCommand::Replace { .. } => "Replace",
            TabCommand::ReplaceAll { .. } => "Replace All",
            TabCommand::JumpToLine { .. } => "Jump to Line",
            TabCommand::JumpToOccurrence { .. } => "Jump to Occurrence",
            TabCommand::SelectAll => "Select All",
            TabCommand::SelectRange { .. } => "Select Range",
            TabCommand::SetSelectedLines { .. } => "Select Lines",
            TabCommand::ClearSelection => "Clear Selection",
            TabCommand::ExportSelection { .. } => "Export Selection",
            TabCommand::ResolveExport { .. } => "Resolve Export",
            TabCommand::OpenEditor => "Edit in Editor",
            TabCommand::ApplyEditorChanges => "Apply Changes",
            TabCommand::CloseEditor => "Close Editor",
            TabCommand::EditorUndo => "Undo",
            TabCommand::EditorRedo => "Redo",
            TabCommand::EditorInsertText { .. } => "Insert Text",
            TabCommand::EditorSetTheme { .. } => "Editor Theme",
            TabCommand::Pulse => "Refresh Layout",
        }
    }
}
