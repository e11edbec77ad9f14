//! Tab records.
//!
//! ## Learning: Newtypes
//!
//! `TabId` wraps a `Uuid`. The wrapper keeps tab ids from being mixed up
//! with any other identifier and lets the representation change later
//! without touching callers. UUIDs are never reused, so an id that
//! belonged to a closed tab can never match a newer one.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::selection::LineSelection;

/// Unique identifier for a tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TabId(Uuid);

impl TabId {
    /// Creates a new unique tab ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TabId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TabId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a tab's content comes from.
///
/// OCR tabs have no path at all, so they can never be attached to the
/// document engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TabSource {
    /// A local file rendered by the document engine
    File { path: PathBuf },
    /// An image-to-text scan tab
    Ocr,
}

/// One open document session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tab {
    pub id: TabId,
    pub source: TabSource,
    pub name: String,
    pub extension: String,
    /// Persistent storage handle, set once a save-as succeeds
    pub uri: Option<String>,
    pub is_dirty: bool,
    pub is_read_only: bool,
    pub selection: LineSelection,
    pub scroll_line: usize,
    pub show_start_editing: bool,
}

impl Tab {
    /// Creates a tab from a descriptor with a fresh id.
    pub fn from_descriptor(descriptor: TabDescriptor) -> Self {
        let extension = descriptor
            .extension
            .unwrap_or_else(|| extension_from_name(&descriptor.name));

        Self {
            id: TabId::new(),
            source: descriptor.source,
            name: descriptor.name,
            extension,
            uri: descriptor.uri,
            is_dirty: false,
            is_read_only: descriptor.read_only,
            selection: LineSelection::default(),
            scroll_line: 0,
            show_start_editing: descriptor.show_start_editing,
        }
    }

    /// Returns the engine path, or `None` for OCR tabs.
    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            TabSource::File { path } => Some(path),
            TabSource::Ocr => None,
        }
    }

    /// Returns true for OCR tabs.
    pub fn is_ocr(&self) -> bool {
        matches!(self.source, TabSource::Ocr)
    }

    /// Applies a partial update.
    pub fn apply(&mut self, patch: TabPatch) {
        if let Some(dirty) = patch.is_dirty {
            self.is_dirty = dirty;
        }
        if let Some(uri) = patch.uri {
            self.uri = Some(uri);
        }
        if let Some(selection) = patch.selection {
            self.selection = selection;
        }
        if let Some(line) = patch.scroll_line {
            self.scroll_line = line;
        }
        if let Some(flag) = patch.show_start_editing {
            self.show_start_editing = flag;
        }
    }
}

/// Lowercase extension from a display name, `txt` when there is none.
pub fn extension_from_name(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => ext.to_lowercase(),
        _ => "txt".to_string(),
    }
}

/// What the host passes to `open`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabDescriptor {
    pub source: TabSource,
    pub name: String,
    #[serde(default)]
    pub extension: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub show_start_editing: bool,
}

impl TabDescriptor {
    /// Describes a file tab.
    pub fn file(path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            source: TabSource::File { path: path.into() },
            name: name.into(),
            extension: None,
            uri: None,
            read_only: false,
            show_start_editing: false,
        }
    }

    /// Describes a blank OCR tab.
    pub fn ocr() -> Self {
        Self {
            source: TabSource::Ocr,
            name: "Scan Image".to_string(),
            extension: Some("ocr".to_string()),
            uri: None,
            read_only: false,
            show_start_editing: false,
        }
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn start_editing(mut self) -> Self {
        self.show_start_editing = true;
        self
    }

    /// Returns the file path this descriptor points at.
    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            TabSource::File { path } => Some(path),
            TabSource::Ocr => None,
        }
    }
}

/// Shallow partial update for a tab.
///
/// Only fields that are `Some` are written. `is_read_only`, `source`
/// and `id` cannot be patched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabPatch {
    pub is_dirty: Option<bool>,
    pub uri: Option<String>,
    pub selection: Option<LineSelection>,
    pub scroll_line: Option<usize>,
    pub show_start_editing: Option<bool>,
}

impl TabPatch {
    pub fn dirty(is_dirty: bool) -> Self {
        Self {
            is_dirty: Some(is_dirty),
            ..Self::default()
        }
    }

    pub fn selection(selection: LineSelection) -> Self {
        Self {
            selection: Some(selection),
            ..Self::default()
        }
    }

    pub fn scroll(line: usize) -> Self {
        Self {
            scroll_line: Some(line),
            ..Self::default()
        }
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn with_dirty(mut self, is_dirty: bool) -> Self {
        self.is_dirty = Some(is_dirty);
        self
    }

    pub fn with_selection(mut self, selection: LineSelection) -> Self {
        self.selection = Some(selection);
        self
    }

    /// Returns true if the patch writes nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_from_name() {
        assert_eq!(extension_from_name("notes.MD"), "md");
        assert_eq!(extension_from_name("archive.tar.gz"), "gz");
        assert_eq!(extension_from_name("README"), "txt");
        assert_eq!(extension_from_name("trailing."), "txt");
    }

    #[test]
    fn test_descriptor_defaults() {
        let tab = Tab::from_descriptor(TabDescriptor::file("/a.log", "a.log"));
        assert_eq!(tab.extension, "log");
        assert!(!tab.is_dirty);
        assert!(tab.uri.is_none());
        assert_eq!(tab.path(), Some(Path::new("/a.log")));
    }

    #[test]
    fn test_ocr_tab_has_no_path() {
        let tab = Tab::from_descriptor(TabDescriptor::ocr());
        assert!(tab.is_ocr());
        assert!(tab.path().is_none());
        assert_eq!(tab.extension, "ocr");
    }

    #[test]
    fn test_patch_is_shallow() {
        let mut tab = Tab::from_descriptor(TabDescriptor::file("/a.txt", "a.txt"));
        tab.apply(TabPatch::dirty(true));
        tab.apply(TabPatch::default().with_uri("content://a"));
        assert!(tab.is_dirty);
        assert_eq!(tab.uri.as_deref(), Some("content://a"));
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(TabId::new(), TabId::new());
    }
}
