//! Headless collaborators.
//!
//! Stand-ins for the document engine, embedded editor and platform
//! services. They record every call into a shared `CommandLog` instead of
//! rendering anything, which is what tests and the replay CLI need.
//! Scratch files are written for real under a root directory.

use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::io::Read;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

use neoscribe_tabs::TabId;

use crate::bridge::{BridgeError, EmbeddedEditor};
use crate::command::{EditorCommand, EngineCommand};
use crate::config::Preferences;
use crate::controller::Collaborators;
use crate::engine::{DocumentEngine, EngineError, EngineHandle};
use crate::platform::{
    sniff_binary, FilePicker, PickedFile, PlatformError, PreferenceStore, ScratchFile,
    ScratchStorage, SharePlatform, SNIFF_LEN,
};

/// One recorded collaborator call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum Recorded {
    Attached { tab: TabId, handle: EngineHandle, path: PathBuf },
    Detached { tab: TabId, handle: EngineHandle },
    Engine { tab: TabId, command: EngineCommand },
    Editor { tab: TabId, command: EditorCommand },
    ScratchCreated { file: ScratchFile, bytes: usize },
    DocumentCreated { name: String, mime: String, handle: Option<String> },
    Clipboard { text: String },
    SharedText { text: String },
    SharedFile { file: ScratchFile },
    PreferencesSaved { preferences: Preferences },
}

/// Sending half of a command log.
#[derive(Debug, Clone)]
pub struct Recorder {
    tx: mpsc::UnboundedSender<Recorded>,
}

impl Recorder {
    pub fn record(&self, entry: Recorded) {
        // The log may already be gone
        let _ = self.tx.send(entry);
    }
}

/// Everything the headless collaborators were asked to do.
pub struct CommandLog {
    recorder: Recorder,
    rx: mpsc::UnboundedReceiver<Recorded>,
    entries: Vec<Recorded>,
}

impl CommandLog {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            recorder: Recorder { tx },
            rx,
            entries: Vec::new(),
        }
    }

    /// A new sender into this log.
    pub fn recorder(&self) -> Recorder {
        self.recorder.clone()
    }

    fn pull(&mut self) {
        while let Ok(entry) = self.rx.try_recv() {
            self.entries.push(entry);
        }
    }

    /// All entries recorded so far.
    pub fn entries(&mut self) -> &[Recorded] {
        self.pull();
        &self.entries
    }

    /// Takes all entries recorded so far.
    pub fn drain(&mut self) -> Vec<Recorded> {
        self.pull();
        std::mem::take(&mut self.entries)
    }

    pub fn engine_commands(&mut self, tab: TabId) -> Vec<EngineCommand> {
        self.entries()
            .iter()
            .filter_map(|entry| match entry {
                Recorded::Engine { tab: t, command } if *t == tab => Some(command.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn editor_commands(&mut self, tab: TabId) -> Vec<EditorCommand> {
        self.entries()
            .iter()
            .filter_map(|entry| match entry {
                Recorded::Editor { tab: t, command } if *t == tab => Some(command.clone()),
                _ => None,
            })
            .collect()
    }
}

impl Default for CommandLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Document engine that hands out sequential handles.
pub struct RecordingEngine {
    recorder: Recorder,
    next: u64,
    surfaces: HashMap<EngineHandle, TabId>,
    refused: Vec<PathBuf>,
}

impl RecordingEngine {
    pub fn new() -> (Self, CommandLog) {
        let log = CommandLog::new();
        (Self::with_recorder(log.recorder()), log)
    }

    pub fn with_recorder(recorder: Recorder) -> Self {
        Self {
            recorder,
            next: 1,
            surfaces: HashMap::new(),
            refused: Vec::new(),
        }
    }

    /// Makes attaching `path` fail as if the file could not be opened.
    pub fn refusing(mut self, path: impl Into<PathBuf>) -> Self {
        self.refused.push(path.into());
        self
    }
}

impl DocumentEngine for RecordingEngine {
    fn attach(&mut self, tab: TabId, path: &Path) -> Result<EngineHandle, EngineError> {
        if self.refused.iter().any(|p| p == path) {
            return Err(EngineError::Open(path.display().to_string()));
        }
        let handle = EngineHandle::new(self.next);
        self.next += 1;
        self.surfaces.insert(handle, tab);
        self.recorder.record(Recorded::Attached {
            tab,
            handle,
            path: path.to_path_buf(),
        });
        Ok(handle)
    }

    fn detach(&mut self, tab: TabId, handle: EngineHandle) {
        if self.surfaces.remove(&handle).is_some() {
            self.recorder.record(Recorded::Detached { tab, handle });
        }
    }

    fn send(&mut self, handle: EngineHandle, command: EngineCommand) -> Result<(), EngineError> {
        let tab = *self
            .surfaces
            .get(&handle)
            .ok_or_else(|| EngineError::Rejected(format!("unknown surface {}", handle)))?;
        self.recorder.record(Recorded::Engine { tab, command });
        Ok(())
    }
}

/// Embedded editor that records commands, or rejects all of them.
pub struct RecordingEditor {
    recorder: Recorder,
    reject: bool,
}

impl RecordingEditor {
    pub fn new() -> (Self, CommandLog) {
        let log = CommandLog::new();
        (Self::with_recorder(log.recorder()), log)
    }

    pub fn rejecting() -> (Self, CommandLog) {
        let log = CommandLog::new();
        let editor = Self {
            recorder: log.recorder(),
            reject: true,
        };
        (editor, log)
    }

    pub fn with_recorder(recorder: Recorder) -> Self {
        Self {
            recorder,
            reject: false,
        }
    }
}

impl EmbeddedEditor for RecordingEditor {
    fn send(&mut self, tab: TabId, command: EditorCommand) -> Result<(), BridgeError> {
        if self.reject {
            return Err(BridgeError::Rejected("editor unavailable".into()));
        }
        self.recorder.record(Recorded::Editor { tab, command });
        Ok(())
    }
}

/// Scratch storage backed by a real directory.
pub struct DirectoryStorage {
    root: PathBuf,
    recorder: Recorder,
    seq: u64,
}

impl DirectoryStorage {
    pub fn new(root: impl Into<PathBuf>, recorder: Recorder) -> Self {
        Self {
            root: root.into(),
            recorder,
            seq: 0,
        }
    }
}

impl ScratchStorage for DirectoryStorage {
    fn create_temp_file(&mut self, name: &str, contents: &str) -> Result<ScratchFile, PlatformError> {
        std::fs::create_dir_all(&self.root)?;
        self.seq += 1;
        let path = self.root.join(format!("{:04}_{}", self.seq, name));
        std::fs::write(&path, contents)?;

        let file = ScratchFile {
            path,
            uri: None,
            name: name.to_string(),
        };
        self.recorder.record(Recorded::ScratchCreated {
            file: file.clone(),
            bytes: contents.len(),
        });
        Ok(file)
    }
}

/// Picker that answers from queued paths and handles. Empty queues cancel.
pub struct ScriptedPicker {
    recorder: Recorder,
    picks: VecDeque<PathBuf>,
    documents: VecDeque<String>,
}

impl ScriptedPicker {
    pub fn new(recorder: Recorder) -> Self {
        Self {
            recorder,
            picks: VecDeque::new(),
            documents: VecDeque::new(),
        }
    }

    pub fn with_pick(mut self, path: impl Into<PathBuf>) -> Self {
        self.picks.push_back(path.into());
        self
    }

    pub fn with_document(mut self, handle: impl Into<String>) -> Self {
        self.documents.push_back(handle.into());
        self
    }
}

impl FilePicker for ScriptedPicker {
    fn pick_document(&mut self) -> Result<Option<PickedFile>, PlatformError> {
        let Some(path) = self.picks.pop_front() else {
            return Ok(None);
        };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Untitled.txt".to_string());

        let mut header = Vec::with_capacity(SNIFF_LEN);
        std::fs::File::open(&path)?
            .take(SNIFF_LEN as u64)
            .read_to_end(&mut header)?;
        if let Some(reason) = sniff_binary(&header) {
            tracing::warn!("Rejected {}: {}", name, reason);
            return Err(PlatformError::BinaryContent(name));
        }

        let size = std::fs::metadata(&path)?.len();
        let uri = Some(format!("file://{}", path.display()));
        Ok(Some(PickedFile {
            name,
            path,
            size,
            uri,
        }))
    }

    fn create_document(&mut self, name: &str, mime: &str) -> Result<Option<String>, PlatformError> {
        let handle = self.documents.pop_front();
        self.recorder.record(Recorded::DocumentCreated {
            name: name.to_string(),
            mime: mime.to_string(),
            handle: handle.clone(),
        });
        Ok(handle)
    }
}

/// Clipboard and share sheet that only record.
pub struct RecordingPlatform {
    recorder: Recorder,
}

impl RecordingPlatform {
    pub fn new(recorder: Recorder) -> Self {
        Self { recorder }
    }
}

impl SharePlatform for RecordingPlatform {
    fn copy_to_clipboard(&mut self, text: &str) -> Result<(), PlatformError> {
        self.recorder.record(Recorded::Clipboard { text: text.to_string() });
        Ok(())
    }

    fn share_text(&mut self, text: &str) -> Result<(), PlatformError> {
        self.recorder.record(Recorded::SharedText { text: text.to_string() });
        Ok(())
    }

    fn share_file(&mut self, file: &ScratchFile) -> Result<(), PlatformError> {
        self.recorder.record(Recorded::SharedFile { file: file.clone() });
        Ok(())
    }
}

/// Preferences kept in memory.
pub struct MemoryPreferences {
    recorder: Recorder,
    stored: Option<Preferences>,
}

impl MemoryPreferences {
    pub fn new(recorder: Recorder) -> Self {
        Self {
            recorder,
            stored: None,
        }
    }

    pub fn with_stored(mut self, preferences: Preferences) -> Self {
        self.stored = Some(preferences);
        self
    }
}

impl PreferenceStore for MemoryPreferences {
    fn load(&mut self) -> Result<Option<Preferences>, PlatformError> {
        Ok(self.stored.clone())
    }

    fn save(&mut self, preferences: &Preferences) -> Result<(), PlatformError> {
        self.stored = Some(preferences.clone());
        self.recorder.record(Recorded::PreferencesSaved {
            preferences: preferences.clone(),
        });
        Ok(())
    }
}

impl Collaborators {
    /// Headless collaborators writing scratch files under `root`.
    pub fn headless(root: impl Into<PathBuf>) -> (Self, CommandLog) {
        let log = CommandLog::new();
        let collaborators = Self {
            engine: Box::new(RecordingEngine::with_recorder(log.recorder())),
            editor: Box::new(RecordingEditor::with_recorder(log.recorder())),
            storage: Box::new(DirectoryStorage::new(root, log.recorder())),
            picker: Box::new(ScriptedPicker::new(log.recorder())),
            share: Box::new(RecordingPlatform::new(log.recorder())),
            preferences: Box::new(MemoryPreferences::new(log.recorder())),
        };
        (collaborators, log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = CommandLog::new();
        let mut storage = DirectoryStorage::new(dir.path().join("scratch"), log.recorder());

        let file = storage.create_temp_file("Selection_1.txt", "hello").unwrap();
        assert_eq!(std::fs::read_to_string(&file.path).unwrap(), "hello");
        assert_eq!(file.name, "Selection_1.txt");
        assert!(matches!(log.drain().as_slice(), [Recorded::ScratchCreated { bytes: 5, .. }]));
    }

    #[test]
    fn test_picker_rejects_binary() {
        let dir = tempfile::tempdir().unwrap();
        let text = dir.path().join("notes.log");
        let binary = dir.path().join("photo.png");
        std::fs::write(&text, "line one\nline two\n").unwrap();
        std::fs::write(&binary, [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A]).unwrap();

        let log = CommandLog::new();
        let mut picker = ScriptedPicker::new(log.recorder())
            .with_pick(&text)
            .with_pick(&binary);

        let picked = picker.pick_document().unwrap().unwrap();
        assert_eq!(picked.name, "notes.log");
        assert_eq!(picked.size, 18);

        let err = picker.pick_document().unwrap_err();
        assert!(matches!(err, PlatformError::BinaryContent(name) if name == "photo.png"));

        assert!(picker.pick_document().unwrap().is_none());
    }

    #[test]
    fn test_engine_rejects_unknown_handle() {
        let (mut engine, _log) = RecordingEngine::new();
        let result = engine.send(EngineHandle::new(99), EngineCommand::Reload);
        assert!(matches!(result, Err(EngineError::Rejected(_))));
    }

    #[test]
    fn test_preferences_round_trip() {
        let mut log = CommandLog::new();
        let mut prefs = MemoryPreferences::new(log.recorder());
        assert!(prefs.load().unwrap().is_none());

        let stored = Preferences {
            theme: "Forest".into(),
            ..Preferences::default()
        };
        prefs.save(&stored).unwrap();
        assert_eq!(prefs.load().unwrap(), Some(stored));
        assert_eq!(log.drain().len(), 1);
    }
}
