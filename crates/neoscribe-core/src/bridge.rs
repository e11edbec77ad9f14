//! Sync handshake between the document engine and the embedded editor.
//!
//! ## Learning: State Enums Instead of Flags
//!
//! A push is a two-phase handshake: the editor writes its text into the
//! engine (`ReplaceEnd`), then the engine persists it (`SaveComplete`).
//! Modelling that with a couple of booleans invites impossible combinations
//! ("pulling and saving"). A `SyncState` enum per tab makes every
//! transition a `match` the compiler checks.
//!
//! ```text
//! Idle ──pull──▶ Pulling ──PullEnd──▶ Idle
//! Idle ──push──▶ Pushing ──ReplaceEnd(ok)──▶ Saving ──SaveComplete──▶ Idle
//!                   └──────ReplaceEnd(err) / rejected──▶ Idle
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use neoscribe_tabs::TabId;

use crate::command::EditorCommand;
use crate::engine::EngineHandle;
use crate::{SessionError, SessionResult};

/// Handshake phase for one tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    #[default]
    Idle,
    /// Content is being copied into the editor. `was_open` restores the
    /// surface if the pull fails.
    Pulling { was_open: bool },
    /// Editor text is being written into the engine
    Pushing,
    /// The engine is persisting the pushed text
    Saving,
}

impl SyncState {
    pub fn push_in_flight(&self) -> bool {
        matches!(self, SyncState::Pushing | SyncState::Saving)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct TabSync {
    state: SyncState,
    editor_open: bool,
    save_pending: bool,
}

/// Events emitted by the embedded editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BridgeEvent {
    PullStart,
    PullEnd {
        #[serde(default = "default_true")]
        success: bool,
        #[serde(default)]
        detail: Option<String>,
    },
    ReplaceStart,
    ReplaceProgress {
        processed: usize,
    },
    ReplaceEnd {
        success: bool,
        #[serde(default)]
        processed_count: Option<usize>,
        #[serde(default)]
        detail: Option<String>,
    },
    ReplaceLimitReached {
        total: usize,
        limit: usize,
    },
}

fn default_true() -> bool {
    true
}

/// What the controller should do after a bridge event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeOutcome {
    /// Nothing to do
    Ignored,
    /// The event does not match the tab's handshake phase
    Stale,
    PullCompleted,
    PullFailed(String),
    Progress { processed: usize },
    /// Push text landed in the engine; waiting for the save
    Saving { processed: Option<usize> },
    PushFailed(String),
    LimitReached { total: usize, limit: usize },
}

/// Errors reported synchronously by the editor.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Editor rejected command: {0}")]
    Rejected(String),

    #[error("Editor is not available")]
    Unavailable,
}

/// The embedded editor surface.
pub trait EmbeddedEditor: Send {
    /// Queues a command. May reject immediately.
    fn send(&mut self, tab: TabId, command: EditorCommand) -> Result<(), BridgeError>;
}

/// Drives pull and push handshakes for every tab.
pub struct EditorSyncBridge {
    editor: Box<dyn EmbeddedEditor>,
    tabs: HashMap<TabId, TabSync>,
}

impl EditorSyncBridge {
    pub fn new(editor: Box<dyn EmbeddedEditor>) -> Self {
        Self {
            editor,
            tabs: HashMap::new(),
        }
    }

    fn entry(&mut self, tab: TabId) -> &mut TabSync {
        self.tabs.entry(tab).or_default()
    }

    fn sync(&self, tab: TabId) -> TabSync {
        self.tabs.get(&tab).copied().unwrap_or_default()
    }

    pub fn state(&self, tab: TabId) -> SyncState {
        self.sync(tab).state
    }

    pub fn push_in_flight(&self, tab: TabId) -> bool {
        self.sync(tab).state.push_in_flight()
    }

    pub fn is_editor_open(&self, tab: TabId) -> bool {
        self.sync(tab).editor_open
    }

    pub fn save_pending(&self, tab: TabId) -> bool {
        self.sync(tab).save_pending
    }

    /// True while any indicator should show as processing.
    pub fn is_processing(&self, tab: TabId) -> bool {
        let sync = self.sync(tab);
        sync.save_pending || sync.state.push_in_flight()
    }

    /// Opens the editor and copies the document into it.
    pub fn pull(&mut self, tab: TabId, handle: Option<EngineHandle>) -> SessionResult<()> {
        let Some(handle) = handle else {
            return Err(SessionError::PullFailed("document has no engine surface".into()));
        };
        let current = self.sync(tab);
        if current.state != SyncState::Idle {
            return Err(SessionError::NotReady);
        }

        let was_open = current.editor_open;
        {
            let sync = self.entry(tab);
            sync.state = SyncState::Pulling { was_open };
            sync.editor_open = true;
        }

        if let Err(e) = self.editor.send(tab, EditorCommand::PullFrom { handle }) {
            tracing::warn!("Pull rejected for tab {}: {}", tab, e);
            let sync = self.entry(tab);
            sync.state = SyncState::Idle;
            sync.editor_open = was_open;
            return Err(SessionError::PullFailed(e.to_string()));
        }

        tracing::debug!("Tab {}: Idle -> Pulling", tab);
        Ok(())
    }

    /// Writes the editor's text back into the engine.
    ///
    /// Returns `Ok(false)` when a push is already in flight. The editor
    /// must be open with its content loaded, otherwise it would write
    /// empty or stale text over the document.
    pub fn push(&mut self, tab: TabId, handle: Option<EngineHandle>) -> SessionResult<bool> {
        let current = self.sync(tab);
        if current.state.push_in_flight() {
            tracing::debug!("Tab {}: push already in flight", tab);
            return Ok(false);
        }
        if !current.editor_open || matches!(current.state, SyncState::Pulling { .. }) {
            return Err(SessionError::NotReady);
        }

        self.entry(tab).state = SyncState::Pushing;

        let Some(handle) = handle else {
            self.entry(tab).state = SyncState::Idle;
            return Err(SessionError::PushFailed("document has no engine surface".into()));
        };

        if let Err(e) = self.editor.send(tab, EditorCommand::PushTo { handle }) {
            tracing::warn!("Push rejected for tab {}: {}", tab, e);
            self.entry(tab).state = SyncState::Idle;
            return Err(SessionError::PushFailed(e.to_string()));
        }

        tracing::debug!("Tab {}: Idle -> Pushing", tab);
        Ok(true)
    }

    /// Sends an editing command that needs loaded content.
    pub fn send(&mut self, tab: TabId, command: EditorCommand) -> SessionResult<()> {
        let current = self.sync(tab);
        if command.is_destructive()
            && (!current.editor_open || matches!(current.state, SyncState::Pulling { .. }))
        {
            return Err(SessionError::NotReady);
        }
        self.editor
            .send(tab, command)
            .map_err(|e| SessionError::EditorRejected(e.to_string()))
    }

    /// Advances the handshake for an editor event.
    pub fn on_event(&mut self, tab: TabId, event: BridgeEvent) -> BridgeOutcome {
        let state = self.state(tab);
        match event {
            BridgeEvent::PullStart | BridgeEvent::ReplaceStart => BridgeOutcome::Ignored,

            BridgeEvent::PullEnd { success, detail } => {
                let SyncState::Pulling { was_open } = state else {
                    return BridgeOutcome::Stale;
                };
                let sync = self.entry(tab);
                sync.state = SyncState::Idle;
                if success {
                    tracing::debug!("Tab {}: Pulling -> Idle", tab);
                    BridgeOutcome::PullCompleted
                } else {
                    sync.editor_open = was_open;
                    BridgeOutcome::PullFailed(detail.unwrap_or_else(|| "pull failed".into()))
                }
            }

            BridgeEvent::ReplaceProgress { processed } => BridgeOutcome::Progress { processed },

            BridgeEvent::ReplaceEnd {
                success,
                processed_count,
                detail,
            } => {
                if state != SyncState::Pushing {
                    return BridgeOutcome::Stale;
                }
                if success {
                    tracing::debug!("Tab {}: Pushing -> Saving", tab);
                    self.entry(tab).state = SyncState::Saving;
                    BridgeOutcome::Saving {
                        processed: processed_count,
                    }
                } else {
                    self.entry(tab).state = SyncState::Idle;
                    BridgeOutcome::PushFailed(detail.unwrap_or_else(|| "replace failed".into()))
                }
            }

            BridgeEvent::ReplaceLimitReached { total, limit } => {
                BridgeOutcome::LimitReached { total, limit }
            }
        }
    }

    /// Finishes a push when the engine reports the save.
    ///
    /// Returns `false` if no push was in flight, meaning the save belongs
    /// to someone else. On success the editor surface closes.
    pub fn complete_push(&mut self, tab: TabId, success: bool) -> bool {
        if !self.push_in_flight(tab) {
            return false;
        }
        let sync = self.entry(tab);
        sync.state = SyncState::Idle;
        if success {
            sync.editor_open = false;
        }
        tracing::debug!("Tab {}: push finished (success: {})", tab, success);
        true
    }

    /// Marks a direct save as started. Returns `false` if one is pending.
    pub fn begin_save(&mut self, tab: TabId) -> bool {
        let sync = self.entry(tab);
        if sync.save_pending {
            return false;
        }
        sync.save_pending = true;
        true
    }

    /// Clears a direct save. Returns whether one was pending.
    pub fn finish_save(&mut self, tab: TabId) -> bool {
        std::mem::take(&mut self.entry(tab).save_pending)
    }

    /// Hides the editor surface without pushing.
    pub fn close_editor(&mut self, tab: TabId) {
        let sync = self.entry(tab);
        if matches!(sync.state, SyncState::Pulling { .. }) {
            sync.state = SyncState::Idle;
        }
        sync.editor_open = false;
    }

    /// Drops all state for a closed tab.
    pub fn forget(&mut self, tab: TabId) {
        self.tabs.remove(&tab);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{CommandLog, RecordingEditor};

    fn bridge() -> (EditorSyncBridge, CommandLog) {
        let (editor, log) = RecordingEditor::new();
        (EditorSyncBridge::new(Box::new(editor)), log)
    }

    fn rejecting() -> EditorSyncBridge {
        let (editor, _log) = RecordingEditor::rejecting();
        EditorSyncBridge::new(Box::new(editor))
    }

    const HANDLE: Option<EngineHandle> = Some(EngineHandle::new(7));

    /// Accepts pulls, refuses everything else.
    struct PullOnlyEditor;

    impl EmbeddedEditor for PullOnlyEditor {
        fn send(&mut self, _tab: TabId, command: EditorCommand) -> Result<(), BridgeError> {
            match command {
                EditorCommand::PullFrom { .. } => Ok(()),
                _ => Err(BridgeError::Unavailable),
            }
        }
    }

    /// Pulls and completes the pull so the editor holds the document.
    fn open_editor(bridge: &mut EditorSyncBridge, tab: TabId) {
        bridge.pull(tab, HANDLE).unwrap();
        bridge.on_event(tab, BridgeEvent::PullEnd { success: true, detail: None });
    }

    #[test]
    fn test_pull_round_trip() {
        let (mut bridge, mut log) = bridge();
        let tab = TabId::new();

        bridge.pull(tab, HANDLE).unwrap();
        assert!(matches!(bridge.state(tab), SyncState::Pulling { was_open: false }));
        assert!(bridge.is_editor_open(tab));
        assert_eq!(
            log.editor_commands(tab),
            vec![EditorCommand::PullFrom { handle: EngineHandle::new(7) }]
        );

        let outcome = bridge.on_event(tab, BridgeEvent::PullEnd { success: true, detail: None });
        assert_eq!(outcome, BridgeOutcome::PullCompleted);
        assert_eq!(bridge.state(tab), SyncState::Idle);
    }

    #[test]
    fn test_pull_without_handle_fails() {
        let (mut bridge, _log) = bridge();
        let tab = TabId::new();

        let err = bridge.pull(tab, None).unwrap_err();
        assert!(matches!(err, SessionError::PullFailed(_)));
        assert!(!bridge.is_editor_open(tab));
    }

    #[test]
    fn test_rejected_pull_restores_prior_state() {
        let mut bridge = rejecting();
        let tab = TabId::new();

        assert!(bridge.pull(tab, HANDLE).is_err());
        assert_eq!(bridge.state(tab), SyncState::Idle);
        assert!(!bridge.is_editor_open(tab));
    }

    #[test]
    fn test_failed_pull_end_restores_surface() {
        let (mut bridge, _log) = bridge();
        let tab = TabId::new();

        bridge.pull(tab, HANDLE).unwrap();
        let outcome = bridge.on_event(
            tab,
            BridgeEvent::PullEnd {
                success: false,
                detail: Some("too big".into()),
            },
        );
        assert_eq!(outcome, BridgeOutcome::PullFailed("too big".into()));
        assert!(!bridge.is_editor_open(tab));
    }

    #[test]
    fn test_editing_rejected_while_pulling() {
        let (mut bridge, _log) = bridge();
        let tab = TabId::new();

        bridge.pull(tab, HANDLE).unwrap();
        assert!(matches!(bridge.send(tab, EditorCommand::Undo), Err(SessionError::NotReady)));

        bridge.on_event(tab, BridgeEvent::PullEnd { success: true, detail: None });
        assert!(bridge.send(tab, EditorCommand::Undo).is_ok());
    }

    #[test]
    fn test_editing_rejected_when_editor_closed() {
        let (mut bridge, _log) = bridge();
        let tab = TabId::new();
        assert!(matches!(
            bridge.send(tab, EditorCommand::InsertText { text: "x".into() }),
            Err(SessionError::NotReady)
        ));
    }

    #[test]
    fn test_push_handshake() {
        let (mut bridge, _log) = bridge();
        let tab = TabId::new();
        open_editor(&mut bridge, tab);

        assert!(bridge.push(tab, HANDLE).unwrap());
        assert!(bridge.push_in_flight(tab));

        let outcome = bridge.on_event(
            tab,
            BridgeEvent::ReplaceEnd {
                success: true,
                processed_count: Some(12),
                detail: None,
            },
        );
        assert_eq!(outcome, BridgeOutcome::Saving { processed: Some(12) });
        assert_eq!(bridge.state(tab), SyncState::Saving);

        assert!(bridge.complete_push(tab, true));
        assert_eq!(bridge.state(tab), SyncState::Idle);
        assert!(!bridge.is_processing(tab));
    }

    #[test]
    fn test_second_push_is_noop() {
        let (mut bridge, mut log) = bridge();
        let tab = TabId::new();
        open_editor(&mut bridge, tab);
        log.drain();

        assert!(bridge.push(tab, HANDLE).unwrap());
        assert!(!bridge.push(tab, HANDLE).unwrap());
        assert_eq!(log.editor_commands(tab).len(), 1);
    }

    #[test]
    fn test_push_needs_loaded_editor() {
        let (mut bridge, mut log) = bridge();
        let tab = TabId::new();

        assert!(matches!(bridge.push(tab, HANDLE), Err(SessionError::NotReady)));

        bridge.pull(tab, HANDLE).unwrap();
        assert!(matches!(bridge.push(tab, HANDLE), Err(SessionError::NotReady)));
        assert!(!log
            .editor_commands(tab)
            .iter()
            .any(|c| matches!(c, EditorCommand::PushTo { .. })));
        assert!(!bridge.push_in_flight(tab));
    }

    #[test]
    fn test_push_failures_return_to_idle() {
        let mut bridge = EditorSyncBridge::new(Box::new(PullOnlyEditor));
        let tab = TabId::new();
        open_editor(&mut bridge, tab);
        assert!(matches!(bridge.push(tab, HANDLE), Err(SessionError::PushFailed(_))));
        assert_eq!(bridge.state(tab), SyncState::Idle);
        assert!(bridge.is_editor_open(tab));

        let (mut bridge, _log) = self::bridge();
        open_editor(&mut bridge, tab);
        assert!(matches!(bridge.push(tab, None), Err(SessionError::PushFailed(_))));
        assert!(!bridge.push_in_flight(tab));

        bridge.push(tab, HANDLE).unwrap();
        let outcome = bridge.on_event(
            tab,
            BridgeEvent::ReplaceEnd {
                success: false,
                processed_count: None,
                detail: None,
            },
        );
        assert!(matches!(outcome, BridgeOutcome::PushFailed(_)));
        assert!(!bridge.push_in_flight(tab));
    }

    #[test]
    fn test_complete_push_without_push_in_flight() {
        let (mut bridge, _log) = bridge();
        assert!(!bridge.complete_push(TabId::new(), true));
    }

    #[test]
    fn test_failed_save_keeps_editor_open() {
        let (mut bridge, _log) = bridge();
        let tab = TabId::new();
        bridge.pull(tab, HANDLE).unwrap();
        bridge.on_event(tab, BridgeEvent::PullEnd { success: true, detail: None });
        bridge.push(tab, HANDLE).unwrap();

        assert!(bridge.complete_push(tab, false));
        assert!(bridge.is_editor_open(tab));
        assert!(!bridge.push_in_flight(tab));
    }

    #[test]
    fn test_direct_save_pending() {
        let (mut bridge, _log) = bridge();
        let tab = TabId::new();

        assert!(bridge.begin_save(tab));
        assert!(!bridge.begin_save(tab));
        assert!(bridge.is_processing(tab));
        assert!(bridge.finish_save(tab));
        assert!(!bridge.finish_save(tab));
    }

    #[test]
    fn test_stale_replace_end() {
        let (mut bridge, _log) = bridge();
        let outcome = bridge.on_event(
            TabId::new(),
            BridgeEvent::ReplaceEnd {
                success: true,
                processed_count: None,
                detail: None,
            },
        );
        assert_eq!(outcome, BridgeOutcome::Stale);
    }
}
