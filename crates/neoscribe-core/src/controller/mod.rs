//! Session orchestration.
//!
//! ## Learning: The Facade Pattern
//!
//! `SessionController` is the only type a host talks to. It owns the
//! store, the adapter, the bridge, the reconciler, the arbiter and the
//! shuffle controller, and wires them together:
//!
//! - `mod.rs`: construction, tab lifecycle, pulses, preferences
//! - `dispatch.rs`: collaborator events (`handle`)
//! - `editing.rs`: host commands (`execute`), saving, the embedded editor
//! - `exporting.rs`: the large-selection export flows
//!
//! ## Thread Safety
//!
//! The controller is a plain synchronous state machine owned by one task.
//! Every method takes `&mut self`; nothing inside is shared.

mod dispatch;
mod editing;
mod exporting;


use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;

use neoscribe_tabs::{OpenOutcome, Session, Tab, TabDescriptor, TabId, TabPatch};

use crate::bridge::{EditorSyncBridge, EmbeddedEditor, SyncState};
use crate::command::EditorCommand;
use crate::config::{Preferences, SessionConfig};
use crate::engine::{DocumentEngine, EngineAdapter, EngineHandle};
use crate::event::{NoticeBus, SessionNotice};
use crate::export::{ExportArbiter, ExportFlow, ExportPolicy};
use crate::platform::{FilePicker, PreferenceStore, ScratchStorage, SharePlatform};
use crate::reconcile::SelectionReconciler;
use crate::shuffle::{PulseOutcome, ShuffleController, SurfaceFrame};
use crate::store::{Closed, TabStore};
use crate::surface::SurfaceState;
use crate::{SessionError, SessionResult};

/// External services the session drives.
pub struct Collaborators {
    pub engine: Box<dyn DocumentEngine>,
    pub editor: Box<dyn EmbeddedEditor>,
    pub storage: Box<dyn ScratchStorage>,
    pub picker: Box<dyn FilePicker>,
    pub share: Box<dyn SharePlatform>,
    pub preferences: Box<dyn PreferenceStore>,
}

/// Extra settings for `open_path`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenOptions {
    pub uri: Option<String>,
    pub extension: Option<String>,
    pub read_only: bool,
    pub start_editing: bool,
}

pub struct SessionController {
    config: SessionConfig,
    store: TabStore,
    engine: EngineAdapter,
    bridge: EditorSyncBridge,
    reconciler: SelectionReconciler,
    arbiter: ExportArbiter,
    shuffle: ShuffleController,
    surfaces: HashMap<TabId, SurfaceState>,
    storage: Box<dyn ScratchStorage>,
    picker: Box<dyn FilePicker>,
    share: Box<dyn SharePlatform>,
    preference_store: Box<dyn PreferenceStore>,
    preferences: Preferences,
    notices: NoticeBus,
    exit_requested: bool,
}

impl SessionController {
    /// Creates a session with one seed tab.
    pub fn new(config: SessionConfig, seed: TabDescriptor, collaborators: Collaborators) -> Self {
        let Collaborators {
            engine,
            editor,
            storage,
            picker,
            share,
            preferences: mut preference_store,
        } = collaborators;

        let preferences = match preference_store.load() {
            Ok(Some(stored)) => stored,
            Ok(None) => config.preferences.clone(),
            Err(e) => {
                tracing::warn!("Failed to load preferences: {}", e);
                config.preferences.clone()
            }
        };

        let session = Session::with_capacity(seed, config.session.max_tabs);
        let seed_id = session.active_tab_id();

        let mut controller = Self {
            store: TabStore::new(session),
            engine: EngineAdapter::new(engine),
            bridge: EditorSyncBridge::new(editor),
            reconciler: SelectionReconciler::new(config.session.clearing_latch()),
            arbiter: ExportArbiter::new(ExportPolicy::new(&config.export)),
            shuffle: ShuffleController::new(config.session.pulse_frame()),
            surfaces: HashMap::new(),
            storage,
            picker,
            share,
            preference_store,
            preferences,
            notices: NoticeBus::new(),
            exit_requested: false,
            config,
        };
        controller.attach(seed_id);
        tracing::info!("Session started with tab {}", seed_id);
        controller
    }

    // ==================== Accessors ====================

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn snapshot(&self) -> Arc<Session> {
        self.store.snapshot()
    }

    pub fn watch_snapshot(&self) -> watch::Receiver<Arc<Session>> {
        self.store.subscribe()
    }

    pub fn notices(&self) -> &NoticeBus {
        &self.notices
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionNotice> {
        self.notices.subscribe()
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn surface(&self, tab: TabId) -> Option<&SurfaceState> {
        self.surfaces.get(&tab)
    }

    pub fn surface_frame(&self, tab: TabId) -> SurfaceFrame {
        self.shuffle.frame(tab)
    }

    pub fn engine_handle(&self, tab: TabId) -> Option<EngineHandle> {
        self.engine.handle(tab)
    }

    pub fn sync_state(&self, tab: TabId) -> SyncState {
        self.bridge.state(tab)
    }

    pub fn is_editor_open(&self, tab: TabId) -> bool {
        self.bridge.is_editor_open(tab)
    }

    /// True while a save or a push is running for the tab.
    pub fn is_processing(&self, tab: TabId) -> bool {
        self.bridge.is_processing(tab)
    }

    pub fn export_flow(&self) -> &ExportFlow {
        self.arbiter.flow()
    }

    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    /// Editor theme derived from the current preferences.
    pub fn editor_theme(&self) -> String {
        self.config.editor_theme_for(&self.preferences)
    }

    // ==================== Tab Lifecycle ====================

    /// Opens a tab, or focuses the tab already showing the same file.
    pub fn open(&mut self, descriptor: TabDescriptor) -> SessionResult<TabId> {
        match self.store.open(descriptor)? {
            OpenOutcome::Created(id) => {
                tracing::info!("Opened tab {}", id);
                self.attach(id);
                self.emit(SessionNotice::TabOpened { tab: id });
                self.pulse(id);
                Ok(id)
            }
            OpenOutcome::Switched(id) => {
                tracing::debug!("Already open, focusing tab {}", id);
                self.emit(SessionNotice::TabFocused { tab: id });
                Ok(id)
            }
            OpenOutcome::AlreadyActive(id) => Ok(id),
        }
    }

    pub fn open_path(
        &mut self,
        path: impl Into<PathBuf>,
        name: impl Into<String>,
        options: OpenOptions,
    ) -> SessionResult<TabId> {
        let mut descriptor = TabDescriptor::file(path, name).read_only(options.read_only);
        if let Some(uri) = options.uri {
            descriptor = descriptor.with_uri(uri);
        }
        if let Some(extension) = options.extension {
            descriptor = descriptor.with_extension(extension);
        }
        if options.start_editing {
            descriptor = descriptor.start_editing();
        }
        self.open(descriptor)
    }

    /// Focuses a tab. Engine surfaces stay as they are.
    pub fn switch_tab(&mut self, tab: TabId) -> SessionResult<()> {
        if self.store.switch(tab)? {
            self.emit(SessionNotice::TabFocused { tab });
        }
        Ok(())
    }

    /// Closes a tab. Closing the last tab requests exit instead.
    pub fn close_tab(&mut self, tab: TabId) -> SessionResult<()> {
        match self.store.close(tab)? {
            Closed::Removed {
                was_active,
                now_active,
            } => {
                self.teardown(tab);
                tracing::info!("Closed tab {}", tab);
                self.emit(SessionNotice::TabClosed { tab });
                if was_active {
                    self.emit(SessionNotice::TabFocused { tab: now_active });
                }
            }
            Closed::ExitRequested => {
                tracing::info!("Last tab closed, requesting exit");
                self.exit_requested = true;
                self.emit(SessionNotice::ExitRequested);
            }
        }
        Ok(())
    }

    /// Opens a document chosen through the picker.
    ///
    /// Returns `Ok(None)` when the user cancels.
    pub fn import_file(&mut self) -> SessionResult<Option<TabId>> {
        let Some(picked) = self.picker.pick_document()? else {
            tracing::debug!("Import cancelled");
            return Ok(None);
        };
        let mut descriptor = TabDescriptor::file(picked.path, picked.name);
        if let Some(uri) = picked.uri {
            descriptor = descriptor.with_uri(uri);
        }
        self.open(descriptor).map(Some)
    }

    /// Creates an empty scratch file and opens it ready for editing.
    pub fn create_tab(&mut self, name: &str, extension: Option<&str>) -> SessionResult<TabId> {
        let snapshot = self.snapshot();
        if snapshot.is_full() {
            return Err(SessionError::CapacityExceeded {
                limit: snapshot.capacity(),
            });
        }

        let file_name = match extension {
            Some(ext) => format!("{}.{}", name, ext.trim_start_matches('.')),
            None => name.to_string(),
        };
        let file = self.storage.create_temp_file(&file_name, "")?;
        let mut descriptor = TabDescriptor::file(file.path, file.name).start_editing();
        if let Some(uri) = file.uri {
            descriptor = descriptor.with_uri(uri);
        }
        self.open(descriptor)
    }

    /// Opens an image-to-text scan tab.
    pub fn new_ocr_tab(&mut self) -> SessionResult<TabId> {
        self.open(TabDescriptor::ocr())
    }

    // ==================== Layout ====================

    /// Hides the tab's surface for one frame.
    pub fn pulse(&mut self, tab: TabId) {
        if let PulseOutcome::Started { generation, .. } = self.shuffle.pulse(tab, Instant::now()) {
            self.emit(SessionNotice::SurfaceHidden { tab, generation });
        }
    }

    /// Earliest time `tick` has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.shuffle.next_deadline()
    }

    /// Shows surfaces whose frame has passed.
    pub fn tick(&mut self) {
        for (tab, generation) in self.shuffle.settle(Instant::now()) {
            self.emit(SessionNotice::SurfaceShown { tab, generation });
        }
    }

    // ==================== Preferences ====================

    pub fn set_app_theme(&mut self, theme: impl Into<String>) -> SessionResult<()> {
        self.preferences.theme = theme.into();
        self.preferences_changed()
    }

    pub fn set_editor_theme(&mut self, theme: Option<String>) -> SessionResult<()> {
        self.preferences.editor_theme = theme;
        self.preferences_changed()
    }

    pub fn set_language(&mut self, language: impl Into<String>) -> SessionResult<()> {
        self.preferences.language = language.into();
        self.preference_store.save(&self.preferences)?;
        Ok(())
    }

    fn preferences_changed(&mut self) -> SessionResult<()> {
        self.preference_store.save(&self.preferences)?;

        let theme = self.editor_theme();
        let open: Vec<TabId> = self
            .snapshot()
            .tabs()
            .iter()
            .map(|t| t.id)
            .filter(|id| self.bridge.is_editor_open(*id))
            .collect();
        for tab in open {
            let command = EditorCommand::SetTheme {
                theme: theme.clone(),
            };
            if let Err(e) = self.bridge.send(tab, command) {
                tracing::debug!("Theme not applied to tab {}: {}", tab, e);
            }
        }
        Ok(())
    }

    // ==================== Internals ====================

    fn attach(&mut self, tab: TabId) {
        let snapshot = self.snapshot();
        let Some(record) = snapshot.get(tab) else {
            return;
        };
        let attached = match self.engine.attach(record) {
            Ok(handle) => handle.is_some(),
            Err(e) => {
                self.report(Some(tab), &SessionError::AttachFailed(e.to_string()));
                false
            }
        };
        let mut surface = SurfaceState::new();
        surface.loading = attached;
        self.surfaces.insert(tab, surface);
    }

    fn teardown(&mut self, tab: TabId) {
        self.engine.detach(tab);
        self.bridge.forget(tab);
        self.reconciler.forget(tab);
        self.arbiter.forget(tab);
        self.shuffle.forget(tab);
        self.surfaces.remove(&tab);
    }

    fn tab(&self, tab: TabId) -> SessionResult<Tab> {
        self.snapshot()
            .get(tab)
            .cloned()
            .ok_or(SessionError::TabNotFound(tab))
    }

    fn patch(&mut self, tab: TabId, patch: TabPatch) {
        if let Err(e) = self.store.patch(tab, patch) {
            tracing::trace!("Patch dropped: {}", e);
        }
    }

    fn surface_mut(&mut self, tab: TabId) -> &mut SurfaceState {
        self.surfaces.entry(tab).or_default()
    }

    fn emit(&self, notice: SessionNotice) {
        self.notices.emit(notice);
    }

    /// Logs a failure and shows it to the user.
    pub fn report(&self, tab: Option<TabId>, error: &SessionError) {
        tracing::warn!("{}", error);
        self.emit(SessionNotice::Failure {
            tab,
            message: error.to_string(),
        });
    }
}
