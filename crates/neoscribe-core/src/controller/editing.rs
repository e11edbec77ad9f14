//! Host commands: search, selection, saving and the embedded editor.

use tokio::time::Instant;

use neoscribe_tabs::{LineSelection, TabId, TabPatch};

use super::SessionController;
use crate::command::{EditorCommand, EngineCommand, TabCommand};
use crate::event::{InfoKind, SessionNotice};
use crate::platform::mime_for_extension;
use crate::{SessionError, SessionResult};

impl SessionController {
    /// Executes a host command against one tab.
    pub fn execute(&mut self, tab: TabId, command: TabCommand) -> SessionResult<()> {
        let record = self.tab(tab)?;
        tracing::debug!("{} on tab {}", command.display_name(), tab);

        match command {
            TabCommand::Save => self.save(tab),
            TabCommand::Reload => {
                self.surface_mut(tab).loading = true;
                self.engine_command(tab, EngineCommand::Reload)
            }

            TabCommand::Search { query, match_case } => {
                let search = &mut self.surface_mut(tab).search;
                search.current = 0;
                search.total = 0;
                search.line = None;
                search.complete = false;
                search.match_case = match_case;
                self.engine_command(tab, EngineCommand::Search { query, match_case })
            }
            TabCommand::FindNext { query, match_case } => {
                self.engine_command(tab, EngineCommand::FindNext { query, match_case })
            }
            TabCommand::FindPrev { query, match_case } => {
                self.engine_command(tab, EngineCommand::FindPrev { query, match_case })
            }
            TabCommand::FinishSearch => {
                self.surface_mut(tab).reset_search();
                self.engine_command(tab, EngineCommand::FinishSearch)
            }
            TabCommand::Replace { text } => {
                if record.is_read_only {
                    return Err(SessionError::ReadOnly);
                }
                self.engine_command(tab, EngineCommand::Replace { text })
            }
            TabCommand::ReplaceAll {
                query,
                replacement,
                match_case,
                apply_limit,
            } => {
                if record.is_read_only {
                    return Err(SessionError::ReadOnly);
                }
                self.engine_command(
                    tab,
                    EngineCommand::ReplaceAll {
                        query,
                        replacement,
                        match_case,
                        apply_limit,
                    },
                )?;
                self.surface_mut(tab).replacing = true;
                Ok(())
            }

            TabCommand::JumpToLine { line } => {
                self.engine_command(tab, EngineCommand::JumpToLine { line })
            }
            TabCommand::JumpToOccurrence {
                line,
                occurrence,
                query,
                match_case,
            } => self.engine_command(
                tab,
                EngineCommand::JumpToOccurrence {
                    line,
                    occurrence,
                    query,
                    match_case,
                },
            ),

            TabCommand::SelectAll => self.engine_command(tab, EngineCommand::SelectAll),
            TabCommand::SelectRange { start, end } => {
                let (start, end) = if start <= end { (start, end) } else { (end, start) };
                self.engine_command(tab, EngineCommand::SelectRange { start, end })
            }
            TabCommand::SetSelectedLines { indices } => {
                self.engine_command(tab, EngineCommand::SetSelectedLines { indices })
            }
            TabCommand::ClearSelection => {
                self.clear_selection(tab);
                Ok(())
            }
            TabCommand::ExportSelection { intent } => self.export_selection(tab, intent),
            TabCommand::ResolveExport { choice } => self.resolve_confirmation(choice),

            TabCommand::OpenEditor => self.open_editor(tab),
            TabCommand::ApplyEditorChanges => {
                if record.is_read_only {
                    return Err(SessionError::ReadOnly);
                }
                self.apply_editor_changes(tab)
            }
            TabCommand::CloseEditor => {
                self.close_editor(tab);
                Ok(())
            }
            TabCommand::EditorUndo => self.bridge.send(tab, EditorCommand::Undo),
            TabCommand::EditorRedo => self.bridge.send(tab, EditorCommand::Redo),
            TabCommand::EditorInsertText { text } => {
                self.bridge.send(tab, EditorCommand::InsertText { text })
            }
            TabCommand::EditorSetTheme { theme } => {
                self.bridge.send(tab, EditorCommand::SetTheme { theme })
            }

            TabCommand::Pulse => {
                self.pulse(tab);
                Ok(())
            }
        }
    }

    fn engine_command(&mut self, tab: TabId, command: EngineCommand) -> SessionResult<()> {
        if self.engine.send(tab, command) {
            Ok(())
        } else {
            Err(SessionError::Detached(tab))
        }
    }

    /// Clears the tab's selection and ignores the engine's echoes of it.
    pub fn clear_selection(&mut self, tab: TabId) {
        self.reconciler.arm(tab, Instant::now());
        self.engine.send(tab, EngineCommand::ClearSelection);
        self.patch(tab, TabPatch::selection(LineSelection::cleared()));
    }

    /// Saves the tab to its storage handle, asking for one if it has none.
    ///
    /// A second save while one is pending does nothing.
    pub fn save(&mut self, tab: TabId) -> SessionResult<()> {
        let record = self.tab(tab)?;
        if record.is_read_only {
            return Err(SessionError::ReadOnly);
        }
        if self.bridge.save_pending(tab) {
            tracing::debug!("Save already pending for tab {}", tab);
            return Ok(());
        }
        if self.engine.handle(tab).is_none() {
            return Err(SessionError::Detached(tab));
        }

        let handle = match record.uri {
            Some(uri) => uri,
            None => {
                let mime = mime_for_extension(&record.extension);
                match self.picker.create_document(&record.name, mime)? {
                    Some(handle) => handle,
                    None => {
                        tracing::debug!("Save cancelled for tab {}", tab);
                        self.emit(SessionNotice::Info {
                            tab,
                            kind: InfoKind::SaveCancelled,
                        });
                        return Ok(());
                    }
                }
            }
        };

        self.bridge.begin_save(tab);
        self.emit(SessionNotice::Processing { tab, active: true });
        if let Err(e) = self.engine_command(tab, EngineCommand::SaveToHandle { handle }) {
            self.bridge.finish_save(tab);
            self.emit(SessionNotice::Processing { tab, active: false });
            return Err(e);
        }
        Ok(())
    }

    /// Opens the embedded editor and loads the document into it.
    pub fn open_editor(&mut self, tab: TabId) -> SessionResult<()> {
        let handle = self.engine.handle(tab);
        self.bridge.pull(tab, handle)?;
        self.emit(SessionNotice::EditorOpened { tab });
        Ok(())
    }

    /// Writes the editor's text back through the engine.
    pub fn apply_editor_changes(&mut self, tab: TabId) -> SessionResult<()> {
        let handle = self.engine.handle(tab);
        if self.bridge.push(tab, handle)? {
            self.emit(SessionNotice::Processing { tab, active: true });
        }
        Ok(())
    }

    pub fn close_editor(&mut self, tab: TabId) {
        if self.bridge.is_editor_open(tab) {
            self.bridge.close_editor(tab);
            self.emit(SessionNotice::EditorClosed { tab });
        }
    }
}
