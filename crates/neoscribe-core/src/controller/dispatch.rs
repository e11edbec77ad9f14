//! Collaborator event dispatch.

use tokio::time::Instant;

use neoscribe_tabs::{LineSelection, SelectedLines, TabId, TabPatch};

use super::SessionController;
use crate::bridge::{BridgeEvent, BridgeOutcome};
use crate::command::{EditorCommand, EngineCommand};
use crate::engine::{CompletionStatus, EngineEvent, LoadStatus, SaveMode};
use crate::event::{InfoKind, SessionEvent, SessionNotice};
use crate::reconcile::{SelectionReport, Verdict};
use crate::SessionError;

impl SessionController {
    /// Applies one collaborator event.
    ///
    /// Events for tabs that are no longer in the session are dropped.
    pub fn handle(&mut self, event: SessionEvent) {
        let tab = event.tab();
        if !self.snapshot().contains(tab) {
            tracing::trace!("Dropping event for closed tab {}", tab);
            return;
        }
        match event {
            SessionEvent::Engine { tab, event } => self.on_engine(tab, event),
            SessionEvent::Editor { tab, event } => self.on_editor(tab, event),
        }
    }

    fn on_engine(&mut self, tab: TabId, event: EngineEvent) {
        tracing::trace!("Engine event {} for tab {}", event.kind(), tab);
        match event {
            EngineEvent::FileLoaded {
                status,
                total_lines,
                file_size,
            } => self.on_file_loaded(tab, status, total_lines, file_size),

            EngineEvent::SelectionChanged {
                count,
                total_line_count,
                indices,
                range_start,
                range_count,
            } => {
                let report = SelectionReport {
                    count,
                    indices,
                    range_start,
                    range_count,
                };
                let snapshot = self.snapshot();
                let verdict = self
                    .reconciler
                    .reconcile_selection(&snapshot, tab, report, Instant::now());
                if let Verdict::Apply(patch) = verdict {
                    self.surface_mut(tab).total_lines = Some(total_line_count);
                    self.patch(tab, patch);
                }
            }

            EngineEvent::SelectionModeChanged { active } => {
                let snapshot = self.snapshot();
                let verdict = self
                    .reconciler
                    .reconcile_mode(&snapshot, tab, active, Instant::now());
                if let Verdict::Apply(patch) = verdict {
                    self.patch(tab, patch);
                }
            }

            EngineEvent::SaveComplete {
                status,
                mode,
                detail,
            } => self.on_save_complete(tab, status, mode, detail),

            EngineEvent::SearchProgress {
                current,
                total,
                line,
                match_case,
                is_full_report,
                ..
            } => {
                let search = &mut self.surface_mut(tab).search;
                search.current = current;
                search.total = total;
                search.line = line;
                if let Some(match_case) = match_case {
                    search.match_case = match_case;
                }
                search.complete = is_full_report;
                self.emit(SessionNotice::SearchUpdated {
                    tab,
                    current,
                    total,
                });
            }

            EngineEvent::ReplaceEnd {
                status,
                processed_count,
                detail,
            } => {
                self.surface_mut(tab).replacing = false;
                if status.is_success() {
                    tracing::info!(
                        "Replace finished on tab {} ({} lines)",
                        tab,
                        processed_count.unwrap_or(0)
                    );
                    self.patch(tab, TabPatch::dirty(true));
                    self.surface_mut(tab).loading = true;
                    self.engine.send(tab, EngineCommand::Reload);
                    self.engine.send(tab, EngineCommand::FinishSearch);
                    self.surface_mut(tab).reset_search();
                    self.emit(SessionNotice::Info {
                        tab,
                        kind: InfoKind::ReplaceFinished,
                    });
                    self.pulse(tab);
                } else {
                    let detail = detail.unwrap_or_else(|| "unknown error".into());
                    self.report(Some(tab), &SessionError::ReplaceFailed(detail));
                }
            }

            EngineEvent::JumpResult { success, line, .. } => {
                if success {
                    self.patch(tab, TabPatch::scroll(line));
                }
                self.emit(SessionNotice::JumpFinished { tab, success, line });
            }

            EngineEvent::HardReset => {
                tracing::debug!("Engine reset tab {}", tab);
                self.surface_mut(tab).reset_search();
                self.patch(tab, TabPatch::selection(LineSelection::cleared()));
                self.pulse(tab);
            }

            EngineEvent::SelectedText { text } => self.on_selected_text(tab, text),

            EngineEvent::SelectionTooLarge => self.on_selection_too_large(tab),

            EngineEvent::Scrolled { line } => self.patch(tab, TabPatch::scroll(line)),
        }
    }

    fn on_file_loaded(
        &mut self,
        tab: TabId,
        status: LoadStatus,
        total_lines: Option<usize>,
        file_size: Option<u64>,
    ) {
        let loading = status == LoadStatus::Loading;
        let restore = self.config.session.restore_on_load;

        let surface = self.surface_mut(tab);
        surface.loading = loading;
        if total_lines.is_some() {
            surface.total_lines = total_lines;
        }
        if file_size.is_some() {
            surface.file_size = file_size;
        }
        let first_load = !loading && !surface.restored;
        if first_load {
            surface.restored = true;
        }

        self.emit(SessionNotice::LoadProgress {
            tab,
            loading,
            total_lines,
        });

        if first_load && restore {
            self.restore_view(tab);
        }
    }

    /// Puts the saved scroll line and selection back after the first load.
    fn restore_view(&mut self, tab: TabId) {
        let Ok(record) = self.tab(tab) else {
            return;
        };
        if record.scroll_line > 0 {
            self.engine.send(
                tab,
                EngineCommand::JumpToLine {
                    line: record.scroll_line,
                },
            );
        }
        match record.selection.lines {
            SelectedLines::Indices { indices } => {
                self.engine
                    .send(tab, EngineCommand::SetSelectedLines { indices });
            }
            SelectedLines::Range { start, count } if count > 0 => {
                self.engine.send(
                    tab,
                    EngineCommand::SelectRange {
                        start,
                        end: start + count - 1,
                    },
                );
            }
            _ => {}
        }
    }

    /// Routes a save completion: push first, then native export, then a
    /// direct save.
    fn on_save_complete(
        &mut self,
        tab: TabId,
        status: CompletionStatus,
        mode: SaveMode,
        detail: Option<String>,
    ) {
        let success = status.is_success();

        if self.bridge.complete_push(tab, success) {
            self.finish_push(tab, success, detail);
            return;
        }
        if self.arbiter.is_awaiting_native(tab) {
            self.finish_native_export(tab, success, detail);
            return;
        }
        self.finish_direct_save(tab, success, mode, detail);
    }

    fn finish_push(&mut self, tab: TabId, success: bool, detail: Option<String>) {
        self.emit(SessionNotice::Processing { tab, active: false });
        if !success {
            let detail = detail.unwrap_or_else(|| "unknown error".into());
            self.report(Some(tab), &SessionError::SaveFailed(detail));
            return;
        }

        self.surface_mut(tab).loading = true;
        self.engine.send(tab, EngineCommand::Reload);
        self.patch(tab, TabPatch::dirty(false));
        self.clear_selection(tab);
        self.emit(SessionNotice::EditorClosed { tab });
        self.emit(SessionNotice::Info {
            tab,
            kind: InfoKind::ChangesApplied,
        });
        self.pulse(tab);
    }

    fn finish_direct_save(&mut self, tab: TabId, success: bool, mode: SaveMode, detail: Option<String>) {
        if self.bridge.finish_save(tab) {
            self.emit(SessionNotice::Processing { tab, active: false });
        }
        if !success {
            let detail = detail.unwrap_or_else(|| "unknown error".into());
            self.report(Some(tab), &SessionError::SaveFailed(detail));
            return;
        }

        let mut patch = TabPatch::dirty(false);
        if mode == SaveMode::Uri {
            if let Some(uri) = detail {
                patch = patch.with_uri(uri);
            }
        }
        self.patch(tab, patch);
        self.emit(SessionNotice::Info {
            tab,
            kind: InfoKind::Saved,
        });
    }

    fn on_editor(&mut self, tab: TabId, event: BridgeEvent) {
        match self.bridge.on_event(tab, event) {
            BridgeOutcome::Ignored => {}
            BridgeOutcome::Stale => {
                tracing::trace!("Dropping stale editor event for tab {}", tab);
            }
            BridgeOutcome::PullCompleted => {
                let theme = self.editor_theme();
                if let Err(e) = self.bridge.send(tab, EditorCommand::SetTheme { theme }) {
                    tracing::debug!("Theme not applied to tab {}: {}", tab, e);
                }
            }
            BridgeOutcome::PullFailed(detail) => {
                self.report(Some(tab), &SessionError::PullFailed(detail));
                if !self.bridge.is_editor_open(tab) {
                    self.emit(SessionNotice::EditorClosed { tab });
                }
            }
            BridgeOutcome::Progress { processed } => {
                tracing::trace!("Push progress on tab {}: {}", tab, processed);
            }
            BridgeOutcome::Saving { processed } => {
                tracing::debug!(
                    "Editor text written to tab {} ({} lines), saving",
                    tab,
                    processed.unwrap_or(0)
                );
            }
            BridgeOutcome::PushFailed(detail) => {
                self.emit(SessionNotice::Processing { tab, active: false });
                self.report(Some(tab), &SessionError::PushFailed(detail));
            }
            BridgeOutcome::LimitReached { total, limit } => {
                tracing::info!("Replace limit reached on tab {}: {} of {}", tab, limit, total);
                self.emit(SessionNotice::Info {
                    tab,
                    kind: InfoKind::ReplaceLimitReached,
                });
            }
        }
    }
}
