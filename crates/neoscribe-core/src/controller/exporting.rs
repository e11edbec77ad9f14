//! Large-selection export flows.
//!
//! Every flow that succeeds ends by clearing the source tab's selection.
//! Failed and cancelled flows leave the selection alone.

use neoscribe_tabs::{TabDescriptor, TabId};

use super::SessionController;
use crate::command::EngineCommand;
use crate::event::{InfoKind, SessionNotice};
use crate::export::{
    scratch_name, ConfirmChoice, ExportIntent, ExportPlan, SizeDecision,
    MASSIVE_SELECTION_SENTINEL,
};
use crate::platform::ScratchFile;
use crate::{SessionError, SessionResult};

impl SessionController {
    /// Starts exporting the tab's selection.
    ///
    /// Does nothing if another export is pending or nothing is selected.
    pub fn export_selection(&mut self, tab: TabId, intent: ExportIntent) -> SessionResult<()> {
        let record = self.tab(tab)?;
        if self.arbiter.is_pending() {
            tracing::debug!("Export already pending, ignoring request from tab {}", tab);
            return Ok(());
        }
        if !record.selection.has_lines() {
            tracing::debug!("Nothing selected on tab {}", tab);
            return Ok(());
        }
        if self.engine.handle(tab).is_none() {
            return Err(SessionError::Detached(tab));
        }

        let plan = self.arbiter.policy().plan(record.selection.count);
        let opens_tab = match plan {
            // Native copies open the written file as a tab
            ExportPlan::NativeFile => intent != ExportIntent::Share,
            ExportPlan::FetchText => intent == ExportIntent::OpenAsTab,
        };
        let snapshot = self.snapshot();
        if opens_tab && snapshot.is_full() {
            return Err(SessionError::CapacityExceeded {
                limit: snapshot.capacity(),
            });
        }

        match plan {
            ExportPlan::NativeFile => {
                let file = self
                    .storage
                    .create_temp_file(&scratch_name("HugeExport"), "")?;
                let path = file.path.clone();
                self.arbiter.begin_native(tab, intent, file);
                tracing::info!(
                    "Exporting {} lines from tab {} to {}",
                    record.selection.count,
                    tab,
                    path.display()
                );
                if !self
                    .engine
                    .send(tab, EngineCommand::ExportSelectionToFile { path })
                {
                    self.arbiter.forget(tab);
                    return Err(SessionError::Detached(tab));
                }
                self.emit(SessionNotice::Processing { tab, active: true });
            }
            ExportPlan::FetchText => {
                self.arbiter.begin_text(tab, intent);
                if !self.engine.send(tab, EngineCommand::GetSelectedText) {
                    self.arbiter.forget(tab);
                    return Err(SessionError::Detached(tab));
                }
            }
        }
        Ok(())
    }

    /// Answers the large-selection prompt.
    pub fn resolve_confirmation(&mut self, choice: ConfirmChoice) -> SessionResult<()> {
        let Some((tab, intent, text)) = self.arbiter.take_confirmation() else {
            tracing::debug!("No export waiting for confirmation");
            return Ok(());
        };
        if !self.snapshot().contains(tab) {
            return Ok(());
        }
        match choice {
            ConfirmChoice::ProceedAnyway => self.deliver_text(tab, intent, &text),
            ConfirmChoice::SaveAsFile => self.export_to_tab(tab, "Selection", &text),
            ConfirmChoice::Cancel => tracing::debug!("Export cancelled on tab {}", tab),
        }
        Ok(())
    }

    pub(super) fn on_selected_text(&mut self, tab: TabId, text: String) {
        let Some(intent) = self.arbiter.take_text_request(tab) else {
            tracing::trace!("Unrequested selection text from tab {}", tab);
            return;
        };
        if text == MASSIVE_SELECTION_SENTINEL {
            self.selection_too_large(tab);
            return;
        }
        if text.is_empty() {
            return;
        }

        let chars = text.chars().count();
        match self.arbiter.policy().decide(intent, chars) {
            SizeDecision::Proceed => self.deliver_text(tab, intent, &text),
            SizeDecision::Confirm { estimated_bytes } => {
                let estimated_kib = (estimated_bytes + 512) / 1024;
                self.arbiter.await_confirmation(tab, intent, text);
                self.emit(SessionNotice::ConfirmLargeSelection { tab, estimated_kib });
            }
            SizeDecision::SaveAsTab => {
                let prefix = match intent {
                    ExportIntent::OpenAsTab => "Export",
                    ExportIntent::Copy | ExportIntent::Share => "HugeSelection",
                };
                self.export_to_tab(tab, prefix, &text);
            }
        }
    }

    pub(super) fn on_selection_too_large(&mut self, tab: TabId) {
        if self.arbiter.take_text_request(tab).is_some() {
            self.selection_too_large(tab);
        }
    }

    fn selection_too_large(&mut self, tab: TabId) {
        tracing::info!("Engine refused to return the selection of tab {}", tab);
        self.emit(SessionNotice::Info {
            tab,
            kind: InfoKind::SelectionTooLarge,
        });
    }

    /// Finishes a native export once the engine has written the file.
    pub(super) fn finish_native_export(&mut self, tab: TabId, success: bool, detail: Option<String>) {
        let Some((intent, file)) = self.arbiter.take_native(tab) else {
            return;
        };
        self.emit(SessionNotice::Processing { tab, active: false });
        if !success {
            let detail = detail.unwrap_or_else(|| "export failed".into());
            self.report(Some(tab), &SessionError::SaveFailed(detail));
            return;
        }

        match intent {
            ExportIntent::Share => match self.share.share_file(&file) {
                Ok(()) => {
                    self.emit(SessionNotice::Info {
                        tab,
                        kind: InfoKind::Shared,
                    });
                    self.finish_export(tab);
                }
                Err(e) => self.report(Some(tab), &e.into()),
            },
            ExportIntent::Copy | ExportIntent::OpenAsTab => self.open_scratch(tab, file),
        }
    }

    fn deliver_text(&mut self, tab: TabId, intent: ExportIntent, text: &str) {
        let (result, kind) = match intent {
            ExportIntent::Copy => (self.share.copy_to_clipboard(text), InfoKind::CopiedToClipboard),
            ExportIntent::Share => (self.share.share_text(text), InfoKind::Shared),
            ExportIntent::OpenAsTab => {
                self.export_to_tab(tab, "Export", text);
                return;
            }
        };
        match result {
            Ok(()) => {
                self.emit(SessionNotice::Info { tab, kind });
                self.finish_export(tab);
            }
            Err(e) => self.report(Some(tab), &e.into()),
        }
    }

    /// Writes `text` to a scratch file and opens it as a new tab.
    fn export_to_tab(&mut self, source: TabId, prefix: &str, text: &str) {
        let snapshot = self.snapshot();
        if snapshot.is_full() {
            let error = SessionError::CapacityExceeded {
                limit: snapshot.capacity(),
            };
            self.report(Some(source), &error);
            return;
        }
        match self.storage.create_temp_file(&scratch_name(prefix), text) {
            Ok(file) => self.open_scratch(source, file),
            Err(e) => self.report(Some(source), &e.into()),
        }
    }

    fn open_scratch(&mut self, source: TabId, file: ScratchFile) {
        let mut descriptor = TabDescriptor::file(file.path, file.name).with_extension("txt");
        if let Some(uri) = file.uri {
            descriptor = descriptor.with_uri(uri);
        }
        match self.open(descriptor) {
            Ok(tab) => {
                self.emit(SessionNotice::Info {
                    tab,
                    kind: InfoKind::ExportedToTab,
                });
                self.finish_export(source);
            }
            Err(e) => self.report(Some(source), &e),
        }
    }

    /// Clears the source selection and leaves selection mode.
    fn finish_export(&mut self, source: TabId) {
        if self.snapshot().contains(source) {
            self.clear_selection(source);
        }
    }
}
