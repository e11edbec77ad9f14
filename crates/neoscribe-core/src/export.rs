//! Large-selection export arbitration.
//!
//! ## Learning: Separating Policy From Effects
//!
//! `ExportPolicy` is a pure function of two numbers (line count, character
//! count) and is tested directly. `ExportArbiter` only remembers which step
//! of the flow is waiting for an engine reply. Actually writing files,
//! copying, sharing, and opening tabs is the controller's job.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use neoscribe_tabs::TabId;

use crate::config::ExportConfig;
use crate::platform::ScratchFile;

/// Sentinel some engines send instead of text for a selection they refuse
/// to marshal.
pub const MASSIVE_SELECTION_SENTINEL: &str = "[MASSIVE_SELECTION]";

/// What the user wants to do with the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportIntent {
    /// Copy to the clipboard
    Copy,
    /// Hand to the platform share sheet
    Share,
    /// Export into a new tab
    OpenAsTab,
}

/// Answer to the large-selection prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmChoice {
    ProceedAnyway,
    SaveAsFile,
    Cancel,
}

/// How the selection leaves the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportPlan {
    /// The engine writes the selection straight to a scratch file
    NativeFile,
    /// The selection text is fetched with `GetSelectedText`
    FetchText,
}

/// What to do with fetched text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeDecision {
    Proceed,
    Confirm { estimated_bytes: u64 },
    SaveAsTab,
}

/// Size thresholds for exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportPolicy {
    native_line_threshold: usize,
    bytes_per_char: u64,
    prompt_bytes: u64,
    save_as_tab_bytes: u64,
}

impl ExportPolicy {
    pub fn new(config: &ExportConfig) -> Self {
        Self {
            native_line_threshold: config.native_line_threshold,
            bytes_per_char: config.bytes_per_char,
            prompt_bytes: config.prompt_bytes,
            save_as_tab_bytes: config.save_as_tab_bytes,
        }
    }

    pub fn plan(&self, selected_lines: usize) -> ExportPlan {
        if selected_lines > self.native_line_threshold {
            ExportPlan::NativeFile
        } else {
            ExportPlan::FetchText
        }
    }

    /// Worst-case UTF-8 size of `chars` characters.
    pub fn estimate_bytes(&self, chars: usize) -> u64 {
        (chars as u64).saturating_mul(self.bytes_per_char)
    }

    pub fn decide(&self, intent: ExportIntent, chars: usize) -> SizeDecision {
        if intent == ExportIntent::OpenAsTab {
            return SizeDecision::SaveAsTab;
        }
        let estimated_bytes = self.estimate_bytes(chars);
        if estimated_bytes > self.save_as_tab_bytes {
            SizeDecision::SaveAsTab
        } else if estimated_bytes > self.prompt_bytes {
            SizeDecision::Confirm { estimated_bytes }
        } else {
            SizeDecision::Proceed
        }
    }
}

impl Default for ExportPolicy {
    fn default() -> Self {
        Self::new(&ExportConfig::default())
    }
}

/// Which engine reply an export is waiting on.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExportFlow {
    #[default]
    Idle,
    AwaitingText {
        tab: TabId,
        intent: ExportIntent,
    },
    AwaitingNativeFile {
        tab: TabId,
        intent: ExportIntent,
        file: ScratchFile,
    },
    AwaitingConfirmation {
        tab: TabId,
        intent: ExportIntent,
        text: String,
    },
}

impl ExportFlow {
    pub fn tab(&self) -> Option<TabId> {
        match self {
            ExportFlow::Idle => None,
            ExportFlow::AwaitingText { tab, .. }
            | ExportFlow::AwaitingNativeFile { tab, .. }
            | ExportFlow::AwaitingConfirmation { tab, .. } => Some(*tab),
        }
    }
}

/// Holds the single pending export of a session.
#[derive(Debug, Default)]
pub struct ExportArbiter {
    policy: ExportPolicy,
    flow: ExportFlow,
}

impl ExportArbiter {
    pub fn new(policy: ExportPolicy) -> Self {
        Self {
            policy,
            flow: ExportFlow::Idle,
        }
    }

    pub fn policy(&self) -> &ExportPolicy {
        &self.policy
    }

    pub fn flow(&self) -> &ExportFlow {
        &self.flow
    }

    pub fn is_pending(&self) -> bool {
        self.flow != ExportFlow::Idle
    }

    /// Starts waiting for a native file export. `false` if busy.
    pub fn begin_native(&mut self, tab: TabId, intent: ExportIntent, file: ScratchFile) -> bool {
        self.begin(ExportFlow::AwaitingNativeFile { tab, intent, file })
    }

    /// Starts waiting for selection text. `false` if busy.
    pub fn begin_text(&mut self, tab: TabId, intent: ExportIntent) -> bool {
        self.begin(ExportFlow::AwaitingText { tab, intent })
    }

    fn begin(&mut self, flow: ExportFlow) -> bool {
        if self.is_pending() {
            tracing::debug!("Export already pending, ignoring new request");
            return false;
        }
        self.flow = flow;
        true
    }

    pub fn is_awaiting_native(&self, tab: TabId) -> bool {
        matches!(&self.flow, ExportFlow::AwaitingNativeFile { tab: t, .. } if *t == tab)
    }

    /// Takes the pending text request for `tab`.
    pub fn take_text_request(&mut self, tab: TabId) -> Option<ExportIntent> {
        match self.flow {
            ExportFlow::AwaitingText { tab: t, intent } if t == tab => {
                self.flow = ExportFlow::Idle;
                Some(intent)
            }
            _ => None,
        }
    }

    /// Takes the pending native export for `tab`.
    pub fn take_native(&mut self, tab: TabId) -> Option<(ExportIntent, ScratchFile)> {
        if !self.is_awaiting_native(tab) {
            return None;
        }
        match std::mem::take(&mut self.flow) {
            ExportFlow::AwaitingNativeFile { intent, file, .. } => Some((intent, file)),
            _ => None,
        }
    }

    /// Parks fetched text until the user answers the prompt.
    pub fn await_confirmation(&mut self, tab: TabId, intent: ExportIntent, text: String) {
        self.flow = ExportFlow::AwaitingConfirmation { tab, intent, text };
    }

    /// Takes the text waiting on the prompt.
    pub fn take_confirmation(&mut self) -> Option<(TabId, ExportIntent, String)> {
        match std::mem::take(&mut self.flow) {
            ExportFlow::AwaitingConfirmation { tab, intent, text } => Some((tab, intent, text)),
            other => {
                self.flow = other;
                None
            }
        }
    }

    /// Abandons any flow that belongs to `tab`.
    pub fn forget(&mut self, tab: TabId) {
        if self.flow.tab() == Some(tab) {
            tracing::debug!("Dropping export flow for closed tab {}", tab);
            self.flow = ExportFlow::Idle;
        }
    }
}

/// Scratch file name such as `HugeExport_1718000000000.txt`.
pub fn scratch_name(prefix: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("{}_{}.txt", prefix, millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scratch() -> ScratchFile {
        ScratchFile {
            path: PathBuf::from("/tmp/HugeExport_1.txt"),
            uri: None,
            name: "HugeExport_1.txt".into(),
        }
    }

    #[test]
    fn test_plan_threshold() {
        let policy = ExportPolicy::default();
        assert_eq!(policy.plan(2000), ExportPlan::FetchText);
        assert_eq!(policy.plan(2001), ExportPlan::NativeFile);
    }

    #[test]
    fn test_decide_by_size() {
        let policy = ExportPolicy::default();

        assert_eq!(policy.decide(ExportIntent::Share, 500), SizeDecision::Proceed);
        assert_eq!(
            policy.decide(ExportIntent::Share, 300_000),
            SizeDecision::Confirm {
                estimated_bytes: 900_000
            }
        );
        assert_eq!(policy.decide(ExportIntent::Copy, 3_000_001), SizeDecision::SaveAsTab);
        assert_eq!(policy.estimate_bytes(3_000_001), 9_000_003);
    }

    #[test]
    fn test_boundaries_are_exclusive() {
        let policy = ExportPolicy::default();
        let at_prompt = (800 * 1024) / 3;
        assert_eq!(policy.decide(ExportIntent::Share, at_prompt), SizeDecision::Proceed);

        let at_limit = (4 * 1024 * 1024) / 3;
        assert!(matches!(
            policy.decide(ExportIntent::Share, at_limit),
            SizeDecision::Confirm { .. }
        ));
    }

    #[test]
    fn test_open_as_tab_always_saves() {
        let policy = ExportPolicy::default();
        assert_eq!(policy.decide(ExportIntent::OpenAsTab, 1), SizeDecision::SaveAsTab);
    }

    #[test]
    fn test_single_pending_flow() {
        let mut arbiter = ExportArbiter::default();
        let tab = TabId::new();

        assert!(arbiter.begin_text(tab, ExportIntent::Share));
        assert!(!arbiter.begin_native(tab, ExportIntent::Copy, scratch()));
        assert!(!arbiter.begin_text(TabId::new(), ExportIntent::Copy));

        assert_eq!(arbiter.take_text_request(tab), Some(ExportIntent::Share));
        assert!(!arbiter.is_pending());
    }

    #[test]
    fn test_take_native_only_for_owner() {
        let mut arbiter = ExportArbiter::default();
        let tab = TabId::new();
        arbiter.begin_native(tab, ExportIntent::OpenAsTab, scratch());

        assert!(arbiter.take_native(TabId::new()).is_none());
        let (intent, file) = arbiter.take_native(tab).unwrap();
        assert_eq!(intent, ExportIntent::OpenAsTab);
        assert_eq!(file.name, "HugeExport_1.txt");
        assert!(!arbiter.is_pending());
    }

    #[test]
    fn test_confirmation_round_trip() {
        let mut arbiter = ExportArbiter::default();
        let tab = TabId::new();
        arbiter.await_confirmation(tab, ExportIntent::Share, "text".into());

        let (owner, intent, text) = arbiter.take_confirmation().unwrap();
        assert_eq!(owner, tab);
        assert_eq!(intent, ExportIntent::Share);
        assert_eq!(text, "text");
        assert!(arbiter.take_confirmation().is_none());
    }

    #[test]
    fn test_take_confirmation_keeps_other_flows() {
        let mut arbiter = ExportArbiter::default();
        let tab = TabId::new();
        arbiter.begin_text(tab, ExportIntent::Copy);

        assert!(arbiter.take_confirmation().is_none());
        assert!(arbiter.is_pending());
    }

    #[test]
    fn test_forget_drops_flow_of_closed_tab() {
        let mut arbiter = ExportArbiter::default();
        let tab = TabId::new();
        arbiter.begin_text(tab, ExportIntent::Copy);

        arbiter.forget(TabId::new());
        assert!(arbiter.is_pending());
        arbiter.forget(tab);
        assert!(!arbiter.is_pending());
    }

    #[test]
    fn test_scratch_name() {
        let name = scratch_name("HugeExport");
        assert!(name.starts_with("HugeExport_"));
        assert!(name.ends_with(".txt"));
    }
}
