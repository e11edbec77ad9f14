//! Headless session replay.
//!
//! A replay script seeds a session, then plays host requests and
//! collaborator events against it through a `SessionRuntime`. Everything
//! the headless collaborators were asked to do comes back in the report,
//! next to the final session and the notices the host would have shown.
//!
//! ```json
//! {
//!   "seed": { "source": { "kind": "file", "path": "/data/app.log" }, "name": "app.log" },
//!   "steps": [
//!     { "step": "engine", "event": { "event": "selection_mode_changed", "active": true } },
//!     { "step": "execute", "command": { "command": "export_selection", "intent": "share" } },
//!     { "step": "wait", "ms": 20 }
//!   ]
//! }
//! ```

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use neoscribe_core::bridge::BridgeEvent;
use neoscribe_core::event::NoticeHandler;
use neoscribe_core::headless::{Recorded, ScriptedPicker};
use neoscribe_core::{
    Collaborators, EngineEvent, OpenOptions, SessionConfig, SessionController, SessionEvent,
    SessionHandle, SessionNotice, SessionRuntime, TabCommand,
};
use neoscribe_tabs::{Session, TabDescriptor, TabId};

/// A replay script.
#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    pub seed: TabDescriptor,
    /// Files the picker returns, in order, for `import` steps
    #[serde(default)]
    pub picks: Vec<PathBuf>,
    /// Storage handles the picker returns, in order, for save-as
    #[serde(default)]
    pub documents: Vec<String>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// One scripted action. `tab` is an index into the current tab list and
/// defaults to the active tab.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    Open {
        path: PathBuf,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        options: OpenOptions,
    },
    OpenOcr,
    Import,
    CreateTab {
        name: String,
        #[serde(default)]
        extension: Option<String>,
    },
    Switch {
        tab: usize,
    },
    Close {
        #[serde(default)]
        tab: Option<usize>,
    },
    Execute {
        #[serde(default)]
        tab: Option<usize>,
        command: TabCommand,
    },
    Engine {
        #[serde(default)]
        tab: Option<usize>,
        event: EngineEvent,
    },
    Editor {
        #[serde(default)]
        tab: Option<usize>,
        event: BridgeEvent,
    },
    Wait {
        ms: u64,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("no tab at index {index} (session has {len})")]
    NoSuchTab { index: usize, len: usize },
}

/// A step that failed. Replay carries on after failures.
#[derive(Debug, Clone, Serialize)]
pub struct StepFailure {
    pub step: usize,
    pub error: String,
}

/// What a replay produced.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub session: Session,
    pub exit_requested: bool,
    pub failures: Vec<StepFailure>,
    pub notices: Vec<SessionNotice>,
    pub calls: Vec<Recorded>,
}

/// Reads a script from a JSON file.
pub fn load_script(path: &Path) -> anyhow::Result<Script> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read script {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse script {}", path.display()))
}

/// Default directory for scratch files written during a replay.
pub fn default_scratch_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("neoscribe")
        .join("scratch")
}

/// Plays a script against a fresh headless session.
pub async fn run(config: SessionConfig, script: Script, scratch: &Path) -> anyhow::Result<Report> {
    let (mut collaborators, mut log) = Collaborators::headless(scratch);
    let picker = script
        .picks
        .into_iter()
        .fold(ScriptedPicker::new(log.recorder()), |p, path| p.with_pick(path));
    let picker = script
        .documents
        .into_iter()
        .fold(picker, |p, handle| p.with_document(handle));
    collaborators.picker = Box::new(picker);

    let controller = SessionController::new(config, script.seed, collaborators);
    let (runtime, handle) = SessionRuntime::new(controller);

    let mut notices = NoticeHandler::new(handle.subscribe());
    let collector = tokio::spawn(async move {
        let mut collected = Vec::new();
        while let Some(notice) = notices.next().await {
            collected.push(notice);
        }
        collected
    });
    let task = tokio::spawn(runtime.run());

    let mut failures = Vec::new();
    for (index, step) in script.steps.into_iter().enumerate() {
        tracing::debug!("Replaying step {}", index);
        if let Err(e) = play(&handle, step).await {
            tracing::warn!("Step {} failed: {:#}", index, e);
            failures.push(StepFailure {
                step: index,
                error: format!("{:#}", e),
            });
        }
        if task.is_finished() {
            tracing::info!("Session ended after step {}", index);
            break;
        }
    }

    // Already stopped if the last tab was closed
    let _ = handle.shutdown().await;
    drop(handle);
    let controller = task.await.context("Session runtime panicked")?;

    let report_session = (*controller.snapshot()).clone();
    let exit_requested = controller.exit_requested();
    drop(controller);
    let notices = collector.await.context("Notice collector panicked")?;

    Ok(Report {
        session: report_session,
        exit_requested,
        failures,
        notices,
        calls: log.drain(),
    })
}

async fn play(handle: &SessionHandle, step: Step) -> anyhow::Result<()> {
    match step {
        Step::Open {
            path,
            name,
            options,
        } => {
            let name = name.unwrap_or_else(|| {
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string())
            });
            handle.open_path(path, name, options).await?;
        }
        Step::OpenOcr => {
            handle.open(TabDescriptor::ocr()).await?;
        }
        Step::Import => {
            handle.import_file().await?;
        }
        Step::CreateTab { name, extension } => {
            handle.create_tab(&name, extension.as_deref()).await?;
        }
        Step::Switch { tab } => {
            let tab = resolve(handle, Some(tab))?;
            handle.switch_tab(tab).await?;
        }
        Step::Close { tab } => {
            let tab = resolve(handle, tab)?;
            handle.close_tab(tab).await?;
        }
        Step::Execute { tab, command } => {
            let tab = resolve(handle, tab)?;
            handle.execute(tab, command).await?;
        }
        Step::Engine { tab, event } => {
            let tab = resolve(handle, tab)?;
            handle.send_event(SessionEvent::Engine { tab, event }).await?;
        }
        Step::Editor { tab, event } => {
            let tab = resolve(handle, tab)?;
            handle.send_event(SessionEvent::Editor { tab, event }).await?;
        }
        Step::Wait { ms } => tokio::time::sleep(Duration::from_millis(ms)).await,
    }
    Ok(())
}

fn resolve(handle: &SessionHandle, index: Option<usize>) -> Result<TabId, ScriptError> {
    let session = handle.snapshot();
    match index {
        None => Ok(session.active_tab_id()),
        Some(index) => session
            .tabs()
            .get(index)
            .map(|t| t.id)
            .ok_or(ScriptError::NoSuchTab {
                index,
                len: session.len(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn script(json: &str) -> Script {
        serde_json::from_str(json).unwrap()
    }

    #[tokio::test]
    async fn test_share_small_selection() {
        let dir = tempfile::tempdir().unwrap();
        let script = script(
            r#"{
                "seed": { "source": { "kind": "file", "path": "/data/app.log" }, "name": "app.log" },
                "steps": [
                    { "step": "engine", "event": { "event": "selection_mode_changed", "active": true } },
                    { "step": "engine", "event": {
                        "event": "selection_changed", "count": 2, "total_line_count": 50,
                        "range_start": 4, "range_count": 2 } },
                    { "step": "execute", "command": { "command": "export_selection", "intent": "share" } },
                    { "step": "engine", "event": { "event": "selected_text", "text": "line 4\nline 5" } }
                ]
            }"#,
        );

        let report = run(SessionConfig::default(), script, dir.path()).await.unwrap();

        assert!(report.failures.is_empty());
        assert!(report.calls.contains(&Recorded::SharedText {
            text: "line 4\nline 5".into()
        }));
        let tab = report.session.active_tab();
        assert!(!tab.selection.mode);
        assert_eq!(tab.selection.count, 0);
    }

    #[tokio::test]
    async fn test_failures_are_collected() {
        let dir = tempfile::tempdir().unwrap();
        let script = script(
            r#"{
                "seed": { "source": { "kind": "file", "path": "/data/app.log" }, "name": "app.log" },
                "steps": [
                    { "step": "switch", "tab": 3 },
                    { "step": "open_ocr" },
                    { "step": "execute", "command": { "command": "select_all" } },
                    { "step": "open", "path": "/data/other.log" }
                ]
            }"#,
        );

        let report = run(SessionConfig::default(), script, dir.path()).await.unwrap();

        let steps: Vec<usize> = report.failures.iter().map(|f| f.step).collect();
        assert_eq!(steps, vec![0, 2]);
        assert!(report.failures[0].error.contains("no tab at index 3"));
        assert_eq!(report.session.len(), 3);
        assert_eq!(report.session.active_tab().name, "other.log");
    }

    #[tokio::test]
    async fn test_closing_last_tab_ends_replay() {
        let dir = tempfile::tempdir().unwrap();
        let script = script(
            r#"{
                "seed": { "source": { "kind": "file", "path": "/data/app.log" }, "name": "app.log" },
                "steps": [
                    { "step": "close" },
                    { "step": "open", "path": "/data/never.log" }
                ]
            }"#,
        );

        let report = run(SessionConfig::default(), script, dir.path()).await.unwrap();

        assert!(report.exit_requested);
        assert_eq!(report.session.len(), 1);
        assert!(report.notices.contains(&SessionNotice::ExitRequested));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Open(u8),
        Close(usize),
        Switch(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..14).prop_map(Op::Open),
            (0usize..12).prop_map(Op::Close),
            (0usize..12).prop_map(Op::Switch),
        ]
    }

    proptest! {
        #[test]
        fn prop_engine_handles_follow_tabs(ops in prop::collection::vec(op(), 0..40)) {
            let dir = tempfile::tempdir().unwrap();
            let (collaborators, _log) = Collaborators::headless(dir.path());
            let mut controller = SessionController::new(
                SessionConfig::default(),
                TabDescriptor::file("/data/seed.log", "seed.log"),
                collaborators,
            );

            for op in ops {
                let tabs: Vec<TabId> = controller.snapshot().tabs().iter().map(|t| t.id).collect();
                match op {
                    Op::Open(n) => {
                        let _ = controller.open_path(format!("/data/{}.log", n), format!("{}.log", n), OpenOptions::default());
                    }
                    Op::Close(i) => {
                        if let Some(&id) = tabs.get(i) {
                            controller.close_tab(id).unwrap();
                        }
                    }
                    Op::Switch(i) => {
                        if let Some(&id) = tabs.get(i) {
                            controller.switch_tab(id).unwrap();
                        }
                    }
                }

                let session = controller.snapshot();
                prop_assert!(session.len() <= session.capacity());
                prop_assert!(session.contains(session.active_tab_id()));
                for tab in session.tabs() {
                    prop_assert!(controller.engine_handle(tab.id).is_some());
                }
            }
        }
    }
}
