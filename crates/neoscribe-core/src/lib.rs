//! # Neoscribe Core
//!
//! The session layer that sits between the host UI and an external
//! document engine.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      SessionController                       │
//! │  ┌───────────┐ ┌────────────┐ ┌──────────┐ ┌──────────────┐  │
//! │  │ TabStore  │ │ Reconciler │ │ Arbiter  │ │   Shuffle    │  │
//! │  └───────────┘ └────────────┘ └──────────┘ └──────────────┘  │
//! │        │                                                     │
//! │  ┌─────┴─────────────────┐   ┌───────────────────────────┐   │
//! │  │    EngineAdapter      │   │     EditorSyncBridge      │   │
//! │  │  (one handle per tab) │   │ (pull / push / saving)    │   │
//! │  └───────────────────────┘   └───────────────────────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//!          ▲ commands               events ▼
//!      document engine          embedded editor
//! ```
//!
//! ## Learning: One Owner, No Locks
//!
//! Every piece of state lives inside `SessionController`, which is driven
//! by a single task (`SessionRuntime`). Collaborators answer with events
//! that are queued on a channel instead of calling back into the
//! controller, so no `Mutex` is needed anywhere in the layer.

pub mod bridge;
pub mod command;
pub mod config;
pub mod controller;
pub mod engine;
pub mod event;
pub mod export;
pub mod headless;
pub mod platform;
pub mod reconcile;
pub mod runtime;
pub mod shuffle;
pub mod store;
pub mod surface;

pub use bridge::{BridgeEvent, EditorSyncBridge, EmbeddedEditor, SyncState};
pub use command::{EditorCommand, EngineCommand, TabCommand};
pub use config::SessionConfig;
pub use controller::{Collaborators, OpenOptions, SessionController};
pub use engine::{DocumentEngine, EngineAdapter, EngineEvent, EngineHandle};
pub use event::{NoticeBus, SessionEvent, SessionNotice};
pub use export::{ConfirmChoice, ExportIntent};
pub use runtime::{SessionHandle, SessionRuntime};

pub use neoscribe_tabs::{Session, Tab, TabDescriptor, TabId};

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors surfaced by the session layer
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Tab limit of {limit} reached")]
    CapacityExceeded { limit: usize },

    #[error("Tab not found: {0}")]
    TabNotFound(TabId),

    #[error("Tab {0} has no document surface")]
    Detached(TabId),

    #[error("Could not load document: {0}")]
    AttachFailed(String),

    #[error("Could not apply editor changes: {0}")]
    PushFailed(String),

    #[error("Could not load content into the editor: {0}")]
    PullFailed(String),

    #[error("Save failed: {0}")]
    SaveFailed(String),

    #[error("Replace failed: {0}")]
    ReplaceFailed(String),

    #[error("Editor is still loading content")]
    NotReady,

    #[error("Editor rejected command: {0}")]
    EditorRejected(String),

    #[error("File is read-only")]
    ReadOnly,

    #[error("{0} looks like a binary file")]
    BinaryContentRejected(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Session runtime has stopped")]
    RuntimeClosed,
}

impl From<neoscribe_tabs::TabError> for SessionError {
    fn from(err: neoscribe_tabs::TabError) -> Self {
        match err {
            neoscribe_tabs::TabError::CapacityExceeded { limit } => {
                SessionError::CapacityExceeded { limit }
            }
            neoscribe_tabs::TabError::TabNotFound(id) => SessionError::TabNotFound(id),
            other @ neoscribe_tabs::TabError::InvalidSnapshot(_) => {
                SessionError::Storage(other.to_string())
            }
        }
    }
}

impl From<platform::PlatformError> for SessionError {
    fn from(err: platform::PlatformError) -> Self {
        match err {
            platform::PlatformError::BinaryContent(name) => SessionError::BinaryContentRejected(name),
            other => SessionError::Storage(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tab_error_conversion() {
        let err: SessionError = neoscribe_tabs::TabError::CapacityExceeded { limit: 10 }.into();
        assert!(matches!(err, SessionError::CapacityExceeded { limit: 10 }));
    }

    #[test]
    fn test_binary_content_conversion() {
        let err: SessionError = platform::PlatformError::BinaryContent("a.bin".into()).into();
        assert_eq!(err.to_string(), "a.bin looks like a binary file");
    }
}
