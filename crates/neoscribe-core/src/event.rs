//! Inbound collaborator events and outbound host notices.
//!
//! ## Learning: Observer Pattern in Rust
//!
//! Notices go out over `tokio::sync::broadcast`, so any number of host
//! components (toast layer, dialog layer, navigation) can listen without
//! the session knowing about them.
//!
//! - Notices are values, not callbacks
//! - Subscribers receive clones
//! - A slow subscriber lags instead of blocking the session

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use neoscribe_tabs::TabId;

use crate::bridge::BridgeEvent;
use crate::engine::EngineEvent;

/// A collaborator event tagged with the tab it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum SessionEvent {
    Engine { tab: TabId, event: EngineEvent },
    Editor { tab: TabId, event: BridgeEvent },
}

impl SessionEvent {
    pub fn tab(&self) -> TabId {
        match self {
            SessionEvent::Engine { tab, .. } | SessionEvent::Editor { tab, .. } => *tab,
        }
    }
}

/// Short informational messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfoKind {
    ChangesApplied,
    Saved,
    SaveCancelled,
    ExportedToTab,
    CopiedToClipboard,
    Shared,
    SelectionTooLarge,
    ReplaceLimitReached,
    ReplaceFinished,
}

/// Everything the session tells the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "notice", rename_all = "snake_case")]
pub enum SessionNotice {
    // Tabs
    TabOpened { tab: TabId },
    TabFocused { tab: TabId },
    TabClosed { tab: TabId },
    /// The last tab was closed; leave the viewing context
    ExitRequested,

    // Layout pulses
    SurfaceHidden { tab: TabId, generation: u64 },
    SurfaceShown { tab: TabId, generation: u64 },

    // Messages
    Failure { tab: Option<TabId>, message: String },
    Info { tab: TabId, kind: InfoKind },
    /// Ask share anyway / save as file / cancel
    ConfirmLargeSelection { tab: TabId, estimated_kib: u64 },

    // Surface state
    LoadProgress { tab: TabId, loading: bool, total_lines: Option<usize> },
    SearchUpdated { tab: TabId, current: usize, total: usize },
    JumpFinished { tab: TabId, success: bool, line: usize },
    EditorOpened { tab: TabId },
    EditorClosed { tab: TabId },
    Processing { tab: TabId, active: bool },
}

/// Broadcasts notices to the host.
pub struct NoticeBus {
    sender: broadcast::Sender<SessionNotice>,
}

impl NoticeBus {
    pub fn new() -> Self {
        // Capacity of 256 notices in the buffer
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }

    pub fn emit(&self, notice: SessionNotice) {
        // No receivers is fine
        let _ = self.sender.send(notice);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionNotice> {
        self.sender.subscribe()
    }
}

impl Default for NoticeBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for NoticeBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

/// Pulls notices off a subscription, skipping over lag.
pub struct NoticeHandler {
    receiver: broadcast::Receiver<SessionNotice>,
}

impl NoticeHandler {
    pub fn new(receiver: broadcast::Receiver<SessionNotice>) -> Self {
        Self { receiver }
    }

    /// Waits for the next notice.
    pub async fn next(&mut self) -> Option<SessionNotice> {
        loop {
            match self.receiver.recv().await {
                Ok(notice) => return Some(notice),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Notice handler lagged, missed {} notices", n);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Returns every notice already queued without waiting.
    pub fn drain(&mut self) -> Vec<SessionNotice> {
        let mut notices = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(notice) => notices.push(notice),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    tracing::warn!("Notice handler lagged, missed {} notices", n);
                }
                Err(_) => return notices,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_notice_bus() {
        let bus = NoticeBus::new();
        let mut rx = bus.subscribe();

        bus.emit(SessionNotice::ExitRequested);

        let notice = rx.recv().await.unwrap();
        assert_eq!(notice, SessionNotice::ExitRequested);
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = NoticeBus::new();
        let mut first = NoticeHandler::new(bus.subscribe());
        let mut second = NoticeHandler::new(bus.subscribe());

        let tab = TabId::new();
        bus.emit(SessionNotice::TabOpened { tab });

        assert_eq!(first.next().await, Some(SessionNotice::TabOpened { tab }));
        assert_eq!(second.drain(), vec![SessionNotice::TabOpened { tab }]);
    }

    #[test]
    fn test_event_json_shape() {
        let tab = TabId::new();
        let event = SessionEvent::Engine {
            tab,
            event: EngineEvent::HardReset,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["source"], "engine");
        assert_eq!(json["event"]["event"], "hard_reset");
        assert_eq!(event.tab(), tab);
    }
}
