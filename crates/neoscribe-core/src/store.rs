//! Tab session store.
//!
//! ## Learning: `watch` for Latest-Value State
//!
//! Hosts only ever care about the newest session, not every intermediate
//! one, which is exactly what `tokio::sync::watch` provides. Snapshots are
//! `Arc<Session>`, so a subscriber holding an old one costs a refcount,
//! not a copy. The store runs the pure reducers from `neoscribe-tabs` and
//! publishes the result only when the transition succeeds.

use std::sync::Arc;
use tokio::sync::watch;

use neoscribe_tabs::{CloseOutcome, OpenOutcome, Session, TabDescriptor, TabId, TabPatch};

use crate::SessionResult;

/// Result of `TabStore::close`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Closed {
    Removed { was_active: bool, now_active: TabId },
    ExitRequested,
}

pub struct TabStore {
    tx: watch::Sender<Arc<Session>>,
}

impl TabStore {
    pub fn new(session: Session) -> Self {
        let (tx, _) = watch::channel(Arc::new(session));
        Self { tx }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<Session> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Session>> {
        self.tx.subscribe()
    }

    fn publish(&self, session: Session) {
        self.tx.send_replace(Arc::new(session));
    }

    pub fn open(&self, descriptor: TabDescriptor) -> SessionResult<OpenOutcome> {
        let (next, outcome) = self.snapshot().open(descriptor)?;
        if !matches!(outcome, OpenOutcome::AlreadyActive(_)) {
            self.publish(next);
        }
        Ok(outcome)
    }

    /// Activates a tab. Returns `false` if it already was active.
    pub fn switch(&self, id: TabId) -> SessionResult<bool> {
        match self.snapshot().switch(id)? {
            Some(next) => {
                self.publish(next);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn close(&self, id: TabId) -> SessionResult<Closed> {
        match self.snapshot().close(id)? {
            CloseOutcome::Closed { session, was_active } => {
                let now_active = session.active_tab_id();
                self.publish(session);
                Ok(Closed::Removed {
                    was_active,
                    now_active,
                })
            }
            CloseOutcome::ExitRequested => Ok(Closed::ExitRequested),
        }
    }

    pub fn patch(&self, id: TabId, patch: TabPatch) -> SessionResult<()> {
        if patch.is_empty() {
            return Ok(());
        }
        let next = self.snapshot().patch(id, patch)?;
        self.publish(next);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SessionError;

    fn store() -> TabStore {
        TabStore::new(Session::new(TabDescriptor::file("/a.txt", "a.txt")))
    }

    #[test]
    fn test_open_publishes_snapshot() {
        let store = store();
        let mut rx = store.subscribe();

        let outcome = store.open(TabDescriptor::file("/b.txt", "b.txt")).unwrap();
        assert!(outcome.is_created());
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().active_tab_id(), outcome.id());
    }

    #[test]
    fn test_reopen_active_does_not_publish() {
        let store = store();
        let mut rx = store.subscribe();
        rx.borrow_and_update();

        let outcome = store.open(TabDescriptor::file("/a.txt", "a.txt")).unwrap();
        assert!(matches!(outcome, OpenOutcome::AlreadyActive(_)));
        assert!(!rx.has_changed().unwrap());
        assert_eq!(store.snapshot().len(), 1);
    }

    #[test]
    fn test_capacity_leaves_snapshot_unchanged() {
        let store = store();
        for i in 1..10 {
            store
                .open(TabDescriptor::file(format!("/{i}.txt"), format!("{i}.txt")))
                .unwrap();
        }
        let before = store.snapshot();

        let err = store.open(TabDescriptor::file("/11.txt", "11.txt")).unwrap_err();
        assert!(matches!(err, SessionError::CapacityExceeded { limit: 10 }));
        assert_eq!(*store.snapshot(), *before);
    }

    #[test]
    fn test_close_reports_new_active() {
        let store = store();
        let first = store.snapshot().active_tab_id();
        let second = store.open(TabDescriptor::file("/b.txt", "b.txt")).unwrap().id();

        let closed = store.close(second).unwrap();
        assert_eq!(
            closed,
            Closed::Removed {
                was_active: true,
                now_active: first
            }
        );
        assert_eq!(store.close(first).unwrap(), Closed::ExitRequested);
        assert_eq!(store.snapshot().len(), 1);
    }

    #[test]
    fn test_patch_unknown_tab() {
        let store = store();
        let err = store.patch(TabId::new(), TabPatch::dirty(true)).unwrap_err();
        assert!(matches!(err, SessionError::TabNotFound(_)));
    }

    #[test]
    fn test_switch() {
        let store = store();
        let first = store.snapshot().active_tab_id();
        store.open(TabDescriptor::file("/b.txt", "b.txt")).unwrap();

        assert!(store.switch(first).unwrap());
        assert!(!store.switch(first).unwrap());
        assert_eq!(store.snapshot().active_index(), 0);
    }
}
