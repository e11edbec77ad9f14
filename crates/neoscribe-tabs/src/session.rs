//! The tab collection and its reducers.
//!
//! ## Learning: Persistent Snapshots
//!
//! Every transition takes `&self` and returns a brand new `Session`.
//! Nothing is mutated in place, so a snapshot handed to a subscriber can
//! never change underneath it. The store that owns the current snapshot
//! swaps it atomically after a successful transition.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::tab::{Tab, TabDescriptor, TabId, TabPatch};
use crate::{TabError, TabResult};

/// Default number of tabs a session may hold.
pub const DEFAULT_MAX_TABS: usize = 10;

/// Ordered set of open tabs with exactly one active tab.
///
/// Deserialized snapshots are checked before use: they must hold at least
/// one tab, no more than `capacity`, and `active_index` must point at
/// `active_tab_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SessionRecord")]
pub struct Session {
    tabs: Vec<Tab>,
    active_tab_id: TabId,
    active_index: usize,
    capacity: usize,
}

/// Unchecked wire form of a `Session`.
#[derive(Deserialize)]
struct SessionRecord {
    tabs: Vec<Tab>,
    active_tab_id: TabId,
    active_index: usize,
    capacity: usize,
}

impl TryFrom<SessionRecord> for Session {
    type Error = TabError;

    fn try_from(record: SessionRecord) -> Result<Self, Self::Error> {
        if record.tabs.is_empty() {
            return Err(TabError::InvalidSnapshot("no tabs".into()));
        }
        if record.capacity == 0 || record.tabs.len() > record.capacity {
            return Err(TabError::InvalidSnapshot(format!(
                "{} tabs with capacity {}",
                record.tabs.len(),
                record.capacity
            )));
        }
        match record.tabs.get(record.active_index) {
            Some(tab) if tab.id == record.active_tab_id => {}
            _ => {
                return Err(TabError::InvalidSnapshot(format!(
                    "active index {} does not hold tab {}",
                    record.active_index, record.active_tab_id
                )));
            }
        }
        Ok(Self {
            tabs: record.tabs,
            active_tab_id: record.active_tab_id,
            active_index: record.active_index,
            capacity: record.capacity,
        })
    }
}

/// Result of `open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    /// A new tab was appended and activated
    Created(TabId),
    /// A tab with the same path existed and was activated
    Switched(TabId),
    /// A tab with the same path existed and was already active
    AlreadyActive(TabId),
}

impl OpenOutcome {
    pub fn id(&self) -> TabId {
        match *self {
            OpenOutcome::Created(id) | OpenOutcome::Switched(id) | OpenOutcome::AlreadyActive(id) => id,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, OpenOutcome::Created(_))
    }
}

/// Result of `close`.
#[derive(Debug, Clone, PartialEq)]
pub enum CloseOutcome {
    /// The tab was removed
    Closed { session: Session, was_active: bool },
    /// The tab was the last one; the host should leave the viewing context
    ExitRequested,
}

impl Session {
    /// Creates a session holding one seed tab.
    pub fn new(seed: TabDescriptor) -> Self {
        Self::with_capacity(seed, DEFAULT_MAX_TABS)
    }

    /// Creates a session with a custom tab limit (at least one).
    pub fn with_capacity(seed: TabDescriptor, capacity: usize) -> Self {
        let tab = Tab::from_descriptor(seed);
        Self {
            active_tab_id: tab.id,
            active_index: 0,
            tabs: vec![tab],
            capacity: capacity.max(1),
        }
    }

    // ==================== Getters ====================

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn active_tab_id(&self) -> TabId {
        self.active_tab_id
    }

    pub fn active_index(&self) -> usize {
        self.active_index
    }

    /// Returns the active tab.
    pub fn active_tab(&self) -> &Tab {
        // active_index always points at active_tab_id
        &self.tabs[self.active_index]
    }

    pub fn get(&self, id: TabId) -> Option<&Tab> {
        self.tabs.iter().find(|tab| tab.id == id)
    }

    pub fn contains(&self, id: TabId) -> bool {
        self.position(id).is_some()
    }

    pub fn is_active(&self, id: TabId) -> bool {
        self.active_tab_id == id
    }

    /// Finds a file tab by path. OCR tabs never match.
    pub fn find_by_path(&self, path: &Path) -> Option<TabId> {
        self.tabs
            .iter()
            .find(|tab| tab.path() == Some(path))
            .map(|tab| tab.id)
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    /// Always false: a session keeps at least one tab.
    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.tabs.len() >= self.capacity
    }

    fn position(&self, id: TabId) -> Option<usize> {
        self.tabs.iter().position(|tab| tab.id == id)
    }

    // ==================== Reducers ====================

    /// Opens a tab, or switches to an existing tab with the same path.
    pub fn open(&self, descriptor: TabDescriptor) -> TabResult<(Session, OpenOutcome)> {
        if let Some(existing) = descriptor.path().and_then(|path| self.find_by_path(path)) {
            return match self.switch(existing)? {
                Some(next) => Ok((next, OpenOutcome::Switched(existing))),
                None => Ok((self.clone(), OpenOutcome::AlreadyActive(existing))),
            };
        }

        if self.is_full() {
            return Err(TabError::CapacityExceeded {
                limit: self.capacity,
            });
        }

        let tab = Tab::from_descriptor(descriptor);
        let id = tab.id;
        let mut next = self.clone();
        next.tabs.push(tab);
        next.active_index = next.tabs.len() - 1;
        next.active_tab_id = id;

        Ok((next, OpenOutcome::Created(id)))
    }

    /// Activates a tab. Returns `None` when it is already active.
    pub fn switch(&self, id: TabId) -> TabResult<Option<Session>> {
        let index = self.position(id).ok_or(TabError::TabNotFound(id))?;
        if id == self.active_tab_id {
            return Ok(None);
        }

        let mut next = self.clone();
        next.active_index = index;
        next.active_tab_id = id;
        Ok(Some(next))
    }

    /// Closes a tab.
    ///
    /// When the closed tab was active, its left neighbour becomes active
    /// (the first tab when closing index 0).
    pub fn close(&self, id: TabId) -> TabResult<CloseOutcome> {
        let index = self.position(id).ok_or(TabError::TabNotFound(id))?;
        if self.tabs.len() == 1 {
            return Ok(CloseOutcome::ExitRequested);
        }

        let mut next = self.clone();
        next.tabs.remove(index);

        let was_active = id == self.active_tab_id;
        if was_active {
            let candidate = index.saturating_sub(1);
            next.active_index = candidate.min(next.tabs.len() - 1);
            next.active_tab_id = next.tabs[next.active_index].id;
        } else if index < self.active_index {
            next.active_index = self.active_index - 1;
        }

        Ok(CloseOutcome::Closed {
            session: next,
            was_active,
        })
    }

    /// Shallow-merges a patch into one tab.
    pub fn patch(&self, id: TabId, patch: TabPatch) -> TabResult<Session> {
        let index = self.position(id).ok_or(TabError::TabNotFound(id))?;
        let mut next = self.clone();
        next.tabs[index].apply(patch);
        Ok(next)
    }
}
