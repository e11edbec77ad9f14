//! # Neoscribe Tabs
//!
//! Tab records and the pure reducers that move a session between states.
//!
//! ## Key Concepts for Learning Rust
//!
//! ### Ownership & Borrowing
//! - `Session` owns its `Vec<Tab>`
//! - Reducers borrow `&self` and hand back an owned next snapshot
//! - Nothing here performs I/O or knows about the document engine
//!
//! ### Making Illegal States Unrepresentable
//! - An OCR tab has no path field to fill in (`TabSource::Ocr`)
//! - Index and range selections share one enum (`SelectedLines`)

mod selection;
mod session;
mod tab;

pub use selection::{LineSelection, SelectedLines};
pub use session::{CloseOutcome, OpenOutcome, Session, DEFAULT_MAX_TABS};
pub use tab::{extension_from_name, Tab, TabDescriptor, TabId, TabPatch, TabSource};

/// Result type for session transitions
pub type TabResult<T> = Result<T, TabError>;

/// Errors a session transition can produce
#[derive(Debug, thiserror::Error)]
pub enum TabError {
    #[error("Tab limit of {limit} reached")]
    CapacityExceeded { limit: usize },

    #[error("Tab not found: {0}")]
    TabNotFound(TabId),

    #[error("Invalid session snapshot: {0}")]
    InvalidSnapshot(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_creation() {
        let session = Session::new(TabDescriptor::file("/tmp/a.txt", "a.txt"));
        assert_eq!(session.len(), 1);
        assert_eq!(session.active_index(), 0);
        assert_eq!(session.capacity(), DEFAULT_MAX_TABS);
    }

    #[test]
    fn test_custom_capacity_is_at_least_one() {
        let session = Session::with_capacity(TabDescriptor::ocr(), 0);
        assert_eq!(session.capacity(), 1);
        assert!(session.is_full());
    }

    #[test]
    fn test_error_messages() {
        let err = TabError::CapacityExceeded { limit: 10 };
        assert_eq!(err.to_string(), "Tab limit of 10 reached");
    }
}
