//! Selection event reconciliation.
//!
//! ## Learning: Guarding Against Echoes
//!
//! Selection events arrive some time after the engine produced them. Two
//! kinds must be ignored:
//!
//! - events from a tab that is no longer active (stale)
//! - echoes of our own programmatic clear, which the engine reports back
//!   a few frames later with the old selection still in them
//!
//! The second case is handled with a short per-tab latch. It is plain data
//! (`ClearLatch`) compared against the current `Instant`, released on the
//! first event after it expires, so no timer task is needed.

use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

use neoscribe_tabs::{LineSelection, SelectedLines, Session, TabId, TabPatch};

/// Whether selection events from a tab are currently suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearLatch {
    Open,
    Clearing { until: Instant },
}

/// Decision for one selection event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Patch the originating tab
    Apply(TabPatch),
    /// The tab is not active
    Stale,
    /// Suppressed by a clearing latch
    Echo,
}

/// Raw selection payload from the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionReport {
    pub count: usize,
    pub indices: Option<Vec<usize>>,
    pub range_start: Option<usize>,
    pub range_count: Option<usize>,
}

pub struct SelectionReconciler {
    window: Duration,
    latches: HashMap<TabId, Instant>,
}

impl SelectionReconciler {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            latches: HashMap::new(),
        }
    }

    /// Arms the latch after a programmatic clear.
    pub fn arm(&mut self, tab: TabId, now: Instant) {
        let until = now + self.window;
        tracing::debug!("Clearing latch armed for tab {} ({:?})", tab, self.window);
        self.latches.insert(tab, until);
    }

    /// Current latch state for a tab.
    pub fn latch(&self, tab: TabId, now: Instant) -> ClearLatch {
        match self.latches.get(&tab) {
            Some(until) if now < *until => ClearLatch::Clearing { until: *until },
            _ => ClearLatch::Open,
        }
    }

    /// Runs the active-tab check and the latch check.
    fn admit(&mut self, session: &Session, tab: TabId, now: Instant) -> Option<Verdict> {
        if !session.is_active(tab) {
            tracing::trace!("Dropping selection event from inactive tab {}", tab);
            return Some(Verdict::Stale);
        }
        match self.latch(tab, now) {
            ClearLatch::Clearing { .. } => {
                tracing::trace!("Dropping selection echo from tab {}", tab);
                Some(Verdict::Echo)
            }
            ClearLatch::Open => {
                self.latches.remove(&tab);
                None
            }
        }
    }

    /// Reconciles a `SelectionChanged` event. The tab keeps its mode.
    pub fn reconcile_selection(
        &mut self,
        session: &Session,
        tab: TabId,
        report: SelectionReport,
        now: Instant,
    ) -> Verdict {
        if let Some(verdict) = self.admit(session, tab, now) {
            return verdict;
        }
        let mode = session.get(tab).map(|t| t.selection.mode).unwrap_or(false);
        let selection = LineSelection {
            mode,
            count: report.count,
            lines: SelectedLines::from_parts(report.indices, report.range_start, report.range_count),
        };
        Verdict::Apply(TabPatch::selection(selection))
    }

    /// Reconciles a `SelectionModeChanged` event. Only `mode` changes.
    pub fn reconcile_mode(
        &mut self,
        session: &Session,
        tab: TabId,
        active: bool,
        now: Instant,
    ) -> Verdict {
        if let Some(verdict) = self.admit(session, tab, now) {
            return verdict;
        }
        match session.get(tab) {
            Some(current) => Verdict::Apply(TabPatch::selection(current.selection.with_mode(active))),
            None => Verdict::Stale,
        }
    }

    pub fn forget(&mut self, tab: TabId) {
        self.latches.remove(&tab);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neoscribe_tabs::TabDescriptor;

    fn two_tabs() -> (Session, TabId, TabId) {
        let session = Session::new(TabDescriptor::file("/a.txt", "a.txt"));
        let a = session.active_tab_id();
        let (session, outcome) = session.open(TabDescriptor::file("/b.txt", "b.txt")).unwrap();
        (session, a, outcome.id())
    }

    fn report(count: usize) -> SelectionReport {
        SelectionReport {
            count,
            indices: Some((0..count).collect()),
            ..SelectionReport::default()
        }
    }

    #[test]
    fn test_inactive_tab_is_stale() {
        let (session, a, _b) = two_tabs();
        let mut reconciler = SelectionReconciler::new(Duration::from_millis(300));

        let verdict = reconciler.reconcile_selection(&session, a, report(3), Instant::now());
        assert_eq!(verdict, Verdict::Stale);
    }

    #[test]
    fn test_active_tab_applies() {
        let (session, _a, b) = two_tabs();
        let mut reconciler = SelectionReconciler::new(Duration::from_millis(300));

        let verdict = reconciler.reconcile_selection(&session, b, report(2), Instant::now());
        let Verdict::Apply(patch) = verdict else {
            panic!("expected patch");
        };
        let selection = patch.selection.unwrap();
        assert_eq!(selection.count, 2);
        assert_eq!(selection.lines, SelectedLines::Indices { indices: vec![0, 1] });
    }

    #[test]
    fn test_mode_patch_keeps_lines() {
        let (session, _a, b) = two_tabs();
        let selection = LineSelection {
            mode: false,
            count: 4,
            lines: SelectedLines::Range { start: 10, count: 4 },
        };
        let session = session.patch(b, TabPatch::selection(selection)).unwrap();
        let mut reconciler = SelectionReconciler::new(Duration::from_millis(300));

        let Verdict::Apply(patch) = reconciler.reconcile_mode(&session, b, true, Instant::now())
        else {
            panic!("expected patch");
        };
        let selection = patch.selection.unwrap();
        assert!(selection.mode);
        assert_eq!(selection.count, 4);
        assert_eq!(selection.lines, SelectedLines::Range { start: 10, count: 4 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_latch_suppresses_echo_until_expiry() {
        let (session, _a, b) = two_tabs();
        let mut reconciler = SelectionReconciler::new(Duration::from_millis(300));

        reconciler.arm(b, Instant::now());
        assert!(matches!(reconciler.latch(b, Instant::now()), ClearLatch::Clearing { .. }));

        tokio::time::advance(Duration::from_millis(299)).await;
        assert_eq!(
            reconciler.reconcile_selection(&session, b, report(5), Instant::now()),
            Verdict::Echo
        );
        assert_eq!(reconciler.reconcile_mode(&session, b, true, Instant::now()), Verdict::Echo);

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(matches!(
            reconciler.reconcile_selection(&session, b, report(5), Instant::now()),
            Verdict::Apply(_)
        ));
        assert_eq!(reconciler.latch(b, Instant::now()), ClearLatch::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latch_is_per_tab() {
        let (session, a, b) = two_tabs();
        let mut reconciler = SelectionReconciler::new(Duration::from_millis(300));
        reconciler.arm(a, Instant::now());

        assert!(matches!(
            reconciler.reconcile_selection(&session, b, report(1), Instant::now()),
            Verdict::Apply(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_configured_window() {
        let (session, _a, b) = two_tabs();
        let mut reconciler = SelectionReconciler::new(Duration::from_millis(50));
        reconciler.arm(b, Instant::now());

        tokio::time::advance(Duration::from_millis(60)).await;
        assert!(matches!(
            reconciler.reconcile_selection(&session, b, report(1), Instant::now()),
            Verdict::Apply(_)
        ));
    }
}
