//! Layout shuffle: briefly hide a tab's surface so the renderer rebuilds it.
//!
//! ## Learning: Deadlines as Data
//!
//! A pulse is "hidden now, shown one frame later". Instead of spawning a
//! timer per pulse, the controller keeps the show deadline and the runtime
//! loop sleeps until `next_deadline()`. Overlapping pulses on a surface
//! that is already hidden fold into the pending one.

use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

use neoscribe_tabs::TabId;

/// Render state of one tab surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SurfaceFrame {
    /// Bumped once per hide/show cycle; hosts key their surface on it
    pub generation: u64,
    pub hidden: bool,
}

/// Result of `pulse`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseOutcome {
    /// The surface was visible and is now hidden until `show_at`
    Started { generation: u64, show_at: Instant },
    /// The surface was already hidden; the pending pulse absorbed this one
    Collapsed { generation: u64 },
}

#[derive(Debug, Clone, Copy)]
struct Surface {
    frame: SurfaceFrame,
    show_at: Option<Instant>,
}

pub struct ShuffleController {
    frame: Duration,
    surfaces: HashMap<TabId, Surface>,
}

impl ShuffleController {
    pub fn new(frame: Duration) -> Self {
        Self {
            frame,
            surfaces: HashMap::new(),
        }
    }

    pub fn pulse(&mut self, tab: TabId, now: Instant) -> PulseOutcome {
        let frame = self.frame;
        let surface = self.surfaces.entry(tab).or_insert(Surface {
            frame: SurfaceFrame::default(),
            show_at: None,
        });
        if surface.frame.hidden {
            tracing::trace!("Pulse collapsed into pending one for tab {}", tab);
            return PulseOutcome::Collapsed {
                generation: surface.frame.generation,
            };
        }

        surface.frame.generation += 1;
        let show_at = now + frame;
        surface.frame.hidden = true;
        surface.show_at = Some(show_at);
        tracing::debug!("Pulse {} started for tab {}", surface.frame.generation, tab);
        PulseOutcome::Started {
            generation: surface.frame.generation,
            show_at,
        }
    }

    pub fn frame(&self, tab: TabId) -> SurfaceFrame {
        self.surfaces.get(&tab).map(|s| s.frame).unwrap_or_default()
    }

    /// Earliest pending show deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.surfaces.values().filter_map(|s| s.show_at).min()
    }

    /// Shows every surface whose deadline has passed.
    pub fn settle(&mut self, now: Instant) -> Vec<(TabId, u64)> {
        let mut shown = Vec::new();
        for (tab, surface) in self.surfaces.iter_mut() {
            if surface.show_at.is_some_and(|at| at <= now) {
                surface.show_at = None;
                surface.frame.hidden = false;
                shown.push((*tab, surface.frame.generation));
            }
        }
        shown
    }

    pub fn forget(&mut self, tab: TabId) {
        self.surfaces.remove(&tab);
    }
}
