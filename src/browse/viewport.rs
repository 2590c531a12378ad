use std::collections::HashMap;
use std::time::Instant;

use crate::browse::hydrate::MetadataHydrator;
use crate::browse::{Presentation, ViewId, ViewportWindow};

/// Last window handed to the hydrator, with the row count it was computed
/// against. New rows invalidate it even if the window itself is unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Dispatched {
    window: ViewportWindow,
    row_count: usize,
}

/// Turns "rows rendered" notifications into hydration triggers.
#[derive(Debug, Default)]
pub struct ViewportCoordinator {
    last_window: HashMap<ViewId, ViewportWindow>,
    dispatched: HashMap<ViewId, Dispatched>,
}

impl ViewportCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the rendered window of a view. Flat views schedule hydration
    /// unless the window is already covered by the last dispatched one; tree
    /// views only record it, their rows are resident.
    ///
    /// Returns whether hydration was scheduled.
    pub fn on_rows_rendered(
        &mut self,
        view: ViewId,
        window: ViewportWindow,
        row_count: usize,
        hydrator: &mut MetadataHydrator,
        now: Instant,
    ) -> bool {
        self.last_window.insert(view, window);
        if view.presentation() == Presentation::Tree {
            return false;
        }
        if let Some(last) = self.dispatched.get(&view) {
            if last.row_count == row_count && last.window.contains(&window) {
                return false;
            }
        }
        self.dispatched.insert(view, Dispatched { window, row_count });
        hydrator.hydrate(view, window, now);
        true
    }

    pub fn last_window(&self, view: ViewId) -> Option<ViewportWindow> {
        self.last_window.get(&view).copied()
    }

    pub fn reset(&mut self, view: ViewId) {
        self.last_window.remove(&view);
        self.dispatched.remove(&view);
    }
}
