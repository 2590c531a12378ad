//! Scan, hydration and viewport controllers shared by the list and tree views.

pub mod debounce;
pub mod hydrate;
pub mod scan;
pub mod search;
pub mod viewport;

use std::fmt;

/// A view that owns its own scan state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewId {
    /// Flat, incrementally paginated key list.
    List,
    /// Namespace tree derived from the key delimiter.
    Tree,
}

impl ViewId {
    pub const ALL: [ViewId; 2] = [ViewId::List, ViewId::Tree];

    pub fn label(&self) -> &'static str {
        match self {
            ViewId::List => "list",
            ViewId::Tree => "tree",
        }
    }

    /// Whether rows of this view need lazily fetched metadata.
    pub fn presentation(&self) -> Presentation {
        match self {
            ViewId::List => Presentation::Flat,
            ViewId::Tree => Presentation::Tree,
        }
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How a view lays out its rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presentation {
    Flat,
    Tree,
}

/// Range of rendered row indices, `start_index..=stop_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewportWindow {
    pub start_index: usize,
    pub stop_index: usize,
}

impl ViewportWindow {
    pub fn new(start_index: usize, stop_index: usize) -> Self {
        Self {
            start_index: start_index.min(stop_index),
            stop_index: start_index.max(stop_index),
        }
    }

    /// Whether `other` lies entirely inside this window.
    pub fn contains(&self, other: &ViewportWindow) -> bool {
        self.start_index <= other.start_index && other.stop_index <= self.stop_index
    }

    pub fn len(&self) -> usize {
        self.stop_index - self.start_index + 1
    }
}
