use std::sync::Arc;
use std::time::Instant;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::browse::hydrate::{HydrationRequest, MetadataHydrator};
use crate::browse::scan::{LoadMore, ScanCursorController, ScanOutcome, ScanRequest};
use crate::browse::search::SearchContinuation;
use crate::browse::viewport::ViewportCoordinator;
use crate::browse::{ViewId, ViewportWindow};
use crate::config::AppConfig;
use crate::event::Event;
use crate::keyspace::backend::KeyspaceBackend;
use crate::keyspace::pattern::KeyPattern;
use crate::keyspace::record::KeyRecord;
use crate::tree::builder::{RowKind, TreeRow};
use crate::tree::session::TreeSession;
use crate::tree::worker::TreeWorker;

/// Which prompt the input line is collecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Filter,
    Delimiter,
}

impl InputKind {
    pub fn title(&self) -> &'static str {
        match self {
            InputKind::Filter => "Filter keys (glob)",
            InputKind::Delimiter => "Namespace delimiter",
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    #[default]
    Normal,
    Input(InputKind),
    Help,
}

/// Text being typed into a prompt.
#[derive(Debug, Default)]
pub struct InputState {
    pub input: String,
    pub cursor_position: usize,
}

/// Selection and scroll position of one view.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PaneState {
    pub selected: usize,
    pub scroll: usize,
}

impl PaneState {
    /// Keep the selected row within `visible_height` rows of the scroll offset.
    pub fn update_scroll(&mut self, visible_height: usize) {
        if visible_height == 0 {
            return;
        }
        if self.selected < self.scroll {
            self.scroll = self.selected;
        } else if self.selected >= self.scroll + visible_height {
            self.scroll = self.selected - visible_height + 1;
        }
    }

    fn clamp(&mut self, row_count: usize) {
        self.selected = self.selected.min(row_count.saturating_sub(1));
    }
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub text: String,
    pub is_error: bool,
    pub created: Instant,
}

/// A row of the flat list view.
#[derive(Debug, Clone, Copy)]
pub enum ListRow<'a> {
    Key(&'a KeyRecord),
    LoadMore,
}

/// Main application state. Mutated only from the event loop.
pub struct App {
    backend: Arc<dyn KeyspaceBackend>,
    event_tx: mpsc::UnboundedSender<Event>,
    pub scans: ScanCursorController,
    pub hydrator: MetadataHydrator,
    pub viewport: ViewportCoordinator,
    pub search: SearchContinuation,
    pub tree: TreeSession,
    pub active: ViewId,
    pub list_pane: PaneState,
    pub tree_pane: PaneState,
    pub mode: AppMode,
    pub input: InputState,
    pub status_message: Option<StatusMessage>,
    pub should_quit: bool,
    /// Page size of the last render, used for load-ahead and paging.
    pub page_height: usize,
}

impl App {
    pub fn new(
        backend: Arc<dyn KeyspaceBackend>,
        config: &AppConfig,
        event_tx: mpsc::UnboundedSender<Event>,
    ) -> Self {
        let worker = TreeWorker::new(config.tree_offload(), Some(event_tx.clone()));
        Self {
            backend,
            scans: ScanCursorController::new(config.scan_settings()),
            hydrator: MetadataHydrator::new(
                config.hydration_debounce(),
                config.hydration_max_keys(),
            ),
            viewport: ViewportCoordinator::new(),
            search: SearchContinuation::new(config.search_state()),
            tree: TreeSession::new(config.delimiter(), worker),
            event_tx,
            active: ViewId::List,
            list_pane: PaneState::default(),
            tree_pane: PaneState::default(),
            mode: AppMode::Normal,
            input: InputState::default(),
            status_message: None,
            should_quit: false,
            page_height: 20,
        }
    }

    /// Start both views from the beginning of the keyspace.
    pub fn mount(&mut self) {
        for view in ViewId::ALL {
            self.start_view(view);
        }
    }

    fn start_view(&mut self, view: ViewId) {
        let request = self.scans.start(view, self.scans.batch_size(view));
        self.spawn_key_count(view, request.token.epoch);
        self.spawn_scan(request);
    }

    // ── Spawned work ────────────────────────────────────────────────────────

    fn spawn_scan(&self, request: ScanRequest) {
        let Ok(handle) = Handle::try_current() else {
            warn!(view = %request.token.view, "no runtime, scan not issued");
            return;
        };
        let backend = Arc::clone(&self.backend);
        let tx = self.event_tx.clone();
        handle.spawn(async move {
            let response = request.execute(backend.as_ref()).await;
            let _ = tx.send(Event::ScanCompleted(response));
        });
    }

    fn spawn_hydration(&self, request: HydrationRequest) {
        let Ok(handle) = Handle::try_current() else {
            return;
        };
        let backend = Arc::clone(&self.backend);
        let tx = self.event_tx.clone();
        handle.spawn(async move {
            let response = request.execute(backend.as_ref()).await;
            let _ = tx.send(Event::HydrationCompleted(response));
        });
    }

    fn spawn_key_count(&self, view: ViewId, epoch: u64) {
        let Ok(handle) = Handle::try_current() else {
            return;
        };
        let backend = Arc::clone(&self.backend);
        let tx = self.event_tx.clone();
        handle.spawn(async move {
            let result = backend.key_count().await;
            let _ = tx.send(Event::KeyCount {
                view,
                epoch,
                result,
            });
        });
    }

    // ── Completions ─────────────────────────────────────────────────────────

    /// Apply a non-input event.
    pub fn on_event(&mut self, event: Event, now: Instant) {
        match event {
            Event::Tick => self.tick(now),
            Event::ScanCompleted(response) => {
                let view = response.token.view;
                match self.scans.apply(response) {
                    Ok(ScanOutcome::Applied(batch)) => {
                        let first_batch = self
                            .scans
                            .state(view)
                            .is_some_and(|s| s.len() == batch.added.len());
                        if view == ViewId::Tree {
                            if first_batch {
                                let keys = self
                                    .scans
                                    .state(view)
                                    .map(|s| s.names())
                                    .unwrap_or_default();
                                self.tree.populate(keys);
                            } else {
                                self.tree.on_batch(&batch.added);
                            }
                        }
                        if batch.exhausted {
                            info!(%view, "sweep complete");
                        }
                        if let Some(request) = self.search.after_batch(view, &mut self.scans) {
                            self.spawn_scan(request);
                        }
                    }
                    Ok(ScanOutcome::Discarded) => {}
                    Err(e) => self.set_error(e.to_string()),
                }
            }
            Event::HydrationCompleted(response) => {
                // Failures were logged by the hydrator; the next viewport
                // change asks again.
                let _ = self.hydrator.apply(response, &mut self.scans);
            }
            Event::KeyCount {
                view,
                epoch,
                result,
            } => {
                if self.scans.epoch(view) != Some(epoch) {
                    return;
                }
                match result {
                    Ok(total) => self.scans.set_total(view, total),
                    Err(e) => warn!(%view, error = %e, "key count unavailable"),
                }
            }
            Event::TreeReady(outcome) => {
                let scans = &self.scans;
                self.tree.on_outcome(outcome, || {
                    scans
                        .state(ViewId::Tree)
                        .map(|s| s.names())
                        .unwrap_or_default()
                });
                let rows = self.tree_rows().len();
                self.tree_pane.clamp(rows);
            }
            Event::Key(_) | Event::Mouse(_) | Event::Resize(_, _) => {}
        }
    }

    /// Fire due hydration requests and expire old status messages.
    pub fn tick(&mut self, now: Instant) {
        for request in self.hydrator.poll(now, &self.scans) {
            self.spawn_hydration(request);
        }
        self.clear_expired_status(now);
    }

    // ── Rendering callbacks ─────────────────────────────────────────────────

    /// Called by the renderer with the rows it drew. Schedules hydration
    /// and loads ahead when the list nears its end.
    pub fn on_rows_rendered(&mut self, view: ViewId, window: ViewportWindow, row_count: usize) {
        self.viewport.on_rows_rendered(
            view,
            window,
            row_count,
            &mut self.hydrator,
            Instant::now(),
        );
        if view == ViewId::List {
            self.load_more_items(window, row_count);
        }
    }

    /// Load the next batch once the window is within a page of the last row.
    pub fn load_more_items(&mut self, window: ViewportWindow, row_count: usize) {
        let view = ViewId::List;
        if self.scans.is_exhausted(view) || self.scans.is_in_flight(view) {
            return;
        }
        if window.stop_index + self.page_height.max(1) >= row_count {
            self.load_more(view);
        }
    }

    /// Request the next batch for `view`. A request already in flight is
    /// left alone.
    pub fn load_more(&mut self, view: ViewId) {
        if self.scans.is_in_flight(view) {
            return;
        }
        match self.scans.begin_load_more(view, self.scans.batch_size(view)) {
            LoadMore::Request(request) => self.spawn_scan(request),
            LoadMore::Exhausted(_) => {
                self.set_status_message(format!("{} view: all keys loaded", view.label()))
            }
        }
    }

    // ── Rows ────────────────────────────────────────────────────────────────

    pub fn list_rows(&self) -> Vec<ListRow<'_>> {
        let mut rows: Vec<ListRow<'_>> = self
            .scans
            .state(ViewId::List)
            .map(|s| s.records().map(ListRow::Key).collect())
            .unwrap_or_default();
        if !self.scans.is_exhausted(ViewId::List) {
            rows.push(ListRow::LoadMore);
        }
        rows
    }

    pub fn list_row_count(&self) -> usize {
        let keys = self.scans.state(ViewId::List).map_or(0, |s| s.len());
        keys + usize::from(!self.scans.is_exhausted(ViewId::List))
    }

    pub fn tree_rows(&self) -> Vec<TreeRow> {
        let mut rows = self.tree.tree().flatten();
        if !self.scans.is_exhausted(ViewId::Tree) {
            if let Some(last) = rows.iter_mut().rev().find(|r| r.depth == 0) {
                last.is_last_sibling = false;
            }
            rows.push(TreeRow::load_more());
        }
        rows
    }

    fn row_count(&self, view: ViewId) -> usize {
        match view {
            ViewId::List => self.list_row_count(),
            ViewId::Tree => self.tree_rows().len(),
        }
    }

    pub fn pane_mut(&mut self, view: ViewId) -> &mut PaneState {
        match view {
            ViewId::List => &mut self.list_pane,
            ViewId::Tree => &mut self.tree_pane,
        }
    }

    pub fn pane(&self, view: ViewId) -> &PaneState {
        match view {
            ViewId::List => &self.list_pane,
            ViewId::Tree => &self.tree_pane,
        }
    }

    // ── Navigation ──────────────────────────────────────────────────────────

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    pub fn switch_view(&mut self) {
        self.active = match self.active {
            ViewId::List => ViewId::Tree,
            ViewId::Tree => ViewId::List,
        };
    }

    pub fn select_next(&mut self) {
        self.move_selection(1);
    }

    pub fn select_previous(&mut self) {
        self.move_selection(-1);
    }

    pub fn page_down(&mut self) {
        self.move_selection(self.page_height.max(1) as isize);
    }

    pub fn page_up(&mut self) {
        self.move_selection(-(self.page_height.max(1) as isize));
    }

    pub fn select_first(&mut self) {
        let view = self.active;
        self.pane_mut(view).selected = 0;
    }

    pub fn select_last(&mut self) {
        let view = self.active;
        let len = self.row_count(view);
        self.pane_mut(view).selected = len.saturating_sub(1);
    }

    pub fn move_selection(&mut self, delta: isize) {
        let view = self.active;
        let len = self.row_count(view);
        if len == 0 {
            return;
        }
        let pane = self.pane_mut(view);
        pane.selected = pane.selected.saturating_add_signed(delta).min(len - 1);
    }

    /// Enter on the selected row: toggle a namespace, select a leaf, or
    /// load more keys.
    pub fn activate_selected(&mut self) {
        match self.active {
            ViewId::List => {
                let on_load_more = matches!(
                    self.list_rows().get(self.list_pane.selected),
                    Some(ListRow::LoadMore)
                );
                if on_load_more {
                    self.load_more(ViewId::List);
                }
            }
            ViewId::Tree => {
                let Some(row) = self.tree_rows().into_iter().nth(self.tree_pane.selected) else {
                    return;
                };
                match row.kind {
                    RowKind::Branch { path, .. } => {
                        self.tree.toggle(&path);
                    }
                    RowKind::Leaf { name } => {
                        self.tree.select_leaf(&name);
                    }
                    RowKind::LoadMore => self.load_more(ViewId::Tree),
                }
                let rows = self.tree_rows().len();
                self.tree_pane.clamp(rows);
            }
        }
    }

    /// Collapse the selected namespace, or jump to its parent row.
    pub fn collapse_selected(&mut self) {
        if self.active != ViewId::Tree {
            return;
        }
        let rows = self.tree_rows();
        let Some(row) = rows.get(self.tree_pane.selected) else {
            return;
        };
        if let RowKind::Branch { path, .. } = &row.kind {
            if row.is_open {
                self.tree.set_open(path, false);
                return;
            }
        }
        if row.depth == 0 {
            return;
        }
        let depth = row.depth;
        if let Some(parent) = (0..self.tree_pane.selected)
            .rev()
            .find(|&i| rows[i].depth < depth)
        {
            self.tree_pane.selected = parent;
        }
    }

    /// Open the selected namespace.
    pub fn expand_selected(&mut self) {
        if self.active != ViewId::Tree {
            return;
        }
        let rows = self.tree_rows();
        if let Some(TreeRow {
            kind: RowKind::Branch { path, .. },
            ..
        }) = rows.get(self.tree_pane.selected)
        {
            self.tree.set_open(path, true);
        }
    }

    // ── Filter, delimiter, reset ────────────────────────────────────────────

    /// Apply a new search pattern. It is also the scan filter, so both views
    /// restart their sweep.
    pub fn set_filter(&mut self, text: &str) {
        let text = text.trim();
        let pattern = if text.is_empty() || text == "*" {
            None
        } else {
            match KeyPattern::new(text) {
                Ok(p) => Some(p),
                Err(e) => {
                    self.set_error(e.to_string());
                    return;
                }
            }
        };
        info!(filter = text, "filter changed");
        self.search.set_pattern(pattern.clone());
        for view in ViewId::ALL {
            self.scans.set_filter(view, pattern.clone());
        }
        self.restart();
    }

    /// Drop everything loaded and sweep again with the current filter.
    pub fn restart(&mut self) {
        for view in ViewId::ALL {
            self.hydrator.reset(view);
            self.viewport.reset(view);
            *self.pane_mut(view) = PaneState::default();
        }
        self.tree.clear();
        self.mount();
    }

    /// Rebuild the tree with a new delimiter. Open nodes and the selected
    /// leaf are reset.
    pub fn set_delimiter(&mut self, delimiter: &str) {
        if delimiter == self.tree.delimiter() {
            return;
        }
        let keys = self
            .scans
            .state(ViewId::Tree)
            .map(|s| s.names())
            .unwrap_or_default();
        self.tree.set_delimiter(delimiter, keys);
        self.tree_pane = PaneState::default();
        let shown = if delimiter.is_empty() {
            "none".to_string()
        } else {
            format!("\"{}\"", delimiter)
        };
        self.set_status_message(format!("Delimiter set to {}", shown));
    }

    // ── Prompt input ────────────────────────────────────────────────────────

    pub fn open_input(&mut self, kind: InputKind) {
        let prefill = match kind {
            InputKind::Filter => self
                .search
                .state()
                .pattern
                .as_ref()
                .map(|p| p.as_str().to_string())
                .unwrap_or_default(),
            InputKind::Delimiter => self.tree.delimiter().to_string(),
        };
        self.input = InputState {
            cursor_position: prefill.len(),
            input: prefill,
        };
        self.mode = AppMode::Input(kind);
    }

    pub fn close_input(&mut self) {
        self.mode = AppMode::Normal;
        self.input = InputState::default();
    }

    pub fn submit_input(&mut self) {
        let AppMode::Input(kind) = self.mode else {
            return;
        };
        let value = std::mem::take(&mut self.input.input);
        self.close_input();
        match kind {
            InputKind::Filter => self.set_filter(&value),
            InputKind::Delimiter => self.set_delimiter(&value),
        }
    }

    pub fn input_char(&mut self, c: char) {
        self.input.input.insert(self.input.cursor_position, c);
        self.input.cursor_position += c.len_utf8();
    }

    pub fn input_backspace(&mut self) {
        let before = &self.input.input[..self.input.cursor_position];
        if let Some(prev) = before.chars().next_back() {
            self.input.cursor_position -= prev.len_utf8();
            self.input.input.remove(self.input.cursor_position);
        }
    }

    pub fn input_cursor_left(&mut self) {
        let before = &self.input.input[..self.input.cursor_position];
        if let Some(prev) = before.chars().next_back() {
            self.input.cursor_position -= prev.len_utf8();
        }
    }

    pub fn input_cursor_right(&mut self) {
        let after = &self.input.input[self.input.cursor_position..];
        if let Some(next) = after.chars().next() {
            self.input.cursor_position += next.len_utf8();
        }
    }

    // ── Status ──────────────────────────────────────────────────────────────

    pub fn set_status_message(&mut self, text: String) {
        self.status_message = Some(StatusMessage {
            text,
            is_error: false,
            created: Instant::now(),
        });
    }

    pub fn set_error(&mut self, text: String) {
        warn!(error = %text, "shown to user");
        self.status_message = Some(StatusMessage {
            text,
            is_error: true,
            created: Instant::now(),
        });
    }

    /// Errors stay for 6 seconds, notices for 3.
    pub fn clear_expired_status(&mut self, now: Instant) {
        if let Some(msg) = &self.status_message {
            let ttl = if msg.is_error { 6 } else { 3 };
            if now.saturating_duration_since(msg.created).as_secs() >= ttl {
                debug!("status message expired");
                self.status_message = None;
            }
        }
    }
}
