//! Cursor-driven incremental scanning, one independent sweep per view.
//!
//! A scan is issued, executed and applied in three steps so that the caller
//! never holds the controller across a network round trip:
//!
//! 1. [`ScanCursorController::begin_load_more`] allocates a [`RequestToken`]
//!    and returns an owned [`ScanRequest`]. Any earlier request of the same
//!    view is superseded.
//! 2. [`ScanRequest::execute`] talks to the backend.
//! 3. [`ScanCursorController::apply`] merges the page, or silently discards it
//!    if its token is no longer the view's current one.

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::browse::{ViewId, ViewportWindow};
use crate::error::{AppError, Result};
use crate::keyspace::backend::{BackendError, Cursor, KeyspaceBackend, ScanPage};
use crate::keyspace::pattern::KeyPattern;
use crate::keyspace::record::{KeyName, KeyRecord};

/// Default count hint for one `loadMore`.
pub const DEFAULT_BATCH_SIZE: usize = 500;
/// Default floor applied to every count hint.
pub const DEFAULT_MIN_COUNT: usize = 100;

/// Sweep progress and accumulated keys of one view.
#[derive(Debug, Clone, Default)]
pub struct ScanState {
    pub cursor: Cursor,
    /// Entries visited in this sweep, duplicates included.
    pub scanned: u64,
    /// Namespace size reported by the backend, if known.
    pub total: Option<u64>,
    pub exhausted: bool,
    accumulated: IndexMap<KeyName, KeyRecord>,
}

impl ScanState {
    pub fn len(&self) -> usize {
        self.accumulated.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accumulated.is_empty()
    }

    /// Records in first-seen order.
    pub fn records(&self) -> impl Iterator<Item = &KeyRecord> {
        self.accumulated.values()
    }

    pub fn get(&self, index: usize) -> Option<&KeyRecord> {
        self.accumulated.get_index(index).map(|(_, record)| record)
    }

    pub fn contains(&self, name: &KeyName) -> bool {
        self.accumulated.contains_key(name)
    }

    pub fn names(&self) -> Vec<KeyName> {
        self.accumulated.keys().cloned().collect()
    }

    /// Records whose index falls inside `window`, clamped to what is loaded.
    pub fn window(&self, window: &ViewportWindow) -> impl Iterator<Item = &KeyRecord> {
        let end = (window.stop_index + 1).min(self.accumulated.len());
        let start = window.start_index.min(end);
        (start..end).filter_map(move |i| self.accumulated.get_index(i).map(|(_, record)| record))
    }

    pub(crate) fn get_mut_by_name(&mut self, name: &KeyName) -> Option<&mut KeyRecord> {
        self.accumulated.get_mut(name)
    }

    /// Merge one page; returns the names that were not already accumulated.
    fn absorb(&mut self, page: ScanPage) -> (Vec<KeyName>, usize) {
        let visited = page.keys.len();
        let mut added = Vec::new();
        for name in page.keys {
            if !self.accumulated.contains_key(&name) {
                self.accumulated
                    .insert(name.clone(), KeyRecord::new(name.clone()));
                added.push(name);
            }
        }
        self.scanned += visited as u64;
        self.exhausted = page.cursor.is_start();
        self.cursor = page.cursor;
        (added, visited)
    }
}

/// Identifies one issued scan request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestToken {
    pub view: ViewId,
    /// Sweep the request belongs to; changes on every reset.
    pub epoch: u64,
    pub serial: u64,
}

/// An issued scan, ready to be executed without borrowing the controller.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub token: RequestToken,
    pub cursor: Cursor,
    pub pattern: Option<KeyPattern>,
    pub count: usize,
}

impl ScanRequest {
    pub async fn execute(self, backend: &dyn KeyspaceBackend) -> ScanResponse {
        let result = backend
            .scan(&self.cursor, self.pattern.as_ref(), self.count)
            .await;
        ScanResponse {
            token: self.token,
            result,
        }
    }
}

/// Backend reply tagged with the token of the request that produced it.
#[derive(Debug)]
pub struct ScanResponse {
    pub token: RequestToken,
    pub result: std::result::Result<ScanPage, BackendError>,
}

/// What one applied scan contributed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub view: ViewId,
    /// Names new to the accumulated set, in arrival order.
    pub added: Vec<KeyName>,
    /// Entries visited by the call, duplicates included.
    pub visited: usize,
    pub exhausted: bool,
}

impl Batch {
    pub fn empty(view: ViewId, exhausted: bool) -> Self {
        Self {
            view,
            added: Vec::new(),
            visited: 0,
            exhausted,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Applied(Batch),
    /// The response belonged to a superseded, cancelled or reset request.
    Discarded,
}

#[derive(Debug, Clone)]
pub enum LoadMore {
    /// The sweep is complete; nothing was issued.
    Exhausted(Batch),
    Request(ScanRequest),
}

/// Sizes applied to scan requests.
#[derive(Debug, Clone, Copy)]
pub struct ScanSettings {
    pub batch_size: usize,
    pub min_count: usize,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            min_count: DEFAULT_MIN_COUNT,
        }
    }
}

#[derive(Debug)]
struct ViewScan {
    state: ScanState,
    filter: Option<KeyPattern>,
    batch_size: usize,
    in_flight: Option<u64>,
    epoch: u64,
}

/// Owns the scan state of every view and the tokens of their requests.
#[derive(Debug)]
pub struct ScanCursorController {
    views: HashMap<ViewId, ViewScan>,
    settings: ScanSettings,
    next_serial: u64,
}

impl ScanCursorController {
    pub fn new(settings: ScanSettings) -> Self {
        Self {
            views: HashMap::new(),
            settings,
            next_serial: 0,
        }
    }

    fn next_serial(&mut self) -> u64 {
        self.next_serial += 1;
        self.next_serial
    }

    fn view_mut(&mut self, view: ViewId) -> &mut ViewScan {
        let batch_size = self.settings.batch_size;
        let serial = &mut self.next_serial;
        self.views.entry(view).or_insert_with(|| {
            *serial += 1;
            ViewScan {
                state: ScanState::default(),
                filter: None,
                batch_size,
                in_flight: None,
                epoch: *serial,
            }
        })
    }

    /// Reset the view's sweep and issue its first request.
    pub fn start(&mut self, view: ViewId, batch_size: usize) -> ScanRequest {
        self.reset(view);
        self.view_mut(view).batch_size = batch_size.max(1);
        self.issue(view, batch_size)
    }

    /// Issue the next scan of the view, superseding any request in flight.
    pub fn begin_load_more(&mut self, view: ViewId, requested: usize) -> LoadMore {
        if self.is_exhausted(view) {
            return LoadMore::Exhausted(Batch::empty(view, true));
        }
        LoadMore::Request(self.issue(view, requested))
    }

    fn issue(&mut self, view: ViewId, requested: usize) -> ScanRequest {
        let count = requested.max(self.settings.min_count).max(1);
        let serial = self.next_serial();
        let scan = self.view_mut(view);
        if let Some(previous) = scan.in_flight.replace(serial) {
            debug!(%view, previous, serial, "superseding in-flight scan");
        }
        let request = ScanRequest {
            token: RequestToken {
                view,
                epoch: scan.epoch,
                serial,
            },
            cursor: scan.state.cursor.clone(),
            pattern: scan.filter.clone(),
            count,
        };
        debug!(%view, cursor = request.cursor.as_str(), count, "scan issued");
        request
    }

    /// Issue, execute and apply one scan while holding the controller.
    pub async fn load_more(
        &mut self,
        view: ViewId,
        requested: usize,
        backend: &dyn KeyspaceBackend,
    ) -> Result<Batch> {
        let request = match self.begin_load_more(view, requested) {
            LoadMore::Exhausted(batch) => return Ok(batch),
            LoadMore::Request(request) => request,
        };
        let response = request.execute(backend).await;
        match self.apply(response)? {
            ScanOutcome::Applied(batch) => Ok(batch),
            ScanOutcome::Discarded => Ok(Batch::empty(view, self.is_exhausted(view))),
        }
    }

    /// Apply a scan response if its token is still current.
    ///
    /// A rejected request surfaces as [`AppError::Scan`] and leaves the
    /// cursor and accumulated keys untouched.
    pub fn apply(&mut self, response: ScanResponse) -> Result<ScanOutcome> {
        let token = response.token;
        let Some(scan) = self.views.get_mut(&token.view) else {
            return Ok(ScanOutcome::Discarded);
        };
        if scan.epoch != token.epoch || scan.in_flight != Some(token.serial) {
            debug!(view = %token.view, serial = token.serial, "stale scan response dropped");
            return Ok(ScanOutcome::Discarded);
        }
        scan.in_flight = None;

        let page = response.result.map_err(|source| {
            warn!(view = %token.view, error = %source, "scan failed");
            AppError::Scan {
                view: token.view,
                source,
            }
        })?;
        let (added, visited) = scan.state.absorb(page);
        debug!(
            view = %token.view,
            visited,
            added = added.len(),
            accumulated = scan.state.len(),
            exhausted = scan.state.exhausted,
            "scan applied"
        );
        Ok(ScanOutcome::Applied(Batch {
            view: token.view,
            added,
            visited,
            exhausted: scan.state.exhausted,
        }))
    }

    /// Invalidate the view's outstanding request, if any.
    pub fn cancel_in_flight(&mut self, view: ViewId) {
        if let Some(scan) = self.views.get_mut(&view) {
            scan.in_flight = None;
        }
    }

    /// Drop the view's accumulated keys and start a new epoch.
    /// The filter and batch size are kept.
    pub fn reset(&mut self, view: ViewId) {
        let epoch = self.next_serial();
        let scan = self.view_mut(view);
        scan.state = ScanState::default();
        scan.in_flight = None;
        scan.epoch = epoch;
    }

    /// Replace the view's match filter; this resets the sweep.
    pub fn set_filter(&mut self, view: ViewId, filter: Option<KeyPattern>) {
        self.view_mut(view).filter = filter;
        self.reset(view);
    }

    pub fn filter(&self, view: ViewId) -> Option<&KeyPattern> {
        self.views.get(&view).and_then(|scan| scan.filter.as_ref())
    }

    pub fn set_total(&mut self, view: ViewId, total: Option<u64>) {
        self.view_mut(view).state.total = total;
    }

    pub fn state(&self, view: ViewId) -> Option<&ScanState> {
        self.views.get(&view).map(|scan| &scan.state)
    }

    pub fn epoch(&self, view: ViewId) -> Option<u64> {
        self.views.get(&view).map(|scan| scan.epoch)
    }

    pub fn batch_size(&self, view: ViewId) -> usize {
        self.views
            .get(&view)
            .map_or(self.settings.batch_size, |scan| scan.batch_size)
    }

    pub fn is_in_flight(&self, view: ViewId) -> bool {
        self.views
            .get(&view)
            .is_some_and(|scan| scan.in_flight.is_some())
    }

    pub fn is_exhausted(&self, view: ViewId) -> bool {
        self.views
            .get(&view)
            .is_some_and(|scan| scan.state.exhausted)
    }

    /// Mutable record lookup for metadata merges. Returns `None` when the
    /// view has been reset since `epoch` or the key is no longer present.
    pub(crate) fn record_mut(
        &mut self,
        view: ViewId,
        epoch: u64,
        name: &KeyName,
    ) -> Option<&mut KeyRecord> {
        let scan = self.views.get_mut(&view)?;
        if scan.epoch != epoch {
            return None;
        }
        scan.state.get_mut_by_name(name)
    }
}
