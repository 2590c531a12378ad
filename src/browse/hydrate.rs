//! Lazy metadata for the rows that are actually on screen.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::browse::debounce::Debouncer;
use crate::browse::scan::ScanCursorController;
use crate::browse::{ViewId, ViewportWindow};
use crate::error::{AppError, Result};
use crate::keyspace::backend::{BackendError, KeyspaceBackend};
use crate::keyspace::record::{KeyMetadata, KeyName};

/// Default quiet period before a viewport change turns into a request.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);
/// Default cap on names per metadata request.
pub const DEFAULT_MAX_KEYS: usize = 500;

/// A metadata batch bound to the sweep epoch it was computed from.
#[derive(Debug, Clone)]
pub struct HydrationRequest {
    pub view: ViewId,
    pub epoch: u64,
    pub names: Vec<KeyName>,
}

impl HydrationRequest {
    pub async fn execute(self, backend: &dyn KeyspaceBackend) -> HydrationResponse {
        let result = backend.fetch_metadata(&self.names).await;
        HydrationResponse {
            view: self.view,
            epoch: self.epoch,
            names: self.names,
            result,
        }
    }
}

#[derive(Debug)]
pub struct HydrationResponse {
    pub view: ViewId,
    pub epoch: u64,
    pub names: Vec<KeyName>,
    pub result: std::result::Result<Vec<KeyMetadata>, BackendError>,
}

/// Fetches per-key attributes for the visible window only.
#[derive(Debug)]
pub struct MetadataHydrator {
    debounce: Duration,
    max_keys: usize,
    pending: HashMap<ViewId, Debouncer<ViewportWindow>>,
    /// Names with an outstanding request, tagged with the request's epoch.
    in_flight: HashMap<ViewId, HashMap<KeyName, u64>>,
}

impl MetadataHydrator {
    pub fn new(debounce: Duration, max_keys: usize) -> Self {
        Self {
            debounce,
            max_keys: max_keys.max(1),
            pending: HashMap::new(),
            in_flight: HashMap::new(),
        }
    }

    /// Note a new visible window; the request is sent once the window has
    /// been stable for the debounce period (see [`Self::poll`]).
    pub fn hydrate(&mut self, view: ViewId, window: ViewportWindow, now: Instant) {
        let debounce = self.debounce;
        self.pending
            .entry(view)
            .or_insert_with(|| Debouncer::new(debounce))
            .schedule(window, now);
    }

    /// Earliest instant at which [`Self::poll`] has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().filter_map(Debouncer::deadline).min()
    }

    /// Turn every window whose debounce expired into a request.
    pub fn poll(&mut self, now: Instant, scans: &ScanCursorController) -> Vec<HydrationRequest> {
        let due: Vec<(ViewId, ViewportWindow)> = self
            .pending
            .iter_mut()
            .filter_map(|(view, debouncer)| debouncer.fire(now).map(|window| (*view, window)))
            .collect();
        due.into_iter()
            .filter_map(|(view, window)| self.request(view, window, scans))
            .collect()
    }

    /// Build a request for the records of `window` that still lack metadata
    /// and are not already being fetched. Marks them in flight.
    pub fn request(
        &mut self,
        view: ViewId,
        window: ViewportWindow,
        scans: &ScanCursorController,
    ) -> Option<HydrationRequest> {
        let state = scans.state(view)?;
        let epoch = scans.epoch(view)?;
        let flying = self.in_flight.entry(view).or_default();

        let names: Vec<KeyName> = state
            .window(&window)
            .filter(|record| record.needs_metadata())
            .filter(|record| flying.get(&record.name) != Some(&epoch))
            .take(self.max_keys)
            .map(|record| record.name.clone())
            .collect();
        if names.is_empty() {
            return None;
        }
        for name in &names {
            flying.insert(name.clone(), epoch);
        }
        debug!(%view, keys = names.len(), start = window.start_index, stop = window.stop_index, "metadata requested");
        Some(HydrationRequest { view, epoch, names })
    }

    /// Merge a response into the view's records, matching strictly by name.
    ///
    /// Records that were reset or dropped since the request was built are
    /// left alone. A failed request leaves every field `NotLoaded` so the
    /// next viewport change asks again.
    pub fn apply(
        &mut self,
        response: HydrationResponse,
        scans: &mut ScanCursorController,
    ) -> Result<usize> {
        let HydrationResponse {
            view,
            epoch,
            names,
            result,
        } = response;
        if let Some(flying) = self.in_flight.get_mut(&view) {
            for name in &names {
                if flying.get(name) == Some(&epoch) {
                    flying.remove(name);
                }
            }
        }

        let records = result.map_err(|e| {
            warn!(%view, keys = names.len(), error = %e, "metadata fetch failed");
            AppError::Hydration(e)
        })?;

        let mut applied = 0;
        for meta in &records {
            match scans.record_mut(view, epoch, &meta.name) {
                Some(record) => {
                    record.apply_metadata(meta);
                    applied += 1;
                }
                None => debug!(%view, key = %meta.name, "late metadata dropped"),
            }
        }
        Ok(applied)
    }

    /// Forget pending windows and outstanding names of the view.
    pub fn reset(&mut self, view: ViewId) {
        if let Some(debouncer) = self.pending.get_mut(&view) {
            debouncer.cancel();
        }
        self.in_flight.remove(&view);
    }

    pub fn is_in_flight(&self, view: ViewId, name: &KeyName) -> bool {
        self.in_flight
            .get(&view)
            .is_some_and(|flying| flying.contains_key(name))
    }
}

impl Default for MetadataHydrator {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE, DEFAULT_MAX_KEYS)
    }
}
