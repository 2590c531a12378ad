//! Keeps scanning while an active search has too few visible matches.

use std::collections::HashMap;

use tracing::debug;

use crate::browse::scan::{LoadMore, ScanCursorController, ScanOutcome, ScanRequest};
use crate::browse::ViewId;
use crate::error::Result;
use crate::keyspace::backend::KeyspaceBackend;
use crate::keyspace::pattern::KeyPattern;

/// Default number of matches a search tries to fill the screen with.
pub const DEFAULT_MATCH_THRESHOLD: usize = 20;

/// Active search input.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchState {
    pub pattern: Option<KeyPattern>,
    pub match_threshold: usize,
}

impl Default for SearchState {
    fn default() -> Self {
        Self {
            pattern: None,
            match_threshold: DEFAULT_MATCH_THRESHOLD,
        }
    }
}

/// Matches among the first `counted` accumulated records of one sweep.
#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    epoch: u64,
    counted: usize,
    matches: usize,
}

#[derive(Debug, Default)]
pub struct SearchContinuation {
    state: SearchState,
    tallies: HashMap<ViewId, Tally>,
}

impl SearchContinuation {
    pub fn new(state: SearchState) -> Self {
        Self {
            state,
            tallies: HashMap::new(),
        }
    }

    pub fn state(&self) -> &SearchState {
        &self.state
    }

    pub fn set_pattern(&mut self, pattern: Option<KeyPattern>) {
        self.state.pattern = pattern;
        self.tallies.clear();
    }

    /// Accumulated keys of the view that match the active pattern.
    ///
    /// Only records added since the last call are tested; a new sweep starts
    /// the tally over.
    pub fn match_count(&mut self, view: ViewId, scans: &ScanCursorController) -> usize {
        let (Some(pattern), Some(state), Some(epoch)) =
            (&self.state.pattern, scans.state(view), scans.epoch(view))
        else {
            return 0;
        };
        let tally = self.tallies.entry(view).or_default();
        if tally.epoch != epoch || tally.counted > state.len() {
            *tally = Tally {
                epoch,
                ..Tally::default()
            };
        }
        tally.matches += (tally.counted..state.len())
            .filter_map(|index| state.get(index))
            .filter(|record| pattern.matches(&record.name))
            .count();
        tally.counted = state.len();
        tally.matches
    }

    /// Called after a batch lands. Issues another scan when a search is
    /// active, fewer than `match_threshold` matches are loaded, the sweep is
    /// not exhausted and nothing is in flight for the view.
    pub fn after_batch(
        &mut self,
        view: ViewId,
        scans: &mut ScanCursorController,
    ) -> Option<ScanRequest> {
        self.state.pattern.as_ref()?;
        if scans.is_exhausted(view) || scans.is_in_flight(view) {
            return None;
        }
        let matches = self.match_count(view, scans);
        if matches >= self.state.match_threshold {
            return None;
        }
        debug!(%view, matches, threshold = self.state.match_threshold, "search continues scanning");
        match scans.begin_load_more(view, scans.batch_size(view)) {
            LoadMore::Request(request) => Some(request),
            LoadMore::Exhausted(_) => None,
        }
    }

    /// Drive [`Self::after_batch`] to completion against `backend`.
    /// Returns the final match count.
    pub async fn run(
        &mut self,
        view: ViewId,
        scans: &mut ScanCursorController,
        backend: &dyn KeyspaceBackend,
    ) -> Result<usize> {
        while let Some(request) = self.after_batch(view, scans) {
            let response = request.execute(backend).await;
            if let ScanOutcome::Discarded = scans.apply(response)? {
                break;
            }
        }
        Ok(self.match_count(view, scans))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browse::scan::ScanSettings;
    use crate::keyspace::memory::MemoryKeyspace;

    fn search(pattern: &str, threshold: usize) -> SearchContinuation {
        SearchContinuation::new(SearchState {
            pattern: Some(KeyPattern::new(pattern).unwrap()),
            match_threshold: threshold,
        })
    }

    fn controller(batch_size: usize) -> ScanCursorController {
        ScanCursorController::new(ScanSettings {
            batch_size,
            min_count: 1,
        })
    }

    #[tokio::test]
    async fn sparse_match_sweeps_until_exhausted() {
        let mut names: Vec<String> = (0..9_999).map(|i| format!("item:{:05}", i)).collect();
        names.push("needle:1".to_string());
        let backend = MemoryKeyspace::from_names(&names);
        let mut continuation = search("needle:*", 20);

        let mut scans = controller(500);
        scans.set_filter(ViewId::List, continuation.state().pattern.clone());
        let first = scans.start(ViewId::List, 500);
        let response = first.execute(&backend).await;
        scans.apply(response).unwrap();

        let matches = continuation.run(ViewId::List, &mut scans, &backend).await.unwrap();
        assert_eq!(matches, 1);
        assert!(scans.is_exhausted(ViewId::List));
        assert_eq!(backend.scan_calls(), 20);
    }

    #[tokio::test]
    async fn stops_once_threshold_is_met() {
        let names: Vec<String> = (0..1_000).map(|i| format!("user:{:04}", i)).collect();
        let backend = MemoryKeyspace::from_names(&names);
        let mut continuation = search("user:*", 20);

        let mut scans = controller(8);
        let matches = continuation.run(ViewId::List, &mut scans, &backend).await.unwrap();
        assert!(matches >= 20);
        assert!(matches < 30);
        assert!(!scans.is_exhausted(ViewId::List));
    }

    #[tokio::test]
    async fn client_side_match_count_without_scan_filter() {
        let names: Vec<String> = (0..100)
            .map(|i| {
                if i % 10 == 0 {
                    format!("hit:{:03}", i)
                } else {
                    format!("miss:{:03}", i)
                }
            })
            .collect();
        let backend = MemoryKeyspace::from_names(&names);
        let mut continuation = search("hit:*", 15);

        let mut scans = controller(10);
        let matches = continuation.run(ViewId::List, &mut scans, &backend).await.unwrap();
        assert_eq!(matches, 10);
        assert!(scans.is_exhausted(ViewId::List));
    }

    #[tokio::test]
    async fn tally_counts_new_records_and_restarts_with_the_sweep() {
        let backend = MemoryKeyspace::from_names(["a:hit", "b:miss", "c:hit", "d:miss", "e:hit"]);
        let mut continuation = search("*hit", 100);
        let mut scans = controller(2);

        scans.load_more(ViewId::List, 2, &backend).await.unwrap();
        assert_eq!(continuation.match_count(ViewId::List, &scans), 1);
        scans.load_more(ViewId::List, 2, &backend).await.unwrap();
        assert_eq!(continuation.match_count(ViewId::List, &scans), 2);
        assert_eq!(continuation.match_count(ViewId::List, &scans), 2);

        let restart = scans.start(ViewId::List, 2);
        assert_eq!(continuation.match_count(ViewId::List, &scans), 0);
        run_request(&mut scans, restart, &backend).await;
        assert_eq!(continuation.match_count(ViewId::List, &scans), 1);

        continuation.set_pattern(Some(KeyPattern::new("*miss").unwrap()));
        assert_eq!(continuation.match_count(ViewId::List, &scans), 1);
    }

    async fn run_request(
        scans: &mut ScanCursorController,
        request: ScanRequest,
        backend: &MemoryKeyspace,
    ) {
        let response = request.execute(backend).await;
        scans.apply(response).unwrap();
    }

    #[test]
    fn inactive_search_never_continues() {
        let mut continuation = SearchContinuation::default();
        let mut scans = controller(10);
        assert!(continuation.after_batch(ViewId::List, &mut scans).is_none());
        assert!(!scans.is_in_flight(ViewId::List));
    }

    #[test]
    fn in_flight_request_blocks_continuation() {
        let mut continuation = search("a*", 20);
        let mut scans = controller(10);
        let _pending = scans.start(ViewId::List, 10);
        assert!(continuation.after_batch(ViewId::List, &mut scans).is_none());
    }
}
