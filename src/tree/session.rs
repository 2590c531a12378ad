use tracing::{debug, warn};

use crate::keyspace::record::KeyName;
use crate::tree::builder::{TreeBuilder, TreeRoot};
use crate::tree::worker::{Dispatch, TreeJob, TreeOutcome, TreeWorker};

/// The tree of one view: the snapshot on screen plus the worker feeding it.
///
/// Merges are serialized. Batches arriving while a job runs are queued and
/// merged together once it returns.
#[derive(Debug)]
pub struct TreeSession {
    tree: TreeRoot,
    worker: TreeWorker,
    queued: Vec<KeyName>,
}

impl TreeSession {
    pub fn new(delimiter: &str, worker: TreeWorker) -> Self {
        Self {
            tree: TreeRoot::empty(delimiter),
            worker,
            queued: Vec::new(),
        }
    }

    pub fn tree(&self) -> &TreeRoot {
        &self.tree
    }

    pub fn delimiter(&self) -> &str {
        &self.tree.delimiter
    }

    pub fn is_building(&self) -> bool {
        self.worker.is_busy()
    }

    /// Full rebuild from `keys`, keeping open nodes and selection.
    pub fn populate(&mut self, keys: Vec<KeyName>) {
        self.worker.invalidate();
        self.queued.clear();
        let job = TreeJob::Build {
            keys,
            delimiter: self.tree.delimiter.clone(),
            previous: Some(self.tree.clone()),
        };
        self.dispatch(job);
    }

    /// Drop the tree along with its view state.
    pub fn clear(&mut self) {
        self.worker.invalidate();
        self.queued.clear();
        self.tree = TreeRoot::empty(&self.tree.delimiter);
    }

    /// Switch delimiter. Open nodes and selection do not survive.
    pub fn set_delimiter(&mut self, delimiter: &str, keys: Vec<KeyName>) {
        debug!(delimiter, keys = keys.len(), "tree delimiter changed");
        self.worker.invalidate();
        self.queued.clear();
        self.tree = TreeRoot::empty(delimiter);
        let job = TreeJob::Build {
            keys,
            delimiter: delimiter.to_string(),
            previous: None,
        };
        self.dispatch(job);
    }

    /// Merge the names a scan batch added.
    pub fn on_batch(&mut self, added: &[KeyName]) {
        if added.is_empty() {
            return;
        }
        if self.worker.is_busy() {
            self.queued.extend_from_slice(added);
            return;
        }
        let job = TreeJob::Merge {
            tree: self.tree.clone(),
            keys: added.to_vec(),
        };
        self.dispatch(job);
    }

    /// Install a background result. A failed job is replaced by an inline
    /// rebuild over `all_keys`. Returns whether the outcome was current.
    pub fn on_outcome<F>(&mut self, outcome: TreeOutcome, all_keys: F) -> bool
    where
        F: FnOnce() -> Vec<KeyName>,
    {
        if !self.worker.accept(&outcome) {
            return false;
        }
        match outcome.result {
            Ok(tree) => self.install(tree),
            Err(e) => {
                warn!(error = %e, "tree worker failed, rebuilding inline");
                self.queued.clear();
                let tree = TreeBuilder::rebuild(&all_keys(), &self.tree.delimiter, Some(&self.tree));
                self.install(tree);
            }
        }
        self.flush_queue();
        true
    }

    pub fn toggle(&mut self, path: &str) -> Option<bool> {
        self.tree.toggle(path)
    }

    pub fn set_open(&mut self, path: &str, open: bool) -> bool {
        self.tree.set_open(path, open)
    }

    pub fn select_leaf(&mut self, name: &KeyName) -> bool {
        self.tree.select_leaf(name)
    }

    fn dispatch(&mut self, job: TreeJob) {
        if let Dispatch::Ready(tree) = self.worker.submit(job) {
            self.install(tree);
        }
    }

    /// Open state may have changed on the live tree while the job ran.
    fn install(&mut self, mut tree: TreeRoot) {
        tree.adopt_view_state(&self.tree);
        self.tree = tree;
    }

    fn flush_queue(&mut self) {
        if self.queued.is_empty() {
            return;
        }
        let keys = std::mem::take(&mut self.queued);
        let job = TreeJob::Merge {
            tree: self.tree.clone(),
            keys,
        };
        self.dispatch(job);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::event::Event;
    use tokio::sync::mpsc;

    fn names(list: &[&str]) -> Vec<KeyName> {
        list.iter().map(|s| KeyName::from(*s)).collect()
    }

    async fn next_outcome(rx: &mut mpsc::UnboundedReceiver<Event>) -> TreeOutcome {
        match rx.recv().await {
            Some(Event::TreeReady(outcome)) => outcome,
            other => panic!("expected tree event, got {:?}", other),
        }
    }

    #[test]
    fn inline_session_merges_batches() {
        let mut session = TreeSession::new(":", TreeWorker::inline());
        session.populate(names(&["a:1", "b:1"]));
        session.on_batch(&names(&["a:2", "c"]));
        assert_eq!(session.tree().key_count(), 4);
        assert_eq!(session.tree().node("a").unwrap().key_count, 2);
        assert_eq!(session.tree().ungrouped().len(), 1);
    }

    #[test]
    fn open_state_survives_repopulate() {
        let mut session = TreeSession::new(":", TreeWorker::inline());
        session.populate(names(&["a:b:1", "a:c:1"]));
        assert_eq!(session.toggle("a"), Some(true));
        session.populate(names(&["a:b:1", "a:c:1", "a:d:1"]));
        assert!(session.tree().node("a").unwrap().is_open);
    }

    #[test]
    fn delimiter_change_rebuilds_from_scratch() {
        let mut session = TreeSession::new(":", TreeWorker::inline());
        let keys = names(&["a/b:1", "a/b:2"]);
        session.populate(keys.clone());
        session.toggle("a/b");
        session.set_delimiter("/", keys);
        assert_eq!(session.delimiter(), "/");
        assert!(session.tree().open_paths().is_empty());
        assert_eq!(session.tree().node("a").unwrap().key_count, 2);
    }

    #[test]
    fn clear_drops_everything() {
        let mut session = TreeSession::new(":", TreeWorker::inline());
        session.populate(names(&["a:1"]));
        session.toggle("a");
        session.clear();
        assert_eq!(session.tree().key_count(), 0);
        assert!(session.tree().open_paths().is_empty());
    }

    #[tokio::test]
    async fn batches_queue_while_worker_is_busy() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut session = TreeSession::new(":", TreeWorker::new(true, Some(tx)));

        session.populate(names(&["a:1"]));
        assert!(session.is_building());
        session.on_batch(&names(&["a:2"]));
        session.on_batch(&names(&["b:1"]));

        let first = next_outcome(&mut rx).await;
        assert!(session.on_outcome(first, Vec::new));
        assert_eq!(session.tree().key_count(), 1);
        assert!(session.is_building());

        let second = next_outcome(&mut rx).await;
        assert!(session.on_outcome(second, Vec::new));
        assert!(!session.is_building());
        assert_eq!(session.tree().key_count(), 3);
    }

    #[tokio::test]
    async fn toggles_during_flight_are_kept() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut session = TreeSession::new(":", TreeWorker::new(true, Some(tx)));
        session.populate(names(&["a:1", "b:1"]));
        let outcome = next_outcome(&mut rx).await;
        session.on_outcome(outcome, Vec::new);

        session.on_batch(&names(&["a:2"]));
        session.toggle("b");
        let outcome = next_outcome(&mut rx).await;
        session.on_outcome(outcome, Vec::new);

        assert!(session.tree().node("b").unwrap().is_open);
        assert!(!session.tree().node("a").unwrap().is_open);
        assert_eq!(session.tree().node("a").unwrap().key_count, 2);
    }

    #[tokio::test]
    async fn failed_job_falls_back_to_inline_rebuild() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut session = TreeSession::new(":", TreeWorker::new(true, Some(tx)));
        session.populate(names(&["a:1"]));
        let real = next_outcome(&mut rx).await;

        let failed = TreeOutcome {
            generation: real.generation,
            result: Err(AppError::TreeBuild("worker panicked".into())),
        };
        assert!(session.on_outcome(failed, || names(&["a:1", "a:2", "z"])));
        assert_eq!(session.tree().key_count(), 3);
        assert!(!session.is_building());
    }

    #[tokio::test]
    async fn stale_outcome_after_delimiter_change_is_ignored() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut session = TreeSession::new(":", TreeWorker::new(true, Some(tx)));
        session.populate(names(&["a:1"]));
        session.set_delimiter("/", names(&["a/1"]));

        let mut accepted = 0;
        for _ in 0..2 {
            let outcome = next_outcome(&mut rx).await;
            if session.on_outcome(outcome, Vec::new) {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 1);
        assert_eq!(session.tree().delimiter, "/");
        assert!(session.tree().node("a").is_some());
    }
}
