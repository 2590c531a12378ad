//! Runs tree construction on the blocking pool and reports back over the
//! event channel.

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{AppError, Result};
use crate::event::Event;
use crate::keyspace::record::KeyName;
use crate::tree::builder::{TreeBuilder, TreeRoot};

/// Work handed to the worker. Inputs are owned copies; nothing is shared
/// with the caller while the job runs.
#[derive(Debug, Clone)]
pub enum TreeJob {
    /// Full rebuild, carrying view state from `previous` where paths match.
    Build {
        keys: Vec<KeyName>,
        delimiter: String,
        previous: Option<TreeRoot>,
    },
    /// Incremental merge of new keys into a snapshot.
    Merge { tree: TreeRoot, keys: Vec<KeyName> },
}

impl TreeJob {
    pub fn run(self) -> TreeRoot {
        match self {
            TreeJob::Build {
                keys,
                delimiter,
                previous,
            } => TreeBuilder::rebuild(&keys, &delimiter, previous.as_ref()),
            TreeJob::Merge { tree, keys } => TreeBuilder::merge(tree, &keys),
        }
    }

    pub fn key_count(&self) -> usize {
        match self {
            TreeJob::Build { keys, .. } | TreeJob::Merge { keys, .. } => keys.len(),
        }
    }
}

/// Result of an offloaded job.
#[derive(Debug)]
pub struct TreeOutcome {
    pub generation: u64,
    pub result: Result<TreeRoot>,
}

/// How a submitted job was handled.
#[derive(Debug)]
pub enum Dispatch {
    /// Ran inline; the tree is ready now.
    Ready(TreeRoot),
    /// Running in the background; a [`Event::TreeReady`] will follow.
    Spawned,
}

/// Single background lane for tree jobs.
#[derive(Debug)]
pub struct TreeWorker {
    offload: bool,
    tx: Option<mpsc::UnboundedSender<Event>>,
    generation: u64,
    busy: bool,
}

impl TreeWorker {
    pub fn new(offload: bool, tx: Option<mpsc::UnboundedSender<Event>>) -> Self {
        Self {
            offload,
            tx,
            generation: 0,
            busy: false,
        }
    }

    /// Worker that always runs jobs on the caller's thread.
    pub fn inline() -> Self {
        Self::new(false, None)
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Abandon any running job. Its outcome will be rejected on arrival.
    pub fn invalidate(&mut self) -> u64 {
        self.generation += 1;
        self.busy = false;
        self.generation
    }

    /// Run `job` in the background when possible, inline otherwise.
    pub fn submit(&mut self, job: TreeJob) -> Dispatch {
        let handle = match (&self.tx, Handle::try_current()) {
            (Some(tx), Ok(handle)) if self.offload && !tx.is_closed() => {
                Some((tx.clone(), handle))
            }
            _ => None,
        };
        let Some((tx, handle)) = handle else {
            return Dispatch::Ready(job.run());
        };

        let generation = self.generation;
        let keys = job.key_count();
        self.busy = true;
        debug!(generation, keys, "tree job offloaded");

        handle.spawn(async move {
            let result = tokio::task::spawn_blocking(move || job.run())
                .await
                .map_err(|e| AppError::TreeBuild(e.to_string()));
            if tx.send(Event::TreeReady(TreeOutcome { generation, result })).is_err() {
                warn!(generation, "tree result dropped, event loop is gone");
            }
        });
        Dispatch::Spawned
    }

    /// Whether `outcome` belongs to the current generation. Accepting it
    /// frees the lane for the next job.
    pub fn accept(&mut self, outcome: &TreeOutcome) -> bool {
        if outcome.generation != self.generation {
            debug!(
                stale = outcome.generation,
                current = self.generation,
                "stale tree result discarded"
            );
            return false;
        }
        self.busy = false;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<KeyName> {
        list.iter().map(|s| KeyName::from(*s)).collect()
    }

    #[test]
    fn runs_inline_without_runtime() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut worker = TreeWorker::new(true, Some(tx));
        let job = TreeJob::Build {
            keys: names(&["a:1", "a:2"]),
            delimiter: ":".into(),
            previous: None,
        };
        match worker.submit(job) {
            Dispatch::Ready(tree) => assert_eq!(tree.node("a").unwrap().key_count, 2),
            Dispatch::Spawned => panic!("expected inline run"),
        }
        assert!(!worker.is_busy());
    }

    #[tokio::test]
    async fn offloaded_job_reports_over_channel() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut worker = TreeWorker::new(true, Some(tx));
        let job = TreeJob::Merge {
            tree: TreeBuilder::build(&names(&["a:1"]), ":"),
            keys: names(&["a:2", "b:1"]),
        };
        assert!(matches!(worker.submit(job), Dispatch::Spawned));
        assert!(worker.is_busy());

        let Some(Event::TreeReady(outcome)) = rx.recv().await else {
            panic!("expected tree event");
        };
        assert!(worker.accept(&outcome));
        assert!(!worker.is_busy());
        let tree = outcome.result.unwrap();
        assert_eq!(tree.key_count(), 3);
    }

    #[tokio::test]
    async fn disabled_offload_runs_inline() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut worker = TreeWorker::new(false, Some(tx));
        let job = TreeJob::Build {
            keys: names(&["x"]),
            delimiter: ":".into(),
            previous: None,
        };
        assert!(matches!(worker.submit(job), Dispatch::Ready(_)));
    }

    #[tokio::test]
    async fn closed_channel_falls_back_to_inline() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut worker = TreeWorker::new(true, Some(tx));
        let job = TreeJob::Build {
            keys: names(&["x"]),
            delimiter: ":".into(),
            previous: None,
        };
        assert!(matches!(worker.submit(job), Dispatch::Ready(_)));
    }

    #[tokio::test]
    async fn invalidated_outcome_is_rejected() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut worker = TreeWorker::new(true, Some(tx));
        let job = TreeJob::Build {
            keys: names(&["a:1"]),
            delimiter: ":".into(),
            previous: None,
        };
        worker.submit(job);
        assert_eq!(worker.invalidate(), 1);

        let Some(Event::TreeReady(outcome)) = rx.recv().await else {
            panic!("expected tree event");
        };
        assert_eq!(outcome.generation, 0);
        assert!(!worker.accept(&outcome));
    }
}
