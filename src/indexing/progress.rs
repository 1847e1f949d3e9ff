//! Hierarchical progress and ETA estimation for long synchronization runs.
//!
//! Purely observational: nothing here feeds back into the walk.

use std::time::{Duration, Instant};
use tracing::info;

/// Index of a node inside a [`ProgressTree`]
pub type ProgressId = usize;

#[derive(Debug, Clone)]
struct ProgressNode {
    /// Share of the whole run this node stands for
    weight: f64,
    expected: u64,
    ticks: u64,
}

/// A tree of work estimates.
///
/// Each node expects a number of units. A unit is either ticked directly or
/// handed to a child node spawned for it, which splits that unit further.
/// Completeness is the sum of every finished fraction, so it never exceeds 1.
#[derive(Debug, Clone)]
pub struct ProgressTree {
    nodes: Vec<ProgressNode>,
    done: f64,
    started: Instant,
}

impl ProgressTree {
    pub const ROOT: ProgressId = 0;

    pub fn new(expected: u64) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            done: 0.0,
            started: Instant::now(),
        };
        tree.push(1.0, expected);
        tree
    }

    fn push(&mut self, weight: f64, expected: u64) -> ProgressId {
        if expected == 0 {
            self.done += weight;
        }
        self.nodes.push(ProgressNode {
            weight,
            expected,
            ticks: 0,
        });
        self.nodes.len() - 1
    }

    /// Claim one unit of `parent` for a sub-task of `expected` units
    pub fn spawn(&mut self, parent: ProgressId, expected: u64) -> ProgressId {
        let unit = self.claim_unit(parent);
        self.push(unit, expected)
    }

    /// Finish one unit of `node`
    pub fn tick(&mut self, node: ProgressId) {
        self.done += self.claim_unit(node);
    }

    fn claim_unit(&mut self, node: ProgressId) -> f64 {
        let entry = &mut self.nodes[node];
        if entry.ticks >= entry.expected {
            return 0.0;
        }
        entry.ticks += 1;
        entry.weight / entry.expected as f64
    }

    /// Finished fraction of the whole run, in `[0, 1]`
    pub fn completeness(&self) -> f64 {
        self.done.clamp(0.0, 1.0)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Linear extrapolation of the remaining time
    pub fn eta(&self) -> Option<Duration> {
        let done = self.completeness();
        if done <= 0.0 {
            return None;
        }
        let remaining = self.elapsed().as_secs_f64() * (1.0 - done) / done;
        Some(Duration::from_secs_f64(remaining))
    }
}

/// Progress as shown to the caller
#[derive(Debug, Clone)]
pub struct ProgressSnapshot {
    pub completeness: f64,
    pub eta: Option<Duration>,
    pub elapsed: Duration,
    /// Entries handled so far
    pub processed: u64,
    /// Entry being handled when the snapshot was taken
    pub current: Option<String>,
    pub finished: bool,
}

/// Receives progress snapshots during a synchronization run
pub trait ProgressSink {
    fn report(&mut self, snapshot: &ProgressSnapshot);
}

impl ProgressSink for () {
    fn report(&mut self, _snapshot: &ProgressSnapshot) {}
}

impl<F: FnMut(&ProgressSnapshot)> ProgressSink for F {
    fn report(&mut self, snapshot: &ProgressSnapshot) {
        self(snapshot);
    }
}

/// Forwards snapshots to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn report(&mut self, snapshot: &ProgressSnapshot) {
        let percent = snapshot.completeness * 100.0;
        match (snapshot.finished, snapshot.eta) {
            (true, _) => info!(
                processed = snapshot.processed,
                elapsed_secs = snapshot.elapsed.as_secs(),
                "Index update finished"
            ),
            (false, Some(eta)) => info!(
                processed = snapshot.processed,
                eta_secs = eta.as_secs(),
                current = snapshot.current.as_deref().unwrap_or(""),
                "Index update {:.1}% done",
                percent
            ),
            (false, None) => {
                info!(processed = snapshot.processed, "Index update {:.1}% done", percent)
            }
        }
    }
}

/// Drives a [`ProgressTree`] and throttles what reaches the sink
pub struct ProgressReporter<'s> {
    tree: ProgressTree,
    sink: &'s mut dyn ProgressSink,
    interval: Duration,
    last_report: Option<Instant>,
    processed: u64,
}

impl<'s> ProgressReporter<'s> {
    pub fn new(expected: u64, sink: &'s mut dyn ProgressSink, interval: Duration) -> Self {
        Self {
            tree: ProgressTree::new(expected),
            sink,
            interval,
            last_report: None,
            processed: 0,
        }
    }

    pub fn tree_mut(&mut self) -> &mut ProgressTree {
        &mut self.tree
    }

    /// Count one handled entry and report if the interval has passed
    pub fn step(&mut self, current: impl FnOnce() -> String) {
        self.processed += 1;

        let due = self
            .last_report
            .map_or(true, |last| last.elapsed() >= self.interval);
        if due {
            let snapshot = self.snapshot(Some(current()), false);
            self.sink.report(&snapshot);
            self.last_report = Some(Instant::now());
        }
    }

    /// Always reports, regardless of the interval
    pub fn finish(&mut self) {
        let snapshot = self.snapshot(None, true);
        self.sink.report(&snapshot);
    }

    fn snapshot(&self, current: Option<String>, finished: bool) -> ProgressSnapshot {
        ProgressSnapshot {
            completeness: self.tree.completeness(),
            eta: self.tree.eta(),
            elapsed: self.tree.elapsed(),
            processed: self.processed,
            current,
            finished,
        }
    }
}
