//! Lineage tracking for `SpawnWaitAll`.
//!
//! Every task and job belongs to a lineage. Work created from the root context
//! opens a fresh lineage; work created from inside a task or job joins its
//! creator's. A barrier waits for every lineage that existed when it was
//! entered, which covers all earlier work and everything it spawned since.

use std::collections::BTreeMap;

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct Lineages {
    next: u64,
    /// Outstanding units per lineage. Entries are removed when they reach zero.
    outstanding: BTreeMap<u64, usize>,
}

/// Counts outstanding work per lineage.
#[derive(Debug, Default)]
pub struct LineageTracker {
    state: Mutex<Lineages>,
    drained: Condvar,
}

impl LineageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one unit of work. `inherited` is the creator's lineage, if any.
    ///
    /// Returns the lineage the unit belongs to.
    pub fn open(
        &self,
        inherited: Option<u64>,
    ) -> u64 {
        let mut state = self.state.lock();
        let lineage = match inherited {
            Some(lineage) => lineage,
            None => {
                let lineage = state.next;
                state.next += 1;
                lineage
            }
        };
        *state.outstanding.entry(lineage).or_insert(0) += 1;
        lineage
    }

    /// Mark one unit of `lineage` as done.
    pub fn close(
        &self,
        lineage: u64,
    ) {
        let mut state = self.state.lock();
        if let Some(count) = state.outstanding.get_mut(&lineage) {
            *count -= 1;
            if *count == 0 {
                state.outstanding.remove(&lineage);
                self.drained.notify_all();
            }
        }
    }

    /// Block until no lineage opened before this call has outstanding work.
    pub fn wait_all(&self) {
        let mut state = self.state.lock();
        let cutoff = state.next;
        while state.outstanding.range(..cutoff).next().is_some() {
            self.drained.wait(&mut state);
        }
    }

    /// Number of outstanding units across all lineages.
    pub fn outstanding(&self) -> usize {
        self.state.lock().outstanding.values().sum()
    }
}
