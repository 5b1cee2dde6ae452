//! Per-run state: acquisition history, work queue and child supervisor.

use crate::process::ProcessSupervisor;
use crate::requirement::Requirement;
use log::trace;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

/// State shared by the orchestrator and the dependency expander for one run.
///
/// The history holds every requirement ever enqueued. Entries are never
/// removed, so a requirement reachable from several parents (or from a
/// cycle) is fetched at most once.
#[derive(Debug, Default)]
pub struct Session {
    history: HashSet<Requirement>,
    queue: VecDeque<Requirement>,
    supervisor: Arc<ProcessSupervisor>,
}

impl Session {
    /// Fresh session with its own supervisor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh session sharing an existing supervisor, e.g. one an interrupt
    /// handler already holds.
    pub fn with_supervisor(supervisor: Arc<ProcessSupervisor>) -> Self {
        Self {
            supervisor,
            ..Self::default()
        }
    }

    /// Append `requirement` to the queue unless it was seen before.
    /// Returns `true` when it was new.
    pub fn enqueue(&mut self, requirement: Requirement) -> bool {
        if self.history.contains(&requirement) {
            trace!("already seen: {}", requirement);
            return false;
        }
        self.history.insert(requirement.clone());
        self.queue.push_back(requirement);
        true
    }

    /// Next requirement in breadth-first order.
    pub fn dequeue(&mut self) -> Option<Requirement> {
        self.queue.pop_front()
    }

    /// True when `requirement` was enqueued at some point in this run.
    pub fn seen(&self, requirement: &Requirement) -> bool {
        self.history.contains(requirement)
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Supervisor for tool children started in this session.
    pub fn supervisor(&self) -> &Arc<ProcessSupervisor> {
        &self.supervisor
    }
}
