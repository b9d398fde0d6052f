use crate::modules::{ModuleResult, Status};
use crate::plan::Task;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Receives task lifecycle events from the engine. Tasks passed here are
/// already rendered for the machine they ran on.
pub trait TaskReporter: Send + Sync {
    fn task_started(&self, _host: &str, _task: &Task) {}

    fn task_retrying(&self, _host: &str, _task: &Task, _attempt: u32, _result: &ModuleResult) {}

    fn task_finished(&self, host: &str, task: &Task, result: &ModuleResult);
}

/// Reporter that drops every event.
#[derive(Debug, Default)]
pub struct SilentReporter;

impl TaskReporter for SilentReporter {
    fn task_finished(&self, _host: &str, _task: &Task, _result: &ModuleResult) {}
}

/// Per-host counts of task outcomes.
#[derive(Debug, Default)]
pub struct PlanStats {
    counts: Mutex<BTreeMap<String, BTreeMap<Status, usize>>>,
}

impl PlanStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, host: &str, status: Status) {
        let mut counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        *counts
            .entry(host.to_string())
            .or_default()
            .entry(status)
            .or_default() += 1;
    }

    pub fn count(&self, host: &str, status: Status) -> usize {
        let counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        counts
            .get(host)
            .and_then(|c| c.get(&status))
            .copied()
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> BTreeMap<String, BTreeMap<Status, usize>> {
        self.counts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_count_per_host() {
        let stats = PlanStats::new();
        stats.record("a", Status::Changed);
        stats.record("a", Status::Changed);
        stats.record("a", Status::Ignored);
        stats.record("b", Status::Ok);

        assert_eq!(stats.count("a", Status::Changed), 2);
        assert_eq!(stats.count("a", Status::Ignored), 1);
        assert_eq!(stats.count("b", Status::Failure), 0);
        assert_eq!(stats.snapshot().len(), 2);
    }
}
