//! Due-task computation over a parsed definition and persisted run state.
//!
//! [`HeartbeatScheduler`] is synchronous and never fails: a missing
//! definition yields no tasks, a broken state file yields no history, and a
//! failed save only costs durability across restarts.

use crate::scheduler::definition::{SkippedLine, parse_definition};
use crate::scheduler::state::{RunState, RunStateStore};
use crate::scheduler::tasks::{ScheduleKind, ScheduledTask};
use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Where the schedule definition text comes from.
#[derive(Debug, Clone)]
pub enum DefinitionSource {
    /// Read from a Markdown file on every load.
    File(PathBuf),
    /// Literal definition text.
    Inline(String),
}

impl DefinitionSource {
    fn read(&self) -> crate::Result<String> {
        match self {
            Self::File(path) => std::fs::read_to_string(path).map_err(|e| {
                crate::HeartbeatError::Definition(format!("cannot read {}: {e}", path.display()))
            }),
            Self::Inline(text) => Ok(text.clone()),
        }
    }
}

/// Diagnostic view of the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerSummary {
    /// Whether [`HeartbeatScheduler::load`] has been called.
    pub loaded: bool,
    /// Number of loaded tasks.
    pub total_tasks: usize,
    /// Task count per schedule kind.
    pub by_type: BTreeMap<ScheduleKind, usize>,
    /// Schedule kind per task name.
    pub tasks: BTreeMap<String, ScheduleKind>,
    /// Task lines dropped by the last load.
    pub skipped_lines: usize,
}

/// Heartbeat scheduler: parsed tasks plus their last-run times.
pub struct HeartbeatScheduler {
    source: DefinitionSource,
    store: RunStateStore,
    tasks: HashMap<String, ScheduledTask>,
    run_state: RunState,
    skipped: Vec<SkippedLine>,
    loaded: bool,
}

impl HeartbeatScheduler {
    /// Create an unloaded scheduler. Call [`Self::load`] before querying.
    pub fn new(source: DefinitionSource, store: RunStateStore) -> Self {
        Self {
            source,
            store,
            tasks: HashMap::new(),
            run_state: RunState::new(),
            skipped: Vec::new(),
            loaded: false,
        }
    }

    /// Scheduler reading `definition` and persisting to `state`.
    pub fn from_paths(definition: impl Into<PathBuf>, state: impl Into<PathBuf>) -> Self {
        Self::new(
            DefinitionSource::File(definition.into()),
            RunStateStore::new(state),
        )
    }

    /// Reparse the definition and reload run state from disk.
    ///
    /// Replaces the task set entirely and discards in-memory run state in
    /// favour of what is on disk. Returns the number of loaded tasks.
    pub fn load(&mut self) -> usize {
        let parsed = match self.source.read() {
            Ok(text) => parse_definition(&text),
            Err(e) => {
                warn!("heartbeat definition unavailable: {e}");
                Default::default()
            }
        };

        self.tasks = parsed.tasks;
        self.skipped = parsed.skipped;
        self.run_state = self.store.load();
        self.loaded = true;

        info!(
            tasks = self.tasks.len(),
            skipped = self.skipped.len(),
            "heartbeat schedule loaded"
        );
        self.tasks.len()
    }

    /// Non-sequential tasks due at `now`, in unspecified order.
    pub fn due_tasks(&self, now: NaiveDateTime) -> Vec<ScheduledTask> {
        self.tasks
            .values()
            .filter(|task| !task.is_sequential())
            .filter(|task| task.is_due(self.run_state.get(&task.name).copied(), now))
            .cloned()
            .collect()
    }

    /// [`Self::due_tasks`] against the local system clock.
    pub fn due_tasks_now(&self) -> Vec<ScheduledTask> {
        self.due_tasks(Local::now().naive_local())
    }

    /// Every task from a sequential section, regardless of timing.
    pub fn sequential_tasks(&self) -> Vec<ScheduledTask> {
        self.tasks
            .values()
            .filter(|task| task.is_sequential())
            .cloned()
            .collect()
    }

    /// Split tasks into `(parallel_safe, not_parallel_safe)`, preserving order.
    pub fn partition_parallel(
        tasks: Vec<ScheduledTask>,
    ) -> (Vec<ScheduledTask>, Vec<ScheduledTask>) {
        tasks.into_iter().partition(|task| task.parallel_safe)
    }

    /// Record completion at the current local time and persist.
    pub fn mark_completed(&mut self, name: &str) {
        self.mark_completed_at(name, Local::now().naive_local());
    }

    /// Record completion at `at` and persist. Unknown names are recorded too.
    pub fn mark_completed_at(&mut self, name: &str, at: NaiveDateTime) {
        if !self.tasks.contains_key(name) {
            debug!(task = name, "marking unknown heartbeat task completed");
        }
        self.run_state.insert(name.to_owned(), at);
        self.store.save(&self.run_state);
        debug!(task = name, at = %at, "heartbeat task completed");
    }

    /// Last completion time of `name`, if any.
    pub fn last_run(&self, name: &str) -> Option<NaiveDateTime> {
        self.run_state.get(name).copied()
    }

    /// Look up a loaded task.
    pub fn task(&self, name: &str) -> Option<&ScheduledTask> {
        self.tasks.get(name)
    }

    /// All loaded tasks, in unspecified order.
    pub fn tasks(&self) -> impl Iterator<Item = &ScheduledTask> {
        self.tasks.values()
    }

    /// Snapshot of loaded task names.
    pub fn task_names(&self) -> Vec<String> {
        self.tasks.keys().cloned().collect()
    }

    /// Task lines dropped by the last load.
    pub fn skipped_lines(&self) -> &[SkippedLine] {
        &self.skipped
    }

    /// Whether [`Self::load`] has been called.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Run-state store backing this scheduler.
    pub fn store(&self) -> &RunStateStore {
        &self.store
    }

    /// Diagnostic summary.
    pub fn summary(&self) -> SchedulerSummary {
        let mut by_type = BTreeMap::new();
        let mut tasks = BTreeMap::new();
        for task in self.tasks.values() {
            let kind = task.schedule.kind();
            *by_type.entry(kind).or_insert(0) += 1;
            tasks.insert(task.name.clone(), kind);
        }

        SchedulerSummary {
            loaded: self.loaded,
            total_tasks: self.tasks.len(),
            by_type,
            tasks,
            skipped_lines: self.skipped.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::scheduler::tasks::Schedule;
    use chrono::{NaiveDate, TimeDelta};

    const DEFINITION: &str = "\
## Every 15 minutes
- heartbeat_check: Check system health (parallel_safe: true)
## Daily 07:00
- morning_brief: Send morning summary
## Weekly Monday 09:00
- weekly_review: Review the week (parallel_safe: false)
## Sequential
- sync_state: Always runs
";

    fn at(d: u32, hh: u32, mm: u32, ss: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, d)
            .unwrap()
            .and_hms_opt(hh, mm, ss)
            .unwrap()
    }

    fn make_scheduler(text: &str) -> HeartbeatScheduler {
        let mut scheduler = HeartbeatScheduler::new(
            DefinitionSource::Inline(text.to_owned()),
            RunStateStore::in_memory(),
        );
        scheduler.load();
        scheduler
    }

    fn names(tasks: &[ScheduledTask]) -> Vec<&str> {
        let mut names: Vec<&str> = tasks.iter().map(|t| t.name.as_str()).collect();
        names.sort_unstable();
        names
    }

    #[test]
    fn new_scheduler_is_not_loaded() {
        let scheduler = HeartbeatScheduler::new(
            DefinitionSource::Inline(String::new()),
            RunStateStore::in_memory(),
        );
        let summary = scheduler.summary();
        assert!(!summary.loaded);
        assert_eq!(summary.total_tasks, 0);
        assert!(scheduler.due_tasks(at(2, 7, 0, 0)).is_empty());
    }

    #[test]
    fn loaded_empty_definition_is_distinguishable() {
        let scheduler = make_scheduler("");
        assert!(scheduler.is_loaded());
        assert!(scheduler.summary().loaded);
        assert_eq!(scheduler.summary().total_tasks, 0);
    }

    #[test]
    fn missing_definition_file_loads_zero_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let mut scheduler = HeartbeatScheduler::from_paths(
            dir.path().join("missing.md"),
            dir.path().join("state.json"),
        );
        assert_eq!(scheduler.load(), 0);
        assert!(scheduler.is_loaded());
    }

    #[test]
    fn due_tasks_exclude_sequential() {
        let scheduler = make_scheduler(DEFINITION);
        // Monday 2026-03-02 09:00: every timed rule except daily matches.
        let due = scheduler.due_tasks(at(2, 9, 0, 0));
        assert_eq!(names(&due), vec!["heartbeat_check", "weekly_review"]);
        assert_eq!(names(&scheduler.sequential_tasks()), vec!["sync_state"]);
    }

    #[test]
    fn interval_cycle_after_completion() {
        let mut scheduler = make_scheduler("## Every 30 minutes\n- tick: Tick\n");
        let now = at(2, 12, 0, 0);
        assert_eq!(names(&scheduler.due_tasks(now)), vec!["tick"]);

        scheduler.mark_completed_at("tick", now);
        assert!(scheduler.due_tasks(now + TimeDelta::minutes(29)).is_empty());
        assert_eq!(
            names(&scheduler.due_tasks(now + TimeDelta::minutes(30))),
            vec!["tick"]
        );
    }

    #[test]
    fn daily_once_per_day() {
        let mut scheduler = make_scheduler("## Daily 06:00\n- wake: Wake up\n");
        scheduler.mark_completed_at("wake", at(2, 6, 1, 0));
        assert!(scheduler.due_tasks(at(2, 6, 30, 0)).is_empty());
        assert_eq!(names(&scheduler.due_tasks(at(3, 6, 0, 0))), vec!["wake"]);
    }

    #[test]
    fn partition_is_a_pure_filter() {
        let scheduler = make_scheduler(DEFINITION);
        let due = scheduler.due_tasks(at(2, 9, 0, 0));
        let total = due.len();
        let (parallel, serial) = HeartbeatScheduler::partition_parallel(due);

        assert_eq!(parallel.len() + serial.len(), total);
        assert!(parallel.iter().all(|t| t.parallel_safe));
        assert!(serial.iter().all(|t| !t.parallel_safe));
        assert_eq!(names(&parallel), vec!["heartbeat_check"]);
        assert_eq!(names(&serial), vec!["weekly_review"]);
    }

    #[test]
    fn partition_ignores_sequential_flag_and_keeps_duplicates() {
        let seq = ScheduledTask::new("s", "S", Schedule::Sequential);
        let mut serial = ScheduledTask::new("x", "X", Schedule::Interval { minutes: 1 });
        serial.parallel_safe = false;
        let input = vec![seq.clone(), serial.clone(), seq.clone()];

        let (parallel, rest) = HeartbeatScheduler::partition_parallel(input);
        assert_eq!(parallel, vec![seq.clone(), seq]);
        assert_eq!(rest, vec![serial]);
    }

    #[test]
    fn mark_unknown_task_creates_entry() {
        let mut scheduler = make_scheduler(DEFINITION);
        scheduler.mark_completed_at("ghost", at(2, 1, 0, 0));
        assert_eq!(scheduler.last_run("ghost"), Some(at(2, 1, 0, 0)));
        assert!(scheduler.task("ghost").is_none());
    }

    #[test]
    fn mark_completed_uses_clock() {
        let mut scheduler = make_scheduler(DEFINITION);
        let before = Local::now().naive_local();
        scheduler.mark_completed("heartbeat_check");
        let recorded = scheduler.last_run("heartbeat_check").unwrap();
        assert!(recorded >= before);
    }

    #[test]
    fn reload_replaces_in_memory_state_with_disk() {
        let dir = tempfile::tempdir().unwrap();
        let def_path = dir.path().join("HEARTBEAT.md");
        std::fs::write(&def_path, DEFINITION).unwrap();

        let mut scheduler = HeartbeatScheduler::new(
            DefinitionSource::File(def_path.clone()),
            RunStateStore::new(dir.path().join("state.json")),
        );
        scheduler.load();
        scheduler.mark_completed_at("heartbeat_check", at(2, 7, 0, 0));

        // State on disk disappears behind the scheduler's back.
        scheduler.store().clear().unwrap();
        std::fs::write(&def_path, "## Daily 08:00\n- only: Only task\n").unwrap();

        assert_eq!(scheduler.load(), 1);
        assert_eq!(scheduler.task_names(), vec!["only".to_owned()]);
        assert!(scheduler.last_run("heartbeat_check").is_none());
    }

    #[test]
    fn summary_counts_by_type() {
        let scheduler = make_scheduler(
            "## Every 5 minutes\n- a: A\n- b: B\n## Daily 07:00\n- c: C\n## Sequential\n- d: D\n## Junk\n- e: E\n",
        );
        let summary = scheduler.summary();
        assert!(summary.loaded);
        assert_eq!(summary.total_tasks, 4);
        assert_eq!(summary.by_type[&ScheduleKind::Interval], 2);
        assert_eq!(summary.by_type[&ScheduleKind::Daily], 1);
        assert_eq!(summary.by_type[&ScheduleKind::Sequential], 1);
        assert!(!summary.by_type.contains_key(&ScheduleKind::Weekly));
        assert_eq!(summary.tasks["c"], ScheduleKind::Daily);
        assert_eq!(summary.skipped_lines, 1);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["by_type"]["interval"], 2);
        assert_eq!(json["tasks"]["d"], "sequential");
    }
}
