//! Scheduled task definitions.
//!
//! Defines the [`ScheduledTask`] type, the [`Schedule`] enum for timing and
//! the due-time predicate, plus the result/record types the runner emits.

use chrono::{Datelike, NaiveDateTime, TimeDelta, Timelike, Weekday};
use serde::{Deserialize, Serialize};

/// Weekly tasks are suppressed while fewer than this many whole days have
/// passed since their last run.
const WEEKLY_COOLDOWN_DAYS: i64 = 6;

/// How a task is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Schedule {
    /// Run every N minutes.
    Interval {
        /// Minutes between runs (always positive).
        minutes: u32,
    },
    /// Run once per calendar day, from the given local time onwards within
    /// that hour.
    Daily {
        /// Hour of day (0-23).
        hour: u32,
        /// Minute of hour (0-59).
        min: u32,
    },
    /// Run once per week on the given weekday.
    Weekly {
        /// Day of week.
        day: Weekday,
        /// Hour of day (0-23).
        hour: u32,
        /// Minute of hour (0-59).
        min: u32,
    },
    /// Run on every tick of the caller's loop, bypassing timing.
    Sequential,
}

/// Discriminator of a [`Schedule`], used for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    Interval,
    Daily,
    Weekly,
    Sequential,
}

impl ScheduleKind {
    /// Lowercase name as used in summaries.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Interval => "interval",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Sequential => "sequential",
        }
    }
}

impl std::fmt::Display for ScheduleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Schedule {
    /// Returns the discriminator for this schedule.
    pub fn kind(&self) -> ScheduleKind {
        match self {
            Self::Interval { .. } => ScheduleKind::Interval,
            Self::Daily { .. } => ScheduleKind::Daily,
            Self::Weekly { .. } => ScheduleKind::Weekly,
            Self::Sequential => ScheduleKind::Sequential,
        }
    }
}

impl std::fmt::Display for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Interval { minutes: 60 } => write!(f, "every hour"),
            Self::Interval { minutes } if *minutes >= 60 && minutes % 60 == 0 => {
                write!(f, "every {} hours", minutes / 60)
            }
            Self::Interval { minutes: 1 } => write!(f, "every minute"),
            Self::Interval { minutes } => write!(f, "every {minutes} minutes"),
            Self::Daily { hour, min } => write!(f, "daily at {hour:02}:{min:02}"),
            Self::Weekly { day, hour, min } => {
                write!(f, "weekly on {} at {hour:02}:{min:02}", weekday_name(*day))
            }
            Self::Sequential => write!(f, "sequential"),
        }
    }
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// A task parsed from the schedule definition. Immutable after parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTask {
    /// Unique task name (e.g. `"morning_brief"`).
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// When the task runs.
    pub schedule: Schedule,
    /// Hint that the runner may execute this task alongside other due tasks.
    pub parallel_safe: bool,
}

impl ScheduledTask {
    /// Create a parallel-safe task with the given schedule.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        schedule: Schedule,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schedule,
            parallel_safe: true,
        }
    }

    /// Returns `true` for tasks that run on every tick.
    pub fn is_sequential(&self) -> bool {
        matches!(self.schedule, Schedule::Sequential)
    }

    /// Returns `true` if the task is due at `now` given its last completion.
    ///
    /// Daily and weekly windows have no upper bound: once the target minute
    /// has passed in the target hour, the task stays due for the rest of that
    /// hour until it is marked completed. Sequential tasks are never due
    /// through this predicate.
    pub fn is_due(&self, last_run: Option<NaiveDateTime>, now: NaiveDateTime) -> bool {
        match self.schedule {
            Schedule::Interval { minutes } => match last_run {
                None => true,
                Some(last) => {
                    now.signed_duration_since(last) >= TimeDelta::minutes(i64::from(minutes))
                }
            },
            Schedule::Daily { hour, min } => {
                if last_run.is_some_and(|last| last.date() == now.date()) {
                    return false;
                }
                now.hour() == hour && now.minute() >= min
            }
            Schedule::Weekly { day, hour, min } => {
                if last_run.is_some_and(|last| {
                    now.signed_duration_since(last).num_days() < WEEKLY_COOLDOWN_DAYS
                }) {
                    return false;
                }
                now.weekday() == day && now.hour() == hour && now.minute() >= min
            }
            Schedule::Sequential => false,
        }
    }
}

/// Outcome of executing a task, as reported by an executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskResult {
    /// Task completed successfully with a summary message.
    Success(String),
    /// Task failed with an error message.
    Error(String),
}

impl TaskResult {
    /// Summary line for history records.
    pub fn summary(&self) -> String {
        match self {
            Self::Success(msg) => msg.clone(),
            Self::Error(err) => format!("error: {err}"),
        }
    }

    /// Returns `true` for [`TaskResult::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Which phase of a tick a task ran in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    /// Due and parallel-safe; ran concurrently with its peers.
    Parallel,
    /// Due but not parallel-safe; ran alone.
    Serial,
    /// From the sequential section; runs every tick.
    Sequential,
}

/// Terminal outcome of one task run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskRunOutcome {
    Success,
    Error,
}

/// One task execution, emitted by the runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRunRecord {
    /// Task name.
    pub name: String,
    /// Phase the task ran in.
    pub phase: RunPhase,
    /// Tick reference time the run belongs to.
    pub started_at: NaiveDateTime,
    /// Wall-clock completion time.
    pub finished_at: NaiveDateTime,
    /// Outcome of the run.
    pub outcome: TaskRunOutcome,
    /// Short summary of the result.
    pub summary: String,
}
