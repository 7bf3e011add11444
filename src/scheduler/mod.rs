//! Heartbeat task scheduler.
//!
//! Parses a Markdown schedule definition into typed rules, persists the
//! last completion time of each task, and answers "what is due now". The
//! optional [`runner`] drives it on a timer.

pub mod definition;
pub mod heartbeat;
pub mod runner;
pub mod state;
pub mod tasks;

pub use definition::{ParsedDefinition, SkipReason, SkippedLine, parse_definition, parse_definition_strict};
pub use heartbeat::{DefinitionSource, HeartbeatScheduler, SchedulerSummary};
pub use runner::{HeartbeatRunner, TaskExecutor, TickReport};
pub use state::{RunState, RunStateStore};
pub use tasks::{Schedule, ScheduleKind, ScheduledTask, TaskResult, TaskRunRecord};
