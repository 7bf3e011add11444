//! Heartbeat: a declarative task scheduler for a personal companion daemon.
//!
//! A Markdown file describes recurring tasks in sections:
//!
//! ```text
//! ## Every 15 minutes
//! - heartbeat_check: Check system health (parallel_safe: true)
//! ## Daily 07:00
//! - morning_brief: Send morning summary
//! ## Sequential
//! - sync_state: Always runs
//! ```
//!
//! # Architecture
//!
//! - **Definition parsing** ([`scheduler::definition`]): lenient,
//!   line-oriented grammar into typed [`Schedule`] rules
//! - **Run state** ([`scheduler::state`]): last completion time per task,
//!   persisted as JSON
//! - **Scheduler** ([`HeartbeatScheduler`]): due-time queries and completion
//!   tracking; synchronous and infallible
//! - **Runner** ([`HeartbeatRunner`]): optional tokio tick loop that
//!   dispatches due tasks to a caller-supplied executor

pub mod config;
pub mod error;
pub mod heartbeat_dirs;
pub mod scheduler;

pub use config::HeartbeatConfig;
pub use error::{HeartbeatError, Result};
pub use scheduler::{
    DefinitionSource, HeartbeatRunner, HeartbeatScheduler, RunStateStore, Schedule,
    ScheduledTask, SchedulerSummary, TaskExecutor, TaskResult,
};
