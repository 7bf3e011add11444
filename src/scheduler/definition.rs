//! Schedule definition parser.
//!
//! The definition is hand-edited Markdown:
//!
//! ```text
//! ## Every 15 minutes
//! > comment, ignored
//! - heartbeat_check: Check system health (parallel_safe: true)
//! ## Daily 07:00
//! - morning_brief: Send morning summary
//! ## Weekly Monday 09:00
//! - weekly_review: Review the week (parallel_safe: false)
//! ## Sequential
//! - sync_state: Always runs
//! ```
//!
//! Parsing is lenient. Task lines that cannot be registered are skipped and
//! reported through [`ParsedDefinition::skipped`] instead of failing; callers
//! that want hard failures use [`parse_definition_strict`].

use crate::error::{HeartbeatError, Result};
use crate::scheduler::tasks::{Schedule, ScheduledTask};
use chrono::Weekday;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::debug;

static INTERVAL_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^every\s+(\d+)\s+(minutes?|hours?)\b").expect("valid regex")
});

static DAILY_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^daily\s+(\d{1,2}):(\d{2})\b").expect("valid regex")
});

static WEEKLY_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^weekly\s+([a-z]+)\s+(\d{1,2}):(\d{2})\b").expect("valid regex")
});

static PARALLEL_SAFE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\(\s*parallel_safe\s*:\s*(true|false)\s*\)").expect("valid regex")
});

/// Why a task line was not registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The enclosing `## ` header matched no schedule rule.
    UnrecognizedSection,
    /// The line appeared before any `## ` header.
    NoActiveSection,
    /// The line has no `name: description` separator.
    MissingColon,
    /// The text before the colon is blank.
    EmptyName,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnrecognizedSection => write!(f, "section header has no recognized schedule"),
            Self::NoActiveSection => write!(f, "task line before any section header"),
            Self::MissingColon => write!(f, "task line has no ':' separator"),
            Self::EmptyName => write!(f, "task name is empty"),
        }
    }
}

/// A task line the parser dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    /// 1-based line number in the definition.
    pub line_number: usize,
    /// Trimmed line text.
    pub text: String,
    /// Why it was dropped.
    pub reason: SkipReason,
}

/// Result of parsing a definition.
#[derive(Debug, Clone, Default)]
pub struct ParsedDefinition {
    /// Registered tasks keyed by name. Later duplicates replace earlier ones.
    pub tasks: HashMap<String, ScheduledTask>,
    /// Task lines that were dropped.
    pub skipped: Vec<SkippedLine>,
}

enum Section {
    /// No header seen yet.
    None,
    /// Header seen but no rule matched.
    Unrecognized,
    Active(Schedule),
}

/// Parse a definition leniently. Never fails.
pub fn parse_definition(text: &str) -> ParsedDefinition {
    let mut parsed = ParsedDefinition::default();
    let mut section = Section::None;

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with("> ") || line == ">" {
            continue;
        }

        if let Some(header) = line.strip_prefix("## ") {
            section = match parse_section_header(header.trim()) {
                Some(schedule) => Section::Active(schedule),
                None => {
                    debug!(line = idx + 1, header, "unrecognized heartbeat section");
                    Section::Unrecognized
                }
            };
            continue;
        }

        let Some(body) = line.strip_prefix("- ") else {
            continue;
        };

        let outcome = match &section {
            Section::None => Err(SkipReason::NoActiveSection),
            Section::Unrecognized => Err(SkipReason::UnrecognizedSection),
            Section::Active(schedule) => parse_task_line(body, *schedule),
        };

        match outcome {
            Ok(task) => {
                if parsed.tasks.contains_key(&task.name) {
                    debug!(task = %task.name, "duplicate heartbeat task, later definition wins");
                }
                parsed.tasks.insert(task.name.clone(), task);
            }
            Err(reason) => {
                debug!(line = idx + 1, %reason, "skipping heartbeat task line");
                parsed.skipped.push(SkippedLine {
                    line_number: idx + 1,
                    text: line.to_owned(),
                    reason,
                });
            }
        }
    }

    parsed
}

/// Parse a definition, failing on the first dropped task line.
///
/// # Errors
///
/// Returns [`HeartbeatError::Definition`] naming the first skipped line.
pub fn parse_definition_strict(text: &str) -> Result<ParsedDefinition> {
    let parsed = parse_definition(text);
    if let Some(first) = parsed.skipped.first() {
        return Err(HeartbeatError::Definition(format!(
            "line {}: {} ({})",
            first.line_number, first.reason, first.text
        )));
    }
    Ok(parsed)
}

/// Resolve a `## ` header into a schedule rule.
///
/// A header mentioning "sequential" always yields [`Schedule::Sequential`],
/// even if it also matches a time-based pattern.
pub fn parse_section_header(header: &str) -> Option<Schedule> {
    let time_based = parse_time_rule(header);
    if header.to_lowercase().contains("sequential") {
        return Some(Schedule::Sequential);
    }
    time_based
}

fn parse_time_rule(header: &str) -> Option<Schedule> {
    if let Some(caps) = INTERVAL_HEADER.captures(header) {
        let n: u32 = caps[1].parse().ok()?;
        let minutes = if caps[2].to_lowercase().starts_with("hour") {
            n.checked_mul(60)?
        } else {
            n
        };
        if minutes == 0 {
            return None;
        }
        return Some(Schedule::Interval { minutes });
    }

    if let Some(caps) = DAILY_HEADER.captures(header) {
        let (hour, min) = parse_clock(&caps[1], &caps[2])?;
        return Some(Schedule::Daily { hour, min });
    }

    if let Some(caps) = WEEKLY_HEADER.captures(header) {
        let day = parse_weekday(&caps[1])?;
        let (hour, min) = parse_clock(&caps[2], &caps[3])?;
        return Some(Schedule::Weekly { day, hour, min });
    }

    None
}

fn parse_clock(hour: &str, min: &str) -> Option<(u32, u32)> {
    let hour: u32 = hour.parse().ok()?;
    let min: u32 = min.parse().ok()?;
    (hour < 24 && min < 60).then_some((hour, min))
}

/// English weekday name to [`Weekday`] (Monday = 0 ... Sunday = 6).
fn parse_weekday(name: &str) -> Option<Weekday> {
    match name.to_lowercase().as_str() {
        "monday" => Some(Weekday::Mon),
        "tuesday" => Some(Weekday::Tue),
        "wednesday" => Some(Weekday::Wed),
        "thursday" => Some(Weekday::Thu),
        "friday" => Some(Weekday::Fri),
        "saturday" => Some(Weekday::Sat),
        "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Parse `<name>: <description> [(parallel_safe: true|false)]`.
fn parse_task_line(body: &str, schedule: Schedule) -> std::result::Result<ScheduledTask, SkipReason> {
    let (name, rest) = body.split_once(':').ok_or(SkipReason::MissingColon)?;
    let name = name.trim();
    if name.is_empty() {
        return Err(SkipReason::EmptyName);
    }

    let parallel_safe = PARALLEL_SAFE
        .captures(rest)
        .map(|caps| caps[1].eq_ignore_ascii_case("true"))
        .unwrap_or(true);
    let description = PARALLEL_SAFE.replace_all(rest, "").trim().to_owned();

    Ok(ScheduledTask {
        name: name.to_owned(),
        description,
        schedule,
        parallel_safe,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn interval_minutes_and_hours() {
        assert_eq!(
            parse_section_header("Every 15 minutes"),
            Some(Schedule::Interval { minutes: 15 })
        );
        assert_eq!(
            parse_section_header("every 1 minute"),
            Some(Schedule::Interval { minutes: 1 })
        );
        assert_eq!(
            parse_section_header("EVERY 2 Hours"),
            Some(Schedule::Interval { minutes: 120 })
        );
        assert_eq!(
            parse_section_header("Every 1 hour (housekeeping)"),
            Some(Schedule::Interval { minutes: 60 })
        );
    }

    #[test]
    fn interval_zero_is_unrecognized() {
        assert_eq!(parse_section_header("Every 0 minutes"), None);
    }

    #[test]
    fn daily_and_weekly_headers() {
        assert_eq!(
            parse_section_header("Daily 07:00"),
            Some(Schedule::Daily { hour: 7, min: 0 })
        );
        assert_eq!(
            parse_section_header("daily 7:05"),
            Some(Schedule::Daily { hour: 7, min: 5 })
        );
        assert_eq!(
            parse_section_header("Weekly Monday 09:30"),
            Some(Schedule::Weekly {
                day: Weekday::Mon,
                hour: 9,
                min: 30
            })
        );
        assert_eq!(
            parse_section_header("weekly SUNDAY 21:00"),
            Some(Schedule::Weekly {
                day: Weekday::Sun,
                hour: 21,
                min: 0
            })
        );
    }

    #[test]
    fn out_of_range_clock_is_unrecognized() {
        assert_eq!(parse_section_header("Daily 24:00"), None);
        assert_eq!(parse_section_header("Daily 06:60"), None);
    }

    #[test]
    fn unknown_weekday_is_unrecognized() {
        assert_eq!(parse_section_header("Weekly Funday 09:00"), None);
        assert_eq!(parse_section_header("Weekly Mon 09:00"), None);
    }

    #[test]
    fn sequential_takes_precedence() {
        assert_eq!(parse_section_header("Sequential"), Some(Schedule::Sequential));
        assert_eq!(
            parse_section_header("Tasks (run SEQUENTIAL each tick)"),
            Some(Schedule::Sequential)
        );
        assert_eq!(
            parse_section_header("Every 5 minutes sequential"),
            Some(Schedule::Sequential)
        );
    }

    #[test]
    fn other_headers_are_unrecognized() {
        assert_eq!(parse_section_header("Notes"), None);
        assert_eq!(parse_section_header("Hourly"), None);
    }

    #[test]
    fn task_lines_parse_name_description_and_flag() {
        let parsed = parse_definition(
            "## Every 10 minutes\n\
             - check_mail: Look for new mail (parallel_safe: false)\n\
             - ping: Ping: with colon in description\n\
             - tidy: Tidy up (Parallel_Safe: TRUE) now\n",
        );
        assert_eq!(parsed.tasks.len(), 3);

        let mail = &parsed.tasks["check_mail"];
        assert_eq!(mail.description, "Look for new mail");
        assert!(!mail.parallel_safe);
        assert_eq!(mail.schedule, Schedule::Interval { minutes: 10 });

        let ping = &parsed.tasks["ping"];
        assert_eq!(ping.description, "Ping: with colon in description");
        assert!(ping.parallel_safe);

        let tidy = &parsed.tasks["tidy"];
        assert_eq!(tidy.description, "Tidy up  now");
        assert!(tidy.parallel_safe);
    }

    #[test]
    fn comments_blank_lines_and_prose_are_ignored() {
        let parsed = parse_definition(
            "# Heartbeat\n\
             Some prose about the schedule.\n\
             \n\
             ## Daily 06:00\n\
             > quoted comment - not: a task\n\
             \n\
             - wake: Good morning\n",
        );
        assert_eq!(parsed.tasks.len(), 1);
        assert!(parsed.skipped.is_empty());
    }

    #[test]
    fn malformed_lines_are_skipped_with_reasons() {
        let parsed = parse_definition(
            "- orphan: before any header\n\
             ## Every 5 minutes\n\
             - no colon here\n\
             - : empty name\n\
             - ok: fine\n\
             ## Whenever\n\
             - lost: unrecognized section\n",
        );
        assert_eq!(parsed.tasks.len(), 1);
        let reasons: Vec<SkipReason> = parsed.skipped.iter().map(|s| s.reason).collect();
        assert_eq!(
            reasons,
            vec![
                SkipReason::NoActiveSection,
                SkipReason::MissingColon,
                SkipReason::EmptyName,
                SkipReason::UnrecognizedSection,
            ]
        );
        assert_eq!(parsed.skipped[1].line_number, 3);
        assert_eq!(parsed.skipped[1].text, "- no colon here");
    }

    #[test]
    fn unrecognized_header_ends_previous_section() {
        let parsed = parse_definition(
            "## Every 5 minutes\n\
             - a: kept\n\
             ## Misc\n\
             - b: dropped\n\
             ## Daily 08:00\n\
             - c: kept\n",
        );
        let mut names: Vec<&str> = parsed.tasks.keys().map(String::as_str).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn duplicate_names_last_definition_wins() {
        let parsed = parse_definition(
            "## Every 5 minutes\n\
             - sync: first\n\
             ## Daily 08:00\n\
             - sync: second\n",
        );
        assert_eq!(parsed.tasks.len(), 1);
        let sync = &parsed.tasks["sync"];
        assert_eq!(sync.description, "second");
        assert_eq!(sync.schedule, Schedule::Daily { hour: 8, min: 0 });
    }

    #[test]
    fn strict_mode_reports_first_skip() {
        let err = parse_definition_strict("## Every 5 minutes\n- broken line\n").unwrap_err();
        match err {
            HeartbeatError::Definition(msg) => {
                assert!(msg.contains("line 2"), "message was: {msg}");
                assert!(msg.contains("broken line"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn strict_mode_accepts_clean_definition() {
        let parsed = parse_definition_strict("## Sequential\n- sync_state: Always runs\n").unwrap();
        assert!(parsed.tasks["sync_state"].is_sequential());
    }
}
