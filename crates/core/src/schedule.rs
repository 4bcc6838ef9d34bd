//! Schedule expression validation.
//!
//! Two grammars are accepted, both in the wrapped form the events service
//! expects:
//!
//! - `cron(<fields>)` with 6 or 7 whitespace-separated fields
//! - `rate(<integer> <unit>)` where unit is minute(s), hour(s) or day(s)
//!
//! Validation is purely syntactic and never touches the network.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// One cron field: comma lists, steps/ranges/nth-weekday, `L` forms, `*`,
/// `?`, and three-letter month/day names (optionally ranged).
static CRON_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^((\d+,)+\d+|\d+(/|-|#)\d+|\d+L?|\*(/\d+)?|L(-\d+)?|\?|[A-Z]{3}(-[A-Z]{3})?)$")
        .expect("cron field pattern is valid")
});

static RATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^rate\((\d+)\s+(minute|minutes|hour|hours|day|days)\)$")
        .expect("rate pattern is valid")
});

const CRON_MIN_FIELDS: usize = 6;
const CRON_MAX_FIELDS: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateUnit {
    Minutes,
    Hours,
    Days,
}

impl RateUnit {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "minute" | "minutes" => Some(Self::Minutes),
            "hour" | "hours" => Some(Self::Hours),
            "day" | "days" => Some(Self::Days),
            _ => None,
        }
    }
}

/// A schedule expression that passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Schedule {
    Cron { fields: Vec<String> },
    Rate { value: u64, unit: RateUnit },
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schedule::Cron { fields } => write!(f, "cron({})", fields.join(" ")),
            Schedule::Rate { value, unit } => {
                let unit = match (unit, *value == 1) {
                    (RateUnit::Minutes, true) => "minute",
                    (RateUnit::Minutes, false) => "minutes",
                    (RateUnit::Hours, true) => "hour",
                    (RateUnit::Hours, false) => "hours",
                    (RateUnit::Days, true) => "day",
                    (RateUnit::Days, false) => "days",
                };
                write!(f, "rate({} {})", value, unit)
            }
        }
    }
}

fn invalid(schedule: &str, reason: impl Into<String>) -> CoreError {
    CoreError::InvalidSchedule {
        schedule: schedule.to_string(),
        reason: reason.into(),
    }
}

/// Parse and validate a schedule expression.
///
/// Leading and trailing whitespace is ignored. Anything that is neither a
/// well-formed `cron(...)` nor `rate(...)` expression is rejected.
pub fn parse_schedule(schedule: &str) -> Result<Schedule, CoreError> {
    let trimmed = schedule.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Configuration(
            "input 'schedule' is required".to_string(),
        ));
    }

    if let Some(body) = trimmed
        .strip_prefix("cron(")
        .and_then(|rest| rest.strip_suffix(')'))
    {
        let fields: Vec<&str> = body.split_whitespace().collect();
        if !(CRON_MIN_FIELDS..=CRON_MAX_FIELDS).contains(&fields.len()) {
            return Err(invalid(
                schedule,
                format!(
                    "cron expressions take {}-{} fields, got {}",
                    CRON_MIN_FIELDS,
                    CRON_MAX_FIELDS,
                    fields.len()
                ),
            ));
        }
        if let Some(bad) = fields.iter().find(|f| !CRON_FIELD.is_match(f)) {
            return Err(invalid(schedule, format!("unrecognised cron field '{}'", bad)));
        }
        return Ok(Schedule::Cron {
            fields: fields.into_iter().map(str::to_string).collect(),
        });
    }

    if let Some(caps) = RATE.captures(trimmed) {
        let value = caps[1]
            .parse::<u64>()
            .map_err(|e| invalid(schedule, format!("rate value: {e}")))?;
        let unit = RateUnit::parse(&caps[2])
            .ok_or_else(|| invalid(schedule, "unknown rate unit"))?;
        return Ok(Schedule::Rate { value, unit });
    }

    Err(invalid(
        schedule,
        "expected cron(<fields>) or rate(<n> minute(s)|hour(s)|day(s))",
    ))
}

/// Accept or reject a schedule expression without keeping the parse.
pub fn validate_schedule(schedule: &str) -> Result<(), CoreError> {
    parse_schedule(schedule).map(|_| ())
}
