use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Optional due date of a task, as local wall-clock time (no zone attached).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DueAt(NaiveDateTime);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid date: {0:?} (expected YYYY-MM-DD or YYYY-MM-DDTHH:MM)")]
pub struct ParseDueError(pub String);

const DUE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
];

impl DueAt {
    pub fn new(at: NaiveDateTime) -> Self {
        DueAt(at)
    }

    /// Parse user or stored input. An empty (or all-blank) string means
    /// "no due date" and yields `Ok(None)`.
    pub fn parse_optional(input: &str) -> Result<Option<DueAt>, ParseDueError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        trimmed.parse().map(Some)
    }

    /// Short display form used in the task list, e.g. `Jan 5, 09:30`.
    pub fn display_short(&self) -> String {
        self.0.format("%b %-d, %H:%M").to_string()
    }

    /// Form written to storage and pre-filled into edit fields. Seconds and
    /// fractions are only written when present.
    pub fn to_input_string(&self) -> String {
        if self.0.nanosecond() != 0 {
            self.0.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
        } else if self.0.second() != 0 {
            self.0.format("%Y-%m-%dT%H:%M:%S").to_string()
        } else {
            self.0.format("%Y-%m-%dT%H:%M").to_string()
        }
    }
}

impl FromStr for DueAt {
    type Err = ParseDueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        for format in DUE_FORMATS {
            if let Ok(at) = NaiveDateTime::parse_from_str(s, format) {
                return Ok(DueAt(at));
            }
        }
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            if let Some(at) = date.and_hms_opt(0, 0, 0) {
                return Ok(DueAt(at));
            }
        }
        if let Ok(at) = DateTime::parse_from_rfc3339(s) {
            return Ok(DueAt(at.naive_local()));
        }
        Err(ParseDueError(s.to_string()))
    }
}

impl fmt::Display for DueAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_input_string())
    }
}

impl Serialize for DueAt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_input_string())
    }
}

impl<'de> Deserialize<'de> for DueAt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Drop sub-millisecond precision so a timestamp survives a trip through
/// the stored millisecond form unchanged.
pub fn truncate_to_millis(at: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(at.timestamp_millis()).unwrap_or(at)
}

mod created_at_format {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|at| at.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(rename = "dateTime", alias = "dueAt", default)]
    pub due_at: Option<DueAt>,
    #[serde(with = "created_at_format")]
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(id: TaskId, text: String, due_at: Option<DueAt>, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            text,
            completed: false,
            due_at,
            created_at: truncate_to_millis(created_at),
        }
    }
}
