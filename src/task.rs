use crate::error::{Result, TodoError};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Task urgency. Declaration order is the sort order: high first.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }

    pub fn glyph(self) -> &'static str {
        match self {
            Priority::High => "🔴",
            Priority::Medium => "🟡",
            Priority::Low => "🟢",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = TodoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            _ => Err(TodoError::validation(format!(
                "invalid priority '{}' (expected high, medium or low)",
                s
            ))),
        }
    }
}

/// Parses a `YYYY-MM-DD` due date.
pub fn parse_due_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .map_err(|_| TodoError::validation(format!("invalid due date '{}' (expected YYYY-MM-DD)", s)))
}

pub(crate) fn normalize_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(TodoError::validation("title must not be empty"));
    }
    Ok(title.to_string())
}

/// Categories compare case-insensitively; a blank label means none.
pub(crate) fn normalize_category(category: &str) -> Option<String> {
    let category = category.trim().to_lowercase();
    (!category.is_empty()).then_some(category)
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Task {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, alias = "completed")]
    pub done: bool,
    pub created_at: NaiveDateTime,
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.done { "✓" } else { "○" };
        write!(f, "{} [{}] {} {}", status, self.id, self.priority.glyph(), self.title)?;
        if let Some(due) = self.due_date {
            write!(f, " (due: {})", due.format(DATE_FORMAT))?;
        }
        if let Some(category) = &self.category {
            write!(f, " [{}]", category)?;
        }
        Ok(())
    }
}

/// Input for `Store::add`.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
    pub category: Option<String>,
}

impl NewTask {
    #[cfg(test)]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Fields to change on an existing task. `None` leaves a field untouched;
/// `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub priority: Option<Priority>,
    pub due_date: Option<Option<NaiveDate>>,
    pub category: Option<Option<String>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
            && self.category.is_none()
    }
}
