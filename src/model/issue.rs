use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::IssueShapeError;

/// An issue record as the remote source hands it over. Nothing is trusted yet.
#[derive(Debug, Clone, Default)]
pub struct RawIssue {
    pub key: Option<String>,
    pub summary: Option<String>,
    pub detail: Option<String>,
    pub issue_type: Option<String>,
    pub priority: Option<String>,
    pub reporter: Option<String>,
    pub created: Option<String>,
}

/// Point-in-time copy of the tracked fields of one issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueSnapshot {
    pub key: String,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub issue_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    pub reporter: String,
    pub created: DateTime<Utc>,
}

/// Snapshot fields that can take part in change detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Key,
    Summary,
    Detail,
    Type,
    Priority,
    Reporter,
    Created,
}

impl Field {
    pub const ALL: [Field; 7] = [
        Field::Key,
        Field::Summary,
        Field::Detail,
        Field::Type,
        Field::Priority,
        Field::Reporter,
        Field::Created,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Key => "key",
            Field::Summary => "summary",
            Field::Detail => "detail",
            Field::Type => "type",
            Field::Priority => "priority",
            Field::Reporter => "reporter",
            Field::Created => "created",
        }
    }

    pub fn parse(name: &str) -> Option<Field> {
        Field::ALL.iter().copied().find(|f| f.as_str() == name)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The value of one projected field. `None` stands for an absent field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    Timestamp(DateTime<Utc>),
}

impl IssueSnapshot {
    pub fn field(&self, field: Field) -> Option<FieldValue<'_>> {
        match field {
            Field::Key => Some(FieldValue::Text(&self.key)),
            Field::Summary => Some(FieldValue::Text(&self.summary)),
            Field::Detail => self.detail.as_deref().map(FieldValue::Text),
            Field::Type => self.issue_type.as_deref().map(FieldValue::Text),
            Field::Priority => self.priority.as_deref().map(FieldValue::Text),
            Field::Reporter => Some(FieldValue::Text(&self.reporter)),
            Field::Created => Some(FieldValue::Timestamp(self.created)),
        }
    }
}

/// Accepts RFC 3339, the Jira REST form (`2024-01-15T10:30:00.000+0000`) and
/// the older naive `2024-01-15 10:30:00.0` form, read as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn required(value: Option<String>, field: Field, key: &Option<String>) -> Result<String, IssueShapeError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(IssueShapeError::MissingField {
            key: key.clone(),
            field,
        }),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl TryFrom<RawIssue> for IssueSnapshot {
    type Error = IssueShapeError;

    fn try_from(raw: RawIssue) -> Result<Self, Self::Error> {
        let key_hint = raw.key.clone();
        let key = required(raw.key, Field::Key, &key_hint)?;
        let summary = required(raw.summary, Field::Summary, &key_hint)?;
        let reporter = required(raw.reporter, Field::Reporter, &key_hint)?;
        let created_raw = required(raw.created, Field::Created, &key_hint)?;
        let created = parse_timestamp(&created_raw).ok_or_else(|| IssueShapeError::BadTimestamp {
            key: key.clone(),
            value: created_raw.clone(),
        })?;

        Ok(IssueSnapshot {
            key,
            summary,
            detail: non_empty(raw.detail),
            issue_type: non_empty(raw.issue_type),
            priority: non_empty(raw.priority),
            reporter,
            created,
        })
    }
}

/// The last snapshot persisted for a key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredIssue {
    pub snapshot: IssueSnapshot,
    pub stored_at: DateTime<Utc>,
}
