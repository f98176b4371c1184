//! Append-only change log per configuration.
//!
//! Every successful mutation appends exactly one entry; the log rides inside
//! the persisted configuration document so the append is atomic with the
//! save. Used for audit export and reconciliation against channel-manager
//! feedback.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of mutation an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Created,
    Updated,
    Deleted,
    Allocated,
    Released,
    Synced,
}

impl std::fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChangeAction::Created => "created",
            ChangeAction::Updated => "updated",
            ChangeAction::Deleted => "deleted",
            ChangeAction::Allocated => "allocated",
            ChangeAction::Released => "released",
            ChangeAction::Synced => "synced",
        };
        write!(f, "{s}")
    }
}

/// One mutation: what changed, who did it, when and why.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub action: ChangeAction,
    /// Names of the fields the mutation touched.
    pub fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Structured context (rooms moved, date range, channel) for
    /// reconciliation and analytics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ChangeLogEntry {
    pub fn new(actor: impl Into<String>, action: ChangeAction, now: DateTime<Utc>) -> Self {
        Self {
            timestamp: now,
            actor: actor.into(),
            action,
            fields: Vec::new(),
            reason: None,
            details: None,
        }
    }

    pub fn with_fields(mut self, fields: &[&str]) -> Self {
        self.fields = fields.iter().map(|s| (*s).to_string()).collect();
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Range filter for change-log queries.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub action: Option<ChangeAction>,
}

impl LogQuery {
    pub fn matches(&self, entry: &ChangeLogEntry) -> bool {
        if let Some(from) = self.from {
            if entry.timestamp < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if entry.timestamp > to {
                return false;
            }
        }
        if let Some(action) = self.action {
            if entry.action != action {
                return false;
            }
        }
        true
    }
}
