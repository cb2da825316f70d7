// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Printgate print server.

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GateError;

/// A privileged operation a role may be granted.
///
/// Declaration order is the order used when listing permitted commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    Print,
    Queue,
    TopQueue,
    Start,
    Stop,
    Restart,
    Status,
    ReadConfig,
    SetConfig,
}

impl Operation {
    /// Every operation, in declaration order.
    pub const ALL: [Operation; 9] = [
        Self::Print,
        Self::Queue,
        Self::TopQueue,
        Self::Start,
        Self::Stop,
        Self::Restart,
        Self::Status,
        Self::ReadConfig,
        Self::SetConfig,
    ];

    /// Name as it appears in policy files and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Print => "print",
            Self::Queue => "queue",
            Self::TopQueue => "topQueue",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::Status => "status",
            Self::ReadConfig => "readConfig",
            Self::SetConfig => "setConfig",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| GateError::UnknownOperation(s.to_owned()))
    }
}

/// A named bundle of permitted operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    pub permissions: BTreeSet<Operation>,
}

impl Role {
    pub fn new(name: impl Into<String>, permissions: impl IntoIterator<Item = Operation>) -> Self {
        Self {
            name: name.into(),
            permissions: permissions.into_iter().collect(),
        }
    }

    pub fn permits(&self, operation: Operation) -> bool {
        self.permissions.contains(&operation)
    }
}

/// Server-side proof of a prior successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub username: String,
    /// Start of the current sliding window.
    pub last_active_at: DateTime<Utc>,
}

/// Unique identifier for a queued print job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A queued print request. Its position is implicit in queue order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub filename: String,
    pub printer: String,
    pub submitted_at: DateTime<Utc>,
}

impl Job {
    pub fn new(
        filename: impl Into<String>,
        printer: impl Into<String>,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: JobId::new(),
            filename: filename.into(),
            printer: printer.into(),
            submitted_at,
        }
    }
}

/// One row of a queue snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// 1-based position within the printer's queue.
    pub position: usize,
    pub job: Job,
}

/// Logical run state of the print service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerStatus {
    Stopped,
    Running,
}

impl std::fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stopped => f.write_str("Stopped"),
            Self::Running => f.write_str("Running"),
        }
    }
}

/// Result of a settings lookup. A miss is not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigValue {
    Found(String),
    NotFound,
}

impl From<Option<String>> for ConfigValue {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(v) => Self::Found(v),
            None => Self::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_names_round_trip_through_from_str() {
        for op in Operation::ALL {
            assert_eq!(op.as_str().parse::<Operation>().unwrap(), op);
        }
    }

    #[test]
    fn unknown_operation_is_rejected() {
        let err = "format".parse::<Operation>().unwrap_err();
        assert!(matches!(err, GateError::UnknownOperation(name) if name == "format"));
    }

    #[test]
    fn operation_names_are_case_sensitive() {
        assert!("TopQueue".parse::<Operation>().is_err());
        assert_eq!("topQueue".parse::<Operation>().unwrap(), Operation::TopQueue);
    }

    #[test]
    fn operation_serde_uses_wire_names() {
        let json = serde_json::to_string(&Operation::ReadConfig).unwrap();
        assert_eq!(json, "\"readConfig\"");
        let op: Operation = serde_json::from_str("\"setConfig\"").unwrap();
        assert_eq!(op, Operation::SetConfig);
    }

    #[test]
    fn role_permits_only_granted_operations() {
        let role = Role::new("user", [Operation::Print, Operation::Queue]);
        assert!(role.permits(Operation::Print));
        assert!(!role.permits(Operation::Restart));
    }

    #[test]
    fn config_value_from_option() {
        assert_eq!(ConfigValue::from(Some("a4".to_owned())), ConfigValue::Found("a4".into()));
        assert_eq!(ConfigValue::from(None), ConfigValue::NotFound);
    }
}
