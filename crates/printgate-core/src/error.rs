// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Printgate.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type for all Printgate operations.
#[derive(Debug, Error)]
pub enum GateError {
    // -- Authentication / session --
    /// Unknown username or wrong hash. Deliberately does not say which.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("session expired or not found; please log in again")]
    SessionExpired,

    // -- Authorization --
    #[error("no role assigned to user {0}")]
    RoleNotAssigned(String),

    #[error("no permissions defined for role {0}")]
    PermissionsUndefined(String),

    #[error("user {username} may not perform {operation}")]
    AccessDenied { username: String, operation: String },

    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    // -- Queue errors --
    #[error("printer not found: {0}")]
    PrinterNotFound(String),

    #[error("invalid job index {position} (queue holds {len} job(s))")]
    InvalidJobIndex { position: i64, len: usize },

    // -- Infrastructure --
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("print server error: {0}")]
    Server(String),

    #[error("malformed request: {0}")]
    Protocol(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse classification of a [`GateError`], stable across the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidCredentials,
    SessionExpired,
    RoleNotAssigned,
    PermissionsUndefined,
    AccessDenied,
    PrinterNotFound,
    InvalidJobIndex,
    /// The request itself could not be understood.
    BadRequest,
    /// Anything the caller cannot fix by changing the request.
    Internal,
}

impl GateError {
    /// Classify this error for callers that branch on the failure type.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidCredentials => ErrorKind::InvalidCredentials,
            Self::SessionExpired => ErrorKind::SessionExpired,
            Self::RoleNotAssigned(_) => ErrorKind::RoleNotAssigned,
            Self::PermissionsUndefined(_) => ErrorKind::PermissionsUndefined,
            Self::AccessDenied { .. } => ErrorKind::AccessDenied,
            Self::PrinterNotFound(_) => ErrorKind::PrinterNotFound,
            Self::InvalidJobIndex { .. } => ErrorKind::InvalidJobIndex,
            Self::UnknownOperation(_) | Self::Protocol(_) => ErrorKind::BadRequest,
            Self::Config(_)
            | Self::Database(_)
            | Self::Server(_)
            | Self::Io(_)
            | Self::Serialization(_) => ErrorKind::Internal,
        }
    }

    /// True when the caller should re-authenticate and retry.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, GateError>;
