// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! printgate-security — the three gates in front of every print operation.
//!
//! Credentials are checked once at login, after which a sliding session
//! stands in for them.  Each privileged call is then authorised against the
//! caller's single role.  Everything the server does is written to a
//! fire-and-forget audit sink.

pub mod access;
pub mod audit;
pub mod credentials;
pub mod roles;
pub mod session;

// PUBLIC API: Re-export the gatekeeping primitives
pub use access::AccessController;
pub use audit::{AuditLog, AuditSink, AuditWriter, NullAudit};
pub use credentials::{CredentialStore, hash_password};
pub use roles::{AccessPolicy, RoleStore};
pub use session::SessionManager;
