// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Access controller — role-based authorization layered on top of sessions.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use printgate_core::error::{GateError, Result};
use printgate_core::types::Operation;

use crate::roles::RoleStore;
use crate::session::SessionManager;

/// Decides whether a user may run an operation.
#[derive(Debug, Clone)]
pub struct AccessController {
    sessions: Arc<SessionManager>,
    roles: Arc<RoleStore>,
}

impl AccessController {
    pub fn new(sessions: Arc<SessionManager>, roles: Arc<RoleStore>) -> Self {
        Self { sessions, roles }
    }

    /// Permission set of the user's role.
    ///
    /// Fails with `RoleNotAssigned` when the user has no role, and with
    /// `PermissionsUndefined` when the role has no registered set.
    pub fn permitted_operations(&self, username: &str) -> Result<BTreeSet<Operation>> {
        let role = self
            .roles
            .role_of(username)
            .ok_or_else(|| GateError::RoleNotAssigned(username.to_owned()))?;
        self.roles
            .permissions(role)
            .cloned()
            .ok_or_else(|| GateError::PermissionsUndefined(role.to_owned()))
    }

    /// Pure role check. Touches no session state.
    pub fn authorize(&self, username: &str, operation: Operation) -> Result<()> {
        let role = self
            .roles
            .role_of(username)
            .ok_or_else(|| GateError::RoleNotAssigned(username.to_owned()))?;
        let permissions = self
            .roles
            .permissions(role)
            .ok_or_else(|| GateError::PermissionsUndefined(role.to_owned()))?;

        if permissions.contains(&operation) {
            debug!(%username, %role, %operation, "access granted");
            Ok(())
        } else {
            debug!(%username, %role, %operation, "access denied");
            Err(GateError::AccessDenied {
                username: username.to_owned(),
                operation: operation.to_string(),
            })
        }
    }

    /// Session validation followed by [`authorize`](Self::authorize).
    ///
    /// The session is checked first so an expired caller only ever sees
    /// `SessionExpired`, never a permission error. The session is renewed
    /// only when authorization succeeds.
    pub fn check(&self, username: &str, operation: Operation) -> Result<()> {
        self.sessions
            .validate_then(username, || self.authorize(username, operation))
    }

    /// Session validation followed by role resolution.
    pub fn check_session_permissions(&self, username: &str) -> Result<BTreeSet<Operation>> {
        self.sessions
            .validate_then(username, || self.permitted_operations(username))
    }
}
