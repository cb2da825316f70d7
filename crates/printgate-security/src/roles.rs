// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Role store — immutable role → permission set and user → role lookups.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use printgate_core::error::Result;
use printgate_core::types::{Operation, Role};

/// Registered roles and user-role assignments. Populated once at startup.
#[derive(Debug, Clone, Default)]
pub struct RoleStore {
    roles: HashMap<String, Role>,
    assignments: HashMap<String, String>,
}

impl RoleStore {
    /// Build the store. An assignment may reference a role that is not in
    /// `roles`; authorization for such users fails later.
    pub fn new<U, R>(
        roles: impl IntoIterator<Item = Role>,
        assignments: impl IntoIterator<Item = (U, R)>,
    ) -> Self
    where
        U: Into<String>,
        R: Into<String>,
    {
        Self {
            roles: roles.into_iter().map(|r| (r.name.clone(), r)).collect(),
            assignments: assignments
                .into_iter()
                .map(|(u, r)| (u.into(), r.into()))
                .collect(),
        }
    }

    /// The role assigned to `username`, if any.
    pub fn role_of(&self, username: &str) -> Option<&str> {
        self.assignments.get(username).map(String::as_str)
    }

    /// Permission set registered for `role`, if any.
    pub fn permissions(&self, role: &str) -> Option<&BTreeSet<Operation>> {
        self.roles.get(role).map(|r| &r.permissions)
    }

    pub fn role_count(&self) -> usize {
        self.roles.len()
    }

    pub fn assignment_count(&self) -> usize {
        self.assignments.len()
    }
}

/// On-disk shape of the access policy, with operation names still as text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessPolicy {
    /// role name → operation names
    pub roles: BTreeMap<String, Vec<String>>,
    /// username → role name
    pub assignments: BTreeMap<String, String>,
}

impl AccessPolicy {
    /// Resolve operation names and build a [`RoleStore`].
    ///
    /// Fails with `UnknownOperation` on the first name that is not an
    /// [`Operation`].
    pub fn into_store(self) -> Result<RoleStore> {
        let roles = self
            .roles
            .into_iter()
            .map(|(name, ops)| {
                let permissions = ops
                    .iter()
                    .map(|op| op.parse::<Operation>())
                    .collect::<Result<BTreeSet<_>>>()?;
                Ok(Role { name, permissions })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(RoleStore::new(roles, self.assignments))
    }
}
