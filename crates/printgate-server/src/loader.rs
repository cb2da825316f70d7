// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Startup loaders for the credential file and the access policy.

use std::collections::HashSet;
use std::path::Path;

use printgate_core::error::{GateError, Result};
use printgate_security::{AccessPolicy, CredentialStore, RoleStore};
use tracing::{info, warn};

/// Parse `username,sha256hex` lines.
///
/// Blank lines and `#` comments are ignored. Malformed lines are skipped
/// with a warning; a repeated username replaces the earlier entry.
pub fn parse_credentials(text: &str) -> Vec<(String, String)> {
    let mut seen = HashSet::new();
    let mut users = Vec::new();

    for (lineno, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((username, hash)) = line.split_once(',') else {
            warn!(line = lineno + 1, "credential line has no comma, skipped");
            continue;
        };
        let (username, hash) = (username.trim(), hash.trim());
        if username.is_empty() || hash.is_empty() || hash.contains(',') {
            warn!(line = lineno + 1, "malformed credential line, skipped");
            continue;
        }
        if !seen.insert(username.to_owned()) {
            warn!(line = lineno + 1, %username, "duplicate user, later entry wins");
        }
        users.push((username.to_owned(), hash.to_owned()));
    }
    users
}

pub fn load_credentials(path: impl AsRef<Path>) -> Result<CredentialStore> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| GateError::Config(format!("read {}: {e}", path.display())))?;
    let store = CredentialStore::new(parse_credentials(&text));
    info!(path = %path.display(), users = store.len(), "credentials loaded");
    Ok(store)
}

pub fn load_access_policy(path: impl AsRef<Path>) -> Result<RoleStore> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| GateError::Config(format!("read {}: {e}", path.display())))?;
    let policy: AccessPolicy = serde_json::from_str(&text)
        .map_err(|e| GateError::Config(format!("parse {}: {e}", path.display())))?;
    let store = policy.into_store()?;
    info!(
        path = %path.display(),
        roles = store.role_count(),
        assignments = store.assignment_count(),
        "access policy loaded"
    );
    Ok(store)
}
