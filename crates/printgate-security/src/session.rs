// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Session manager — one sliding-expiry session per username.
//
// Expiry is detected lazily: there is no background sweep, a stale session
// is only noticed (and removed) the next time `validate` runs for it.  All
// mutations for one username go through the DashMap entry for that key, so
// login, renewal, and logout for the same user cannot interleave.

use std::sync::Arc;

use chrono::TimeDelta;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, info, instrument, warn};

use printgate_core::clock::Clock;
use printgate_core::error::{GateError, Result};
use printgate_core::types::Session;

use crate::credentials::CredentialStore;

/// Tracks who is logged in and when they were last active.
pub struct SessionManager {
    credentials: Arc<CredentialStore>,
    sessions: DashMap<String, Session>,
    timeout: TimeDelta,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("sessions", &self.sessions.len())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl SessionManager {
    pub fn new(credentials: Arc<CredentialStore>, timeout: TimeDelta, clock: Arc<dyn Clock>) -> Self {
        Self {
            credentials,
            sessions: DashMap::new(),
            timeout,
            clock,
        }
    }

    pub fn timeout(&self) -> TimeDelta {
        self.timeout
    }

    /// Check credentials and open (or renew) the user's session.
    ///
    /// Fails with `InvalidCredentials` for an unknown user or a wrong hash,
    /// leaving any existing session untouched.
    #[instrument(skip(self, password_hash))]
    pub fn authenticate(&self, username: &str, password_hash: &str) -> Result<()> {
        if !self.credentials.verify(username, password_hash) {
            warn!(%username, "authentication failed");
            return Err(GateError::InvalidCredentials);
        }

        let now = self.clock.now();
        self.sessions.insert(
            username.to_owned(),
            Session {
                username: username.to_owned(),
                last_active_at: now,
            },
        );
        info!(%username, "user authenticated");
        Ok(())
    }

    /// Require a live session for `username` and slide its window forward.
    ///
    /// A session is live while `now - last_active_at <= timeout`.
    pub fn validate(&self, username: &str) -> Result<()> {
        self.validate_then(username, || Ok(()))
    }

    /// Require a live session, run `guard`, and renew only if it succeeds.
    ///
    /// `guard` runs while the username's entry is locked, so the expiry
    /// check, the guard and the renewal are one atomic step for that user.
    /// A failing guard leaves the session exactly as it was.
    pub fn validate_then<T>(&self, username: &str, guard: impl FnOnce() -> Result<T>) -> Result<T> {
        match self.sessions.entry(username.to_owned()) {
            Entry::Occupied(mut entry) => {
                let now = self.clock.now();
                let idle = now - entry.get().last_active_at;
                if idle > self.timeout {
                    entry.remove();
                    debug!(%username, idle_secs = idle.num_seconds(), "session expired");
                    return Err(GateError::SessionExpired);
                }
                let value = guard()?;
                entry.get_mut().last_active_at = now;
                debug!(%username, "session renewed");
                Ok(value)
            }
            Entry::Vacant(_) => {
                debug!(%username, "no session");
                Err(GateError::SessionExpired)
            }
        }
    }

    /// End the caller's own session.
    ///
    /// Requires a live session for `username`; without one this fails with
    /// `SessionExpired` and changes nothing.  An expired session found here
    /// is removed, as in [`validate`](Self::validate).
    pub fn close(&self, username: &str) -> Result<()> {
        match self.sessions.entry(username.to_owned()) {
            Entry::Occupied(entry) => {
                let idle = self.clock.now() - entry.get().last_active_at;
                entry.remove();
                if idle > self.timeout {
                    debug!(%username, idle_secs = idle.num_seconds(), "session expired");
                    return Err(GateError::SessionExpired);
                }
                info!(%username, "session closed");
                Ok(())
            }
            Entry::Vacant(_) => {
                debug!(%username, "no session to close");
                Err(GateError::SessionExpired)
            }
        }
    }

    /// Drop the user's session. Idempotent.
    pub fn invalidate(&self, username: &str) {
        if self.sessions.remove(username).is_some() {
            info!(%username, "session closed");
        }
    }

    /// Whether `username` currently holds a live session. Does not renew.
    pub fn is_active(&self, username: &str) -> bool {
        let now = self.clock.now();
        self.sessions
            .get(username)
            .is_some_and(|s| now - s.last_active_at <= self.timeout)
    }

    /// Copy of the stored session, expired or not.
    pub fn session(&self, username: &str) -> Option<Session> {
        self.sessions.get(username).map(|s| s.value().clone())
    }

    /// Number of stored sessions, including expired ones not yet detected.
    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }
}
