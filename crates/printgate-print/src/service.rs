// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Print service — the request-level facade over sessions, access control,
// job queues, and settings.
//
// Every privileged call runs the same pipeline: validate the caller's
// session, authorise the operation against their role, then execute.  Only
// `login` looks at credentials; everything afterwards is session-gated.

use std::sync::{Arc, Mutex};

use chrono::TimeDelta;
use tracing::{info, instrument, warn};

use printgate_core::clock::{Clock, SystemClock};
use printgate_core::config::ServerConfig;
use printgate_core::error::Result;
use printgate_core::types::{ConfigValue, Operation, ServerStatus};
use printgate_security::{
    AccessController, AuditSink, CredentialStore, RoleStore, SessionManager,
};

use crate::queue::{JobQueueEngine, render_queue};
use crate::settings::ConfigStore;

/// Name appended to every command list; it needs no permission.
const LOGOUT_COMMAND: &str = "logout";

/// Shared service state. Cheap to share behind an `Arc`.
pub struct PrintService {
    sessions: Arc<SessionManager>,
    access: AccessController,
    queues: JobQueueEngine,
    settings: ConfigStore,
    status: Mutex<ServerStatus>,
    audit: Arc<dyn AuditSink>,
}

impl std::fmt::Debug for PrintService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrintService")
            .field("sessions", &self.sessions)
            .field("queues", &self.queues)
            .field("status", &self.server_status())
            .finish_non_exhaustive()
    }
}

impl PrintService {
    /// Build the service from startup configuration using the wall clock.
    pub fn new(
        config: &ServerConfig,
        credentials: CredentialStore,
        roles: RoleStore,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self::with_clock(config, credentials, roles, audit, Arc::new(SystemClock))
    }

    /// Build the service with an explicit time source.
    pub fn with_clock(
        config: &ServerConfig,
        credentials: CredentialStore,
        roles: RoleStore,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let sessions = Arc::new(SessionManager::new(
            Arc::new(credentials),
            config.session_timeout(),
            Arc::clone(&clock),
        ));
        let access = AccessController::new(Arc::clone(&sessions), Arc::new(roles));
        Self {
            sessions,
            access,
            queues: JobQueueEngine::with_clock(config.printers.iter().cloned(), clock),
            settings: ConfigStore::with_entries(config.settings.clone()),
            status: Mutex::new(ServerStatus::Running),
            audit,
        }
    }

    // -- Accessors -----------------------------------------------------------

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn queues(&self) -> &JobQueueEngine {
        &self.queues
    }

    pub fn settings(&self) -> &ConfigStore {
        &self.settings
    }

    pub fn session_timeout(&self) -> TimeDelta {
        self.sessions.timeout()
    }

    pub fn server_status(&self) -> ServerStatus {
        *self.status.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn set_status(&self, status: ServerStatus) {
        *self.status.lock().unwrap_or_else(|p| p.into_inner()) = status;
    }

    // -- Pipeline ------------------------------------------------------------

    /// Session check, then role check, then `execute`. The outcome is
    /// audited either way.
    fn guarded<T>(
        &self,
        username: &str,
        operation: Operation,
        detail: &str,
        execute: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        let result = self
            .access
            .check(username, operation)
            .and_then(|()| execute());
        match &result {
            Ok(_) => self.audit.record(operation.as_str(), username, true, detail),
            Err(e) => {
                warn!(%username, %operation, error = %e, "request rejected");
                self.audit
                    .record(operation.as_str(), username, false, &format!("{detail}: {e}"));
            }
        }
        result
    }

    // -- Session -------------------------------------------------------------

    /// Verify credentials and open a session.
    #[instrument(skip(self, password_hash))]
    pub fn login(&self, username: &str, password_hash: &str) -> Result<()> {
        let result = self.sessions.authenticate(username, password_hash);
        let detail = match &result {
            Ok(()) => String::new(),
            Err(e) => e.to_string(),
        };
        self.audit.record("login", username, result.is_ok(), &detail);
        result
    }

    /// Close the caller's session.
    ///
    /// Session-gated like every other call, but needs no permission.
    #[instrument(skip(self))]
    pub fn logout(&self, username: &str) -> Result<()> {
        let result = self.sessions.close(username);
        let detail = match &result {
            Ok(()) => String::new(),
            Err(e) => e.to_string(),
        };
        self.audit
            .record(LOGOUT_COMMAND, username, result.is_ok(), &detail);
        result
    }

    // -- Queue operations ----------------------------------------------------

    /// Queue `filename` at the tail of `printer`.
    #[instrument(skip(self))]
    pub fn print(&self, filename: &str, printer: &str, username: &str) -> Result<()> {
        let detail = format!("{filename} on {printer}");
        self.guarded(username, Operation::Print, &detail, || {
            self.queues.submit(printer, filename).map(|_| ())
        })
    }

    /// Text report of `printer`'s queue.
    #[instrument(skip(self))]
    pub fn queue(&self, printer: &str, username: &str) -> Result<String> {
        self.guarded(username, Operation::Queue, printer, || {
            let entries = self.queues.list(printer)?;
            Ok(render_queue(printer, &entries))
        })
    }

    /// Move the job at 1-based position `job` to the front of `printer`.
    #[instrument(skip(self))]
    pub fn top_queue(&self, printer: &str, job: i64, username: &str) -> Result<()> {
        let detail = format!("job {job} on {printer}");
        self.guarded(username, Operation::TopQueue, &detail, || {
            self.queues.promote(printer, job)
        })
    }

    // -- Server lifecycle ----------------------------------------------------

    #[instrument(skip(self))]
    pub fn start(&self, username: &str) -> Result<()> {
        self.guarded(username, Operation::Start, "", || {
            self.set_status(ServerStatus::Running);
            info!(%username, "print service started");
            Ok(())
        })
    }

    #[instrument(skip(self))]
    pub fn stop(&self, username: &str) -> Result<()> {
        self.guarded(username, Operation::Stop, "", || {
            self.set_status(ServerStatus::Stopped);
            info!(%username, "print service stopped");
            Ok(())
        })
    }

    /// Drop every queued job and mark the service running.
    #[instrument(skip(self))]
    pub fn restart(&self, username: &str) -> Result<()> {
        self.guarded(username, Operation::Restart, "", || {
            self.queues.clear_all();
            self.set_status(ServerStatus::Running);
            info!(%username, "print service restarted");
            Ok(())
        })
    }

    /// One-line status of `printer`.
    #[instrument(skip(self))]
    pub fn status(&self, printer: &str, username: &str) -> Result<String> {
        self.guarded(username, Operation::Status, printer, || {
            let queued = self.queues.len(printer)?;
            Ok(format!(
                "Status of printer {printer}: {}, {queued} job(s) queued",
                self.server_status()
            ))
        })
    }

    // -- Settings ------------------------------------------------------------

    #[instrument(skip(self))]
    pub fn read_config(&self, key: &str, username: &str) -> Result<ConfigValue> {
        self.guarded(username, Operation::ReadConfig, key, || {
            Ok(ConfigValue::from(self.settings.get(key)))
        })
    }

    #[instrument(skip(self))]
    pub fn set_config(&self, key: &str, value: &str, username: &str) -> Result<()> {
        let detail = format!("{key}={value}");
        self.guarded(username, Operation::SetConfig, &detail, || {
            self.settings.set(key, value);
            Ok(())
        })
    }

    // -- Discovery -----------------------------------------------------------

    /// Comma-separated operations the caller's role allows, plus `logout`.
    ///
    /// Requires a live session like every other call.
    #[instrument(skip(self))]
    pub fn available_commands(&self, username: &str) -> Result<String> {
        let result = self
            .access
            .check_session_permissions(username)
            .map(|ops| {
                ops.iter()
                    .map(Operation::as_str)
                    .chain(std::iter::once(LOGOUT_COMMAND))
                    .collect::<Vec<_>>()
                    .join(", ")
            });
        let detail = match &result {
            Ok(_) => String::new(),
            Err(e) => e.to_string(),
        };
        self.audit
            .record("availableCommands", username, result.is_ok(), &detail);
        result
    }
}
