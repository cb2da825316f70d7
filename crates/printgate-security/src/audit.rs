// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Audit trail — append-only SQLite log of every request the server handles.
//
// Schema:
//   audit_log(
//     id        INTEGER PRIMARY KEY AUTOINCREMENT,
//     timestamp TEXT    NOT NULL,   -- RFC 3339
//     action    TEXT    NOT NULL,   -- e.g. "login", "print", "topQueue"
//     username  TEXT    NOT NULL,
//     success   INTEGER NOT NULL,   -- 0 = failure, 1 = success
//     details   TEXT                -- optional free-form context
//   )

use std::path::Path;
use std::sync::{Arc, Mutex, mpsc};
use std::thread::{self, JoinHandle};

use chrono::Utc;
use printgate_core::error::GateError;
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument, warn};

const CREATE_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS audit_log (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT    NOT NULL,
    action    TEXT    NOT NULL,
    username  TEXT    NOT NULL,
    success   INTEGER NOT NULL,
    details   TEXT
);";

// ---------------------------------------------------------------------------
// Local error helpers
// ---------------------------------------------------------------------------

/// Convert a `rusqlite::Error` into a `GateError::Database`.
fn db_err(e: rusqlite::Error) -> GateError {
    GateError::Database(e.to_string())
}

// ---------------------------------------------------------------------------
// Sink trait
// ---------------------------------------------------------------------------

/// Fire-and-forget destination for audit events.
///
/// Implementations must never fail the caller: a sink that cannot write
/// reports the problem through `tracing` and carries on.
pub trait AuditSink: Send + Sync {
    fn record(&self, action: &str, username: &str, success: bool, details: &str);
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAudit;

impl AuditSink for NullAudit {
    fn record(&self, _action: &str, _username: &str, _success: bool, _details: &str) {}
}

// ---------------------------------------------------------------------------
// Background writer
// ---------------------------------------------------------------------------

enum AuditMessage {
    Record {
        action: String,
        username: String,
        success: bool,
        details: String,
    },
    Flush(mpsc::Sender<()>),
}

/// Sink that hands every event to a dedicated thread.
///
/// `record` only enqueues, so callers never wait on the wrapped sink.
/// Events reach the inner sink in the order they were recorded.  Dropping
/// the writer drains the queue and joins the thread.
pub struct AuditWriter {
    sender: Option<mpsc::Sender<AuditMessage>>,
    worker: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for AuditWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditWriter")
            .field("running", &self.worker.is_some())
            .finish()
    }
}

impl AuditWriter {
    /// Start the writer thread in front of `inner`.
    pub fn spawn(inner: Arc<dyn AuditSink>) -> Result<Self, GateError> {
        let (tx, rx) = mpsc::channel::<AuditMessage>();
        let worker = thread::Builder::new()
            .name("printgate-audit".into())
            .spawn(move || {
                for message in rx {
                    match message {
                        AuditMessage::Record {
                            action,
                            username,
                            success,
                            details,
                        } => inner.record(&action, &username, success, &details),
                        AuditMessage::Flush(done) => {
                            let _ = done.send(());
                        }
                    }
                }
                debug!("audit writer stopped");
            })?;

        debug!("audit writer started");
        Ok(Self {
            sender: Some(tx),
            worker: Some(worker),
        })
    }

    /// Block until every event recorded so far has reached the inner sink.
    pub fn flush(&self) {
        let Some(sender) = &self.sender else {
            return;
        };
        let (done_tx, done_rx) = mpsc::channel();
        if sender.send(AuditMessage::Flush(done_tx)).is_ok() {
            let _ = done_rx.recv();
        }
    }
}

impl AuditSink for AuditWriter {
    fn record(&self, action: &str, username: &str, success: bool, details: &str) {
        let Some(sender) = &self.sender else {
            return;
        };
        let message = AuditMessage::Record {
            action: action.to_owned(),
            username: username.to_owned(),
            success,
            details: details.to_owned(),
        };
        if sender.send(message).is_err() {
            warn!(%action, %username, "audit writer is gone, entry dropped");
        }
    }
}

impl Drop for AuditWriter {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop once the backlog is written.
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("audit writer thread panicked");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A single entry in the audit log, used for queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub timestamp: String,
    pub action: String,
    pub username: String,
    pub success: bool,
    pub details: Option<String>,
}

/// Append-only audit log backed by a SQLite database.
///
/// `rusqlite::Connection` is `Send` but not `Sync`, so it sits behind a
/// mutex; every statement is a single short insert or select.
pub struct AuditLog {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog").finish_non_exhaustive()
    }
}

impl AuditLog {
    /// Open (or create) the audit database at `path`.
    ///
    /// The `audit_log` table is created automatically if it does not already
    /// exist.  WAL mode is enabled for better concurrent-read performance.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self, GateError> {
        let conn = Connection::open(path).map_err(db_err)?;

        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .map_err(db_err)?;
        conn.execute_batch(CREATE_TABLE_SQL).map_err(db_err)?;

        debug!("audit log opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory audit database.
    pub fn open_in_memory() -> Result<Self, GateError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(CREATE_TABLE_SQL).map_err(db_err)?;

        debug!("in-memory audit log opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>, GateError> {
        self.conn
            .lock()
            .map_err(|_| GateError::Database("audit connection lock poisoned".into()))
    }

    /// Record a new audit entry, reporting any storage failure.
    pub fn try_record(
        &self,
        action: &str,
        username: &str,
        success: bool,
        details: Option<&str>,
    ) -> Result<(), GateError> {
        let timestamp = Utc::now().to_rfc3339();
        let success_int: i32 = if success { 1 } else { 0 };

        self.conn()?
            .execute(
                "INSERT INTO audit_log (timestamp, action, username, success, details)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![timestamp, action, username, success_int, details],
            )
            .map_err(db_err)?;
        Ok(())
    }

    /// Retrieve all entries for a given user, oldest first.
    pub fn entries_for_user(&self, username: &str) -> Result<Vec<AuditEntry>, GateError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, timestamp, action, username, success, details
                 FROM audit_log
                 WHERE username = ?1
                 ORDER BY id ASC",
            )
            .map_err(db_err)?;

        let rows = stmt
            .query_map(params![username], row_to_entry)
            .map_err(db_err)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.map_err(db_err)?);
        }
        Ok(entries)
    }

    /// Retrieve the most recent `limit` entries, ordered newest-first.
    pub fn recent_entries(&self, limit: u32) -> Result<Vec<AuditEntry>, GateError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, timestamp, action, username, success, details
                 FROM audit_log
                 ORDER BY id DESC
                 LIMIT ?1",
            )
            .map_err(db_err)?;

        let rows = stmt.query_map(params![limit], row_to_entry).map_err(db_err)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.map_err(db_err)?);
        }
        Ok(entries)
    }

    /// Return the total number of entries in the audit log.
    pub fn count(&self) -> Result<u64, GateError> {
        self.conn()?
            .query_row("SELECT COUNT(*) FROM audit_log", [], |row| row.get(0))
            .map_err(db_err)
    }
}

impl AuditSink for AuditLog {
    fn record(&self, action: &str, username: &str, success: bool, details: &str) {
        let details = (!details.is_empty()).then_some(details);
        if let Err(e) = self.try_record(action, username, success, details) {
            error!(error = %e, %action, "failed to record audit entry");
        }
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuditEntry> {
    Ok(AuditEntry {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        action: row.get(2)?,
        username: row.get(3)?,
        success: row.get::<_, i32>(4)? != 0,
        details: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn make_log() -> AuditLog {
        AuditLog::open_in_memory().expect("open in-memory audit log")
    }

    #[test]
    fn record_and_count() {
        let log = make_log();
        assert_eq!(log.count().unwrap(), 0);

        log.record("login", "alice", true, "");
        log.record("print", "alice", true, "report.pdf on printer1");

        assert_eq!(log.count().unwrap(), 2);
    }

    #[test]
    fn entries_for_user() {
        let log = make_log();
        log.record("login", "alice", true, "");
        log.record("login", "bob", false, "invalid credentials");
        log.record("stop", "alice", false, "access denied");

        let entries = log.entries_for_user("alice").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "login");
        assert!(entries[0].success);
        assert!(entries[0].details.is_none());
        assert_eq!(entries[1].action, "stop");
        assert!(!entries[1].success);
    }

    #[test]
    fn recent_entries_ordering() {
        let log = make_log();
        for i in 0..5 {
            log.record("queue", &format!("user_{i}"), true, "");
        }

        let recent = log.recent_entries(3).unwrap();
        assert_eq!(recent.len(), 3);
        assert!(recent[0].id > recent[1].id);
        assert!(recent[1].id > recent[2].id);
        assert_eq!(recent[0].username, "user_4");
    }

    #[test]
    fn file_backed_log_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.db");
        {
            let log = AuditLog::open(&path).unwrap();
            log.record("restart", "alice", true, "");
        }
        let log = AuditLog::open(&path).unwrap();
        assert_eq!(log.count().unwrap(), 1);
    }

    /// Sink that takes `delay` per event and remembers what it saw.
    struct SlowSink {
        delay: Duration,
        seen: Mutex<Vec<String>>,
    }

    impl AuditSink for SlowSink {
        fn record(&self, action: &str, _username: &str, _success: bool, _details: &str) {
            thread::sleep(self.delay);
            self.seen.lock().unwrap().push(action.to_owned());
        }
    }

    fn slow_sink() -> Arc<SlowSink> {
        Arc::new(SlowSink {
            delay: Duration::from_millis(200),
            seen: Mutex::new(Vec::new()),
        })
    }

    #[test]
    fn writer_does_not_wait_for_slow_sink() {
        let sink = slow_sink();
        let writer = AuditWriter::spawn(sink.clone()).unwrap();

        let started = Instant::now();
        writer.record("login", "alice", true, "");
        writer.record("print", "alice", true, "a.txt on printer1");
        writer.record("logout", "alice", true, "");
        assert!(started.elapsed() < Duration::from_millis(100));

        writer.flush();
        assert_eq!(*sink.seen.lock().unwrap(), vec!["login", "print", "logout"]);
    }

    #[test]
    fn dropping_writer_drains_backlog() {
        let sink = slow_sink();
        let writer = AuditWriter::spawn(sink.clone()).unwrap();
        writer.record("restart", "bob", true, "");
        drop(writer);
        assert_eq!(*sink.seen.lock().unwrap(), vec!["restart"]);
    }

    #[test]
    fn writer_feeds_sqlite_log() {
        let log = Arc::new(make_log());
        let writer = AuditWriter::spawn(log.clone()).unwrap();
        writer.record("login", "alice", true, "");
        writer.record("stop", "alice", false, "access denied");
        writer.flush();

        let entries = log.entries_for_user("alice").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].details.as_deref(), Some("access denied"));
    }

    #[test]
    fn null_sink_accepts_everything() {
        let sink: &dyn AuditSink = &NullAudit;
        sink.record("print", "nobody", false, "ignored");
    }
}
