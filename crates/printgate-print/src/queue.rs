// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory print job queues, one per configured printer.
//
// The printer set is fixed when the engine is built, so the outer map is
// never written again and needs no lock.  Each printer's queue has its own
// mutex: operations on one printer serialise, operations on different
// printers never touch the same lock.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, instrument};

use printgate_core::clock::{Clock, SystemClock};
use printgate_core::error::{GateError, Result};
use printgate_core::types::{Job, QueueEntry};

/// FIFO job queues keyed by printer name.
pub struct JobQueueEngine {
    queues: HashMap<String, Mutex<VecDeque<Job>>>,
    /// Stamps `Job::submitted_at`.
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for JobQueueEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobQueueEngine")
            .field("printers", &self.printers())
            .finish_non_exhaustive()
    }
}

impl JobQueueEngine {
    /// Create an empty queue for each printer name. Duplicates collapse.
    pub fn new<P: Into<String>>(printers: impl IntoIterator<Item = P>) -> Self {
        Self::with_clock(printers, Arc::new(SystemClock))
    }

    /// Like [`new`](Self::new), with an explicit time source for job stamps.
    pub fn with_clock<P: Into<String>>(
        printers: impl IntoIterator<Item = P>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let queues: HashMap<_, _> = printers
            .into_iter()
            .map(|p| (p.into(), Mutex::new(VecDeque::new())))
            .collect();
        info!(printers = queues.len(), "job queues initialised");
        Self { queues, clock }
    }

    /// Lock one printer's queue.
    fn lock(&self, printer: &str) -> Result<MutexGuard<'_, VecDeque<Job>>> {
        let queue = self
            .queues
            .get(printer)
            .ok_or_else(|| GateError::PrinterNotFound(printer.to_owned()))?;
        Ok(queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }

    /// Append `filename` to the tail of `printer`'s queue.
    ///
    /// Returns the new job's 1-based position.
    #[instrument(skip(self))]
    pub fn submit(&self, printer: &str, filename: &str) -> Result<usize> {
        let mut queue = self.lock(printer)?;
        queue.push_back(Job::new(filename, printer, self.clock.now()));
        let position = queue.len();
        debug!(%printer, %filename, position, "job queued");
        Ok(position)
    }

    /// Ordered snapshot of `printer`'s queue, positions starting at 1.
    pub fn list(&self, printer: &str) -> Result<Vec<QueueEntry>> {
        let queue = self.lock(printer)?;
        Ok(queue
            .iter()
            .enumerate()
            .map(|(i, job)| QueueEntry {
                position: i + 1,
                job: job.clone(),
            })
            .collect())
    }

    /// Move the job at 1-based `position` to the front of the queue.
    ///
    /// Fails with `InvalidJobIndex` for `position < 1` or past the end; the
    /// queue is untouched on failure.
    #[instrument(skip(self))]
    pub fn promote(&self, printer: &str, position: i64) -> Result<()> {
        let mut queue = self.lock(printer)?;
        let len = queue.len();
        let index = usize::try_from(position)
            .ok()
            .filter(|p| (1..=len).contains(p))
            .map(|p| p - 1)
            .ok_or(GateError::InvalidJobIndex { position, len })?;

        if let Some(job) = queue.remove(index) {
            debug!(%printer, filename = %job.filename, from = position, "job moved to top");
            queue.push_front(job);
        }
        Ok(())
    }

    /// Empty every printer's queue. Used by restart.
    pub fn clear_all(&self) {
        let mut dropped = 0usize;
        for queue in self.queues.values() {
            let mut queue = queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            dropped += queue.len();
            queue.clear();
        }
        info!(dropped, "all job queues cleared");
    }

    /// Number of jobs waiting on `printer`.
    pub fn len(&self, printer: &str) -> Result<usize> {
        Ok(self.lock(printer)?.len())
    }

    pub fn contains_printer(&self, printer: &str) -> bool {
        self.queues.contains_key(printer)
    }

    /// Configured printer names, sorted.
    pub fn printers(&self) -> Vec<String> {
        let mut names: Vec<_> = self.queues.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Render a queue snapshot as the text report sent to clients.
pub fn render_queue(printer: &str, entries: &[QueueEntry]) -> String {
    if entries.is_empty() {
        return format!("Queue for printer {printer} is empty");
    }
    let mut report = format!("Queue for printer {printer}:");
    for entry in entries {
        report.push_str(&format!("\n{}. {}", entry.position, entry.job.filename));
    }
    report
}
