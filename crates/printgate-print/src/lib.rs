// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printgate Print — per-printer job queues, runtime settings, the service
// facade that gates every request, and the TCP front end that carries
// requests to it.

pub mod protocol;
pub mod queue;
pub mod server;
pub mod service;
pub mod settings;

pub use protocol::{Request, Response};
pub use queue::JobQueueEngine;
pub use server::PrintServer;
pub use service::PrintService;
pub use settings::ConfigStore;
