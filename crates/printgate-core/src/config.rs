// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Server configuration.

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{GateError, Result};

/// Startup settings for the print server.
///
/// Every field has a default, so a config file only needs the keys it
/// wants to change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the TCP listener binds to.
    pub listen_addr: IpAddr,
    /// Port for the request listener (default 2099).
    pub port: u16,
    /// Idle time after which a session expires.
    pub session_timeout_secs: u64,
    /// The fixed set of printers queues are created for.
    pub printers: Vec<String>,
    /// `username,sha256hex` credential file.
    pub users_file: PathBuf,
    /// Roles and user-role assignments.
    pub access_file: PathBuf,
    /// SQLite audit database. `None` keeps the audit trail in memory.
    pub audit_db: Option<PathBuf>,
    /// Initial contents of the settings store.
    pub settings: BTreeMap<String, String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 2099,
            session_timeout_secs: 300,
            printers: vec!["printer1".into(), "printer2".into()],
            users_file: PathBuf::from("users.txt"),
            access_file: PathBuf::from("access.json"),
            audit_db: None,
            settings: BTreeMap::new(),
        }
    }
}

impl ServerConfig {
    /// Read a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .map_err(|e| GateError::Config(format!("read {}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&data)
            .map_err(|e| GateError::Config(format!("parse {}: {e}", path.display())))?;
        config.validate()?;
        info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn session_timeout(&self) -> TimeDelta {
        i64::try_from(self.session_timeout_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX)
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen_addr, self.port)
    }

    fn validate(&self) -> Result<()> {
        if self.session_timeout_secs == 0 {
            return Err(GateError::Config("session_timeout_secs must be positive".into()));
        }
        if self.printers.iter().any(|p| p.trim().is_empty()) {
            return Err(GateError::Config("printer names must not be empty".into()));
        }
        Ok(())
    }
}
