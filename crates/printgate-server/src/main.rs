// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printgate — session-gated remote print queue server
//
// Entry point. Initialises logging, loads configuration, credentials and
// the access policy, then serves requests until interrupted.

mod loader;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use printgate_core::ServerConfig;
use printgate_core::error::Result;
use printgate_print::{PrintServer, PrintService};
use printgate_security::{AuditLog, AuditSink, AuditWriter, hash_password};

#[derive(Debug, Parser)]
#[command(name = "printgate", version, about = "Session-gated remote print queue server")]
struct Cli {
    /// JSON configuration file. Missing file means built-in defaults.
    #[arg(short, long, env = "PRINTGATE_CONFIG", default_value = "printgate.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the print server (the default).
    Serve,
    /// Print the SHA-256 hash of a password, for the users file.
    HashPassword { password: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let result = match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&cli.config).await,
        Command::HashPassword { password } => {
            println!("{}", hash_password(&password));
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "printgate exited with an error");
            ExitCode::FAILURE
        }
    }
}

async fn serve(config_path: &PathBuf) -> Result<()> {
    info!("Printgate starting");

    let config = ServerConfig::load_or_default(config_path)?;
    let credentials = loader::load_credentials(&config.users_file)?;
    let roles = loader::load_access_policy(&config.access_file)?;

    let store: Arc<dyn AuditSink> = match &config.audit_db {
        Some(path) => Arc::new(AuditLog::open(path)?),
        None => Arc::new(AuditLog::open_in_memory()?),
    };
    let audit: Arc<dyn AuditSink> = Arc::new(AuditWriter::spawn(store)?);

    let service = Arc::new(PrintService::new(&config, credentials, roles, audit));
    info!(
        printers = ?service.queues().printers(),
        session_timeout_secs = service.session_timeout().num_seconds(),
        "print service ready"
    );

    let mut server = PrintServer::new(config.socket_addr());
    server.start(Arc::clone(&service)).await?;

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    server.stop().await?;
    Ok(())
}
