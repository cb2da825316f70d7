// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// TCP front end for the print service.
//
// The listener accepts connections in a Tokio task; each connection gets
// its own task which reads newline-delimited JSON requests and answers each
// one on its own line (see `protocol`).  The service itself is synchronous
// and only ever holds short per-key locks, so handlers call it directly.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use printgate_core::error::{GateError, Result};

use crate::protocol::{Response, dispatch, encode_response, parse_request};
use crate::service::PrintService;

/// Longest request line, excluding its newline, accepted before the
/// connection is dropped.
const MAX_LINE_BYTES: usize = 64 * 1024;

/// Lifecycle of the listener itself (not the logical print service).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Stopped,
    Listening,
}

/// Network listener that feeds requests into a [`PrintService`].
pub struct PrintServer {
    /// Address requested at construction.
    bind_addr: SocketAddr,
    /// Address actually bound (differs when port 0 was requested).
    local_addr: Option<SocketAddr>,
    state: ListenerState,
    /// Signals the accept loop to exit.
    shutdown_signal: Arc<Notify>,
    task_handle: Option<JoinHandle<()>>,
    active_connections: Arc<AtomicU32>,
}

impl PrintServer {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            local_addr: None,
            state: ListenerState::Stopped,
            shutdown_signal: Arc::new(Notify::new()),
            task_handle: None,
            active_connections: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn state(&self) -> ListenerState {
        self.state
    }

    pub fn active_connections(&self) -> u32 {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Bind the listener and start accepting connections in the background.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is in use or cannot be bound.
    pub async fn start(&mut self, service: Arc<PrintService>) -> Result<SocketAddr> {
        if let (ListenerState::Listening, Some(addr)) = (self.state, self.local_addr) {
            debug!(%addr, "listener already running");
            return Ok(addr);
        }

        let listener = TcpListener::bind(self.bind_addr)
            .await
            .map_err(|e| GateError::Server(format!("bind {}: {e}", self.bind_addr)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| GateError::Server(format!("local address: {e}")))?;

        info!(addr = %local_addr, "print server listening");

        let shutdown = Arc::clone(&self.shutdown_signal);
        let connections = Arc::clone(&self.active_connections);
        let handle = tokio::spawn(async move {
            Self::accept_loop(listener, shutdown, connections, service).await;
        });

        self.task_handle = Some(handle);
        self.local_addr = Some(local_addr);
        self.state = ListenerState::Listening;
        Ok(local_addr)
    }

    /// Stop accepting connections and wait for the accept loop to exit.
    ///
    /// Connections already being served run to completion.
    pub async fn stop(&mut self) -> Result<()> {
        if self.state != ListenerState::Listening {
            return Ok(());
        }

        self.shutdown_signal.notify_one();
        if let Some(handle) = self.task_handle.take() {
            handle
                .await
                .map_err(|e| GateError::Server(format!("task join: {e}")))?;
        }

        self.state = ListenerState::Stopped;
        info!(addr = ?self.local_addr, "print server stopped");
        Ok(())
    }

    async fn accept_loop(
        listener: TcpListener,
        shutdown: Arc<Notify>,
        connections: Arc<AtomicU32>,
        service: Arc<PrintService>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    debug!("accept loop received shutdown signal");
                    break;
                }

                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, peer_addr)) => {
                            debug!(peer = %peer_addr, "incoming connection");
                            let service = Arc::clone(&service);
                            let connections = Arc::clone(&connections);
                            tokio::spawn(async move {
                                connections.fetch_add(1, Ordering::Relaxed);
                                if let Err(e) = handle_connection(stream, peer_addr, service).await {
                                    warn!(peer = %peer_addr, error = %e, "connection handler error");
                                }
                                connections.fetch_sub(1, Ordering::Relaxed);
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "failed to accept connection");
                        }
                    }
                }
            }
        }
    }
}

/// Serve requests on one connection until the peer hangs up.
async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    service: Arc<PrintService>,
) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut buf = Vec::with_capacity(1024);

    loop {
        buf.clear();
        let read = (&mut reader)
            .take(MAX_LINE_BYTES as u64 + 1)
            .read_until(b'\n', &mut buf)
            .await
            .map_err(|e| GateError::Server(format!("read from {peer_addr}: {e}")))?;

        if read == 0 {
            debug!(peer = %peer_addr, "peer closed connection");
            return Ok(());
        }

        let content_len = buf.len() - usize::from(buf.ends_with(b"\n"));
        if content_len > MAX_LINE_BYTES {
            warn!(peer = %peer_addr, bytes = content_len, "request line too long, closing");
            let response = Response::error(&GateError::Protocol("request line too long".into()));
            send_response(&mut write_half, &response).await?;
            return Ok(());
        }

        let Ok(line) = std::str::from_utf8(&buf) else {
            warn!(peer = %peer_addr, "request line is not valid UTF-8");
            let response = Response::error(&GateError::Protocol("request is not valid UTF-8".into()));
            send_response(&mut write_half, &response).await?;
            continue;
        };
        if line.trim().is_empty() {
            continue;
        }

        let response = match parse_request(line) {
            Ok(request) => {
                let op = request.op_name();
                let username = request.username().to_owned();
                let response = dispatch(&service, request);
                info!(
                    peer = %peer_addr,
                    %op,
                    %username,
                    ok = !matches!(response, Response::Error { .. }),
                    "request handled"
                );
                response
            }
            Err(e) => {
                warn!(peer = %peer_addr, error = %e, "malformed request");
                Response::error(&e)
            }
        };

        send_response(&mut write_half, &response).await?;
    }
}

async fn send_response(
    writer: &mut tokio::net::tcp::OwnedWriteHalf,
    response: &Response,
) -> Result<()> {
    let line = encode_response(response)?;
    writer
        .write_all(line.as_bytes())
        .await
        .map_err(|e| GateError::Server(format!("write response: {e}")))?;
    writer
        .flush()
        .await
        .map_err(|e| GateError::Server(format!("flush: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use printgate_core::config::ServerConfig;
    use printgate_core::error::ErrorKind;
    use printgate_core::types::{Operation, Role};
    use printgate_security::{CredentialStore, NullAudit, RoleStore, hash_password};
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

    fn service() -> Arc<PrintService> {
        Arc::new(PrintService::new(
            &ServerConfig::default(),
            CredentialStore::new([
                ("alice", hash_password("password")),
                ("cecilia", hash_password("secret")),
            ]),
            RoleStore::new(
                [
                    Role::new("admin", Operation::ALL),
                    Role::new("user", [Operation::Print, Operation::Queue]),
                ],
                [("alice", "admin"), ("cecilia", "user")],
            ),
            Arc::new(NullAudit),
        ))
    }

    async fn start() -> (PrintServer, SocketAddr) {
        let mut server = PrintServer::new("127.0.0.1:0".parse().unwrap());
        let addr = server.start(service()).await.unwrap();
        (server, addr)
    }

    struct Client {
        reader: BufReader<OwnedReadHalf>,
        writer: OwnedWriteHalf,
    }

    impl Client {
        async fn connect(addr: SocketAddr) -> Self {
            let (r, w) = TcpStream::connect(addr).await.unwrap().into_split();
            Self {
                reader: BufReader::new(r),
                writer: w,
            }
        }

        async fn send(&mut self, line: &str) -> Response {
            self.send_raw(line.as_bytes()).await
        }

        async fn send_raw(&mut self, bytes: &[u8]) -> Response {
            self.writer.write_all(bytes).await.unwrap();
            self.writer.write_all(b"\n").await.unwrap();
            let mut reply = String::new();
            self.reader.read_line(&mut reply).await.unwrap();
            serde_json::from_str(&reply).unwrap()
        }

        /// True once the server has closed its side.
        async fn at_eof(&mut self) -> bool {
            let mut rest = String::new();
            self.reader.read_line(&mut rest).await.unwrap() == 0
        }
    }

    /// A logout request padded to exactly `len` bytes, newline excluded.
    fn logout_line_of_len(len: usize) -> String {
        let head = r#"{"op":"logout","username":""#;
        let tail = r#""}"#;
        let pad = "a".repeat(len - head.len() - tail.len());
        format!("{head}{pad}{tail}")
    }

    #[test]
    fn new_server_is_stopped() {
        let server = PrintServer::new("127.0.0.1:2099".parse().unwrap());
        assert_eq!(server.state(), ListenerState::Stopped);
        assert_eq!(server.active_connections(), 0);
        assert!(server.local_addr().is_none());
    }

    #[tokio::test]
    async fn login_print_queue_over_tcp() {
        let (mut server, addr) = start().await;
        let mut client = Client::connect(addr).await;

        let login = format!(
            r#"{{"op":"login","username":"alice","passwordHash":"{}"}}"#,
            hash_password("password")
        );
        assert_eq!(client.send(&login).await, Response::ok());
        assert_eq!(
            client
                .send(r#"{"op":"print","filename":"a.txt","printer":"printer1","username":"alice"}"#)
                .await,
            Response::ok()
        );
        assert_eq!(
            client
                .send(r#"{"op":"queue","printer":"printer1","username":"alice"}"#)
                .await,
            Response::value("Queue for printer printer1:\n1. a.txt")
        );

        server.stop().await.unwrap();
        assert_eq!(server.state(), ListenerState::Stopped);
    }

    #[tokio::test]
    async fn errors_are_typed_on_the_wire() {
        let (mut server, addr) = start().await;
        let mut client = Client::connect(addr).await;

        let reply = client.send(r#"{"op":"stop","username":"cecilia"}"#).await;
        assert!(matches!(reply, Response::Error { kind: ErrorKind::SessionExpired, .. }));

        let login = format!(
            r#"{{"op":"login","username":"cecilia","passwordHash":"{}"}}"#,
            hash_password("secret")
        );
        assert_eq!(client.send(&login).await, Response::ok());
        let reply = client.send(r#"{"op":"stop","username":"cecilia"}"#).await;
        assert!(matches!(reply, Response::Error { kind: ErrorKind::AccessDenied, .. }));

        let reply = client
            .send(r#"{"op":"login","username":"cecilia","passwordHash":"00"}"#)
            .await;
        assert!(matches!(reply, Response::Error { kind: ErrorKind::InvalidCredentials, .. }));

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn malformed_line_keeps_connection_open() {
        let (mut server, addr) = start().await;
        let mut client = Client::connect(addr).await;

        let reply = client.send("{ this is not json").await;
        assert!(matches!(reply, Response::Error { kind: ErrorKind::BadRequest, .. }));

        let reply = client
            .send(r#"{"op":"availableCommands","username":"alice"}"#)
            .await;
        assert!(matches!(reply, Response::Error { kind: ErrorKind::SessionExpired, .. }));

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn line_at_size_limit_is_served() {
        let (mut server, addr) = start().await;
        let mut client = Client::connect(addr).await;

        let line = logout_line_of_len(MAX_LINE_BYTES);
        assert_eq!(line.len(), MAX_LINE_BYTES);
        let reply = client.send(&line).await;
        assert!(matches!(reply, Response::Error { kind: ErrorKind::SessionExpired, .. }));

        let reply = client
            .send(r#"{"op":"availableCommands","username":"alice"}"#)
            .await;
        assert!(matches!(reply, Response::Error { kind: ErrorKind::SessionExpired, .. }));

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn line_over_size_limit_closes_connection() {
        let (mut server, addr) = start().await;
        let mut client = Client::connect(addr).await;

        // No newline: the server stops reading at the limit and leaves
        // nothing unread behind it.
        let line = logout_line_of_len(MAX_LINE_BYTES + 1);
        client.writer.write_all(line.as_bytes()).await.unwrap();
        let mut raw = String::new();
        client.reader.read_line(&mut raw).await.unwrap();
        let reply: Response = serde_json::from_str(&raw).unwrap();
        match reply {
            Response::Error { kind, message } => {
                assert_eq!(kind, ErrorKind::BadRequest);
                assert!(message.contains("too long"), "{message}");
            }
            other => panic!("unexpected reply {other:?}"),
        }
        assert!(client.at_eof().await);

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn invalid_utf8_is_rejected_and_connection_stays_open() {
        let (mut server, addr) = start().await;
        let mut client = Client::connect(addr).await;

        let reply = client
            .send_raw(b"{\"op\":\"logout\",\"username\":\"al\xffice\"}")
            .await;
        match reply {
            Response::Error { kind, message } => {
                assert_eq!(kind, ErrorKind::BadRequest);
                assert!(message.contains("UTF-8"), "{message}");
            }
            other => panic!("unexpected reply {other:?}"),
        }

        let login = format!(
            r#"{{"op":"login","username":"alice","passwordHash":"{}"}}"#,
            hash_password("password")
        );
        assert_eq!(client.send(&login).await, Response::ok());

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let (mut server, _) = start().await;
        server.stop().await.unwrap();
        server.stop().await.unwrap();
        assert_eq!(server.state(), ListenerState::Stopped);
    }
}
