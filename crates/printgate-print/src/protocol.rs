// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Wire protocol — one JSON object per line in each direction.
//
//   -> {"op":"login","username":"alice","passwordHash":"5e88..."}
//   <- {"status":"ok"}
//   -> {"op":"queue","printer":"printer1","username":"alice"}
//   <- {"status":"ok","value":"Queue for printer printer1 is empty"}
//   -> {"op":"readConfig","key":"paper","username":"alice"}
//   <- {"status":"notFound","key":"paper"}
//   -> {"op":"stop","username":"alice"}
//   <- {"status":"error","kind":"SessionExpired","message":"..."}

use serde::{Deserialize, Serialize};

use printgate_core::error::{ErrorKind, GateError, Result};
use printgate_core::types::ConfigValue;

use crate::service::PrintService;

/// A client request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Request {
    Login { username: String, password_hash: String },
    Logout { username: String },
    Print { filename: String, printer: String, username: String },
    Queue { printer: String, username: String },
    TopQueue { printer: String, job: i64, username: String },
    Start { username: String },
    Stop { username: String },
    Restart { username: String },
    Status { printer: String, username: String },
    ReadConfig { key: String, username: String },
    SetConfig { key: String, value: String, username: String },
    AvailableCommands { username: String },
}

impl Request {
    /// The acting user.
    pub fn username(&self) -> &str {
        match self {
            Self::Login { username, .. }
            | Self::Logout { username }
            | Self::Print { username, .. }
            | Self::Queue { username, .. }
            | Self::TopQueue { username, .. }
            | Self::Start { username }
            | Self::Stop { username }
            | Self::Restart { username }
            | Self::Status { username, .. }
            | Self::ReadConfig { username, .. }
            | Self::SetConfig { username, .. }
            | Self::AvailableCommands { username } => username,
        }
    }

    /// Wire name of the operation, for logging.
    pub fn op_name(&self) -> &'static str {
        match self {
            Self::Login { .. } => "login",
            Self::Logout { .. } => "logout",
            Self::Print { .. } => "print",
            Self::Queue { .. } => "queue",
            Self::TopQueue { .. } => "topQueue",
            Self::Start { .. } => "start",
            Self::Stop { .. } => "stop",
            Self::Restart { .. } => "restart",
            Self::Status { .. } => "status",
            Self::ReadConfig { .. } => "readConfig",
            Self::SetConfig { .. } => "setConfig",
            Self::AvailableCommands { .. } => "availableCommands",
        }
    }
}

/// A server reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Response {
    Ok {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
    /// A settings lookup missed. Not a failure.
    NotFound { key: String },
    Error { kind: ErrorKind, message: String },
}

impl Response {
    pub fn ok() -> Self {
        Self::Ok { value: None }
    }

    pub fn value(value: impl Into<String>) -> Self {
        Self::Ok {
            value: Some(value.into()),
        }
    }

    pub fn error(err: &GateError) -> Self {
        Self::Error {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<Result<()>> for Response {
    fn from(result: Result<()>) -> Self {
        match result {
            Ok(()) => Self::ok(),
            Err(e) => Self::error(&e),
        }
    }
}

impl From<Result<String>> for Response {
    fn from(result: Result<String>) -> Self {
        match result {
            Ok(value) => Self::value(value),
            Err(e) => Self::error(&e),
        }
    }
}

/// Parse one request line.
pub fn parse_request(line: &str) -> Result<Request> {
    serde_json::from_str(line.trim()).map_err(|e| GateError::Protocol(e.to_string()))
}

/// Serialise a response as a single line (newline included).
pub fn encode_response(response: &Response) -> Result<String> {
    let mut line = serde_json::to_string(response)?;
    line.push('\n');
    Ok(line)
}

/// Run `request` against the service.
pub fn dispatch(service: &PrintService, request: Request) -> Response {
    match request {
        Request::Login {
            username,
            password_hash,
        } => service.login(&username, &password_hash).into(),
        Request::Logout { username } => service.logout(&username).into(),
        Request::Print {
            filename,
            printer,
            username,
        } => service.print(&filename, &printer, &username).into(),
        Request::Queue { printer, username } => service.queue(&printer, &username).into(),
        Request::TopQueue {
            printer,
            job,
            username,
        } => service.top_queue(&printer, job, &username).into(),
        Request::Start { username } => service.start(&username).into(),
        Request::Stop { username } => service.stop(&username).into(),
        Request::Restart { username } => service.restart(&username).into(),
        Request::Status { printer, username } => service.status(&printer, &username).into(),
        Request::ReadConfig { key, username } => match service.read_config(&key, &username) {
            Ok(ConfigValue::Found(value)) => Response::value(value),
            Ok(ConfigValue::NotFound) => Response::NotFound { key },
            Err(e) => Response::error(&e),
        },
        Request::SetConfig {
            key,
            value,
            username,
        } => service.set_config(&key, &value, &username).into(),
        Request::AvailableCommands { username } => service.available_commands(&username).into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use printgate_core::config::ServerConfig;
    use printgate_core::types::{Operation, Role};
    use printgate_security::{CredentialStore, NullAudit, RoleStore, hash_password};
    use std::sync::Arc;

    fn service() -> PrintService {
        PrintService::new(
            &ServerConfig::default(),
            CredentialStore::new([("alice", hash_password("password"))]),
            RoleStore::new([Role::new("admin", Operation::ALL)], [("alice", "admin")]),
            Arc::new(NullAudit),
        )
    }

    #[test]
    fn parses_camel_case_requests() {
        let req = parse_request(
            r#"{"op":"topQueue","printer":"printer1","job":2,"username":"alice"}"#,
        )
        .unwrap();
        assert_eq!(
            req,
            Request::TopQueue {
                printer: "printer1".into(),
                job: 2,
                username: "alice".into()
            }
        );
        assert_eq!(req.op_name(), "topQueue");
        assert_eq!(req.username(), "alice");

        let login = parse_request(r#"{"op":"login","username":"a","passwordHash":"ff"}"#).unwrap();
        assert!(matches!(login, Request::Login { ref password_hash, .. } if password_hash == "ff"));
    }

    #[test]
    fn negative_job_index_is_representable() {
        let req =
            parse_request(r#"{"op":"topQueue","printer":"p","job":-1,"username":"a"}"#).unwrap();
        assert!(matches!(req, Request::TopQueue { job: -1, .. }));
    }

    #[test]
    fn malformed_requests_are_protocol_errors() {
        for line in [
            "",
            "not json",
            r#"{"op":"format","username":"a"}"#,
            r#"{"op":"print","username":"a"}"#,
        ] {
            let err = parse_request(line).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::BadRequest, "{line:?}");
        }
    }

    #[test]
    fn response_encoding() {
        assert_eq!(encode_response(&Response::ok()).unwrap(), "{\"status\":\"ok\"}\n");
        assert_eq!(
            encode_response(&Response::value("x")).unwrap(),
            "{\"status\":\"ok\",\"value\":\"x\"}\n"
        );
        assert_eq!(
            encode_response(&Response::NotFound { key: "k".into() }).unwrap(),
            "{\"status\":\"notFound\",\"key\":\"k\"}\n"
        );
        let line = encode_response(&Response::error(&GateError::SessionExpired)).unwrap();
        assert!(line.starts_with("{\"status\":\"error\",\"kind\":\"SessionExpired\""));
    }

    #[test]
    fn dispatch_full_flow() {
        let svc = service();
        let send = |line: &str| dispatch(&svc, parse_request(line).unwrap());

        let denied = send(r#"{"op":"queue","printer":"printer1","username":"alice"}"#);
        assert!(matches!(
            denied,
            Response::Error { kind: ErrorKind::SessionExpired, .. }
        ));

        let login = format!(
            r#"{{"op":"login","username":"alice","passwordHash":"{}"}}"#,
            hash_password("password")
        );
        assert_eq!(send(&login), Response::ok());
        assert_eq!(
            send(r#"{"op":"print","filename":"a.txt","printer":"printer1","username":"alice"}"#),
            Response::ok()
        );
        assert_eq!(
            send(r#"{"op":"queue","printer":"printer1","username":"alice"}"#),
            Response::value("Queue for printer printer1:\n1. a.txt")
        );
        assert_eq!(
            send(r#"{"op":"readConfig","key":"missing","username":"alice"}"#),
            Response::NotFound {
                key: "missing".into()
            }
        );
        assert!(matches!(
            send(r#"{"op":"topQueue","printer":"printer1","job":5,"username":"alice"}"#),
            Response::Error { kind: ErrorKind::InvalidJobIndex, .. }
        ));
    }
}
