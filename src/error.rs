//! Error types shared by the session layer and the pipelines.

use std::fmt;

use thiserror::Error;

use crate::scan::enumerate::EnumerateError;

/// Coarse classification of a session failure.
///
/// Only [`ErrorKind::SessionInvalid`] is retried by the executor; every other
/// kind abandons the action that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// TCP/TLS connection could not be established.
    Connection,
    /// Credentials were rejected.
    Authentication,
    /// The session dropped or the server no longer considers us logged in.
    SessionInvalid,
    /// The server answered NO/BAD to a command.
    Rejected,
    /// The response could not be understood.
    Protocol,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Connection => "connection error",
            ErrorKind::Authentication => "login error",
            ErrorKind::SessionInvalid => "session invalid",
            ErrorKind::Rejected => "rejected by server",
            ErrorKind::Protocol => "protocol error",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct SessionError {
    pub kind: ErrorKind,
    pub message: String,
}

impl SessionError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn session_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SessionInvalid, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Rejected, message)
    }

    /// Whether a reconnect may cure this failure.
    pub fn is_transient(&self) -> bool {
        self.kind == ErrorKind::SessionInvalid
    }
}

/// Fatal conditions detected before any scan starts.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error(transparent)]
    Enumerate(#[from] EnumerateError),

    #[error("could not find trash folder")]
    TrashNotFound,

    #[error("configured trash folder {0:?} does not exist on the server")]
    TrashMissing(String),

    #[error(transparent)]
    Session(#[from] SessionError),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FingerprintError {
    #[error("unparseable message: {0}")]
    Parse(String),
}
