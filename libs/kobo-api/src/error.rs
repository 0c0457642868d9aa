use std::fmt;

/// Category of a backend error. Lets the loader decide whether a failure
/// aborts the run or only costs one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid configuration. Permanent, fails at startup.
    Config,
    /// Transport error (connection refused, timeout, non-2xx).
    Io,
    /// Rejected credentials (HTTP 401/403, database auth).
    Auth,
    /// Payload could not be decoded.
    Format,
    /// Statement rejected by the database, or a value it cannot bind.
    Query,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Config => f.write_str("config"),
            ErrorKind::Io => f.write_str("io"),
            ErrorKind::Auth => f.write_str("auth"),
            ErrorKind::Format => f.write_str("format"),
            ErrorKind::Query => f.write_str("query"),
        }
    }
}

/// Unified error type for the `RecordSource` and `Database` seams.
///
/// `From` impls assign the kind automatically so backends can use `?`.
#[derive(Clone)]
pub struct BackendError {
    kind: ErrorKind,
    message: String,
}

impl BackendError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Config, message: msg.into() }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Io, message: msg.into() }
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Auth, message: msg.into() }
    }

    pub fn format(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Format, message: msg.into() }
    }

    pub fn query(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Query, message: msg.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Add context to the error, preserving the original kind.
    ///
    /// Produces: `"context: original message"`.
    pub fn with_context(self, ctx: impl fmt::Display) -> Self {
        Self {
            kind: self.kind,
            message: format!("{ctx}: {}", self.message),
        }
    }
}

impl fmt::Debug for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for BackendError {}

impl From<String> for BackendError {
    fn from(s: String) -> Self { Self { kind: ErrorKind::Query, message: s } }
}

impl From<&str> for BackendError {
    fn from(s: &str) -> Self { Self { kind: ErrorKind::Query, message: s.to_string() } }
}

impl From<std::io::Error> for BackendError {
    fn from(e: std::io::Error) -> Self { Self { kind: ErrorKind::Io, message: e.to_string() } }
}

impl From<serde_json::Error> for BackendError {
    fn from(e: serde_json::Error) -> Self { Self { kind: ErrorKind::Format, message: e.to_string() } }
}
