use std::fmt;

/// How the session reacts to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The session's premises are invalid. Abort the whole run.
    Fatal,
    /// Only the current message is affected. Log, skip, continue.
    Recoverable,
}

/// Error kind for session errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid configuration or arguments.
    Config,
    /// Broker unreachable, permission denied, partition assignment failed.
    Connect,
    /// Broker read failure or output write failure.
    Io,
    /// Schema registry unreachable or returned an error.
    Registry,
    /// Schema document could not be parsed.
    Schema,
    /// Binary record does not match its resolved schema.
    Decode,
    /// A decoded message could not be rendered as output text.
    Render,
}

impl ErrorKind {
    pub fn severity(self) -> Severity {
        match self {
            ErrorKind::Render => Severity::Recoverable,
            _ => Severity::Fatal,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Config => f.write_str("config"),
            ErrorKind::Connect => f.write_str("connect"),
            ErrorKind::Io => f.write_str("io"),
            ErrorKind::Registry => f.write_str("registry"),
            ErrorKind::Schema => f.write_str("schema"),
            ErrorKind::Decode => f.write_str("decode"),
            ErrorKind::Render => f.write_str("render"),
        }
    }
}

/// Session error returned by every source, registry and pipeline operation.
///
/// Carries an `ErrorKind` so the stream controller can tell a fatal
/// condition from a per-message one without string matching.
#[derive(Clone)]
pub struct TailError {
    kind: ErrorKind,
    message: String,
}

impl TailError {
    pub fn new(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self { kind, message: msg.into() }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, msg)
    }

    pub fn connect(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Connect, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, msg)
    }

    pub fn registry(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Registry, msg)
    }

    pub fn schema(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Schema, msg)
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Decode, msg)
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Render, msg)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    /// Add context to the error, preserving the original ErrorKind.
    ///
    /// Produces: `"context: original message"`.
    pub fn with_context(self, ctx: impl fmt::Display) -> Self {
        Self {
            kind: self.kind,
            message: format!("{ctx}: {}", self.message),
        }
    }
}

impl fmt::Debug for TailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl fmt::Display for TailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for TailError {}

// ---------------------------------------------------------------------------
// From impls: standard error types → TailError with correct ErrorKind
// ---------------------------------------------------------------------------

impl From<std::io::Error> for TailError {
    fn from(e: std::io::Error) -> Self {
        Self::io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_render_errors_are_recoverable() {
        assert_eq!(TailError::render("x").severity(), Severity::Recoverable);
        for err in [
            TailError::config("x"),
            TailError::connect("x"),
            TailError::io("x"),
            TailError::registry("x"),
            TailError::schema("x"),
            TailError::decode("x"),
        ] {
            assert!(err.is_fatal(), "{err:?} should be fatal");
        }
    }

    #[test]
    fn context_keeps_kind() {
        let err = TailError::registry("status 404").with_context("schema 7");
        assert_eq!(err.kind(), ErrorKind::Registry);
        assert_eq!(err.to_string(), "schema 7: status 404");
        assert_eq!(format!("{err:?}"), "[registry] schema 7: status 404");
    }
}
