use std::fmt;

use url::Url;

/// Error type for ureq-relay
///
/// Transport failures (`Connect`, `Read`, `Write`, `Close`, `Proxy`, `Timeout`) are
/// produced by a [`Transport`][crate::transport::Transport] and passed through
/// untouched. The remaining variants are raised by the orchestration itself.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
#[non_exhaustive]
pub enum Error {
    Connect(String),
    Read(String),
    Write(String),
    Close(String),
    Proxy(String),
    Timeout(TimeoutKind, String),
    Protocol(String),
    RemoteProtocol(String),
    TooManyRedirects { url: Url, history: usize },
    UnsupportedProtocol(String),
    StreamConsumed,
    StreamMode,
    Unimplemented(&'static str),
    InvalidMountPattern(String),
    InvalidUrl(String),
    BadHeader(String),
    NetRc(String),
    Hook(String),
}

/// Which timeout fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    /// Establishing the connection took too long.
    Connect,
    /// Waiting for response data took too long.
    Read,
    /// Sending request data took too long.
    Write,
    /// Waiting for an admission permit took too long.
    Pool,
}

/// Coarse classification of an [`Error`], handy for branching on the cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network level failure reported by the transport.
    Transport,
    /// Any of the timeouts, including waiting for a pool permit.
    Timeout,
    /// Malformed or unsupported protocol data.
    Protocol,
    /// Redirect chain could not be followed.
    Redirect,
    /// Request body stream misuse.
    Stream,
    /// Bad configuration or input given to the client.
    Config,
}

impl Error {
    /// Categorize the error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Connect(_)
            | Error::Read(_)
            | Error::Write(_)
            | Error::Close(_)
            | Error::Proxy(_) => ErrorCategory::Transport,
            Error::Timeout(_, _) => ErrorCategory::Timeout,
            Error::Protocol(_) | Error::RemoteProtocol(_) | Error::Unimplemented(_) => {
                ErrorCategory::Protocol
            }
            Error::TooManyRedirects { .. } | Error::UnsupportedProtocol(_) => {
                ErrorCategory::Redirect
            }
            Error::StreamConsumed | Error::StreamMode => ErrorCategory::Stream,
            Error::InvalidMountPattern(_)
            | Error::InvalidUrl(_)
            | Error::BadHeader(_)
            | Error::NetRc(_)
            | Error::Hook(_) => ErrorCategory::Config,
        }
    }

    /// Tell if this is one of the timeout errors.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_, _))
    }

    /// Tell if this error was reported by a transport.
    pub fn is_transport(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Transport | ErrorCategory::Timeout
        )
    }
}

impl From<url::ParseError> for Error {
    fn from(value: url::ParseError) -> Self {
        Error::InvalidUrl(value.to_string())
    }
}

impl From<http::header::InvalidHeaderValue> for Error {
    fn from(value: http::header::InvalidHeaderValue) -> Self {
        Error::BadHeader(value.to_string())
    }
}

impl From<http::header::InvalidHeaderName> for Error {
    fn from(value: http::header::InvalidHeaderName) -> Self {
        Error::BadHeader(value.to_string())
    }
}

impl From<http::Error> for Error {
    fn from(value: http::Error) -> Self {
        Error::BadHeader(value.to_string())
    }
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connect(v) => write!(f, "connect failed: {}", v),
            Error::Read(v) => write!(f, "read failed: {}", v),
            Error::Write(v) => write!(f, "write failed: {}", v),
            Error::Close(v) => write!(f, "close failed: {}", v),
            Error::Proxy(v) => write!(f, "proxy failed: {}", v),
            Error::Timeout(k, v) => write!(f, "{} timeout: {}", k, v),
            Error::Protocol(v) => write!(f, "protocol error: {}", v),
            Error::RemoteProtocol(v) => write!(f, "remote protocol error: {}", v),
            Error::TooManyRedirects { url, history } => {
                write!(f, "too many redirects ({}) at {}", history, url)
            }
            Error::UnsupportedProtocol(v) => write!(f, "unsupported protocol: {}", v),
            Error::StreamConsumed => write!(f, "body stream has already been consumed"),
            Error::StreamMode => {
                write!(f, "body stream read in the wrong mode (blocking vs async)")
            }
            Error::Unimplemented(v) => write!(f, "not implemented: {}", v),
            Error::InvalidMountPattern(v) => {
                write!(f, "mount pattern must be scheme://host[:port]: {}", v)
            }
            Error::InvalidUrl(v) => write!(f, "invalid url: {}", v),
            Error::BadHeader(v) => write!(f, "bad header: {}", v),
            Error::NetRc(v) => write!(f, "netrc: {}", v),
            Error::Hook(v) => write!(f, "event hook failed: {}", v),
        }
    }
}

impl fmt::Display for TimeoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TimeoutKind::Connect => "connect",
            TimeoutKind::Read => "read",
            TimeoutKind::Write => "write",
            TimeoutKind::Pool => "pool",
        };
        write!(f, "{}", s)
    }
}
