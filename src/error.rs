//! Error kinds shared by every naming-server operation.

use std::fmt;
use std::io;

/// Result of naming-server operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure modes of the naming server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed path, illegal component, or a misuse of the
    /// locking surface (unlocking a lock that is not held).
    InvalidArgument(String),
    /// The path is absent, its parent is not a directory, or a
    /// non-file path was asked for its storage node.
    NotFound(String),
    /// The storage or command handle is already registered.
    AlreadyRegistered,
    /// A file creation was attempted with zero registered storage nodes.
    NoStorage,
    /// An outbound directive to a storage node failed or was refused.
    Transport(String),
    /// A lock wait was interrupted by server shutdown.
    Cancelled,
}

impl Error {
    /// Wire discriminant of this error kind.
    pub fn code(&self) -> u32 {
        match self {
            Error::InvalidArgument(_) => 1,
            Error::NotFound(_) => 2,
            Error::AlreadyRegistered => 3,
            Error::NoStorage => 4,
            Error::Transport(_) => 5,
            Error::Cancelled => 6,
        }
    }

    /// Reconstructs an error from its wire discriminant and message.
    ///
    /// Unknown discriminants map to [`Error::Transport`], since they can
    /// only come from a misbehaving peer.
    pub fn from_code(code: u32, message: String) -> Error {
        match code {
            1 => Error::InvalidArgument(message),
            2 => Error::NotFound(message),
            3 => Error::AlreadyRegistered,
            4 => Error::NoStorage,
            5 => Error::Transport(message),
            6 => Error::Cancelled,
            other => Error::Transport(format!("unknown error code {other}: {message}")),
        }
    }

    /// Human-readable payload carried next to the discriminant.
    pub fn message(&self) -> &str {
        match self {
            Error::InvalidArgument(message)
            | Error::NotFound(message)
            | Error::Transport(message) => message,
            Error::AlreadyRegistered => "already registered",
            Error::NoStorage => "no storage node registered",
            Error::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
            Error::NotFound(message) => write!(f, "not found: {message}"),
            Error::AlreadyRegistered => write!(f, "storage node already registered"),
            Error::NoStorage => write!(f, "no storage node registered"),
            Error::Transport(message) => write!(f, "transport failure: {message}"),
            Error::Cancelled => write!(f, "lock wait cancelled"),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Transport(err.to_string())
    }
}
