use std::fmt;
use std::io;

/// The result type used throughout this crate's internals.
///
/// Public façade methods (`TcpServer`, `TcpClient`, `UdpPeer`) do not surface
/// this type directly -- per the error handling design, they collapse
/// failures to `bool` or an invalid handle so that application code never has
/// to unwind a `Result` across a callback boundary.
pub type Result<T> = std::result::Result<T, Error>;

/// The five error kinds named by the error handling design, plus a catch-all
/// for OS call failures that don't fit any of them.
#[derive(Debug)]
pub enum Error {
    /// A required pointer/reference/slice argument was absent (e.g. the
    /// byte-stream C-string writer given `None`).
    NullPointer,
    /// An argument was out of range or otherwise malformed, e.g. a byte
    /// stream read cursor moved past the write cursor.
    InvalidParameter(&'static str),
    /// An operation was attempted in a state that forbids it, e.g. starting
    /// a timer twice or sending on a socket that was never registered.
    Logic(&'static str),
    /// An underlying OS or runtime primitive failed in a way that leaves no
    /// more specific kind applicable, e.g. thread creation.
    Runtime(&'static str),
    /// A read or write would cross the bounds of an owned buffer.
    AccessViolation,
    /// Wraps a `std::io::Error` from an OS call.
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NullPointer => write!(f, "null pointer"),
            Error::InvalidParameter(msg) => write!(f, "invalid parameter: {msg}"),
            Error::Logic(msg) => write!(f, "logic error: {msg}"),
            Error::Runtime(msg) => write!(f, "runtime error: {msg}"),
            Error::AccessViolation => write!(f, "access violation"),
            Error::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl Error {
    pub fn is_would_block(&self) -> bool {
        matches!(self, Error::Io(err) if err.kind() == io::ErrorKind::WouldBlock)
    }
}
