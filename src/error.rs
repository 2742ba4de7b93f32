//! Error handling for spotdeck.
//!
//! Every fallible operation returns [`struct@Error`]: a coarse [`ErrorKind`]
//! plus the boxed underlying error. The kinds borrow their names from gRPC
//! status codes. Controls only need the kind to decide between an alert and
//! a placeholder, while logs get the full chain.
//!
//! Domain errors such as [`AuthError`](crate::auth::AuthError) and
//! [`ApiError`](crate::api::ApiError) stay recoverable through
//! [`Error::downcast`].

#![allow(clippy::enum_glob_use)]

use std::fmt;
use thiserror::Error;

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub error: Box<dyn std::error::Error + Send + Sync>,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Error categories.
#[expect(clippy::module_name_repetitions)]
#[derive(Clone, Copy, Debug, Eq, Error, Hash, Ord, PartialEq, PartialOrd)]
pub enum ErrorKind {
    #[error("operation was cancelled")]
    Cancelled,

    #[error("unknown error")]
    Unknown,

    /// A request was malformed, or rejected as such by a remote service.
    #[error("invalid argument specified")]
    InvalidArgument,

    /// A timeout elapsed, including waiting for the user to authorize.
    #[error("operation timed out")]
    DeadlineExceeded,

    #[error("not found")]
    NotFound,

    /// Typically a loopback port that is already taken.
    #[error("already in use")]
    AlreadyExists,

    /// Access was refused, or an authorization redirect did not match.
    #[error("permission denied")]
    PermissionDenied,

    /// No usable tokens.
    #[error("no valid authentication credentials")]
    Unauthenticated,

    /// Rate limited by a remote service.
    #[error("resource has been exhausted")]
    ResourceExhausted,

    /// The operation needs something that is not there, such as an active
    /// playback device.
    #[error("invalid state")]
    FailedPrecondition,

    #[error("operation aborted")]
    Aborted,

    #[error("internal error")]
    Internal,

    #[error("service unavailable")]
    Unavailable,

    /// A response was truncated or lacked required fields.
    #[error("incomplete or corrupt data")]
    DataLoss,
}

impl ErrorKind {
    /// Classifies an unexpected HTTP status code returned by a remote service.
    #[must_use]
    pub fn from_status(status: http::StatusCode) -> Self {
        match status.as_u16() {
            400 => Self::InvalidArgument,
            401 => Self::Unauthenticated,
            403 => Self::PermissionDenied,
            404 => Self::NotFound,
            409 => Self::Aborted,
            429 => Self::ResourceExhausted,
            500..=599 => Self::Unavailable,
            _ => Self::FailedPrecondition,
        }
    }
}

impl Error {
    pub fn new<E>(kind: ErrorKind, error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self {
            kind,
            error: error.into(),
        }
    }

    /// Returns the underlying error if it is an `E`.
    #[must_use]
    pub fn downcast<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        self.error.downcast_ref::<E>()
    }

    pub fn data_loss<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::DataLoss, error)
    }

    pub fn deadline_exceeded<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::DeadlineExceeded, error)
    }

    pub fn failed_precondition<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::FailedPrecondition, error)
    }

    /// For errors that indicate a bug rather than a failing environment.
    pub fn internal<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::Internal, error)
    }

    pub fn not_found<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::NotFound, error)
    }

    pub fn permission_denied<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::PermissionDenied, error)
    }

    pub fn unauthenticated<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::Unauthenticated, error)
    }

    pub fn unavailable<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::Unavailable, error)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.error.source()
    }
}

/// Formats as `{kind}: {details}`.
impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}: ", self.kind)?;
        self.error.fmt(fmt)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind::*;
        let kind = match err.kind() {
            NotFound => ErrorKind::NotFound,
            PermissionDenied => ErrorKind::PermissionDenied,
            AddrInUse | AlreadyExists => ErrorKind::AlreadyExists,
            AddrNotAvailable | ConnectionRefused | NotConnected => ErrorKind::Unavailable,
            BrokenPipe | ConnectionReset | ConnectionAborted => ErrorKind::Aborted,
            Interrupted | WouldBlock => ErrorKind::Cancelled,
            UnexpectedEof => ErrorKind::DataLoss,
            TimedOut => ErrorKind::DeadlineExceeded,
            InvalidInput | InvalidData => ErrorKind::InvalidArgument,
            _ => ErrorKind::Unknown,
        };
        Self::new(kind, err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            ErrorKind::DeadlineExceeded
        } else if err.is_connect() {
            ErrorKind::Unavailable
        } else if err.is_body() {
            ErrorKind::DataLoss
        } else if err.is_decode() {
            ErrorKind::InvalidArgument
        } else if err.is_builder() {
            ErrorKind::Internal
        } else if let Some(status) = err.status() {
            ErrorKind::from_status(status)
        } else {
            ErrorKind::Unknown
        };
        Self::new(kind, err)
    }
}

/// Errors of the host connection.
impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error::*;
        match err {
            Io(err) => err.into(),
            ConnectionClosed | AlreadyClosed => Self::unavailable(err),
            Capacity(_) | WriteBufferFull(_) => {
                Self::new(ErrorKind::ResourceExhausted, err.to_string())
            }
            Url(_) | HttpFormat(_) => Self::new(ErrorKind::InvalidArgument, err),
            _ => Self::new(ErrorKind::Unknown, err),
        }
    }
}

/// JSON errors follow the I/O mapping: syntax and data errors become
/// `InvalidArgument`, truncated input `DataLoss`.
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        std::io::Error::from(err).into()
    }
}

impl From<http::header::InvalidHeaderValue> for Error {
    fn from(e: http::header::InvalidHeaderValue) -> Self {
        Self::internal(e.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Self::new(ErrorKind::InvalidArgument, e.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(e: tokio::time::error::Elapsed) -> Self {
        Self::deadline_exceeded(e.to_string())
    }
}
