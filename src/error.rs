//! `connpool` error types.
use std::fmt;

/// A specialized [`Result`] type for `connpool` operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// All possible errors from the `connpool` library.
pub struct Error {
    context: String,
    kind: ErrorKind,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind) -> Self {
        Self { context: String::new(), kind }
    }

    /// Attach extra context to this error.
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    /// The kind of error that occurred.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Build a [`ErrorKind::ConnectionBroken`] error.
    ///
    /// `Backend` implementations call this from [`crate::RawConnection::exec`]
    /// (or [`crate::Backend::connect`]) to report a socket/protocol failure
    /// that makes the connection unusable for any further statement.
    pub fn connection_broken(source: impl Into<BoxStdError>) -> Self {
        Self::new(ErrorKind::ConnectionBroken(source.into()))
    }

    /// Build a [`ErrorKind::ExecutionFailed`] error.
    ///
    /// `Backend` implementations call this to report a SQL-level rejection
    /// that leaves the connection itself usable for the next statement.
    pub fn execution_failed(source: impl Into<BoxStdError>) -> Self {
        Self::new(ErrorKind::ExecutionFailed(source.into()))
    }

    /// Build a [`ErrorKind::Config`] error, for when a `Backend` rejects the
    /// opaque [`crate::ConnectInfo`] it was given.
    pub fn config(source: impl Into<BoxStdError>) -> Self {
        Self::new(ErrorKind::Config(source.into()))
    }

    pub(crate) fn transaction_rolled_back() -> Self {
        Self::new(ErrorKind::TransactionRolledBack)
    }

    pub(crate) fn shutdown_in_progress() -> Self {
        Self::new(ErrorKind::ShutdownInProgress)
    }

    pub(crate) fn backpressure_exceeded() -> Self {
        Self::new(ErrorKind::BackpressureExceeded)
    }

    /// `true` if this error means the connection that was executing the
    /// command is no longer usable.
    pub fn is_connection_broken(&self) -> bool {
        matches!(self.kind, ErrorKind::ConnectionBroken(_))
    }
}

type BoxStdError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// All possible error kinds from the `connpool` library.
pub enum ErrorKind {
    /// The backend connection failed during or before a statement; the
    /// statement did not definitely commit.
    ConnectionBroken(BoxStdError),
    /// The backend returned a SQL error for this statement.
    ExecutionFailed(BoxStdError),
    /// The command was rejected because its transaction is already
    /// finished, or is being drained after an earlier failure.
    TransactionRolledBack,
    /// Submitted after the client was closed.
    ShutdownInProgress,
    /// The wait buffer was at its configured maximum depth.
    BackpressureExceeded,
    /// The opaque connection-info value was rejected by the backend.
    Config(BoxStdError),
}

macro_rules! from {
    (<$ty:ty>$pat:pat => $body:expr) => {
        impl From<$ty> for Error {
            fn from($pat: $ty) -> Self {
                Self { context: String::new(), kind: $body }
            }
        }
    };
}

from!(<ErrorKind>e => e);

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ErrorKind::ConnectionBroken(e) | ErrorKind::ExecutionFailed(e) | ErrorKind::Config(e) => {
                Some(e.as_ref())
            }
            ErrorKind::TransactionRolledBack
            | ErrorKind::ShutdownInProgress
            | ErrorKind::BackpressureExceeded => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.context.is_empty() {
            write!(f, "{}: ", self.context)?;
        }
        fmt::Display::fmt(&self.kind, f)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

impl std::error::Error for ErrorKind {}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionBroken(e) => write!(f, "connection broken: {e}"),
            Self::ExecutionFailed(e) => write!(f, "execution failed: {e}"),
            Self::TransactionRolledBack => f.write_str("transaction rolled back"),
            Self::ShutdownInProgress => f.write_str("shutdown in progress"),
            Self::BackpressureExceeded => f.write_str("wait buffer backpressure exceeded"),
            Self::Config(e) => write!(f, "invalid connection info: {e}"),
        }
    }
}

impl fmt::Debug for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}
