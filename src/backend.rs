//! The [`Backend`]/[`RawConnection`] contract (C1): the only surface the
//! pool and the transaction actor are allowed to use to reach an actual
//! database. The physical wire protocol is out of scope for this crate —
//! see the crate-level docs.
use std::sync::Arc;

use futures_core::future::BoxFuture;

use crate::{CommandResult, Param, Result};

/// Which wire protocol a pool's connections speak.
///
/// Purely descriptive metadata (used for logging and the default
/// placeholder token); the core never branches on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    PostgreSql,
    MySql,
}

impl BackendKind {
    /// The placeholder token a caller would typically rewrite from, for
    /// this backend family. Informational only — see [`crate::sql`].
    pub const fn default_placeholder_token(self) -> &'static str {
        match self {
            BackendKind::PostgreSql | BackendKind::MySql => "?",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            BackendKind::PostgreSql => "postgresql",
            BackendKind::MySql => "mysql",
        })
    }
}

/// Opaque, caller-supplied connection info, passed through verbatim to
/// [`Backend::connect`]. The core does not parse it.
#[derive(Clone, Debug)]
pub struct ConnectInfo(Arc<str>);

impl ConnectInfo {
    pub fn new(info: impl Into<Arc<str>>) -> Self {
        Self(info.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConnectInfo {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ConnectInfo {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// A pluggable database wire protocol.
///
/// Implementors provide the actual socket I/O; this crate's dispatch engine
/// only ever calls [`Backend::connect`] and the methods of the
/// [`RawConnection`] it returns.
pub trait Backend: Send + Sync + 'static {
    /// One live connection to the database.
    type Connection: RawConnection;

    /// Which wire protocol family this is, for logging/introspection.
    const KIND: BackendKind;

    /// Open and fully handshake one connection. Resolves once the backend
    /// is ready to accept a statement, or fails with [`crate::ErrorKind::Config`]
    /// / a connection-level error.
    fn connect(info: Arc<ConnectInfo>) -> BoxFuture<'static, Result<Self::Connection>>;
}

/// One live backend connection: the opaque object the spec calls a
/// "backend connection".
///
/// `exec` may only be called again after its previous call's future has
/// resolved — the engine never holds two in-flight `exec` futures for the
/// same connection at once, mirroring the `isWorking` invariant.
pub trait RawConnection: Send + 'static {
    /// Execute one statement to completion.
    ///
    /// `sql` and `params` are handed over by value rather than borrowed from
    /// the originating [`crate::Command`]: the engine needs to keep driving
    /// that `Command` (to resolve its result channel) independently of this
    /// future's lifetime, which only ever borrows `self`.
    ///
    /// The engine inspects the returned error's [`Error::is_connection_broken`][1]:
    /// a socket/protocol failure should be surfaced that way so the engine
    /// retires the connection and schedules a replacement. A SQL-level
    /// rejection from the server should be surfaced as `ExecutionFailed`
    /// instead, which leaves the connection usable for the next statement.
    ///
    /// [1]: crate::Error::is_connection_broken
    fn exec(&mut self, sql: Arc<str>, params: Vec<Param>) -> BoxFuture<'_, Result<CommandResult>>;

    /// Gracefully close the connection. Called exactly once, when the pool
    /// or a transaction is done with it for good (release is not a close:
    /// only shutdown and reconnect-on-error close a connection).
    fn close(self: Box<Self>) -> BoxFuture<'static, Result<()>>;
}
