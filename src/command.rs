//! The [`Command`] data record (C4 of the design: the unit of work handed
//! from a caller to exactly one backend connection).
use tokio::sync::oneshot;

use crate::Result;

/// Whether a bound parameter is encoded as text or in the backend's native
/// binary format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamFormat {
    Text,
    Binary,
}

/// One bound parameter: a byte buffer plus the format it is encoded in.
///
/// `None` represents a SQL `NULL`.
#[derive(Clone, Debug)]
pub struct Param {
    pub bytes: Option<Vec<u8>>,
    pub format: ParamFormat,
}

impl Param {
    pub fn null() -> Self {
        Self { bytes: None, format: ParamFormat::Text }
    }

    pub fn text(bytes: impl Into<Vec<u8>>) -> Self {
        Self { bytes: Some(bytes.into()), format: ParamFormat::Text }
    }

    pub fn binary(bytes: impl Into<Vec<u8>>) -> Self {
        Self { bytes: Some(bytes.into()), format: ParamFormat::Binary }
    }

    pub(crate) fn len(&self) -> i32 {
        self.bytes.as_ref().map_or(-1, |b| b.len() as i32)
    }
}

/// The opaque outcome of one successfully executed statement.
///
/// Row decoding is out of scope for this crate (see the crate-level docs);
/// a backend that needs to surface rows does so through its own
/// `RawConnection` implementation and a richer `CommandResult`-like type of
/// its own, layered on top of this core.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CommandResult {
    pub rows_affected: u64,
}

/// One parameterized SQL statement plus the single channel its outcome is
/// delivered through.
///
/// Consumed exactly once by one backend connection. The paired
/// `onResult`/`onError` callbacks of the original design collapse into a
/// single [`oneshot::Sender<Result<CommandResult>>`] here: idiomatic Rust
/// expresses "exactly one of two callbacks fires, exactly once" as "exactly
/// one `Result` is sent, exactly once".
pub struct Command {
    pub sql: std::sync::Arc<str>,
    pub param_count: usize,
    pub params: Vec<Param>,
    pub(crate) result: oneshot::Sender<Result<CommandResult>>,
}

impl Command {
    /// Build a command and the receiver its caller should await.
    ///
    /// `param_count` is the statement's declared arity; `params` must carry
    /// at least that many entries (§6). Violating this is undefined
    /// behavior at the core level and is caught here by a debug assertion.
    pub fn new(
        sql: impl Into<std::sync::Arc<str>>,
        param_count: usize,
        params: Vec<Param>,
    ) -> (Self, oneshot::Receiver<Result<CommandResult>>) {
        debug_assert!(
            params.len() >= param_count,
            "param vector shorter than its declared param_count"
        );
        let (tx, rx) = oneshot::channel();
        (
            Self { sql: sql.into(), param_count, params, result: tx },
            rx,
        )
    }

    /// Resolve this command's result channel. Silently dropped if the
    /// caller already stopped awaiting it — this is the uniform treatment
    /// the original design gives a "null" result/error callback.
    pub(crate) fn resolve(self, result: Result<CommandResult>) {
        let _ = self.result.send(result);
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("sql", &self.sql)
            .field("param_count", &self.param_count)
            .finish_non_exhaustive()
    }
}
