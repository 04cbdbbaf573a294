//! The connection pool (C2): a fixed-size set of backend connections shared
//! between callers, fronted by a single dedicated worker thread.
mod config;
mod worker;

use std::marker::PhantomData;
use std::sync::Arc;

use crate::backend::{Backend, ConnectInfo};
use crate::command::{Command, CommandResult, Param};
use crate::transaction::Transaction;
use crate::Result;

pub use config::PoolConfig;

use worker::WorkerHandle;

/// A handle to a running connection pool for one backend.
///
/// Cloning a `Client` is cheap — every clone shares the same worker thread
/// and the same set of connections. The pool itself is torn down only when
/// [`Client::shutdown`] is called, or when the last clone is dropped and a
/// pending [`WorkerHandle`]'s channel closes (in-flight work is then failed
/// with [`crate::ErrorKind::ShutdownInProgress`] rather than hung forever).
pub struct Client<B> {
    worker: WorkerHandle,
    _backend: PhantomData<fn() -> B>,
}

impl<B> Clone for Client<B> {
    fn clone(&self) -> Self {
        Self { worker: self.worker.clone(), _backend: PhantomData }
    }
}

impl<B: Backend> Client<B> {
    /// Start a pool of connections to `info`, configured by `config`.
    ///
    /// Connections are established lazily, in the background, on the pool's
    /// dedicated worker thread — this call returns immediately without
    /// waiting for any of them to be ready. The first statement submitted
    /// before any connection is up simply waits in the wait buffer.
    pub fn connect(info: impl Into<ConnectInfo>, config: PoolConfig) -> Self {
        let worker = WorkerHandle::spawn::<B>(info.into(), config);
        Self { worker, _backend: PhantomData }
    }

    /// Execute one parameterized statement against the first available
    /// connection in the pool, falling back to FIFO waiting if every
    /// connection is busy.
    pub async fn exec_sql(
        &self,
        sql: impl Into<Arc<str>>,
        param_count: usize,
        params: Vec<Param>,
    ) -> Result<CommandResult> {
        let (cmd, rx) = Command::new(sql, param_count, params);
        self.worker.submit(cmd);
        rx.await.unwrap_or_else(|_| Err(crate::Error::shutdown_in_progress()))
    }

    /// Reserve one connection for a transactional session.
    ///
    /// Waits (without blocking the pool's worker thread or any other
    /// caller) until a connection is free, then issues `BEGIN` and returns
    /// a handle bound to that connection for the lifetime of the
    /// transaction.
    pub async fn begin(&self) -> Result<Transaction> {
        self.worker.begin().await
    }

    /// Gracefully stop the pool: fail everything still waiting, close every
    /// connection, and wait for the worker thread to finish doing so.
    ///
    /// Further calls on this (or any clone of this) `Client` fail with
    /// [`crate::ErrorKind::ShutdownInProgress`].
    pub async fn shutdown(&self) {
        self.worker.shutdown().await;
    }
}
