//! Transactional sessions (C3): a handle plus the actor task that drives a
//! single reserved connection through `BEGIN` / statements / `ROLLBACK` or
//! `COMMIT`.
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Poll;

use tokio::sync::{mpsc, oneshot};

use crate::backend::{Backend, RawConnection};
use crate::command::{Command, CommandResult, Param};
use crate::common::warn;
use crate::error::Error;
use crate::Result;

/// A reserved connection running inside a transaction.
///
/// Obtained from [`crate::Client::begin`]. Every statement sent through
/// `exec_sql` runs on the same physical connection, in submission order.
/// Dropping the last live handle implicitly commits — there is no explicit
/// `commit` method, matching the source this crate's transactional sessions
/// are modeled on: a transaction either finishes by an explicit
/// [`rollback`][1], or it commits once every handle sharing it (see
/// [`begin_nested`][2]) has gone out of scope.
///
/// [1]: Transaction::rollback
/// [2]: Transaction::begin_nested
pub struct Transaction {
    shared: Arc<Shared>,
}

/// The part of a [`Transaction`] actually shared between `begin_nested`
/// clones. Wrapping the inbox in an `Arc<Shared>` rather than cloning the
/// `mpsc::UnboundedSender` directly means `CommitOnDrop` fires exactly once,
/// when the *last* clone is dropped — the same lifetime `shared_from_this`
/// gives the original design's transaction object, reproduced here through
/// ordinary reference counting instead of a second, hand-rolled counter.
struct Shared {
    inbox: mpsc::UnboundedSender<TxMsg>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        // best-effort: if the actor is already gone (or already finished)
        // this send simply fails and is ignored, which is the correct
        // outcome — there is nothing left to commit.
        let _ = self.inbox.send(TxMsg::CommitOnDrop);
    }
}

impl Transaction {
    pub(crate) fn new(inbox: mpsc::UnboundedSender<TxMsg>) -> Self {
        Self { shared: Arc::new(Shared { inbox }) }
    }

    /// Execute one statement on this transaction's connection.
    ///
    /// If the transaction has already finished (explicit rollback, or an
    /// earlier statement failed and triggered an automatic rollback), this
    /// resolves immediately with [`crate::ErrorKind::TransactionRolledBack`]
    /// without reaching the connection.
    pub async fn exec_sql(
        &self,
        sql: impl Into<Arc<str>>,
        param_count: usize,
        params: Vec<Param>,
    ) -> Result<CommandResult> {
        let (cmd, rx) = Command::new(sql, param_count, params);
        if self.shared.inbox.send(TxMsg::Exec(cmd)).is_err() {
            return Err(Error::transaction_rolled_back());
        }
        rx.await.unwrap_or_else(|_| Err(Error::transaction_rolled_back()))
    }

    /// Roll back this transaction now, instead of waiting for it to be
    /// dropped. A no-op if the transaction has already finished.
    pub async fn rollback(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        if self.shared.inbox.send(TxMsg::Rollback(tx)).is_err() {
            return Ok(());
        }
        rx.await.unwrap_or(Ok(()))
    }

    /// Start a nested session on the same connection.
    ///
    /// This crate has no savepoint support (see the crate docs' non-goals):
    /// "nesting" here means the original design's own semantics — a cheap
    /// clone of the handle that shares the same connection and the same
    /// eventual commit/rollback, not an independent `SAVEPOINT`. The commit
    /// only runs once every clone sharing this session — the original and
    /// every `begin_nested` descendant of it — has been dropped.
    pub fn begin_nested(&self) -> Transaction {
        Transaction { shared: self.shared.clone() }
    }
}

pub(crate) enum TxMsg {
    Exec(Command),
    Rollback(oneshot::Sender<Result<()>>),
    CommitOnDrop,
}

/// One statement queued on the transaction's connection: either a caller's
/// command, or one of the two pseudo-statements that end the session.
enum Item {
    User(Command),
    Rollback,
    Commit,
}

impl Item {
    fn sql(&self) -> Arc<str> {
        match self {
            Item::User(cmd) => cmd.sql.clone(),
            Item::Rollback => Arc::from("ROLLBACK"),
            Item::Commit => Arc::from("COMMIT"),
        }
    }

    fn params(&self) -> Vec<Param> {
        match self {
            Item::User(cmd) => cmd.params.clone(),
            Item::Rollback | Item::Commit => Vec::new(),
        }
    }
}

/// Drive one connection through a transaction from `BEGIN` to its
/// commit/rollback. Returns `true` if the connection broke along the way,
/// in which case the caller (the connection's actor task) must not reuse
/// it.
///
/// Runs entirely on the connection actor's task: nothing here is shared
/// with the pool dispatcher, so no lock is needed — mirroring the
/// original design's "transaction commands are executed serially on a
/// dedicated connection, queued in userspace while one is in flight".
pub(crate) async fn run<B: Backend>(
    conn: &mut B::Connection,
    mut inbox: mpsc::UnboundedReceiver<TxMsg>,
) -> bool {
    if let Err(e) = conn.exec(Arc::from("BEGIN"), Vec::new()).await {
        let broken = e.is_connection_broken();
        warn!("connpool: transaction BEGIN failed: {e}");
        drain_as_rolled_back(&mut inbox).await;
        return broken;
    }

    let mut buffer: VecDeque<Item> = VecDeque::new();
    let mut rollback_waiters: VecDeque<oneshot::Sender<Result<()>>> = VecDeque::new();
    let mut terminal_queued = false;
    let mut is_finished = false;
    let mut current: Option<Current<'_>> = None;
    let mut broken = false;

    loop {
        if current.is_none() {
            if let Some(item) = buffer.pop_front() {
                let sql = item.sql();
                let params = item.params();
                current = Some(Current { item, fut: conn.exec(sql, params) });
            } else if is_finished {
                break;
            }
        }

        tokio::select! {
            biased;

            msg = inbox.recv() => {
                match msg {
                    None => {
                        // the handle was dropped without ever reaching
                        // `Drop` (shouldn't happen, but leaves no one to
                        // commit); roll back rather than leave the
                        // transaction open forever.
                        if !terminal_queued {
                            terminal_queued = true;
                            buffer.push_front(Item::Rollback);
                        }
                    }
                    Some(TxMsg::Exec(cmd)) => {
                        if is_finished {
                            cmd.resolve(Err(Error::transaction_rolled_back()));
                        } else {
                            buffer.push_back(Item::User(cmd));
                        }
                    }
                    Some(TxMsg::Rollback(reply)) => {
                        if is_finished {
                            let _ = reply.send(Ok(()));
                        } else {
                            rollback_waiters.push_back(reply);
                            if !terminal_queued {
                                terminal_queued = true;
                                buffer.push_front(Item::Rollback);
                            }
                        }
                    }
                    Some(TxMsg::CommitOnDrop) => {
                        if !is_finished && !terminal_queued {
                            terminal_queued = true;
                            buffer.push_back(Item::Commit);
                        }
                    }
                }
            }

            result = poll_current(&mut current), if current.is_some() => {
                let done = current.take().unwrap();
                let is_err = result.as_ref().err().is_some_and(Error::is_connection_broken);
                broken |= is_err;

                match done.item {
                    Item::User(cmd) => {
                        let failed = result.is_err();
                        cmd.resolve(result);
                        if failed && !terminal_queued {
                            terminal_queued = true;
                            buffer.push_front(Item::Rollback);
                        }
                    }
                    Item::Rollback => {
                        is_finished = true;
                        if let Err(e) = &result {
                            warn!("connpool: ROLLBACK failed: {e}");
                        }
                        for w in rollback_waiters.drain(..) {
                            let _ = w.send(result.as_ref().map(|_| ()).map_err(|_| Error::transaction_rolled_back()));
                        }
                        for leftover in buffer.drain(..) {
                            if let Item::User(cmd) = leftover {
                                cmd.resolve(Err(Error::transaction_rolled_back()));
                            }
                        }
                    }
                    Item::Commit => {
                        is_finished = true;
                        if let Err(e) = &result {
                            warn!("connpool: COMMIT failed: {e}");
                        }
                        for leftover in buffer.drain(..) {
                            if let Item::User(cmd) = leftover {
                                cmd.resolve(Err(Error::transaction_rolled_back()));
                            }
                        }
                    }
                }
            }
        }

        if is_finished && current.is_none() && buffer.is_empty() {
            break;
        }
    }

    broken
}

struct Current<'a> {
    item: Item,
    fut: futures_core::future::BoxFuture<'a, Result<CommandResult>>,
}

async fn poll_current<'a>(current: &mut Option<Current<'a>>) -> Result<CommandResult> {
    std::future::poll_fn(|cx| match current {
        Some(c) => Pin::new(&mut c.fut).poll(cx),
        None => Poll::Pending,
    })
    .await
}

async fn drain_as_rolled_back(inbox: &mut mpsc::UnboundedReceiver<TxMsg>) {
    inbox.close();
    while let Some(msg) = inbox.recv().await {
        match msg {
            TxMsg::Exec(cmd) => cmd.resolve(Err(Error::transaction_rolled_back())),
            TxMsg::Rollback(reply) => {
                let _ = reply.send(Ok(()));
            }
            TxMsg::CommitOnDrop => {}
        }
    }
}
