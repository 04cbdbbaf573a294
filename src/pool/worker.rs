//! The pool's dedicated worker thread: one current-thread Tokio runtime
//! running a `LocalSet`, hosting the dispatch task plus one actor task per
//! connection slot. Every mutable piece of pool state — `ready`, the wait
//! buffer, the transaction-begin waiters — is touched only from inside
//! [`Dispatch::run`], so none of it needs a lock.
use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::LocalSet;

use crate::backend::{Backend, ConnectInfo};
use crate::command::Command;
use crate::error::Error;
use crate::common::{trace, warn};
use crate::pool::PoolConfig;
use crate::transaction::{self, Transaction};
use crate::Result;

/// Message a slot's actor task sends back to the dispatcher.
enum Event {
    /// The connection finished its initial handshake and is ready for work.
    Ready(usize),
    /// A dispatched command finished; the connection is idle again.
    Idle(usize),
    /// A transaction that was handed this connection has ended; it is idle
    /// again and back under pool control.
    Released(usize),
    /// The connection is gone (protocol error, or closed during shutdown).
    Closed(usize),
    /// The initial connect attempt failed.
    ConnectFailed(usize, Error),
    /// The reconnect backoff for this slot has elapsed.
    RetryReconnect(usize),
}

/// Message sent to one connection slot's actor task.
enum SlotMsg {
    Exec(Command),
    /// Hand this connection to a transaction. The actor stops reading pool
    /// dispatch messages and runs the transaction sub-protocol on the new
    /// inbox until the transaction ends, then resumes normal dispatch.
    Begin(mpsc::UnboundedReceiver<transaction::TxMsg>),
    Shutdown,
}

/// Handle to a running worker thread. Cheaply [`Clone`]able; every clone
/// shares the same dispatcher via an unbounded channel.
#[derive(Clone)]
pub(crate) struct WorkerHandle {
    inbox: mpsc::UnboundedSender<WorkerMsg>,
}

enum WorkerMsg {
    Submit(Command),
    Begin(oneshot::Sender<Result<Transaction>>),
    Shutdown(oneshot::Sender<()>),
}

impl WorkerHandle {
    pub(crate) fn spawn<B: Backend>(info: ConnectInfo, config: PoolConfig) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let info = Arc::new(info);

        std::thread::Builder::new()
            .name("connpool-worker".into())
            .spawn(move || {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("failed to build connpool worker runtime");
                let local = LocalSet::new();
                local.block_on(&rt, Dispatch::<B>::run(info, config, inbox_rx));
            })
            .expect("failed to spawn connpool worker thread");

        Self { inbox: inbox_tx }
    }

    /// Submit a command for pool-level dispatch. If the worker thread is
    /// already gone, the command is resolved in place with
    /// [`crate::ErrorKind::ShutdownInProgress`] rather than silently dropped.
    pub(crate) fn submit(&self, cmd: Command) {
        if let Err(mpsc::error::SendError(msg)) = self.inbox.send(WorkerMsg::Submit(cmd)) {
            let WorkerMsg::Submit(cmd) = msg else { unreachable!() };
            cmd.resolve(Err(Error::shutdown_in_progress()));
        }
    }

    pub(crate) async fn begin(&self) -> Result<Transaction> {
        let (tx, rx) = oneshot::channel();
        if self.inbox.send(WorkerMsg::Begin(tx)).is_err() {
            return Err(Error::shutdown_in_progress());
        }
        rx.await.unwrap_or_else(|_| Err(Error::shutdown_in_progress()))
    }

    pub(crate) async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        if self.inbox.send(WorkerMsg::Shutdown(tx)).is_ok() {
            let _ = rx.await;
        }
    }
}

struct Slot {
    /// `None` while the connection is gone and waiting out its reconnect
    /// backoff; `Some` for the entire lifetime of a live actor task,
    /// including while it is still completing its initial handshake.
    jobs: Option<mpsc::UnboundedSender<SlotMsg>>,
}

struct Dispatch<B: Backend> {
    info: Arc<ConnectInfo>,
    config: PoolConfig,
    slots: Vec<Slot>,
    ready: VecDeque<usize>,
    wait_buffer: VecDeque<Command>,
    tx_waiters: VecDeque<oneshot::Sender<Result<Transaction>>>,
    stopping: Option<oneshot::Sender<()>>,
    events_tx: mpsc::UnboundedSender<Event>,
    _backend: std::marker::PhantomData<fn() -> B>,
}

impl<B: Backend> Dispatch<B> {
    async fn run(
        info: Arc<ConnectInfo>,
        config: PoolConfig,
        mut inbox: mpsc::UnboundedReceiver<WorkerMsg>,
    ) {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let pool_size = config.pool_size;
        let mut this = Dispatch::<B> {
            info,
            config,
            slots: Vec::with_capacity(pool_size),
            ready: VecDeque::new(),
            wait_buffer: VecDeque::new(),
            tx_waiters: VecDeque::new(),
            stopping: None,
            events_tx,
            _backend: std::marker::PhantomData,
        };

        for id in 0..pool_size {
            this.slots.push(Slot { jobs: None });
            this.connect_slot(id);
        }

        loop {
            tokio::select! {
                msg = inbox.recv() => {
                    match msg {
                        Some(msg) => this.handle_worker_msg(msg),
                        None => break,
                    }
                }
                Some(event) = events_rx.recv() => {
                    this.handle_event(event);
                }
            }

            if this.stopping.is_some() && this.slots.iter().all(|s| s.jobs.is_none()) {
                if let Some(reply) = this.stopping.take() {
                    let _ = reply.send(());
                }
                break;
            }
        }
    }

    /// Spawn a fresh actor task for `id` and mark the slot occupied.
    fn connect_slot(&mut self, id: usize) {
        trace!("connpool: connecting slot {id}");
        let info = self.info.clone();
        let events = self.events_tx.clone();
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        self.slots[id].jobs = Some(jobs_tx);
        tokio::task::spawn_local(connection_actor::<B>(id, info, jobs_rx, events));
    }

    fn handle_worker_msg(&mut self, msg: WorkerMsg) {
        match msg {
            WorkerMsg::Submit(cmd) => self.submit(cmd),
            WorkerMsg::Begin(reply) => self.begin(reply),
            WorkerMsg::Shutdown(reply) => self.shutdown(reply),
        }
    }

    fn submit(&mut self, cmd: Command) {
        if self.stopping.is_some() {
            cmd.resolve(Err(Error::shutdown_in_progress()));
            return;
        }
        if let Some(id) = self.ready.pop_front() {
            self.dispatch(id, cmd);
            return;
        }
        if let Some(max) = self.config.max_queue_depth {
            if self.wait_buffer.len() >= max {
                cmd.resolve(Err(Error::backpressure_exceeded()));
                return;
            }
        }
        self.wait_buffer.push_back(cmd);
    }

    fn begin(&mut self, reply: oneshot::Sender<Result<Transaction>>) {
        if self.stopping.is_some() {
            let _ = reply.send(Err(Error::shutdown_in_progress()));
            return;
        }
        if let Some(id) = self.ready.pop_front() {
            self.hand_to_transaction(id, reply);
            return;
        }
        self.tx_waiters.push_back(reply);
    }

    fn shutdown(&mut self, reply: oneshot::Sender<()>) {
        if self.stopping.is_some() {
            return;
        }
        trace!("connpool: shutdown requested");
        for cmd in self.wait_buffer.drain(..) {
            cmd.resolve(Err(Error::shutdown_in_progress()));
        }
        for waiter in self.tx_waiters.drain(..) {
            let _ = waiter.send(Err(Error::shutdown_in_progress()));
        }
        for slot in &self.slots {
            if let Some(jobs) = &slot.jobs {
                let _ = jobs.send(SlotMsg::Shutdown);
            }
        }
        self.ready.clear();
        self.stopping = Some(reply);
    }

    /// Hand a single command to connection `id`, which must currently be
    /// idle (popped from `ready`, or just freed).
    fn dispatch(&mut self, id: usize, cmd: Command) {
        let Some(jobs) = &self.slots[id].jobs else {
            // the connection died between being marked ready and now; put
            // the command back and let the next `Ready`/`Idle` pick it up.
            self.wait_buffer.push_front(cmd);
            return;
        };
        let _ = jobs.send(SlotMsg::Exec(cmd));
    }

    fn hand_to_transaction(&mut self, id: usize, reply: oneshot::Sender<Result<Transaction>>) {
        let Some(jobs) = &self.slots[id].jobs else {
            let _ = reply.send(Err(Error::shutdown_in_progress()));
            return;
        };
        let (tx_inbox_tx, tx_inbox_rx) = mpsc::unbounded_channel();
        if jobs.send(SlotMsg::Begin(tx_inbox_rx)).is_err() {
            let _ = reply.send(Err(Error::shutdown_in_progress()));
            return;
        }
        let _ = reply.send(Ok(Transaction::new(tx_inbox_tx)));
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Ready(id) => {
                trace!("connpool: slot {id} ready");
                self.on_slot_free(id);
            }
            Event::Idle(id) => {
                trace!("connpool: slot {id} idle");
                self.on_slot_free(id);
            }
            Event::Released(id) => {
                trace!("connpool: slot {id} released from transaction");
                self.on_slot_free(id);
            }
            Event::Closed(id) => {
                trace!("connpool: slot {id} closed");
                self.slots[id].jobs = None;
                self.ready.retain(|&x| x != id);
                if self.stopping.is_none() {
                    self.schedule_reconnect(id);
                }
            }
            Event::ConnectFailed(id, err) => {
                warn!("connpool: connect failed on slot {id}: {err}");
                self.slots[id].jobs = None;
                if self.stopping.is_none() {
                    self.schedule_reconnect(id);
                }
            }
            Event::RetryReconnect(id) => {
                if self.stopping.is_none() && self.slots[id].jobs.is_none() {
                    self.connect_slot(id);
                }
            }
        }
    }

    fn on_slot_free(&mut self, id: usize) {
        if let Some(cmd) = self.wait_buffer.pop_front() {
            self.dispatch(id, cmd);
            return;
        }
        if let Some(waiter) = self.tx_waiters.pop_front() {
            self.hand_to_transaction(id, waiter);
            return;
        }
        self.ready.push_back(id);
    }

    fn schedule_reconnect(&self, id: usize) {
        let backoff = self.config.reconnect_backoff;
        trace!("connpool: reconnect for slot {id} scheduled in {backoff:?}");
        let events = self.events_tx.clone();
        tokio::task::spawn_local(async move {
            tokio::time::sleep(backoff).await;
            let _ = events.send(Event::RetryReconnect(id));
        });
    }
}

async fn connection_actor<B: Backend>(
    id: usize,
    info: Arc<ConnectInfo>,
    mut jobs: mpsc::UnboundedReceiver<SlotMsg>,
    events: mpsc::UnboundedSender<Event>,
) {
    let mut conn = match B::connect(info).await {
        Ok(conn) => conn,
        Err(e) => {
            let _ = events.send(Event::ConnectFailed(id, e));
            return;
        }
    };
    let _ = events.send(Event::Ready(id));

    while let Some(msg) = jobs.recv().await {
        match msg {
            SlotMsg::Exec(cmd) => {
                let result = conn.exec(cmd.sql.clone(), cmd.params.clone()).await;
                let broken = result.as_ref().err().is_some_and(Error::is_connection_broken);
                cmd.resolve(result);
                if broken {
                    let _ = events.send(Event::Closed(id));
                    return;
                }
                let _ = events.send(Event::Idle(id));
            }
            SlotMsg::Begin(tx_inbox) => {
                let broken = transaction::run::<B>(&mut conn, tx_inbox).await;
                if broken {
                    let _ = events.send(Event::Closed(id));
                    return;
                }
                let _ = events.send(Event::Released(id));
            }
            SlotMsg::Shutdown => {
                let _ = Box::new(conn).close().await;
                // reuse the `Closed` path to mark the slot empty; `stopping`
                // is already set by now, so the dispatcher won't schedule a
                // reconnect for it.
                let _ = events.send(Event::Closed(id));
                return;
            }
        }
    }
}
