//! A deterministic, in-memory [`Backend`] used to drive the scenarios in
//! `SPEC_FULL.md` §8 without a real database.
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use connpool::{Backend, BackendKind, CommandResult, ConnectInfo, Error, Param, RawConnection, Result};
use futures_core::future::BoxFuture;

/// Every connection opened against the same [`ConnectInfo`] string shares a
/// `World` — the mock's recorded wire log and scripted failures — looked
/// up through a process-wide registry keyed by that string, since
/// `Backend::connect` only ever receives the opaque info, not test state.
static REGISTRY: OnceLock<Mutex<HashMap<String, Arc<World>>>> = OnceLock::new();

pub struct World {
    log: Mutex<Vec<String>>,
    fail_once: Mutex<HashSet<String>>,
    break_next: Mutex<HashSet<usize>>,
    next_id: AtomicUsize,
}

impl World {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            log: Mutex::new(Vec::new()),
            fail_once: Mutex::new(HashSet::new()),
            break_next: Mutex::new(HashSet::new()),
            next_id: AtomicUsize::new(0),
        })
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// The next execution of `sql` anywhere in the world fails with
    /// `ExecutionFailed`, then reverts to succeeding.
    pub fn fail_once(&self, sql: &str) {
        self.fail_once.lock().unwrap().insert(sql.to_string());
    }

    /// The next `exec` on connection `id` fails with `ConnectionBroken`
    /// instead of running, simulating a dropped socket.
    pub fn break_connection(&self, id: usize) {
        self.break_next.lock().unwrap().insert(id);
    }
}

/// Register a fresh [`World`] under `name` and return a [`ConnectInfo`]
/// that resolves to it. Call once per test before `Client::connect`.
pub fn world(name: &str) -> (Arc<World>, ConnectInfo) {
    let world = World::new();
    REGISTRY
        .get_or_init(Default::default)
        .lock()
        .unwrap()
        .insert(name.to_string(), world.clone());
    (world, ConnectInfo::new(name))
}

pub struct MockBackend;

impl Backend for MockBackend {
    type Connection = MockConnection;

    const KIND: BackendKind = BackendKind::PostgreSql;

    fn connect(info: Arc<ConnectInfo>) -> BoxFuture<'static, Result<Self::Connection>> {
        Box::pin(async move {
            let world = REGISTRY
                .get_or_init(Default::default)
                .lock()
                .unwrap()
                .get(info.as_str())
                .cloned()
                .unwrap_or_else(|| panic!("no mock world registered for {:?}", info.as_str()));
            let id = world.next_id.fetch_add(1, Ordering::SeqCst);
            Ok(MockConnection { id, world })
        })
    }
}

pub struct MockConnection {
    id: usize,
    world: Arc<World>,
}

impl RawConnection for MockConnection {
    fn exec(&mut self, sql: Arc<str>, _params: Vec<Param>) -> BoxFuture<'_, Result<CommandResult>> {
        let world = self.world.clone();
        let id = self.id;
        Box::pin(async move {
            if world.break_next.lock().unwrap().remove(&id) {
                return Err(Error::connection_broken(std::io::Error::other("mock connection killed")));
            }
            world.log.lock().unwrap().push(sql.to_string());
            if world.fail_once.lock().unwrap().remove(sql.as_ref()) {
                return Err(Error::execution_failed(std::io::Error::other("mock statement rejected")));
            }
            Ok(CommandResult { rows_affected: 1 })
        })
    }

    fn close(self: Box<Self>) -> BoxFuture<'static, Result<()>> {
        Box::pin(async { Ok(()) })
    }
}
