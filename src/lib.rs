//! `connpool` is an asynchronous, pooled SQL client built around
//! transactional sessions.
//!
//! It owns nothing of a specific wire protocol — that surface is the
//! [`Backend`]/[`RawConnection`] pair, which an adapter crate implements per
//! database. This crate owns three things instead:
//!
//! - a fixed-size pool of connections, dispatched FIFO when every
//!   connection is busy (see [`Client`]);
//! - transactional sessions that reserve one connection end-to-end and
//!   commit on drop unless rolled back first (see [`Transaction`]);
//! - a pure placeholder rewriter for callers moving SQL between dialects
//!   (see [`sql::replace_sql_placeholder`]).
//!
//! # Example
//!
//! ```ignore
//! use connpool::{Client, PoolConfig};
//!
//! let pool = Client::<MyBackend>::connect("host=localhost", PoolConfig::new());
//! let result = pool.exec_sql("insert into t values ($1)", 1, vec![Param::text("x")]).await?;
//!
//! let tx = pool.begin().await?;
//! tx.exec_sql("update t set a = 1", 0, vec![]).await?;
//! // dropping `tx` here commits
//! ```
pub(crate) mod common;

// Wire protocol seam
mod backend;

// Unit of work
mod command;
pub mod sql;

// Pool and transactional sessions
pub mod pool;
mod transaction;

mod error;

pub use backend::{Backend, BackendKind, ConnectInfo, RawConnection};
pub use command::{Command, CommandResult, Param, ParamFormat};
pub use error::{Error, ErrorKind, Result};
pub use pool::{Client, PoolConfig};
pub use transaction::Transaction;
