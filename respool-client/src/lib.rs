//! # respool Client
//!
//! Purpose: Provide a blocking RESP client whose connections come from a
//! fixed-size pool shared by many threads.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: All TCP connections are opened when the pool is
//!    created and reused for its whole lifetime.
//! 2. **Explicit Ownership**: The pool is an ordinary value with explicit
//!    `create`/`close`; there is no global instance.
//! 3. **Generic Calls**: A single `call(&[Arg])` primitive; no per-command
//!    helpers.
//! 4. **Errors Go Up**: Nothing is retried or swallowed internally.
//!
//! ## Usage
//!
//! ```no_run
//! use respool_client::{ConnectionConfig, Pool, PoolConfig};
//!
//! let pool = Pool::create(PoolConfig::new(ConnectionConfig::new("127.0.0.1", 6379), 4))?;
//! let conn = pool.acquire()?;
//! conn.call(&["SET".into(), "k".into(), "v".into()])?;
//! let value = conn.call(&["GET".into(), "k".into()])?.as_string()?;
//! assert_eq!(value, "v");
//! conn.release();
//! pool.close()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod config;
mod connection;
mod error;
mod pool;

pub use config::{ConnectionConfig, PoolConfig};
pub use connection::{ConnState, Connection, PooledConnection};
pub use error::{ClientError, ClientResult};
pub use pool::Pool;

pub use respool_common::{args_from_json, Arg, ReplyKind, RespError, ResponseValue, ServerError};
