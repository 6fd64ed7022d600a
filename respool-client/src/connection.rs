//! # Pooled Connections
//!
//! Purpose: Own one TCP stream to the server and run one request/response
//! cycle at a time on it.
//!
//! ## Design Principles
//! 1. **One Round Trip at a Time**: The stream lives behind a mutex held for
//!    the whole encode/write/read cycle.
//! 2. **Explicit Lifecycle**: `Idle -> CheckedOut -> Idle`, and any state to
//!    `Closed`, which is terminal.
//! 3. **Buffer Reuse**: Each connection keeps its own write and line buffers.
//! 4. **No Self-Healing**: Transport errors are returned as-is; nothing
//!    reconnects behind the caller's back.
//! 5. **Broken Means Retired**: After a transport or framing failure the
//!    stream position is unknown, so the connection is closed on release
//!    instead of going back to the idle queue.

use std::io::{self, BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use respool_common::{encode_command, read_reply, Arg, ResponseValue};
use tracing::{debug, trace, warn};

use crate::config::ConnectionConfig;
use crate::error::{ClientError, ClientResult};
use crate::pool::PoolShared;

/// Lifecycle state of a pooled connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// Waiting in the pool's idle queue.
    Idle,
    /// Handed out by `Pool::acquire`.
    CheckedOut,
    /// Socket shut down; never handed out again.
    Closed,
}

/// Locks a mutex, recovering the data if another thread panicked with it held.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Socket plus the buffers reused across calls.
pub(crate) struct Transport {
    // Buffered reader reduces syscalls while still allowing direct writes.
    reader: BufReader<TcpStream>,
    line_buf: Vec<u8>,
    write_buf: Vec<u8>,
}

impl Transport {
    /// Connects to the first reachable address.
    pub(crate) fn open(config: &ConnectionConfig, addrs: &[SocketAddr]) -> io::Result<Self> {
        let mut last_err = None;
        for addr in addrs {
            let attempt = match config.connect_timeout() {
                Some(timeout) => TcpStream::connect_timeout(addr, timeout),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(stream) => {
                    stream.set_nodelay(config.nodelay)?;
                    return Ok(Transport {
                        reader: BufReader::new(stream),
                        line_buf: Vec::with_capacity(128),
                        write_buf: Vec::with_capacity(256),
                    });
                }
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, "no address to connect to")
        }))
    }

    fn round_trip(&mut self, args: &[Arg]) -> ClientResult<ResponseValue> {
        self.write_buf.clear();
        encode_command(args, &mut self.write_buf);

        let stream = self.reader.get_mut();
        stream.write_all(&self.write_buf)?;
        stream.flush()?;

        Ok(read_reply(&mut self.reader, &mut self.line_buf)?)
    }

    pub(crate) fn shutdown(self) -> io::Result<()> {
        match self.reader.get_ref().shutdown(Shutdown::Both) {
            // The peer already went away; the socket is closed either way.
            Err(err) if err.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }
}

/// One TCP connection owned by a [`Pool`](crate::Pool).
pub struct Connection {
    id: usize,
    pool: Weak<PoolShared>,
    io: Mutex<Option<Transport>>,
    state: Mutex<ConnState>,
    db_index: AtomicU32,
    // Set when a round trip failed below the reply level.
    broken: AtomicBool,
}

impl Connection {
    pub(crate) fn new(id: usize, pool: Weak<PoolShared>, transport: Transport) -> Self {
        Connection {
            id,
            pool,
            io: Mutex::new(Some(transport)),
            state: Mutex::new(ConnState::Idle),
            db_index: AtomicU32::new(0),
            broken: AtomicBool::new(false),
        }
    }

    /// Position of this connection in its pool, stable for the pool's lifetime.
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn state(&self) -> ConnState {
        *lock(&self.state)
    }

    /// Database selected through [`Connection::select`]; starts at 0.
    pub fn db_index(&self) -> u32 {
        self.db_index.load(Ordering::Relaxed)
    }

    /// True once a call failed with a transport or protocol error.
    ///
    /// A broken connection is closed when it is released.
    pub fn is_broken(&self) -> bool {
        self.broken.load(Ordering::Acquire)
    }

    /// Sends one command and reads its reply.
    ///
    /// An error reply from the server is returned as
    /// [`ClientError::Server`], which also carries the decoded reply, and
    /// leaves the connection usable. Any other failure marks it broken.
    pub fn call(&self, args: &[Arg]) -> ClientResult<ResponseValue> {
        if self.state() == ConnState::Closed {
            return Err(ClientError::ConnectionClosed);
        }

        let reply = {
            let mut io = lock(&self.io);
            let transport = io.as_mut().ok_or(ClientError::ConnectionClosed)?;
            trace!(conn = self.id, argc = args.len(), "call");
            transport.round_trip(args).map_err(|err| {
                self.broken.store(true, Ordering::Release);
                warn!(conn = self.id, error = %err, "call failed, connection marked broken");
                err
            })?
        };

        match reply.as_error() {
            Some(server) => Err(ClientError::Server {
                message: server.message,
                reply,
            }),
            None => Ok(reply),
        }
    }

    /// Issues `SELECT db` and remembers the index once the server accepts it.
    pub fn select(&self, db: u32) -> ClientResult<()> {
        self.call(&["SELECT".into(), db.into()])?;
        self.db_index.store(db, Ordering::Relaxed);
        Ok(())
    }

    /// Shuts the socket down. Closing twice is a no-op.
    ///
    /// A call already in flight finishes first; later calls fail with
    /// [`ClientError::ConnectionClosed`].
    pub fn close(&self) -> io::Result<()> {
        {
            let mut state = lock(&self.state);
            if *state == ConnState::Closed {
                return Ok(());
            }
            *state = ConnState::Closed;
        }

        let transport = lock(&self.io).take();
        debug!(conn = self.id, "closing connection");
        match transport {
            Some(transport) => transport.shutdown(),
            None => Ok(()),
        }
    }

    /// Idle -> CheckedOut. Returns false when the connection is closed.
    pub(crate) fn check_out(&self) -> bool {
        let mut state = lock(&self.state);
        match *state {
            ConnState::Closed => false,
            _ => {
                *state = ConnState::CheckedOut;
                true
            }
        }
    }

    /// CheckedOut -> Idle, then back into the owning pool's queue.
    ///
    /// Broken connections are closed here and never re-enqueued.
    fn release(self: &Arc<Self>) {
        let broken = self.is_broken();
        let previous = {
            let mut state = lock(&self.state);
            let previous = *state;
            if previous == ConnState::CheckedOut && !broken {
                *state = ConnState::Idle;
            }
            previous
        };

        match previous {
            ConnState::CheckedOut if broken => {
                warn!(conn = self.id, "retiring broken connection");
                if let Err(err) = self.close() {
                    debug!(conn = self.id, error = %err, "shutdown of broken connection");
                }
                self.retire();
            }
            ConnState::CheckedOut => {
                if let Some(pool) = self.pool.upgrade() {
                    pool.push_idle(Arc::clone(self));
                }
            }
            ConnState::Closed => {
                debug!(conn = self.id, "closed connection not returned to pool");
                self.retire();
            }
            ConnState::Idle => warn!(conn = self.id, "connection released twice"),
        }
    }

    fn retire(&self) {
        if let Some(pool) = self.pool.upgrade() {
            pool.wake_all();
        }
    }
}

/// A connection checked out of the pool.
///
/// Returned to the pool by [`PooledConnection::release`] or on drop.
pub struct PooledConnection {
    conn: Option<Arc<Connection>>,
}

impl PooledConnection {
    pub(crate) fn new(conn: Arc<Connection>) -> Self {
        PooledConnection { conn: Some(conn) }
    }

    /// Hands the connection back to its pool.
    pub fn release(mut self) {
        self.give_back();
    }

    fn give_back(&mut self) {
        if let Some(conn) = self.conn.take() {
            conn.release();
        }
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        // Only `release`/`drop` take the connection, and both consume the guard.
        match &self.conn {
            Some(conn) => conn,
            None => unreachable!("pooled connection used after release"),
        }
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        self.give_back();
    }
}
