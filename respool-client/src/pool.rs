//! # Connection Pool
//!
//! Purpose: Open a fixed number of connections up front and share them
//! between threads without ever exceeding that number.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: Every connection is created in `create`; none
//!    are added afterwards. Broken or caller-closed connections leave the
//!    rotation and are not replaced.
//! 2. **Block, Don't Fail**: An empty pool makes `acquire` wait on a condvar
//!    instead of returning an exhaustion error. There is no timeout.
//! 3. **Minimal Locking**: The queue mutex is held only while moving
//!    connections in or out, never across network I/O.
//! 4. **Hard Shutdown**: `close` closes every member, including connections
//!    that are still checked out.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use respool_common::{Arg, ResponseValue};
use tracing::{debug, warn};

use crate::config::PoolConfig;
use crate::connection::{lock, ConnState, Connection, PooledConnection, Transport};
use crate::error::{ClientError, ClientResult};

struct IdleQueue {
    idle: VecDeque<Arc<Connection>>,
    closed: bool,
}

pub(crate) struct PoolShared {
    queue: Mutex<IdleQueue>,
    available: Condvar,
    // Fixed at creation; used for bulk close.
    members: Vec<Arc<Connection>>,
}

impl PoolShared {
    pub(crate) fn push_idle(&self, conn: Arc<Connection>) {
        let mut queue = lock(&self.queue);
        if queue.closed {
            return;
        }
        queue.idle.push_back(conn);
        drop(queue);
        self.available.notify_one();
    }

    /// Wakes every waiter so it can re-check whether any member is still live.
    pub(crate) fn wake_all(&self) {
        // Taking the lock orders this wakeup after any in-progress liveness check.
        drop(lock(&self.queue));
        self.available.notify_all();
    }

    fn all_closed(&self) -> bool {
        self.members.iter().all(|conn| conn.state() == ConnState::Closed)
    }
}

/// Fixed-size pool of connections to one server.
pub struct Pool {
    config: PoolConfig,
    shared: Arc<PoolShared>,
}

impl Pool {
    /// Opens exactly `pool_size` connections.
    ///
    /// If any connection fails, the ones already opened are shut down before
    /// the error is returned.
    pub fn create(config: PoolConfig) -> ClientResult<Self> {
        config.validate()?;
        let addrs = config.connection.resolve()?;

        let transports = open_all(&config, |_| Transport::open(&config.connection, &addrs))?;

        let shared = Arc::new_cyclic(|weak| {
            let members: Vec<Arc<Connection>> = transports
                .into_iter()
                .enumerate()
                .map(|(id, transport)| Arc::new(Connection::new(id, weak.clone(), transport)))
                .collect();
            PoolShared {
                queue: Mutex::new(IdleQueue {
                    idle: members.iter().cloned().collect(),
                    closed: false,
                }),
                available: Condvar::new(),
                members,
            }
        });

        debug!(
            host = %config.connection.host,
            port = config.connection.port,
            pool_size = config.pool_size,
            "connection pool created"
        );
        Ok(Pool { config, shared })
    }

    /// Takes an idle connection, blocking until one is released.
    ///
    /// Fails with [`ClientError::PoolClosed`] once the pool is closed, also
    /// for callers that were waiting when it closed, and with
    /// [`ClientError::PoolDrained`] once every member has been closed.
    pub fn acquire(&self) -> ClientResult<PooledConnection> {
        let mut queue = lock(&self.shared.queue);
        loop {
            if queue.closed {
                return Err(ClientError::PoolClosed);
            }
            if let Some(conn) = queue.idle.pop_front() {
                if conn.check_out() {
                    return Ok(PooledConnection::new(conn));
                }
                // Closed on its own by a caller; it stays out of rotation.
                continue;
            }
            if self.shared.all_closed() {
                return Err(ClientError::PoolDrained);
            }
            queue = self
                .shared
                .available
                .wait(queue)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Acquires a connection, runs one command on it, and releases it.
    pub fn call(&self, args: &[Arg]) -> ClientResult<ResponseValue> {
        let conn = self.acquire()?;
        conn.call(args)
    }

    /// Closes every connection the pool created, checked out or not.
    ///
    /// Keeps going past individual failures and reports them together.
    /// Calling it again is harmless.
    pub fn close(&self) -> ClientResult<()> {
        {
            let mut queue = lock(&self.shared.queue);
            queue.closed = true;
            queue.idle.clear();
        }
        self.shared.available.notify_all();

        let result = close_members(
            self.shared
                .members
                .iter()
                .map(|conn| (conn.id(), conn.close())),
        );
        debug!(pool_size = self.shared.members.len(), ok = result.is_ok(), "connection pool closed");
        result
    }

    /// Fixed number of connections owned by the pool.
    pub fn size(&self) -> usize {
        self.shared.members.len()
    }

    /// Connections currently waiting in the idle queue.
    pub fn idle_count(&self) -> usize {
        lock(&self.shared.queue).idle.len()
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.shared.queue).closed
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }
}

/// Opens `pool_size` transports with `connect`, shutting down the opened ones
/// if a later attempt fails.
fn open_all<F>(config: &PoolConfig, mut connect: F) -> ClientResult<Vec<Transport>>
where
    F: FnMut(usize) -> std::io::Result<Transport>,
{
    let mut transports = Vec::with_capacity(config.pool_size);
    for idx in 0..config.pool_size {
        match connect(idx) {
            Ok(transport) => transports.push(transport),
            Err(err) => {
                warn!(
                    opened = idx,
                    pool_size = config.pool_size,
                    error = %err,
                    "pool creation failed, closing opened connections"
                );
                for transport in transports {
                    if let Err(close_err) = transport.shutdown() {
                        debug!(error = %close_err, "shutdown after failed pool creation");
                    }
                }
                return Err(err.into());
            }
        }
    }
    Ok(transports)
}

/// Drains every close outcome, then reports the failures together.
fn close_members<I>(outcomes: I) -> ClientResult<()>
where
    I: IntoIterator<Item = (usize, std::io::Result<()>)>,
{
    let mut failures = Vec::new();
    for (id, outcome) in outcomes {
        if let Err(err) = outcome {
            warn!(conn = id, error = %err, "failed to close connection");
            failures.push(err);
        }
    }
    if failures.is_empty() {
        Ok(())
    } else {
        Err(ClientError::Close { failures })
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        if self.is_closed() {
            return;
        }
        if let Err(err) = self.close() {
            warn!(error = %err, "errors while closing dropped pool");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Read};
    use std::net::TcpListener;
    use std::time::Duration;

    use crate::config::ConnectionConfig;

    #[test]
    fn partial_failure_closes_opened_connections() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let config = PoolConfig::new(ConnectionConfig::new("127.0.0.1", addr.port()), 3);

        let result = open_all(&config, |idx| {
            if idx < 2 {
                Transport::open(&config.connection, &[addr])
            } else {
                Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
            }
        });
        assert!(matches!(result, Err(ClientError::Io(err)) if err.kind() == io::ErrorKind::ConnectionRefused));

        // Both sockets opened before the failure must already be shut down.
        for _ in 0..2 {
            let (mut stream, _) = listener.accept().unwrap();
            stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
            let mut buf = [0u8; 1];
            assert_eq!(stream.read(&mut buf).unwrap(), 0);
        }
    }

    #[test]
    fn open_all_opens_exactly_pool_size() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let config = PoolConfig::new(ConnectionConfig::new("127.0.0.1", addr.port()), 4);

        let mut attempts = 0;
        let transports = open_all(&config, |_| {
            attempts += 1;
            Transport::open(&config.connection, &[addr])
        })
        .unwrap();
        assert_eq!(transports.len(), 4);
        assert_eq!(attempts, 4);
    }

    #[test]
    fn close_members_continues_past_failures() {
        let mut closed = Vec::new();
        let result = close_members((0..4).map(|id| {
            closed.push(id);
            let outcome = if id == 1 {
                Err(io::Error::new(io::ErrorKind::Other, "shutdown failed"))
            } else {
                Ok(())
            };
            (id, outcome)
        }));

        assert_eq!(closed, vec![0, 1, 2, 3]);
        match result {
            Err(ClientError::Close { failures }) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].to_string(), "shutdown failed");
            }
            other => panic!("expected close failure, got {:?}", other),
        }
    }

    #[test]
    fn close_members_ok_when_all_succeed() {
        assert!(close_members((0..3).map(|id| (id, Ok(())))).is_ok());
    }
}
