//! Single-reactor topology: one thread owns the listener and every
//! connection.

use std::io;
use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::runtime;
use tokio::task::LocalSet;
use tracing::{debug, info};

use crate::storage::LocalLru;

use super::Connection;

/// Cache server on a single reactor thread.
///
/// All connections share one unsynchronised store through [`LocalLru`].
/// The store is created on the reactor thread and nothing ever leaves
/// it, so there is no locking anywhere on the fast path.
pub struct SingleThreadServer {
    rt: runtime::Runtime,
    listener: TcpListener,
    max_size: usize,
    addr: SocketAddr,
}

impl SingleThreadServer {
    /// Binds the listener and prepares the reactor. `max_size` is the
    /// store byte budget.
    pub fn bind(addr: &str, max_size: usize) -> io::Result<Self> {
        let rt = runtime::Builder::new_current_thread().enable_io().enable_time().build()?;
        let listener = rt.block_on(TcpListener::bind(addr))?;
        let addr = listener.local_addr()?;
        Ok(Self { rt, listener, max_size, addr })
    }

    /// Address the listener actually bound.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Accepts and serves connections on the calling thread until the
    /// listener fails.
    pub fn run(self) -> io::Result<()> {
        let Self { rt, listener, max_size, addr } = self;
        info!(%addr, "single-thread server listening");
        let storage = LocalLru::new(max_size);
        let local = LocalSet::new();
        local.block_on(&rt, serve(listener, storage))
    }
}

async fn serve(listener: TcpListener, storage: LocalLru) -> io::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        stream.set_nodelay(true)?;
        debug!(%peer, "accepted");
        tokio::task::spawn_local(Connection::new(stream, storage.clone()).run());
    }
}
