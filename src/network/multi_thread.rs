//! Acceptor-plus-workers topology.

use std::io;
use std::net::SocketAddr;
use std::thread;

use async_channel::{Receiver, Sender};
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime;
use tokio::task::LocalSet;
use tracing::{debug, info, warn};

use crate::concurrency::Executor;
use crate::storage::ThreadSafeLru;

use super::Connection;

/// How many accepted sockets may wait for a worker before accept stalls.
const HANDOFF_DEPTH: usize = 64;

/// Cache server with one acceptor reactor and N worker reactors.
///
/// Accepted connections are assigned round-robin and then owned by their
/// worker for life, so per-connection state needs no lock. The store is
/// the synchronised [`ThreadSafeLru`] since every worker reaches into
/// it; command execution can optionally hop to an [`Executor`] pool.
pub struct MultiThreadServer {
    rt: runtime::Runtime,
    listener: TcpListener,
    storage: ThreadSafeLru,
    workers: usize,
    offload: Option<Executor>,
    addr: SocketAddr,
}

impl MultiThreadServer {
    /// Binds the listener and prepares the acceptor reactor. `workers`
    /// of zero means one reactor per hardware thread.
    pub fn bind(addr: &str, max_size: usize, workers: usize) -> io::Result<Self> {
        let workers = if workers == 0 {
            thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        } else {
            workers
        };
        let rt = runtime::Builder::new_current_thread().enable_io().enable_time().build()?;
        let listener = rt.block_on(TcpListener::bind(addr))?;
        let addr = listener.local_addr()?;
        Ok(Self {
            rt,
            listener,
            storage: ThreadSafeLru::new(max_size),
            workers,
            offload: None,
            addr,
        })
    }

    /// Routes command execution through `pool` instead of running it on
    /// the worker reactors.
    pub fn with_offload(mut self, pool: Executor) -> Self {
        self.offload = Some(pool);
        self
    }

    /// Address the listener actually bound.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Spawns the worker reactors and runs the accept loop on the
    /// calling thread.
    pub fn run(self) -> io::Result<()> {
        let Self { rt, listener, storage, workers, offload, addr } = self;
        info!(%addr, workers, "multi-thread server listening");

        let mut lanes: Vec<Sender<std::net::TcpStream>> = Vec::with_capacity(workers);
        for id in 0..workers {
            let (lane_send, lane_recv) = async_channel::bounded(HANDOFF_DEPTH);
            lanes.push(lane_send);
            let storage = storage.clone();
            let offload = offload.clone();
            thread::Builder::new()
                .name(format!("lrucached-worker-{id}"))
                .spawn(move || worker_reactor(id, lane_recv, storage, offload))?;
        }

        rt.block_on(accept_loop(listener, lanes))
    }
}

async fn accept_loop(
    listener: TcpListener,
    lanes: Vec<Sender<std::net::TcpStream>>,
) -> io::Result<()> {
    let mut next = 0usize;
    loop {
        let (stream, peer) = listener.accept().await?;
        stream.set_nodelay(true)?;
        // the socket crosses threads as a std stream and is re-registered
        // with the owning worker's reactor
        let stream = stream.into_std()?;
        debug!(%peer, worker = next, "accepted");
        if lanes[next].send(stream).await.is_err() {
            return Err(io::Error::other("worker lane closed"));
        }
        next = (next + 1) % lanes.len();
    }
}

fn worker_reactor(
    id: usize,
    lane: Receiver<std::net::TcpStream>,
    storage: ThreadSafeLru,
    offload: Option<Executor>,
) {
    let rt = match runtime::Builder::new_current_thread().enable_io().enable_time().build() {
        Ok(rt) => rt,
        Err(err) => {
            warn!(worker = id, error = %err, "worker reactor failed to start");
            return;
        }
    };
    let local = LocalSet::new();
    local.block_on(&rt, async move {
        while let Ok(stream) = lane.recv().await {
            let stream = match TcpStream::from_std(stream) {
                Ok(stream) => stream,
                Err(err) => {
                    debug!(worker = id, error = %err, "could not register socket");
                    continue;
                }
            };
            let connection = Connection::new(stream, storage.clone());
            match offload.clone() {
                Some(pool) => {
                    tokio::task::spawn_local(connection.run_offloaded(pool));
                }
                None => {
                    tokio::task::spawn_local(connection.run());
                }
            }
        }
        debug!(worker = id, "lane closed, worker exiting");
    });
}
