//! Readiness-driven socket driver for one client connection.

use std::collections::BTreeMap;
use std::io;

use async_channel::Sender;
use tokio::net::TcpStream;
use tracing::debug;

use crate::concurrency::Executor;
use crate::execute;
use crate::storage::Storage;

use super::session::{InboundEvent, Session, State};
use super::MAX_WRITE_SEGMENTS;

/// A completed command's place in line and its rendered reply.
type Completion = (u64, Option<Vec<u8>>);

/// One accepted client socket with its state machine.
///
/// The connection is owned by exactly one reactor for its whole life and
/// nothing else touches its state, so no lock guards it. Readiness is
/// edge-driven: both paths drain the socket until it would block.
pub(crate) struct Connection<S: Storage> {
    stream: TcpStream,
    storage: S,
    session: Session,
}

impl<S: Storage> Connection<S> {
    pub(crate) fn new(stream: TcpStream, storage: S) -> Self {
        Self { stream, storage, session: Session::new() }
    }

    /// Drives the connection until the peer goes away, executing commands
    /// on the reactor thread itself.
    pub(crate) async fn run(mut self) {
        while self.session.state() != State::Dead {
            let ready = match self.stream.ready(self.session.interest()).await {
                Ok(ready) => ready,
                Err(err) => {
                    debug!(error = %err, "connection poll failed");
                    break;
                }
            };

            // closed and error states must reach the socket calls, which
            // surface them as zero reads or hard errors
            let do_read = ready.is_readable() || ready.is_read_closed() || ready.is_error();
            let do_write = ready.is_writable() || ready.is_write_closed() || ready.is_error();

            if do_read && self.session.state() == State::Alive {
                if let Err(err) = self.do_read() {
                    debug!(error = %err, "read failed");
                    break;
                }
            }
            if do_write && self.session.has_replies() {
                if let Err(err) = self.do_write() {
                    debug!(error = %err, "write failed");
                    break;
                }
            }
            if self.session.state() == State::Draining && !self.session.has_replies() {
                self.session.set_state(State::Dead);
            }
        }
    }

    /// Drives the connection with command execution hopping to `pool`.
    ///
    /// Every inbound event takes a per-connection sequence number; pool
    /// workers push completions back over a channel and out-of-order
    /// results wait in a buffer, so replies hit the wire in arrival
    /// order even though execution is concurrent.
    pub(crate) async fn run_offloaded(mut self, pool: Executor)
    where
        S: Clone + Send + Sync + 'static,
    {
        let (complete_send, complete_recv) = async_channel::unbounded::<Completion>();
        let mut next_seq: u64 = 0;
        let mut next_ready: u64 = 0;
        let mut out_of_order: BTreeMap<u64, Option<Vec<u8>>> = BTreeMap::new();

        loop {
            // release every completion that is next in line
            while let Some(reply) = out_of_order.remove(&next_ready) {
                self.session.push_reply(reply);
                next_ready += 1;
            }

            match self.session.state() {
                State::Dead => break,
                State::Draining => {
                    if !self.session.has_replies() && next_ready == next_seq {
                        break;
                    }
                    // replies still owed by the pool: the socket has
                    // nothing to say until they arrive
                    if !self.session.has_replies() {
                        match complete_recv.recv().await {
                            Ok((seq, reply)) => {
                                out_of_order.insert(seq, reply);
                                continue;
                            }
                            Err(_) => break,
                        }
                    }
                }
                State::Alive => {}
            }

            tokio::select! {
                ready = self.stream.ready(self.session.interest()) => {
                    let ready = match ready {
                        Ok(ready) => ready,
                        Err(err) => {
                            debug!(error = %err, "connection poll failed");
                            break;
                        }
                    };
                    let do_read =
                        ready.is_readable() || ready.is_read_closed() || ready.is_error();
                    let do_write =
                        ready.is_writable() || ready.is_write_closed() || ready.is_error();
                    if do_read && self.session.state() == State::Alive {
                        if let Err(err) = self.do_read_offloaded(
                            &pool,
                            &complete_send,
                            &mut next_seq,
                            &mut out_of_order,
                        ) {
                            debug!(error = %err, "read failed");
                            break;
                        }
                    }
                    if do_write && self.session.has_replies() {
                        if let Err(err) = self.do_write() {
                            debug!(error = %err, "write failed");
                            break;
                        }
                    }
                }
                completion = complete_recv.recv() => {
                    match completion {
                        Ok((seq, reply)) => {
                            out_of_order.insert(seq, reply);
                        }
                        Err(_) => break,
                    }
                }
            }
        }
    }

    /// Read path: drain the socket, feed the session, execute whatever
    /// completed.
    fn do_read(&mut self) -> io::Result<()> {
        loop {
            match self.stream.try_read(self.session.input_write_slice()) {
                Ok(0) => {
                    // peer half-closed; flush what we owe and die
                    self.session.set_state(State::Draining);
                    return Ok(());
                }
                Ok(n) => {
                    self.session.input_extend(n);
                    for event in self.session.ingest() {
                        match event {
                            InboundEvent::Command { command, body } => {
                                let reply = execute::execute(&self.storage, command, &body);
                                self.session.push_reply(reply);
                            }
                            InboundEvent::Broken { reply, fatal: _ } => {
                                // ingest already put the session in
                                // Draining for fatal errors
                                self.session.push_reply(Some(reply));
                            }
                        }
                    }
                    if self.session.state() != State::Alive {
                        return Ok(());
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
    }

    /// Read path of the offloaded mode: completed commands are submitted
    /// to the pool under the next sequence number; rejected tasks run on
    /// the reactor so their place in line is kept.
    fn do_read_offloaded(
        &mut self,
        pool: &Executor,
        complete_send: &Sender<Completion>,
        next_seq: &mut u64,
        out_of_order: &mut BTreeMap<u64, Option<Vec<u8>>>,
    ) -> io::Result<()>
    where
        S: Clone + Send + Sync + 'static,
    {
        loop {
            match self.stream.try_read(self.session.input_write_slice()) {
                Ok(0) => {
                    self.session.set_state(State::Draining);
                    return Ok(());
                }
                Ok(n) => {
                    self.session.input_extend(n);
                    for event in self.session.ingest() {
                        let seq = *next_seq;
                        *next_seq += 1;
                        match event {
                            InboundEvent::Command { command, body } => {
                                let storage = self.storage.clone();
                                let sender = complete_send.clone();
                                let task = Box::new(move || {
                                    let reply = execute::execute(&storage, command, &body);
                                    // a closed channel means the
                                    // connection is already gone
                                    let _ = sender.try_send((seq, reply));
                                });
                                if let Err(task) = pool.try_execute(task) {
                                    task();
                                }
                            }
                            InboundEvent::Broken { reply, fatal: _ } => {
                                out_of_order.insert(seq, Some(reply));
                            }
                        }
                    }
                    if self.session.state() != State::Alive {
                        return Ok(());
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
    }

    /// Write path: gather queued replies into one vectored write at a
    /// time until the queue empties or the socket would block.
    fn do_write(&mut self) -> io::Result<()> {
        while self.session.has_replies() {
            let written = {
                let segments = self.session.write_segments(MAX_WRITE_SEGMENTS);
                match self.stream.try_write_vectored(&segments) {
                    Ok(n) => n,
                    Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                    Err(err) => return Err(err),
                }
            };
            self.session.advance_write(written);
        }
        Ok(())
    }
}
