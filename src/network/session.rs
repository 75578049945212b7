//! Socket-free core of the per-connection state machine.

use std::collections::VecDeque;
use std::io::IoSlice;

use tokio::io::Interest;

use crate::protocol::{Command, Parser};

use super::{InputBuffer, INPUT_BUFFER_CAPACITY};

/// Connection liveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum State {
    /// Reading and writing normally.
    Alive,
    /// Peer half-closed or a fatal protocol error occurred: flush the
    /// reply queue, then die.
    Draining,
    /// The socket is finished; deregister and drop.
    Dead,
}

/// A command whose header is parsed but whose data block is still
/// arriving.
struct PendingCommand {
    command: Command,
    body: Vec<u8>,
    remains: usize,
}

/// What one round of inbound processing produced, in stream order.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum InboundEvent {
    /// A complete command with its collected data block (trailing CRLF
    /// included for storage commands).
    Command { command: Command, body: Vec<u8> },
    /// A protocol error to answer in stream order. `fatal` means the
    /// connection must stop reading once the reply is on the wire.
    Broken { reply: Vec<u8>, fatal: bool },
}

/// Parser, buffers and reply queue of one connection.
///
/// Everything here is plain state transitions over byte slices, so the
/// whole read path can be exercised without a socket.
pub(crate) struct Session {
    parser: Parser,
    input: InputBuffer,
    pending: Option<PendingCommand>,
    replies: VecDeque<Vec<u8>>,
    sent_in_head: usize,
    state: State,
}

impl Session {
    pub(crate) fn new() -> Self {
        Self {
            parser: Parser::new(),
            input: InputBuffer::new(INPUT_BUFFER_CAPACITY),
            pending: None,
            replies: VecDeque::new(),
            sent_in_head: 0,
            state: State::Alive,
        }
    }

    pub(crate) fn state(&self) -> State {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: State) {
        self.state = state;
    }

    /// Readiness the connection should wait for next.
    pub(crate) fn interest(&self) -> Interest {
        match self.state {
            State::Alive if self.replies.is_empty() => Interest::READABLE,
            State::Alive => Interest::READABLE | Interest::WRITABLE,
            State::Draining | State::Dead => Interest::WRITABLE,
        }
    }

    pub(crate) fn has_replies(&self) -> bool {
        !self.replies.is_empty()
    }

    /// Appends a rendered reply to the outbound FIFO; `None` (noreply) is
    /// dropped.
    pub(crate) fn push_reply(&mut self, reply: Option<Vec<u8>>) {
        if let Some(reply) = reply {
            self.replies.push_back(reply);
        }
    }

    /// Where the next socket read lands.
    pub(crate) fn input_write_slice(&mut self) -> &mut [u8] {
        self.input.write_slice()
    }

    /// Marks `n` bytes as filled by a socket read.
    pub(crate) fn input_extend(&mut self, n: usize) {
        self.input.extend(n);
    }

    /// Runs the inner processing loop over whatever the input buffer
    /// holds.
    ///
    /// A single buffer may complete several pipelined commands and end in
    /// the middle of the next one; events come out in stream order and
    /// leftover bytes stay buffered for the next read.
    pub(crate) fn ingest(&mut self) -> Vec<InboundEvent> {
        let mut events = Vec::new();
        loop {
            if self.pending.is_none() {
                if self.input.available_read() == 0 {
                    break;
                }
                let (consumed, outcome) = self.parser.parse(self.input.read_slice());
                self.input.consume(consumed);
                match outcome {
                    Ok(true) => {
                        let Some((command, body_len)) = self.parser.build() else {
                            break;
                        };
                        // the data block is terminated by CRLF on the wire
                        let remains = if body_len > 0 { body_len + 2 } else { 0 };
                        self.pending = Some(PendingCommand {
                            command,
                            body: Vec::with_capacity(remains),
                            remains,
                        });
                    }
                    Ok(false) => {
                        if consumed == 0 {
                            break;
                        }
                        continue;
                    }
                    Err(err) => {
                        let fatal = err.is_fatal();
                        events.push(InboundEvent::Broken { reply: err.to_reply(), fatal });
                        self.parser.reset();
                        if fatal {
                            self.state = State::Draining;
                            break;
                        }
                        continue;
                    }
                }
            }

            let complete = {
                let Some(pending) = self.pending.as_mut() else {
                    break;
                };
                if pending.remains > 0 {
                    let take = pending.remains.min(self.input.available_read());
                    pending.body.extend_from_slice(&self.input.read_slice()[..take]);
                    self.input.consume(take);
                    pending.remains -= take;
                }
                pending.remains == 0
            };
            if !complete {
                break;
            }
            if let Some(done) = self.pending.take() {
                events.push(InboundEvent::Command { command: done.command, body: done.body });
                self.parser.reset();
            }
        }
        self.input.compact();
        events
    }

    /// Gathers up to `limit` reply segments for one vectored write, the
    /// first adjusted by what already went out.
    pub(crate) fn write_segments(&self, limit: usize) -> Vec<IoSlice<'_>> {
        let mut segments = Vec::with_capacity(limit.min(self.replies.len()));
        for (i, reply) in self.replies.iter().take(limit).enumerate() {
            if i == 0 {
                segments.push(IoSlice::new(&reply[self.sent_in_head..]));
            } else {
                segments.push(IoSlice::new(reply));
            }
        }
        segments
    }

    /// Advances reply bookkeeping after `written` bytes left the socket,
    /// popping fully-sent segments off the queue head.
    pub(crate) fn advance_write(&mut self, written: usize) {
        let mut covered = self.sent_in_head + written;
        while let Some(head) = self.replies.front() {
            if covered < head.len() {
                break;
            }
            covered -= head.len();
            self.replies.pop_front();
        }
        self.sent_in_head = covered;
    }
}
