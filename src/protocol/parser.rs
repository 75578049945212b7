//! Streaming command-header parser.

use super::command::{Command, DeleteCommand, GetCommand, StoreCommand, StoreOp};
use super::{Error, Result, MAX_HEADER_LEN, MAX_KEY_LEN};

/// Restartable parser fed arbitrary byte slices by the connection.
///
/// At most one header line is accumulated internally; readiness is
/// reported once the terminator has been seen, after which [`Parser::build`]
/// hands out the command. Data blocks of storage commands are not handled
/// here: the connection collects [`Command::body_len`] plus the trailing
/// CRLF itself.
///
/// Lines are terminated by CRLF; a bare LF is tolerated.
pub struct Parser {
    line: Vec<u8>,
    ready: Option<Command>,
}

impl Parser {
    pub fn new() -> Self {
        Self { line: Vec::new(), ready: None }
    }

    /// Feeds the next chunk of input.
    ///
    /// Returns how many bytes of `buf` were consumed together with the
    /// readiness outcome. Progress is monotonic: consumed bytes are never
    /// requested again, and `(0, Ok(false))` means more input is needed.
    /// On a non-fatal error the offending header line has been consumed
    /// and the parser is ready for the next one.
    pub fn parse(&mut self, buf: &[u8]) -> (usize, Result<bool>) {
        if self.ready.is_some() {
            return (0, Ok(true));
        }
        match buf.iter().position(|&b| b == b'\n') {
            Some(at) => {
                let consumed = at + 1;
                if self.line.len() + consumed > MAX_HEADER_LEN {
                    self.line.clear();
                    return (consumed, Err(Error::HeaderTooLong));
                }
                self.line.extend_from_slice(&buf[..at]);
                if self.line.last() == Some(&b'\r') {
                    self.line.pop();
                }
                let outcome = parse_header(&self.line);
                self.line.clear();
                match outcome {
                    Ok(command) => {
                        self.ready = Some(command);
                        (consumed, Ok(true))
                    }
                    Err(err) => (consumed, Err(err)),
                }
            }
            None => {
                if self.line.len() + buf.len() > MAX_HEADER_LEN {
                    self.line.clear();
                    return (buf.len(), Err(Error::HeaderTooLong));
                }
                self.line.extend_from_slice(buf);
                (buf.len(), Ok(false))
            }
        }
    }

    /// Hands out the parsed command and the length of the data block the
    /// driver must collect before execution (terminator excluded). `None`
    /// until `parse` has reported readiness.
    pub fn build(&mut self) -> Option<(Command, usize)> {
        let command = self.ready.take()?;
        let body_len = command.body_len();
        Some((command, body_len))
    }

    /// Drops accumulated state; the next byte starts a new header.
    pub fn reset(&mut self) {
        self.line.clear();
        self.ready = None;
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_header(line: &[u8]) -> Result<Command> {
    let mut tokens = line.split(|&b| b == b' ').filter(|token| !token.is_empty());
    let verb = tokens.next().ok_or(Error::UnknownCommand)?;
    match verb {
        b"set" => storage_command(StoreOp::Set, tokens),
        b"add" => storage_command(StoreOp::Add, tokens),
        b"replace" => storage_command(StoreOp::Replace, tokens),
        b"append" => storage_command(StoreOp::Append, tokens),
        b"prepend" => storage_command(StoreOp::Prepend, tokens),
        b"get" => get_command(tokens),
        b"delete" => delete_command(tokens),
        _ => Err(Error::UnknownCommand),
    }
}

fn storage_command<'a>(
    op: StoreOp,
    mut tokens: impl Iterator<Item = &'a [u8]>,
) -> Result<Command> {
    let key = checked_key(tokens.next().ok_or(Error::BadArgumentCount)?)?;
    let mut numbers = Vec::with_capacity(3);
    let mut noreply = false;
    while let Some(token) = tokens.next() {
        if token == b"noreply" {
            if tokens.next().is_some() {
                return Err(Error::BadArgumentCount);
            }
            noreply = true;
            break;
        }
        numbers.push(uint(token)?);
    }
    // the canonical header carries flags and exptime; the bare
    // `<verb> <key> <bytes>` form defaults both to zero
    let (flags, exptime, bytes) = match numbers.as_slice() {
        [bytes] => (0, 0, *bytes),
        [flags, exptime, bytes] => (*flags, *exptime, *bytes),
        _ => return Err(Error::BadArgumentCount),
    };
    let flags = u32::try_from(flags).map_err(|_| Error::BadNumber)?;
    let exptime = u32::try_from(exptime).map_err(|_| Error::BadNumber)?;
    let bytes = usize::try_from(bytes).map_err(|_| Error::BadNumber)?;
    Ok(Command::Store(StoreCommand { op, key, flags, exptime, bytes, noreply }))
}

fn get_command<'a>(tokens: impl Iterator<Item = &'a [u8]>) -> Result<Command> {
    let mut keys = Vec::new();
    for token in tokens {
        keys.push(checked_key(token)?);
    }
    if keys.is_empty() {
        return Err(Error::BadArgumentCount);
    }
    Ok(Command::Get(GetCommand { keys }))
}

fn delete_command<'a>(mut tokens: impl Iterator<Item = &'a [u8]>) -> Result<Command> {
    let key = checked_key(tokens.next().ok_or(Error::BadArgumentCount)?)?;
    let noreply = match tokens.next() {
        None => false,
        Some(b"noreply") => true,
        Some(_) => return Err(Error::BadArgumentCount),
    };
    if tokens.next().is_some() {
        return Err(Error::BadArgumentCount);
    }
    Ok(Command::Delete(DeleteCommand { key, noreply }))
}

fn checked_key(token: &[u8]) -> Result<Vec<u8>> {
    if token.is_empty() || token.len() > MAX_KEY_LEN {
        return Err(Error::BadKey);
    }
    Ok(token.to_vec())
}

fn uint(token: &[u8]) -> Result<u64> {
    let text = std::str::from_utf8(token).map_err(|_| Error::BadNumber)?;
    text.parse::<u64>().map_err(|_| Error::BadNumber)
}
