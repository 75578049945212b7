//! Memcached text protocol: command descriptors and the streaming parser.

mod command;
mod parser;

#[cfg(test)]
mod tests;

pub use command::{Command, DeleteCommand, GetCommand, StoreCommand, StoreOp};
pub use parser::Parser;

/// Maximum length of a key on the wire.
pub const MAX_KEY_LEN: usize = 250;

/// Maximum length of a command header line, terminator included. A header
/// that long without a terminator is a protocol violation, not a partial
/// read.
pub const MAX_HEADER_LEN: usize = 1024;

/// Result of parsing operations with error type [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the command parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The verb is not one this server understands.
    UnknownCommand,
    /// A numeric field did not parse as an unsigned integer.
    BadNumber,
    /// A key is empty or longer than [`MAX_KEY_LEN`].
    BadKey,
    /// Wrong number of tokens for the verb.
    BadArgumentCount,
    /// The header line overflowed [`MAX_HEADER_LEN`] with no terminator in
    /// sight. Unrecoverable: the connection must be closed.
    HeaderTooLong,
}

impl Error {
    /// Renders the reply line the client receives for this error.
    pub fn to_reply(&self) -> Vec<u8> {
        match self {
            Error::UnknownCommand => b"ERROR\r\n".to_vec(),
            Error::BadNumber | Error::BadArgumentCount => {
                b"CLIENT_ERROR bad command line format\r\n".to_vec()
            }
            Error::BadKey => b"CLIENT_ERROR bad key\r\n".to_vec(),
            Error::HeaderTooLong => b"CLIENT_ERROR bad command line\r\n".to_vec(),
        }
    }

    /// Whether the connection must stop reading after replying.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::HeaderTooLong)
    }
}
