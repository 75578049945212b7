//! Parsed command descriptors handed to the executor.

/// Storage verb family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    /// `set`: unconditional store.
    Set,
    /// `add`: store only if the key is absent.
    Add,
    /// `replace`: store only if the key is present.
    Replace,
    /// `append`: concatenate after the existing value.
    Append,
    /// `prepend`: concatenate before the existing value.
    Prepend,
}

/// A storage command awaiting its data block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCommand {
    pub op: StoreOp,
    pub key: Vec<u8>,
    /// Opaque client flags; parsed but not persisted.
    pub flags: u32,
    /// Expiration time; parsed for wire compatibility, never acted on.
    pub exptime: u32,
    /// Length of the data block that follows the header.
    pub bytes: usize,
    pub noreply: bool,
}

/// Retrieval of one or more keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetCommand {
    pub keys: Vec<Vec<u8>>,
}

/// Removal of a single key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteCommand {
    pub key: Vec<u8>,
    pub noreply: bool,
}

/// Any complete command descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Store(StoreCommand),
    Get(GetCommand),
    Delete(DeleteCommand),
}

impl Command {
    /// Bytes of argument data expected after the header, terminator
    /// excluded.
    pub fn body_len(&self) -> usize {
        match self {
            Command::Store(store) => store.bytes,
            Command::Get(_) | Command::Delete(_) => 0,
        }
    }

    /// Whether the client asked for the reply to be suppressed.
    pub fn noreply(&self) -> bool {
        match self {
            Command::Store(store) => store.noreply,
            Command::Delete(delete) => delete.noreply,
            Command::Get(_) => false,
        }
    }
}
