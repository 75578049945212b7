//! Executes parsed commands against a [`Storage`] and renders replies.

#[cfg(test)]
mod tests;

use crate::protocol::{Command, DeleteCommand, GetCommand, StoreCommand, StoreOp};
use crate::storage::Storage;

const CRLF: &[u8] = b"\r\n";

const STORED: &[u8] = b"STORED\r\n";
const NOT_STORED: &[u8] = b"NOT_STORED\r\n";
const DELETED: &[u8] = b"DELETED\r\n";
const NOT_FOUND: &[u8] = b"NOT_FOUND\r\n";
const END: &[u8] = b"END\r\n";
const TOO_LARGE: &[u8] = b"SERVER_ERROR object too large for cache\r\n";
const BAD_DATA_CHUNK: &[u8] = b"CLIENT_ERROR bad data chunk\r\n";

/// Runs `command` against `storage` and renders the reply bytes.
///
/// `body` is the data block collected by the connection, trailing CRLF
/// included; it is empty for retrieval and delete commands. Returns
/// `None` when the client asked for `noreply` — the command still ran.
pub fn execute<S: Storage>(storage: &S, command: Command, body: &[u8]) -> Option<Vec<u8>> {
    match command {
        Command::Store(store) => {
            let noreply = store.noreply;
            let reply = execute_store(storage, store, body);
            (!noreply).then_some(reply)
        }
        Command::Get(get) => Some(execute_get(storage, get)),
        Command::Delete(delete) => {
            let noreply = delete.noreply;
            let reply = execute_delete(storage, delete);
            (!noreply).then_some(reply)
        }
    }
}

fn execute_store<S: Storage>(storage: &S, command: StoreCommand, body: &[u8]) -> Vec<u8> {
    let Some(value) = body.strip_suffix(CRLF) else {
        return BAD_DATA_CHUNK.to_vec();
    };
    if command.key.len() + value.len() > storage.max_size() {
        // the store stays untouched for a pair that can never fit
        return TOO_LARGE.to_vec();
    }
    let stored = match command.op {
        StoreOp::Set => storage.put(&command.key, value),
        StoreOp::Add => storage.put_if_absent(&command.key, value),
        StoreOp::Replace => storage.set(&command.key, value),
        StoreOp::Append => storage.append(&command.key, value),
        StoreOp::Prepend => storage.prepend(&command.key, value),
    };
    if stored {
        STORED.to_vec()
    } else {
        NOT_STORED.to_vec()
    }
}

fn execute_get<S: Storage>(storage: &S, command: GetCommand) -> Vec<u8> {
    let mut reply = Vec::new();
    for key in &command.keys {
        if let Some(value) = storage.get(key) {
            reply.extend_from_slice(b"VALUE ");
            reply.extend_from_slice(key);
            // flags are not persisted, so clients always read them back
            // as zero
            reply.extend_from_slice(b" 0 ");
            reply.extend_from_slice(value.len().to_string().as_bytes());
            reply.extend_from_slice(CRLF);
            reply.extend_from_slice(&value);
            reply.extend_from_slice(CRLF);
        }
    }
    reply.extend_from_slice(END);
    reply
}

fn execute_delete<S: Storage>(storage: &S, command: DeleteCommand) -> Vec<u8> {
    if storage.delete(&command.key) {
        DELETED.to_vec()
    } else {
        NOT_FOUND.to_vec()
    }
}
