use crate::execute::execute;
use crate::protocol::{Command, DeleteCommand, GetCommand, StoreCommand, StoreOp};
use crate::storage::{LocalLru, Storage};

fn store_command(op: StoreOp, key: &[u8], bytes: usize, noreply: bool) -> Command {
    Command::Store(StoreCommand {
        op,
        key: key.to_vec(),
        flags: 0,
        exptime: 0,
        bytes,
        noreply,
    })
}

fn get_command(keys: &[&[u8]]) -> Command {
    Command::Get(GetCommand { keys: keys.iter().map(|key| key.to_vec()).collect() })
}

fn delete_command(key: &[u8], noreply: bool) -> Command {
    Command::Delete(DeleteCommand { key: key.to_vec(), noreply })
}

#[test]
fn set_stores_and_replies() {
    let storage = LocalLru::new(64);
    let reply = execute(&storage, store_command(StoreOp::Set, b"k", 5, false), b"hello\r\n");
    assert_eq!(reply.as_deref(), Some(b"STORED\r\n".as_slice()));
    assert_eq!(storage.get(b"k"), Some(b"hello".to_vec()));
}

#[test]
fn add_refuses_existing_key() {
    let storage = LocalLru::new(64);
    assert!(storage.put(b"k", b"foo"));
    let reply = execute(&storage, store_command(StoreOp::Add, b"k", 3, false), b"bar\r\n");
    assert_eq!(reply.as_deref(), Some(b"NOT_STORED\r\n".as_slice()));
    assert_eq!(storage.get(b"k"), Some(b"foo".to_vec()));
}

#[test]
fn replace_requires_existing_key() {
    let storage = LocalLru::new(64);
    let reply = execute(&storage, store_command(StoreOp::Replace, b"k", 3, false), b"new\r\n");
    assert_eq!(reply.as_deref(), Some(b"NOT_STORED\r\n".as_slice()));
    assert!(storage.put(b"k", b"old"));
    let reply = execute(&storage, store_command(StoreOp::Replace, b"k", 3, false), b"new\r\n");
    assert_eq!(reply.as_deref(), Some(b"STORED\r\n".as_slice()));
    assert_eq!(storage.get(b"k"), Some(b"new".to_vec()));
}

#[test]
fn append_and_prepend_concatenate() {
    let storage = LocalLru::new(64);
    assert!(storage.put(b"k", b"mid"));
    let reply = execute(&storage, store_command(StoreOp::Append, b"k", 3, false), b"end\r\n");
    assert_eq!(reply.as_deref(), Some(b"STORED\r\n".as_slice()));
    let reply = execute(&storage, store_command(StoreOp::Prepend, b"k", 3, false), b"pre\r\n");
    assert_eq!(reply.as_deref(), Some(b"STORED\r\n".as_slice()));
    assert_eq!(storage.get(b"k"), Some(b"premidend".to_vec()));
}

#[test]
fn get_renders_hits_and_skips_misses() {
    let storage = LocalLru::new(64);
    assert!(storage.put(b"a", b"x"));
    assert!(storage.put(b"c", b"yz"));
    let reply = execute(&storage, get_command(&[b"a", b"b", b"c"]), b"");
    assert_eq!(
        reply.as_deref(),
        Some(b"VALUE a 0 1\r\nx\r\nVALUE c 0 2\r\nyz\r\nEND\r\n".as_slice())
    );
}

#[test]
fn get_of_missing_keys_is_just_end() {
    let storage = LocalLru::new(64);
    let reply = execute(&storage, get_command(&[b"nope"]), b"");
    assert_eq!(reply.as_deref(), Some(b"END\r\n".as_slice()));
}

#[test]
fn delete_reports_presence() {
    let storage = LocalLru::new(64);
    assert!(storage.put(b"k", b"v"));
    let reply = execute(&storage, delete_command(b"k", false), b"");
    assert_eq!(reply.as_deref(), Some(b"DELETED\r\n".as_slice()));
    let reply = execute(&storage, delete_command(b"k", false), b"");
    assert_eq!(reply.as_deref(), Some(b"NOT_FOUND\r\n".as_slice()));
}

#[test]
fn noreply_suppresses_output_but_executes() {
    let storage = LocalLru::new(64);
    let reply = execute(&storage, store_command(StoreOp::Set, b"k", 1, true), b"x\r\n");
    assert_eq!(reply, None);
    assert_eq!(storage.get(b"k"), Some(b"x".to_vec()));
    let reply = execute(&storage, delete_command(b"k", true), b"");
    assert_eq!(reply, None);
    assert_eq!(storage.get(b"k"), None);
}

#[test]
fn body_without_terminator_is_a_client_error() {
    let storage = LocalLru::new(64);
    let reply = execute(&storage, store_command(StoreOp::Set, b"k", 3, false), b"xy\r\r");
    assert_eq!(reply.as_deref(), Some(b"CLIENT_ERROR bad data chunk\r\n".as_slice()));
    assert_eq!(storage.get(b"k"), None);
}

#[test]
fn oversized_value_is_a_server_error() {
    let storage = LocalLru::new(8);
    assert!(storage.put(b"warm", b"data"));
    let reply =
        execute(&storage, store_command(StoreOp::Set, b"k", 12, false), b"far too long\r\n");
    assert_eq!(
        reply.as_deref(),
        Some(b"SERVER_ERROR object too large for cache\r\n".as_slice())
    );
    // the existing entry was not evicted for a hopeless store
    assert_eq!(storage.get(b"warm"), Some(b"data".to_vec()));
}
