//! An in-memory LRU key/value cache server speaking the memcached text
//! protocol.
//!
//! The crate is the request-processing engine of the server: a
//! byte-budgeted LRU store with optional thread safety, a streaming
//! command parser that tolerates arbitrary fragmentation, a
//! readiness-driven per-connection state machine, two dispatch
//! topologies, and an elastic thread pool for offloading command
//! execution.

pub mod concurrency;
pub mod config;
pub mod execute;
pub mod network;
pub mod protocol;
pub mod storage;

pub use config::Config;
pub use network::{MultiThreadServer, SingleThreadServer};
pub use storage::{LocalLru, SimpleLru, Storage, ThreadSafeLru};
