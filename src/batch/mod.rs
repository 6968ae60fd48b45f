//! Batched asynchronous delivery: queue, flusher, and HTTP transport

pub mod flusher;
pub mod queue;
pub mod transport;

pub use flusher::{BatchSink, Flusher, FlusherHandle};
pub use queue::{EventQueue, OverflowPolicy, DEFAULT_QUEUE_CAPACITY};
pub use transport::{
    HttpTransport, DEFAULT_READY_ATTEMPTS, DEFAULT_READY_RETRY_DELAY, REQUEST_TIMEOUT,
};
