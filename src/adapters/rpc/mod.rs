//! Streaming RPC client for transformation services.
//!
//! One call is a single request frame followed by response frames on the same
//! connection, all length-delimited:
//! - request: JSON `{"videoPath": ..., "filterChain": [...]}`
//! - response: a tag byte then its payload; `0x01` chunk, `0x00` end-of-stream,
//!   `0x02` UTF-8 error message.
//!
//! A connection that reached end-of-stream is clean and goes back to the pool.

mod client;
mod codec;
mod pool;

pub use client::RpcTransformerClient;
pub use codec::{transport, Frame, Transport, DEFAULT_MAX_FRAME_LENGTH};
pub use pool::ConnectionPool;
