//! Framed JSON link over a non-blocking stream socket.
//!
//! # Architecture
//!
//! ```text
//! caller ──enqueue──► framing::encode_frame ──► outbound buffer ──flush──► socket
//! caller ◄─dequeue_one── framing::decode_next ◄── inbound buffer ◄─drain── socket
//! ```
//!
//! `flush` and `drain` only move bytes while the socket reports readiness,
//! so neither call blocks. `receive_or_wait` adds a bounded busy-poll on top
//! for callers without their own event loop.
//!
//! # Usage
//!
//! ```ignore
//! use linesock::link::Connection;
//! use serde_json::json;
//! use std::time::Duration;
//!
//! let mut conn = Connection::connect("localhost", 10102, Duration::from_secs(5))?;
//! conn.send(&json!({"Type": "cmd", "Payload": "look"}))?;
//! let reply = conn.receive_or_wait(Duration::from_secs(1), Duration::from_millis(100))?;
//! ```

mod connection;
mod error;
pub mod framing;
mod socket;

pub use connection::{Connection, DEFAULT_POLL_INTERVAL};
pub use error::{Direction, LinkError};
pub use socket::{connect_tcp, ReadySocket};
