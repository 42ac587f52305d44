//! linesock library
//!
//! Buffered, newline-framed JSON messaging over a non-blocking TCP socket:
//!
//! - `link` - the connection, its framing and readiness-checked I/O
//! - `config` - scalar connection settings with defaults
//! - `models` - the conventional `{Type, Payload}` envelope
//!
//! ```ignore
//! use linesock::{config::LinkConfig, link::Connection, models::Envelope};
//!
//! let config = LinkConfig::new("localhost", 10102);
//! let mut conn = Connection::connect_with(&config)?;
//! conn.send(&Envelope::text("uname", "alice"))?;
//! let greeting = conn.receive_or_wait(std::time::Duration::from_secs(1), config.poll_interval())?;
//! ```

pub mod config;
pub mod link;
pub mod models;
