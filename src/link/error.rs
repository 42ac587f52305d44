//! Error types for the framed socket link.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::config::ConfigError;

/// Which half of the connection an I/O failure was observed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Writing the outbound buffer to the socket.
    Send,
    /// Reading from the socket into the inbound buffer.
    Receive,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Send => f.write_str("send"),
            Direction::Receive => f.write_str("read"),
        }
    }
}

/// Link-specific error types.
///
/// Connect failures are fatal for the attempt, `Broken` means the socket is
/// no longer usable, and `Encode`/`Decode` only affect a single message.
#[derive(Debug, Error)]
pub enum LinkError {
    /// Host name could not be resolved to any socket address.
    #[error("Failed to resolve {host}:{port}: {source}")]
    Resolve {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// Connect handshake failed (refused, timed out, unreachable).
    #[error("Connection to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Peer closed or reset the connection.
    #[error("Connection discovered broken on {direction}")]
    Broken {
        direction: Direction,
        #[source]
        source: Option<io::Error>,
    },

    /// The caller supplied a value that cannot be serialized.
    #[error("Failed to encode {type_name}: {source}")]
    Encode {
        type_name: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A complete frame was received but its payload is not valid JSON.
    ///
    /// The frame has already been consumed from the inbound buffer.
    #[error("Malformed frame ({len} bytes): {source}")]
    Decode {
        len: usize,
        #[source]
        source: serde_json::Error,
    },

    /// Any other OS error while sending or receiving.
    #[error("I/O error on {direction}: {source}")]
    Io {
        direction: Direction,
        #[source]
        source: io::Error,
    },

    /// Shutting the socket down during close failed. The connection is
    /// closed regardless.
    #[error("Failed to shut down connection: {source}")]
    Shutdown {
        #[source]
        source: io::Error,
    },

    /// Connection settings were rejected before connecting.
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The connection was already closed.
    #[error("Connection is closed")]
    Closed,
}

impl LinkError {
    /// Builds the error for an OS failure during send or receive.
    ///
    /// Reset-class errors mean the peer is gone and map to `Broken`.
    pub(crate) fn from_io(direction: Direction, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof => LinkError::Broken {
                direction,
                source: Some(err),
            },
            _ => LinkError::Io {
                direction,
                source: err,
            },
        }
    }

    pub(crate) fn broken(direction: Direction) -> Self {
        LinkError::Broken {
            direction,
            source: None,
        }
    }

    /// True for resolution and handshake failures.
    pub fn is_connect(&self) -> bool {
        matches!(self, LinkError::Resolve { .. } | LinkError::Connect { .. })
    }

    /// True if the peer or socket is no longer usable.
    pub fn is_broken(&self) -> bool {
        matches!(self, LinkError::Broken { .. })
    }

    /// The side a `Broken` error was discovered on.
    pub fn broken_direction(&self) -> Option<Direction> {
        match self {
            LinkError::Broken { direction, .. } => Some(*direction),
            _ => None,
        }
    }

    /// True if a malformed frame was dropped; reading may continue.
    pub fn is_decode(&self) -> bool {
        matches!(self, LinkError::Decode { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_error_display() {
        assert_eq!(
            LinkError::broken(Direction::Send).to_string(),
            "Connection discovered broken on send"
        );
        assert_eq!(
            LinkError::broken(Direction::Receive).to_string(),
            "Connection discovered broken on read"
        );
        assert_eq!(LinkError::Closed.to_string(), "Connection is closed");
        let shutdown = LinkError::Shutdown {
            source: io::Error::new(io::ErrorKind::NotConnected, "not connected"),
        };
        assert_eq!(
            shutdown.to_string(),
            "Failed to shut down connection: not connected"
        );
    }

    #[test]
    fn test_link_error_from_io() {
        let reset = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        let err = LinkError::from_io(Direction::Receive, reset);
        assert!(err.is_broken());
        assert_eq!(err.broken_direction(), Some(Direction::Receive));

        let pipe = io::Error::new(io::ErrorKind::BrokenPipe, "pipe");
        let err = LinkError::from_io(Direction::Send, pipe);
        assert_eq!(err.broken_direction(), Some(Direction::Send));

        let other = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        let err = LinkError::from_io(Direction::Send, other);
        assert!(matches!(
            err,
            LinkError::Io {
                direction: Direction::Send,
                ..
            }
        ));
        assert!(!err.is_broken());
    }

    #[test]
    fn test_link_error_classification() {
        let refused = LinkError::Connect {
            addr: "127.0.0.1:1".to_string(),
            source: io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
        };
        assert!(refused.is_connect());
        assert!(!refused.is_broken());
        assert!(!LinkError::Closed.is_connect());
        assert_eq!(LinkError::Closed.broken_direction(), None);
    }
}
