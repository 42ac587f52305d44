//! Readiness-aware stream sockets.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, trace};

use super::error::LinkError;

// =============================================================================
// Socket Trait for Dependency Injection
// =============================================================================

/// A connected, non-blocking byte stream that can report I/O readiness.
///
/// `Connection` is generic over this trait so the buffering logic can be
/// driven by a scripted socket in tests.
pub trait ReadySocket: Read + Write {
    /// True if a write would currently make progress without blocking.
    fn can_send(&self) -> bool;

    /// True if a read would currently return data, EOF or an error without
    /// blocking.
    fn can_receive(&self) -> bool;

    /// Shut down both directions of the stream.
    fn shutdown(&mut self) -> io::Result<()>;
}

impl ReadySocket for TcpStream {
    fn can_send(&self) -> bool {
        poll_ready(self, Interest::Send)
    }

    fn can_receive(&self) -> bool {
        poll_ready(self, Interest::Receive)
    }

    fn shutdown(&mut self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }
}

#[derive(Clone, Copy)]
enum Interest {
    Send,
    Receive,
}

/// Zero-timeout `poll(2)` on the stream's descriptor.
///
/// Error and hang-up conditions count as ready so the following read or
/// write reports them.
#[cfg(unix)]
fn poll_ready(stream: &TcpStream, interest: Interest) -> bool {
    use std::os::unix::io::AsRawFd;

    let events = match interest {
        Interest::Send => libc::POLLOUT,
        Interest::Receive => libc::POLLIN,
    };
    let mut fd = libc::pollfd {
        fd: stream.as_raw_fd(),
        events,
        revents: 0,
    };
    // Safety: `fd` is a single valid pollfd and the descriptor stays open
    // for the duration of the call because `stream` is borrowed.
    let ready = unsafe { libc::poll(&mut fd, 1, 0) };
    if ready < 0 {
        trace!("poll failed: {}", io::Error::last_os_error());
        return false;
    }
    ready > 0 && fd.revents & (events | libc::POLLERR | libc::POLLHUP) != 0
}

/// Fallback without `poll(2)`: a one-byte peek observes receive readiness,
/// and a would-block write ends the flush loop on the send side.
#[cfg(not(unix))]
fn poll_ready(stream: &TcpStream, interest: Interest) -> bool {
    match interest {
        Interest::Send => true,
        Interest::Receive => {
            let mut buf = [0u8; 1];
            match stream.peek(&mut buf) {
                Ok(_) => true,
                Err(e) => !matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ),
            }
        }
    }
}

/// Open a TCP connection to `host:port` and switch it to non-blocking mode.
///
/// Every resolved address is tried in order with `timeout` bounding each
/// handshake; the last failure is reported if none connects.
///
/// # Errors
///
/// - `LinkError::Resolve` if the host does not resolve to any address
/// - `LinkError::Connect` if every handshake is refused or times out
pub fn connect_tcp(host: &str, port: u16, timeout: Duration) -> Result<TcpStream, LinkError> {
    let resolve_error = |source| LinkError::Resolve {
        host: host.to_string(),
        port,
        source,
    };

    let mut last_error = None;
    for addr in (host, port).to_socket_addrs().map_err(resolve_error)? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                stream.set_nonblocking(true).map_err(|source| LinkError::Connect {
                    addr: addr.to_string(),
                    source,
                })?;
                debug!("Connected to {} ({}:{})", addr, host, port);
                return Ok(stream);
            }
            Err(source) => {
                debug!("Connect to {} failed: {}", addr, source);
                last_error = Some(LinkError::Connect {
                    addr: addr.to_string(),
                    source,
                });
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        resolve_error(io::Error::new(
            io::ErrorKind::NotFound,
            "no addresses returned",
        ))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_connect_refused_is_connect_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = connect_tcp("127.0.0.1", port, Duration::from_secs(2)).unwrap_err();
        assert!(
            matches!(err, LinkError::Connect { .. }),
            "Expected connect error, got: {:?}",
            err
        );
    }

    #[test]
    fn test_tcp_readiness() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let client = connect_tcp("127.0.0.1", port, Duration::from_secs(2)).unwrap();
        let (mut server, _) = listener.accept().unwrap();

        assert!(client.can_send());
        assert!(!client.can_receive());

        server.write_all(b"{}\n").unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while !client.can_receive() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(client.can_receive());
    }

    #[cfg(unix)]
    #[test]
    fn test_full_send_buffer_is_not_send_ready() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut client = connect_tcp("127.0.0.1", port, Duration::from_secs(2)).unwrap();
        // The peer never reads, so the kernel buffers eventually fill up
        let (_server, _) = listener.accept().unwrap();

        let chunk = vec![b'x'; 64 * 1024];
        let mut total = 0usize;
        loop {
            match client.write(&chunk) {
                Ok(n) => total += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => panic!("Unexpected write error after {} bytes: {}", total, e),
            }
            assert!(total < 256 * 1024 * 1024, "Send buffer never filled");
        }

        assert!(!client.can_send(), "can_send after {} bytes buffered", total);
    }

    #[cfg(unix)]
    #[test]
    fn test_peer_close_is_receive_ready() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let client = connect_tcp("127.0.0.1", port, Duration::from_secs(2)).unwrap();
        let (server, _) = listener.accept().unwrap();
        drop(server);

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while !client.can_receive() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        // EOF counts as readable so the next read can report it
        assert!(client.can_receive());
    }
}
