//! Buffered message connection over a readiness-aware socket.
//!
//! `Connection` decouples producing and consuming messages from socket I/O:
//! `enqueue` only touches the outbound buffer, `flush` and `drain` move bytes
//! while the socket reports readiness, and `dequeue_one` slices complete
//! frames off the inbound buffer. `receive_or_wait` combines the receive side
//! for callers that do not run their own readiness loop.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::thread;
use std::time::{Duration, Instant};

use bytes::{Buf, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace, warn};

use super::error::{Direction, LinkError};
use super::framing;
use super::socket::{connect_tcp, ReadySocket};
use crate::config::{LinkConfig, DEFAULT_POLL_INTERVAL_MS, DEFAULT_READ_SIZE};

/// Default sleep between polls in `receive_or_wait`.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(DEFAULT_POLL_INTERVAL_MS);

/// A connected socket with unbounded outbound and inbound byte buffers.
///
/// The outbound buffer only ever holds bytes the OS has not accepted yet; the
/// inbound buffer only holds bytes read from the OS that have not been
/// consumed as a complete frame.
///
/// # Example
///
/// ```ignore
/// use linesock::link::Connection;
/// use serde_json::json;
/// use std::time::Duration;
///
/// let mut conn = Connection::connect("localhost", 10102, Duration::from_secs(5))?;
/// conn.enqueue(&json!({"Type": "uname", "Payload": "alice"}))?;
/// conn.flush()?;
///
/// if let Some(msg) = conn.receive_or_wait(Duration::from_secs(1), Duration::from_millis(100))? {
///     println!("{}", msg);
/// }
/// ```
#[derive(Debug)]
pub struct Connection<S = TcpStream> {
    /// `None` once the connection has been closed.
    socket: Option<S>,
    outbound: BytesMut,
    inbound: BytesMut,
    read_size: usize,
    alive: bool,
    /// Failure seen by a drain but not raised yet because a buffered message
    /// or a malformed frame was returned first.
    deferred: Option<LinkError>,
}

impl Connection<TcpStream> {
    /// Connect to `host:port`; `timeout` bounds only the handshake.
    ///
    /// # Errors
    ///
    /// Returns `LinkError::Resolve` or `LinkError::Connect` on failure.
    pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self, LinkError> {
        connect_tcp(host, port, timeout).map(Self::from_socket)
    }

    /// Connect using the host, port, timeout and read size from `config`.
    ///
    /// # Errors
    ///
    /// Returns `LinkError::Config` if the config is invalid, otherwise the
    /// same errors as [`Connection::connect`].
    pub fn connect_with(config: &LinkConfig) -> Result<Self, LinkError> {
        config.validate()?;
        let conn = Self::connect(&config.host, config.port, config.connect_timeout())?;
        Ok(conn.with_read_size(config.read_size))
    }
}

impl<S: ReadySocket> Connection<S> {
    /// Wrap an already connected, non-blocking socket.
    pub fn from_socket(socket: S) -> Self {
        Self {
            socket: Some(socket),
            outbound: BytesMut::new(),
            inbound: BytesMut::new(),
            read_size: DEFAULT_READ_SIZE,
            alive: true,
            deferred: None,
        }
    }

    /// Set the number of bytes requested per read (minimum 1).
    pub fn with_read_size(mut self, read_size: usize) -> Self {
        self.read_size = read_size.max(1);
        self
    }

    /// True if the socket can accept more outbound bytes right now.
    pub fn can_send(&self) -> bool {
        self.socket.as_ref().is_some_and(|s| s.can_send())
    }

    /// True if the socket has inbound data (or EOF) available right now.
    pub fn can_receive(&self) -> bool {
        self.socket.as_ref().is_some_and(|s| s.can_receive())
    }

    /// False once a broken connection has been discovered or after close.
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// True once [`Connection::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.socket.is_none()
    }

    /// Bytes waiting to be written to the socket.
    pub fn pending_outbound(&self) -> &[u8] {
        &self.outbound
    }

    /// Bytes read from the socket but not yet consumed as a frame.
    pub fn pending_inbound(&self) -> &[u8] {
        &self.inbound
    }

    /// Serialize `message` and append it as a frame to the outbound buffer.
    ///
    /// No I/O happens here; call [`Connection::flush`] to send.
    ///
    /// # Errors
    ///
    /// - `LinkError::Encode` if the message cannot be serialized (the buffer
    ///   is left untouched)
    /// - `LinkError::Closed` after [`Connection::close`]
    pub fn enqueue<T: Serialize + ?Sized>(&mut self, message: &T) -> Result<(), LinkError> {
        if self.socket.is_none() {
            return Err(LinkError::Closed);
        }
        let frame = framing::encode_frame(message)?;
        self.outbound.extend_from_slice(&frame);
        Ok(())
    }

    /// Write as much of the outbound buffer as the socket accepts without
    /// blocking. Returns the number of bytes sent by this call.
    ///
    /// # Errors
    ///
    /// - `LinkError::Broken` (send side) if the socket accepted zero bytes or
    ///   reported a reset; bytes sent before that are already removed
    /// - `LinkError::Io` for any other OS error
    /// - `LinkError::Closed` after [`Connection::close`]
    pub fn flush(&mut self) -> Result<usize, LinkError> {
        let socket = self.socket.as_mut().ok_or(LinkError::Closed)?;
        let mut sent = 0;

        while !self.outbound.is_empty() && socket.can_send() {
            match socket.write(&self.outbound) {
                Ok(0) => {
                    self.alive = false;
                    warn!("Connection broken on send ({} bytes pending)", self.outbound.len());
                    return Err(LinkError::broken(Direction::Send));
                }
                Ok(n) => {
                    self.outbound.advance(n);
                    sent += n;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    let err = LinkError::from_io(Direction::Send, e);
                    if err.is_broken() {
                        self.alive = false;
                        warn!("Connection broken on send: {}", err);
                    }
                    return Err(err);
                }
            }
        }

        trace!(sent, pending = self.outbound.len(), "flushed outbound buffer");
        Ok(sent)
    }

    /// Read everything the socket has available into the inbound buffer.
    /// Returns the number of bytes received by this call.
    ///
    /// # Errors
    ///
    /// - `LinkError::Broken` (receive side) on EOF or reset; bytes read
    ///   earlier in the same call stay buffered
    /// - `LinkError::Io` for any other OS error
    /// - `LinkError::Closed` after [`Connection::close`]
    pub fn drain(&mut self) -> Result<usize, LinkError> {
        let socket = self.socket.as_mut().ok_or(LinkError::Closed)?;
        let mut chunk = vec![0u8; self.read_size];
        let mut received = 0;

        while socket.can_receive() {
            match socket.read(&mut chunk) {
                Ok(0) => {
                    self.alive = false;
                    warn!("Connection broken on read ({} bytes buffered)", self.inbound.len());
                    return Err(LinkError::broken(Direction::Receive));
                }
                Ok(n) => {
                    self.inbound.extend_from_slice(&chunk[..n]);
                    received += n;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    let err = LinkError::from_io(Direction::Receive, e);
                    if err.is_broken() {
                        self.alive = false;
                        warn!("Connection broken on read: {}", err);
                    }
                    return Err(err);
                }
            }
        }

        trace!(received, buffered = self.inbound.len(), "drained socket");
        Ok(received)
    }

    /// Take the next complete message off the inbound buffer, if any.
    ///
    /// # Errors
    ///
    /// Returns `LinkError::Decode` if the next frame is malformed. That frame
    /// is consumed, so the following call continues with the next one.
    pub fn dequeue_one(&mut self) -> Result<Option<Value>, LinkError> {
        self.dequeue_as()
    }

    /// Like [`Connection::dequeue_one`], decoding into `T`.
    pub fn dequeue_as<T: DeserializeOwned>(&mut self) -> Result<Option<T>, LinkError> {
        framing::decode_next(&mut self.inbound).inspect_err(|e| warn!("Dropping frame: {}", e))
    }

    /// Enqueue `message` and flush immediately.
    pub fn send<T: Serialize + ?Sized>(&mut self, message: &T) -> Result<usize, LinkError> {
        self.enqueue(message)?;
        self.flush()
    }

    /// Return the next message if one is already available, without waiting.
    pub fn receive(&mut self) -> Result<Option<Value>, LinkError> {
        self.receive_or_wait(Duration::ZERO, DEFAULT_POLL_INTERVAL)
    }

    /// Drain the socket and return the next message, polling every
    /// `poll_interval` for up to `max_wait` if none is available yet. A
    /// `max_wait` too large to form a deadline waits until a message or a
    /// failure arrives.
    ///
    /// A complete message already buffered is returned even when the same
    /// drain failed; the failure is kept and reported on the first call that
    /// has no message to return.
    ///
    /// # Errors
    ///
    /// - `LinkError::Broken` once no buffered message is left to deliver
    /// - `LinkError::Decode` if a malformed frame was dropped
    /// - `LinkError::Io` / `LinkError::Closed` as for [`Connection::drain`],
    ///   also once no buffered message is left
    pub fn receive_or_wait(
        &mut self,
        max_wait: Duration,
        poll_interval: Duration,
    ) -> Result<Option<Value>, LinkError> {
        if let Some(message) = self.poll_once()? {
            return Ok(Some(message));
        }
        if max_wait.is_zero() {
            return Ok(None);
        }

        let deadline = Instant::now().checked_add(max_wait);
        loop {
            let nap = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(None);
                    }
                    poll_interval.min(deadline - now)
                }
                None => poll_interval,
            };
            thread::sleep(nap);

            if let Some(message) = self.poll_once()? {
                return Ok(Some(message));
            }
        }
    }

    /// One drain + dequeue step of `receive_or_wait`.
    ///
    /// A drain failure never hides a buffered frame: it is kept in
    /// `deferred` while messages or decode errors are returned, and raised
    /// once the inbound buffer has nothing complete left.
    fn poll_once(&mut self) -> Result<Option<Value>, LinkError> {
        let failure = match self.drain() {
            Ok(_) => self.deferred.take(),
            Err(e) => {
                self.deferred = None;
                Some(e)
            }
        };

        match self.dequeue_one() {
            Ok(Some(message)) => {
                self.deferred = failure;
                Ok(Some(message))
            }
            Ok(None) => failure.map_or(Ok(None), Err),
            Err(decode) => {
                self.deferred = failure;
                Err(decode)
            }
        }
    }

    /// Shut the socket down in both directions, release it and clear both
    /// buffers.
    ///
    /// # Errors
    ///
    /// Returns `LinkError::Closed` if already closed, or `LinkError::Shutdown`
    /// (the connection is closed either way). Callers usually ignore both.
    pub fn close(&mut self) -> Result<(), LinkError> {
        let mut socket = self.socket.take().ok_or(LinkError::Closed)?;
        self.alive = false;
        self.deferred = None;
        self.outbound.clear();
        self.inbound.clear();

        let result = socket.shutdown();
        drop(socket);
        debug!("Connection closed");

        result.map_err(|source| LinkError::Shutdown { source })
    }
}
