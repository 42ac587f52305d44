//! linesock - line-oriented chat client.
//!
//! Connects to a framed-JSON server, logs in with a user name, forwards each
//! stdin line as a `cmd` message and prints `txt` messages until the server
//! sends `logout` or stdin closes.
//!
//! Settings come from the environment over the built-in defaults:
//! `LINESOCK_HOST`, `LINESOCK_PORT`, `LINESOCK_CONNECT_TIMEOUT_MS`,
//! `LINESOCK_POLL_INTERVAL_MS`.

use std::io::{self, BufRead};
use std::str::FromStr;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use linesock::config::LinkConfig;
use linesock::link::Connection;
use linesock::models::{kind, Envelope};

/// How long to wait for the server greeting after connecting.
const GREETING_WAIT: Duration = Duration::from_secs(1);

/// Receive wait per main-loop cycle; also bounds stdin latency.
const CYCLE_TIMEOUT: Duration = Duration::from_millis(100);

/// Read an environment override, keeping `default` if unset.
fn env_or<T: FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {} value: {}", name, raw)),
        Err(_) => Ok(default),
    }
}

fn config_from_env() -> Result<LinkConfig> {
    let defaults = LinkConfig::default();
    let config = LinkConfig {
        host: env_or("LINESOCK_HOST", defaults.host.clone())?,
        port: env_or("LINESOCK_PORT", defaults.port)?,
        connect_timeout_ms: env_or("LINESOCK_CONNECT_TIMEOUT_MS", defaults.connect_timeout_ms)?,
        poll_interval_ms: env_or("LINESOCK_POLL_INTERVAL_MS", defaults.poll_interval_ms)?,
        ..defaults
    };
    config.validate()?;
    Ok(config)
}

/// Read stdin on a worker thread so the main loop never blocks on it.
fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Print or act on one received message. Returns false on logout.
fn handle_message(message: serde_json::Value) -> bool {
    let envelope = match Envelope::try_from(message) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("Ignoring message without a Type field: {}", e);
            return true;
        }
    };

    match envelope.kind.as_str() {
        kind::TXT => {
            println!("{}", envelope.payload_str().unwrap_or_default());
            true
        }
        kind::LOGOUT => {
            println!("{}", envelope.payload_str().unwrap_or_default());
            false
        }
        other => {
            debug!("Unhandled message type {}: {}", other, envelope.payload);
            true
        }
    }
}

fn run(conn: &mut Connection, uname: &str, poll_interval: Duration) -> Result<()> {
    match conn.receive_or_wait(GREETING_WAIT, poll_interval) {
        Ok(Some(greeting)) => println!("{}", greeting),
        Ok(None) => debug!("No greeting within {:?}", GREETING_WAIT),
        Err(e) if e.is_decode() => warn!("{}", e),
        Err(e) => return Err(e).context("Failed waiting for greeting"),
    }

    conn.send(&Envelope::text(kind::UNAME, uname))
        .context("Failed to send user name")?;

    let input = spawn_stdin_reader();
    loop {
        match input.try_recv() {
            Ok(line) => {
                conn.send(&Envelope::text(kind::CMD, line.trim()))
                    .context("Failed to send command")?;
                continue;
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                info!("stdin closed, ending session");
                return Ok(());
            }
        }

        // Anything a previous send could not push out yet
        conn.flush().context("Failed to flush outbound buffer")?;

        match conn.receive_or_wait(CYCLE_TIMEOUT, poll_interval) {
            Ok(Some(message)) => {
                if !handle_message(message) {
                    return Ok(());
                }
            }
            Ok(None) => {}
            Err(e) if e.is_decode() => warn!("{}", e),
            Err(e) => return Err(e).context("Connection lost"),
        }
    }
}

fn main() -> Result<()> {
    // Logs go to stderr so they never mix with server output
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "linesock=info".into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(io::stderr),
        )
        .init();

    let uname = std::env::args().nth(1).unwrap_or_else(|| "guest".to_string());
    let config = config_from_env()?;

    info!("Connecting to {}:{} as {}", config.host, config.port, uname);
    let mut conn = Connection::connect_with(&config)
        .with_context(|| format!("Failed to connect to {}:{}", config.host, config.port))?;

    let result = run(&mut conn, &uname, config.poll_interval());

    if let Err(e) = conn.close() {
        debug!("Ignoring close error: {}", e);
    }
    result
}
