//! Loopback socket primitives for agent connections.
//!
//! The agent is reached either through a bridge tunnel on `127.0.0.1` or
//! directly by IP. A tunnel endpoint may accept a TCP connection before the
//! device-side listener exists, so a plain `connect` success is not enough:
//! [`connect_and_probe`] reads the one-byte readiness marker the agent writes
//! as soon as it starts serving, and discards it.
//!
//! [`SharedListener`] wraps the listening socket used in reverse mode. Both
//! the session lifecycle and the agent watchdog may want to release it; the
//! embedded single-shot flag decides which caller actually does.

// ============================================================================
// Imports
// ============================================================================

use std::io;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tracing::debug;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Address used for all tunnel-mediated connections.
pub const LOCALHOST: Ipv4Addr = Ipv4Addr::LOCALHOST;

// ============================================================================
// Connect Helpers
// ============================================================================

/// Opens a TCP connection to `addr:port`.
///
/// # Errors
///
/// Returns [`Error::Connection`] if the connection cannot be established.
pub async fn connect(addr: Ipv4Addr, port: u16) -> Result<TcpStream> {
    TcpStream::connect((addr, port))
        .await
        .map_err(|e| Error::connection(format!("connect to {addr}:{port}: {e}")))
}

/// Connects to `addr:port` and consumes the one-byte readiness marker.
///
/// The connection may succeed even if the agent behind the tunnel is not
/// listening yet; reading one byte is the earliest proof of a working
/// end-to-end path. The byte is not part of the video stream and is
/// discarded here.
///
/// # Errors
///
/// Returns [`Error::Connection`] if the connection fails or the peer closes
/// before writing the readiness byte.
pub async fn connect_and_probe(addr: Ipv4Addr, port: u16) -> Result<TcpStream> {
    let mut stream = connect(addr, port).await?;

    match stream.read_u8().await {
        Ok(_) => Ok(stream),
        // the agent is not serving yet behind the tunnel
        Err(e) => Err(Error::connection(format!(
            "no readiness byte from {addr}:{port}: {e}"
        ))),
    }
}

/// Invokes [`connect_and_probe`] up to `attempts` times.
///
/// Sleeps `delay` between failed attempts. Returns the first successful
/// stream.
///
/// # Errors
///
/// Returns [`Error::ConnectionTimeout`] once all attempts are exhausted.
pub async fn connect_with_retry(
    addr: Ipv4Addr,
    port: u16,
    attempts: u32,
    delay: Duration,
) -> Result<TcpStream> {
    for remaining in (1..=attempts).rev() {
        debug!(remaining, port, "connection attempt");
        if let Ok(stream) = connect_and_probe(addr, port).await {
            return Ok(stream);
        }
        if remaining > 1 {
            tokio::time::sleep(delay).await;
        }
    }
    Err(Error::connection_timeout(attempts))
}

// ============================================================================
// SharedListener
// ============================================================================

/// A listening socket shared between the session lifecycle and the watchdog.
///
/// The socket must be released exactly once, but three actors may race for
/// it: the watchdog when the agent dies, `connect` after accepting both
/// streams, and `stop`. The single-shot `closed` flag is the close authority:
/// the unique winner of [`try_close`](Self::try_close) takes the socket out
/// of the slot and drops it; losers do nothing.
///
/// Accepting clones the inner [`Arc`] out of the slot so the file descriptor
/// stays alive for the duration of the pending `accept` even if the slot is
/// emptied concurrently.
#[derive(Debug)]
pub(crate) struct SharedListener {
    /// Single-shot close flag; the CAS winner performs the close.
    closed: AtomicBool,
    /// The listening socket, present until closed.
    slot: Mutex<Option<Arc<TcpListener>>>,
    /// Port the listener is bound to.
    port: u16,
}

impl SharedListener {
    /// Binds a listener on `addr:port`.
    ///
    /// Returns the raw [`io::Error`] so callers can sweep to another port
    /// when the address is in use.
    pub(crate) async fn bind(addr: Ipv4Addr, port: u16) -> io::Result<Self> {
        let listener = TcpListener::bind((addr, port)).await?;
        let port = listener.local_addr()?.port();
        debug!(port, "listening socket bound");

        Ok(Self {
            closed: AtomicBool::new(false),
            slot: Mutex::new(Some(Arc::new(listener))),
            port,
        })
    }

    /// Returns the listener for accepting, or `None` if already closed.
    pub(crate) fn get(&self) -> Option<Arc<TcpListener>> {
        self.slot.lock().clone()
    }

    /// Returns the bound port.
    #[inline]
    pub(crate) const fn port(&self) -> u16 {
        self.port
    }

    /// Closes the listener if this caller wins the close authority.
    ///
    /// Returns `true` for the unique winner; every other call is a no-op
    /// returning `false`.
    pub(crate) fn try_close(&self) -> bool {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        drop(self.slot.lock().take());
        debug!(port = self.port, "listening socket closed");
        true
    }

    /// Returns `true` once the close authority has been claimed.
    #[cfg(test)]
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

// ============================================================================
// Tests
// ============================================================================
