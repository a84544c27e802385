//! Bridge tunnel establishment.
//!
//! The agent always serves on its well-known abstract socket; what varies is
//! how the host reaches it. [`Tunnel::establish`] runs the strategy cascade:
//! reverse first (the host listens, the device connects out), falling back
//! to forward (the host connects into the tunnel) when reverse is unusable,
//! e.g. over `adb connect`. Each strategy sweeps the configured port range
//! until a port binds or the range is exhausted.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::bridge::TunnelBridge;
use crate::error::{Error, Result};
use crate::session::PortRange;
use crate::transport::net::{self, SharedListener};

// ============================================================================
// Constants
// ============================================================================

/// Abstract socket name the agent serves on.
pub(crate) const SOCKET_NAME: &str = "scrcpy";

// ============================================================================
// Tunnel
// ============================================================================

/// An established bridge tunnel.
///
/// Exactly one of the two registrations exists in the bridge while a value
/// of this type is alive and enabled; [`disable`](Self::disable) removes it.
#[derive(Debug)]
pub(crate) enum Tunnel {
    /// Reverse tunnel: the host listens, the agent connects back.
    Reverse {
        /// Port the reverse tunnel is registered on.
        local_port: u16,
        /// Listening socket awaiting the agent's connections.
        listener: Arc<SharedListener>,
    },
    /// Forward tunnel: the host connects into the tunnel at `local_port`.
    Forward {
        /// Port the forward tunnel is registered on.
        local_port: u16,
    },
}

impl Tunnel {
    /// Runs the strategy cascade over `range`.
    ///
    /// Reverse is attempted first unless `force_forward` is set; forward is
    /// the fallback either way.
    ///
    /// # Errors
    ///
    /// Returns the forward strategy's error once both strategies fail.
    pub(crate) async fn establish<B: TunnelBridge>(
        bridge: &B,
        range: PortRange,
        force_forward: bool,
    ) -> Result<Self> {
        if !force_forward {
            match Self::reverse_any_port(bridge, range).await {
                Ok(tunnel) => return Ok(tunnel),
                // reverse does not work over some transports (e.g. adb
                // connect); the forward strategy still can
                Err(e) => warn!(error = %e, "reverse tunnel failed, falling back to forward"),
            }
        }

        Self::forward_any_port(bridge, range).await
    }

    /// Reverse strategy: register, then listen, sweeping ports.
    async fn reverse_any_port<B: TunnelBridge>(bridge: &B, range: PortRange) -> Result<Self> {
        let mut port = range.first();
        loop {
            // a failure of the command itself fails on any port
            bridge.reverse(SOCKET_NAME, port).await?;

            // At the application level the device is the server, but at the
            // network level the client listens and the agent connects back,
            // so the listener is ready before the agent even starts.
            match SharedListener::bind(net::LOCALHOST, port).await {
                Ok(listener) => {
                    debug!(port, "reverse tunnel established");
                    return Ok(Self::Reverse {
                        local_port: port,
                        listener: Arc::new(listener),
                    });
                }
                Err(e) => {
                    if let Err(remove_err) = bridge.reverse_remove(SOCKET_NAME).await {
                        warn!(port, error = %remove_err, "could not remove reverse tunnel");
                    }

                    // check before incrementing to avoid overflow on 65535
                    if port < range.last() {
                        warn!(port, error = %e, "could not listen, retrying on next port");
                        port += 1;
                        continue;
                    }

                    log_exhausted(range, "listen on");
                    return Err(Error::tunnel(range.first(), range.last()));
                }
            }
        }
    }

    /// Forward strategy: register per port, no local listener needed.
    async fn forward_any_port<B: TunnelBridge>(bridge: &B, range: PortRange) -> Result<Self> {
        let mut port = range.first();
        loop {
            match bridge.forward(port, SOCKET_NAME).await {
                Ok(()) => {
                    debug!(port, "forward tunnel established");
                    return Ok(Self::Forward { local_port: port });
                }
                Err(e) => {
                    if port < range.last() {
                        warn!(port, error = %e, "could not forward, retrying on next port");
                        port += 1;
                        continue;
                    }

                    log_exhausted(range, "forward");
                    return Err(Error::tunnel(range.first(), range.last()));
                }
            }
        }
    }

    /// Removes the bridge registration. Best-effort: failures are logged,
    /// never propagated.
    pub(crate) async fn disable<B: TunnelBridge>(&self, bridge: &B) {
        let result = match self {
            Self::Reverse { .. } => bridge.reverse_remove(SOCKET_NAME).await,
            Self::Forward { local_port } => bridge.forward_remove(*local_port).await,
        };

        if let Err(e) = result {
            warn!(error = %e, "could not remove tunnel");
        }
    }

    /// Port the tunnel is registered on.
    #[inline]
    pub(crate) const fn local_port(&self) -> u16 {
        match self {
            Self::Reverse { local_port, .. } | Self::Forward { local_port } => *local_port,
        }
    }

    /// Returns `true` for a forward tunnel.
    #[inline]
    pub(crate) const fn is_forward(&self) -> bool {
        matches!(self, Self::Forward { .. })
    }

    /// Listening socket, present only in reverse mode.
    pub(crate) fn listener(&self) -> Option<&Arc<SharedListener>> {
        match self {
            Self::Reverse { listener, .. } => Some(listener),
            Self::Forward { .. } => None,
        }
    }
}

/// Final error log, single-port ranges phrased specially.
fn log_exhausted(range: PortRange, action: &str) {
    if range.first() == range.last() {
        error!(port = range.first(), "could not {action} port");
    } else {
        error!(
            first = range.first(),
            last = range.last(),
            "could not {action} any port in range"
        );
    }
}

// ============================================================================
// Tests
// ============================================================================
