//! Session lifecycle orchestrator.
//!
//! [`Server`] owns every resource a mirroring session acquires: the bridge
//! tunnel, the agent process (through its watchdog), the listening socket,
//! and the two data streams. The lifecycle is caller-driven:
//!
//! 1. [`start`](Server::start) deploys and launches the agent. It is
//!    transactional, unwinding everything it acquired on failure.
//! 2. [`connect`](Server::connect) materializes the video stream, then the
//!    control stream, in that order on the wire.
//! 3. [`stop`](Server::stop) tears down, best-effort, with a bounded wait
//!    for the agent to exit on its own before force-killing it.
//!
//! Only one task may drive the lifecycle; the watchdog runs concurrently
//! from `start` until `stop` joins it. Dropping a `Server` at any point is
//! safe: the agent process handle kills on drop and the watchdog task
//! reaps it in the background.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::bridge::{AdbBridge, DEVICE_AGENT_PATH};
use crate::error::{Error, Result};
use crate::transport::http::DirectControl;
use crate::transport::net::{self, SharedListener};
use crate::transport::tunnel::Tunnel;

use super::artifact;
use super::builder::ServerBuilder;
use super::params::ServerParams;
use super::watchdog::Watchdog;

// ============================================================================
// Constants
// ============================================================================

/// Connection attempts against a direct endpoint; remote networks need
/// fewer but longer attempts.
const DIRECT_ATTEMPTS: u32 = 12;

/// Delay between direct connection attempts.
const DIRECT_DELAY: Duration = Duration::from_millis(1000);

/// Connection attempts through a forward tunnel.
const FORWARD_ATTEMPTS: u32 = 100;

/// Delay between forward connection attempts.
const FORWARD_DELAY: Duration = Duration::from_millis(100);

/// How long `stop` waits for the agent to exit before killing it.
const WATCHDOG_GRACE: Duration = Duration::from_millis(1000);

// ============================================================================
// Types
// ============================================================================

/// A direct (bridge-less) agent host.
pub(crate) struct DirectEndpoint {
    /// Address serving both control endpoints and data sockets.
    pub(crate) addr: Ipv4Addr,
    /// HTTP start/stop client.
    pub(crate) control: DirectControl,
}

// ============================================================================
// Server
// ============================================================================

/// A mirroring session with a single device.
///
/// See the [module docs](self) for the lifecycle contract.
///
/// # Example
///
/// ```no_run
/// use scrcpy_session::{Server, ServerParams};
///
/// # async fn example() -> scrcpy_session::Result<()> {
/// let mut server = Server::builder()
///     .serial("emulator-5554")
///     .params(ServerParams::new())
///     .build()?;
///
/// server.start().await?;
/// server.connect().await?;
/// let (video, control) = server.take_streams().expect("connected");
/// // hand the streams to the decoder and the controller...
/// # drop((video, control));
/// server.stop().await;
/// # Ok(())
/// # }
/// ```
pub struct Server {
    /// Device serial, if pinned.
    serial: Option<String>,
    /// Direct endpoint; `None` means bridge mode.
    direct: Option<DirectEndpoint>,
    /// Agent launch parameters.
    params: ServerParams,
    /// Command bridge to the device.
    bridge: AdbBridge,
    /// Established tunnel, between `start` and `stop`.
    tunnel: Option<Tunnel>,
    /// Whether the tunnel registration is still live in the bridge.
    tunnel_active: bool,
    /// Watchdog over the agent process (bridge mode only).
    watchdog: Option<Watchdog>,
    /// Video stream, after `connect`.
    video: Option<TcpStream>,
    /// Control stream, after `connect`.
    control: Option<TcpStream>,
}

// ============================================================================
// Server - Display
// ============================================================================

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("serial", &self.serial)
            .field("direct", &self.direct.as_ref().map(|d| d.addr))
            .field("local_port", &self.local_port())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Server - Construction
// ============================================================================

impl Server {
    /// Creates a configuration builder for a session.
    #[inline]
    #[must_use]
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Creates an initialized, not yet started server.
    pub(crate) fn new(
        serial: Option<String>,
        direct: Option<DirectEndpoint>,
        params: ServerParams,
    ) -> Self {
        let bridge = AdbBridge::new(serial.clone());
        Self {
            serial,
            direct,
            params,
            bridge,
            tunnel: None,
            tunnel_active: false,
            watchdog: None,
            video: None,
            control: None,
        }
    }
}

// ============================================================================
// Server - Accessors
// ============================================================================

impl Server {
    /// Device serial this session is pinned to, if any.
    #[inline]
    #[must_use]
    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    /// Returns `true` for a direct (bridge-less) session.
    #[inline]
    #[must_use]
    pub fn is_direct(&self) -> bool {
        self.direct.is_some()
    }

    /// Local tunnel port, once a tunnel is established.
    #[inline]
    #[must_use]
    pub fn local_port(&self) -> Option<u16> {
        self.tunnel.as_ref().map(Tunnel::local_port)
    }

    /// Hands both data streams to the consumer.
    ///
    /// Returns `None` unless both streams are present; the first stream is
    /// video, the second control.
    pub fn take_streams(&mut self) -> Option<(TcpStream, TcpStream)> {
        match (self.video.take(), self.control.take()) {
            (Some(video), Some(control)) => Some((video, control)),
            (video, control) => {
                self.video = video;
                self.control = control;
                None
            }
        }
    }
}

// ============================================================================
// Server - Start
// ============================================================================

impl Server {
    /// Deploys, wires up, and launches the agent.
    ///
    /// Bridge mode pushes the artifact, establishes a tunnel, launches the
    /// agent, and spawns the watchdog; direct mode asks the remote host to
    /// start the agent. On failure every step already performed is undone
    /// in reverse order.
    ///
    /// # Errors
    ///
    /// Any step's error is returned after the unwind completes.
    pub async fn start(&mut self) -> Result<()> {
        if let Some(direct) = &self.direct {
            info!(addr = %direct.addr, "starting agent via direct endpoint");

            let path_args = self.params.to_path_args();
            if let Err(e) = direct.control.start_agent(&path_args).await {
                // the remote may have half-started; try to stop it anyway
                if let Err(stop_err) = direct.control.stop_agent().await {
                    debug!(error = %stop_err, "direct stop after failed start");
                }
                return Err(e);
            }

            return Ok(());
        }

        self.push_agent().await?;

        let tunnel = Tunnel::establish(
            &self.bridge,
            self.params.port_range,
            self.params.force_adb_forward,
        )
        .await?;

        let args = self.params.to_agent_args(tunnel.is_forward());
        let child = match self.bridge.exec_agent(&args) {
            Ok(child) => child,
            Err(e) => {
                // unwind: the tunnel (and its listener) were acquired
                if let Some(listener) = tunnel.listener() {
                    listener.try_close();
                }
                tunnel.disable(&self.bridge).await;
                return Err(e);
            }
        };

        // If the agent dies before connecting back, a blocking accept would
        // never return; the watchdog signals the death and closes the
        // listener to unblock it.
        let watchdog = Watchdog::spawn(child, tunnel.listener().cloned());

        info!(
            port = tunnel.local_port(),
            forward = tunnel.is_forward(),
            "agent started"
        );

        self.tunnel = Some(tunnel);
        self.watchdog = Some(watchdog);
        self.tunnel_active = true;
        Ok(())
    }

    /// Resolves the local artifact and pushes it to the device.
    async fn push_agent(&self) -> Result<()> {
        let path = artifact::agent_path();
        artifact::ensure_regular_file(&path)?;

        info!(path = %path.display(), "pushing agent to device");
        self.bridge.push(&path, DEVICE_AGENT_PATH).await
    }
}

// ============================================================================
// Server - Connect
// ============================================================================

impl Server {
    /// Establishes the two data streams, video first.
    ///
    /// The transport decides the mechanics: direct and forward modes
    /// connect out (consuming the agent's readiness byte on the first
    /// stream), reverse mode accepts the agent's inbound connections. If
    /// the second stream fails, the first stays owned for `stop` to close.
    ///
    /// # Errors
    ///
    /// - [`Error::AgentExited`] if the agent died before connecting
    /// - [`Error::Connection`] / [`Error::ConnectionTimeout`] on socket
    ///   failures
    /// - [`Error::Config`] if called before a successful `start`
    pub async fn connect(&mut self) -> Result<()> {
        enum Plan {
            Direct(Ipv4Addr),
            Forward(u16),
            Reverse(Arc<SharedListener>),
        }

        let plan = if let Some(direct) = &self.direct {
            Plan::Direct(direct.addr)
        } else {
            match &self.tunnel {
                Some(Tunnel::Forward { local_port }) => Plan::Forward(*local_port),
                Some(Tunnel::Reverse { listener, .. }) => Plan::Reverse(Arc::clone(listener)),
                None => return Err(Error::config("server not started")),
            }
        };

        match plan {
            Plan::Direct(addr) => self.connect_direct(addr).await,
            Plan::Forward(port) => self.connect_forward(port).await,
            Plan::Reverse(listener) => self.connect_reverse(&listener).await,
        }
    }

    /// Direct mode: both streams go to the agent host's first range port.
    async fn connect_direct(&mut self, addr: Ipv4Addr) -> Result<()> {
        let port = self.params.port_range.first();
        debug!(%addr, port, "connecting to agent directly");

        let video = net::connect_with_retry(addr, port, DIRECT_ATTEMPTS, DIRECT_DELAY).await?;
        self.video = Some(video);

        // the agent is known to be listening; a single attempt suffices
        let control = net::connect(addr, port).await?;
        self.control = Some(control);

        Ok(())
    }

    /// Forward mode: connect into the tunnel, then drop the registration.
    async fn connect_forward(&mut self, port: u16) -> Result<()> {
        debug!(port, "connecting through forward tunnel");

        let video =
            net::connect_with_retry(net::LOCALHOST, port, FORWARD_ATTEMPTS, FORWARD_DELAY).await?;
        self.video = Some(video);

        let control = net::connect(net::LOCALHOST, port).await?;
        self.control = Some(control);

        // both streams are up; the tunnel registration is no longer needed
        self.disable_tunnel().await;

        Ok(())
    }

    /// Reverse mode: accept both streams, racing agent death.
    async fn connect_reverse(&mut self, shared: &SharedListener) -> Result<()> {
        debug!(port = shared.port(), "waiting for agent connections");

        let video = self.accept_agent(shared).await?;
        self.video = Some(video);

        let control = self.accept_agent(shared).await?;
        self.control = Some(control);

        // the listener served its purpose; close it unless the watchdog
        // already did
        shared.try_close();

        Ok(())
    }

    /// Accepts one agent connection, unblocked by agent death.
    async fn accept_agent(&self, shared: &SharedListener) -> Result<TcpStream> {
        let Some(watchdog) = &self.watchdog else {
            return Err(Error::config("server not started"));
        };

        let listener = shared.get().ok_or(Error::AgentExited)?;
        let mut terminated = watchdog.terminated();

        tokio::select! {
            accepted = listener.accept() => {
                let (stream, addr) = accepted
                    .map_err(|e| Error::connection(format!("accept: {e}")))?;
                debug!(%addr, "agent connected");
                Ok(stream)
            }
            _ = terminated.wait_for(|t| *t) => Err(Error::AgentExited),
        }
    }
}

// ============================================================================
// Server - Stop
// ============================================================================

impl Server {
    /// Tears the session down.
    ///
    /// Never fails: every sub-teardown is best-effort and logged. Bounded
    /// by the watchdog grace period plus the bridge removal commands.
    pub async fn stop(&mut self) {
        // release the sockets first so the agent's blocking I/O fails fast
        if let Some(tunnel) = &self.tunnel {
            if let Some(listener) = tunnel.listener() {
                listener.try_close();
            }
        }
        drop(self.video.take());
        drop(self.control.take());

        if self.tunnel_active {
            self.disable_tunnel().await;
        }

        if let Some(direct) = &self.direct {
            if let Err(e) = direct.control.stop_agent().await {
                warn!(error = %e, "could not stop remote agent");
            }
        }

        // give the agent a moment to terminate on its own, then insist
        if let Some(watchdog) = self.watchdog.take() {
            watchdog.stop(WATCHDOG_GRACE).await;
        }

        self.tunnel = None;
        debug!("session stopped");
    }

    /// Removes the tunnel registration, best-effort.
    async fn disable_tunnel(&mut self) {
        if let Some(tunnel) = &self.tunnel {
            tunnel.disable(&self.bridge).await;
        }
        self.tunnel_active = false;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::process::Command;

    use super::super::params::PortRange;

    /// A reverse-mode server wired to a local listener and a stand-in
    /// agent process, bypassing the bridge.
    async fn reverse_server(program: &str, args: &[&str]) -> (Server, u16, Arc<SharedListener>) {
        let listener = SharedListener::bind(net::LOCALHOST, 0).await.expect("bind");
        let port = listener.port();
        let listener = Arc::new(listener);

        let child = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .spawn()
            .expect("spawn");
        let watchdog = Watchdog::spawn(child, Some(Arc::clone(&listener)));

        let mut server = Server::new(None, None, ServerParams::new());
        server.tunnel = Some(Tunnel::Reverse {
            local_port: port,
            listener: Arc::clone(&listener),
        });
        server.watchdog = Some(watchdog);

        (server, port, listener)
    }

    #[test]
    fn test_server_is_debug() {
        let server = Server::builder().build().expect("build");
        let repr = format!("{server:?}");
        assert!(repr.contains("Server"));
    }

    #[tokio::test]
    async fn test_reverse_connect_accepts_video_then_control() {
        let (mut server, port, listener) = reverse_server("sleep", &["30"]).await;

        tokio::spawn(async move {
            // the agent connects twice: video first, then control
            let mut video = TcpStream::connect((net::LOCALHOST, port))
                .await
                .expect("video");
            video.write_all(b"V").await.expect("write video");
            let mut control = TcpStream::connect((net::LOCALHOST, port))
                .await
                .expect("control");
            control.write_all(b"C").await.expect("write control");
            tokio::time::sleep(Duration::from_secs(2)).await;
            drop((video, control));
        });

        server.connect().await.expect("connect");

        let (mut video, mut control) = server.take_streams().expect("streams");
        assert_eq!(video.read_u8().await.expect("video byte"), b'V');
        assert_eq!(control.read_u8().await.expect("control byte"), b'C');

        // the listening socket was closed right after the second accept
        assert!(listener.is_closed());

        server.stop().await;
    }

    #[tokio::test]
    async fn test_reverse_connect_unblocked_by_agent_exit() {
        // the stand-in agent exits immediately and never connects back
        let (mut server, _port, listener) = reverse_server("true", &[]).await;

        let err = server.connect().await.unwrap_err();
        assert!(matches!(err, Error::AgentExited));

        server.stop().await;
        assert!(listener.is_closed());
    }

    #[tokio::test]
    async fn test_direct_connect_consumes_readiness_byte() {
        let listener = TcpListener::bind((net::LOCALHOST, 0)).await.expect("bind");
        let port = listener.local_addr().expect("addr").port();

        tokio::spawn(async move {
            let (mut video, _) = listener.accept().await.expect("video");
            // readiness byte, then the first video byte
            video.write_all(&[0, b'V']).await.expect("write video");
            let (mut control, _) = listener.accept().await.expect("control");
            control.write_all(b"C").await.expect("write control");
            tokio::time::sleep(Duration::from_secs(2)).await;
            drop((video, control));
        });

        let mut server = Server::builder()
            .direct_url(format!("http://127.0.0.1:{port}"))
            .params(ServerParams::new().with_port_range(PortRange::single(port)))
            .build()
            .expect("build");

        server.connect().await.expect("connect");

        let (mut video, mut control) = server.take_streams().expect("streams");
        // the readiness byte was consumed by the probe, not delivered
        assert_eq!(video.read_u8().await.expect("video byte"), b'V');
        assert_eq!(control.read_u8().await.expect("control byte"), b'C');
    }

    #[tokio::test]
    async fn test_connect_before_start_fails() {
        let mut server = Server::builder().build().expect("build");
        let err = server.connect().await.unwrap_err();
        assert!(err.is_config_error());
    }

    #[tokio::test]
    async fn test_stop_on_never_started_instance() {
        let mut server = Server::builder().build().expect("build");
        server.stop().await;
        assert!(server.local_port().is_none());
    }

    #[tokio::test]
    async fn test_take_streams_empty_before_connect() {
        let mut server = Server::builder().build().expect("build");
        assert!(server.take_streams().is_none());
    }

    #[test]
    fn test_drop_never_started_instance() {
        let server = Server::builder().serial("emulator-5554").build().expect("build");
        drop(server);
    }
}
