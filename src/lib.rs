//! scrcpy-session - Session bootstrap for scrcpy-compatible device mirroring.
//!
//! This library establishes a mirroring session with a mobile device: it
//! deploys the on-device agent, negotiates a tunnel through the host-device
//! bridge (or reaches the agent directly by IP), launches the agent, and
//! hands exactly two ordered byte streams to the caller: video first,
//! control second. Everything acquired along the way is torn down
//! transactionally, whichever step fails.
//!
//! # Architecture
//!
//! The device-side agent is the application-level server, but at the
//! network level the roles depend on the transport:
//!
//! - **Reverse** (preferred): the host listens on a loopback port wired to
//!   the agent's socket name by a bridge reverse tunnel; the agent connects
//!   back. A watchdog over the agent process unblocks the pending accept if
//!   the agent dies first.
//! - **Forward** (fallback): the host connects into a bridge forward
//!   tunnel; the agent listens on the device. The first byte the agent
//!   writes is a readiness marker, consumed before the stream is handed
//!   over.
//! - **Direct**: no bridge; the agent host is driven over small HTTP
//!   start/stop endpoints and the data sockets are reached by plain IP.
//!
//! # Quick Start
//!
//! ```no_run
//! use scrcpy_session::{LogLevel, Server, ServerParams};
//!
//! #[tokio::main]
//! async fn main() -> scrcpy_session::Result<()> {
//!     let params = ServerParams::new()
//!         .with_log_level(LogLevel::Info)
//!         .with_max_size(1920)
//!         .with_bit_rate(8_000_000);
//!
//!     let mut server = Server::builder()
//!         .serial("emulator-5554")
//!         .params(params)
//!         .build()?;
//!
//!     server.start().await?;
//!     server.connect().await?;
//!
//!     let (video, control) = server.take_streams().expect("connected");
//!     // hand the streams to the decoder and the input encoder...
//!     # drop((video, control));
//!
//!     server.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`bridge`] | Host-to-device command bridge ([`AdbBridge`]) |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`session`] | Lifecycle: [`Server`], [`ServerBuilder`], [`ServerParams`] |
//! | [`transport`] | Socket primitives, tunnels, direct control (internal) |

// ============================================================================
// Constants
// ============================================================================

/// Version string sent to the agent as the first launch parameter.
///
/// The agent refuses to start under a mismatched client.
pub const AGENT_VERSION: &str = "1.17";

// ============================================================================
// Modules
// ============================================================================

/// Host-to-device command bridge.
///
/// Wraps the external `adb` binary: artifact push, tunnel registration,
/// and agent execution.
pub mod bridge;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Session lifecycle and configuration.
///
/// Use [`Server::builder()`] to configure and create a session.
pub mod session;

/// Transport establishment layer.
///
/// Internal module handling sockets, tunnels, and direct control.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Bridge types
pub use bridge::AdbBridge;

// Error types
pub use error::{Error, Result};

// Session types
pub use session::{LogLevel, PortRange, Server, ServerBuilder, ServerParams};
