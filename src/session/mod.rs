//! Session lifecycle and configuration.
//!
//! This module provides the main entry point for establishing a mirroring
//! session.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Server`] | Lifecycle orchestrator: start, connect, stop |
//! | [`ServerBuilder`] | Fluent session configuration builder |
//! | [`ServerParams`] | Agent launch parameters |
//! | [`LogLevel`] | Agent log verbosity |
//! | [`PortRange`] | Candidate tunnel ports |
//!
//! # Example
//!
//! ```no_run
//! use scrcpy_session::{Server, ServerParams};
//!
//! # async fn example() -> scrcpy_session::Result<()> {
//! let mut server = Server::builder()
//!     .serial("emulator-5554")
//!     .params(ServerParams::new().with_bit_rate(8_000_000))
//!     .build()?;
//!
//! server.start().await?;
//! server.connect().await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Agent artifact resolution.
mod artifact;

/// Fluent builder pattern for session configuration.
pub mod builder;

/// Agent launch parameters.
pub mod params;

/// Session lifecycle orchestrator.
pub mod server;

/// Agent process watchdog.
mod watchdog;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ServerBuilder;
pub use params::{LogLevel, PortRange, ServerParams};
pub use server::Server;
