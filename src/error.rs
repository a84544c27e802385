//! Error types for scrcpy session establishment.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use scrcpy_session::{Result, Server};
//!
//! async fn example(server: &mut Server) -> Result<()> {
//!     server.start().await?;
//!     server.connect().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::AgentNotFound`] |
//! | Bridge | [`Error::Bridge`] |
//! | Tunnel | [`Error::Tunnel`] |
//! | Process | [`Error::ProcessLaunch`], [`Error::AgentExited`] |
//! | Network | [`Error::Connection`], [`Error::ConnectionTimeout`] |
//! | Direct control | [`Error::Control`], [`Error::Http`] |
//! | External | [`Error::Io`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::path::PathBuf;
use std::result::Result as StdResult;

use thiserror::Error;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when session configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Agent artifact not found at path.
    ///
    /// Returned when the resolved agent artifact does not exist or is not
    /// a regular file.
    #[error("Agent not found at: {}", path.display())]
    AgentNotFound {
        /// Path where the agent artifact was expected.
        path: PathBuf,
    },

    // ========================================================================
    // Bridge Errors
    // ========================================================================
    /// A bridge command exited with a non-zero status.
    #[error("Bridge command failed: {command}")]
    Bridge {
        /// Human-readable label of the failed command.
        command: String,
    },

    // ========================================================================
    // Tunnel Errors
    // ========================================================================
    /// No port in the configured range could be bound or forwarded.
    #[error("No tunnel port available in range {first}:{last}")]
    Tunnel {
        /// First candidate port.
        first: u16,
        /// Last candidate port.
        last: u16,
    },

    // ========================================================================
    // Process Errors
    // ========================================================================
    /// Failed to launch the agent process.
    #[error("Failed to launch agent: {message}")]
    ProcessLaunch {
        /// Description of the launch failure.
        message: String,
    },

    /// The agent process exited before the data streams were established.
    #[error("Agent process exited before connecting")]
    AgentExited,

    // ========================================================================
    // Network Errors
    // ========================================================================
    /// Socket listen/accept/connect/probe failure.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// All connection attempts were exhausted.
    #[error("Connection failed after {attempts} attempts")]
    ConnectionTimeout {
        /// Number of attempts made before giving up.
        attempts: u32,
    },

    // ========================================================================
    // Direct Control Errors
    // ========================================================================
    /// The direct control endpoint did not confirm the request.
    #[error("Direct control request failed: {message}")]
    Control {
        /// Description of the control failure.
        message: String,
    },

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an agent-not-found error.
    #[inline]
    pub fn agent_not_found(path: impl Into<PathBuf>) -> Self {
        Self::AgentNotFound { path: path.into() }
    }

    /// Creates a bridge command error.
    #[inline]
    pub fn bridge(command: impl Into<String>) -> Self {
        Self::Bridge {
            command: command.into(),
        }
    }

    /// Creates a tunnel exhaustion error.
    #[inline]
    pub const fn tunnel(first: u16, last: u16) -> Self {
        Self::Tunnel { first, last }
    }

    /// Creates a process launch error.
    #[inline]
    pub fn process_launch(err: IoError) -> Self {
        Self::ProcessLaunch {
            message: err.to_string(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub const fn connection_timeout(attempts: u32) -> Self {
        Self::ConnectionTimeout { attempts }
    }

    /// Creates a direct control error.
    #[inline]
    pub fn control(message: impl Into<String>) -> Self {
        Self::Control {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a configuration error.
    #[inline]
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::Config { .. } | Self::AgentNotFound { .. })
    }

    /// Returns `true` if this is a network error.
    #[inline]
    #[must_use]
    pub fn is_network_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::ConnectionTimeout { .. } | Self::Io(_)
        )
    }

    /// Returns `true` if this is a process error.
    #[inline]
    #[must_use]
    pub fn is_process_error(&self) -> bool {
        matches!(self, Self::ProcessLaunch { .. } | Self::AgentExited)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    #[test]
    fn test_error_display() {
        let err = Error::connection("refused");
        assert_eq!(err.to_string(), "Connection failed: refused");
    }

    #[test]
    fn test_config_error() {
        let err = Error::config("missing serial");
        assert_eq!(err.to_string(), "Configuration error: missing serial");
    }

    #[test]
    fn test_agent_not_found_display() {
        let err = Error::agent_not_found("/tmp/scrcpy-server");
        assert_eq!(err.to_string(), "Agent not found at: /tmp/scrcpy-server");
    }

    #[test]
    fn test_tunnel_display() {
        let err = Error::tunnel(27183, 27199);
        assert_eq!(
            err.to_string(),
            "No tunnel port available in range 27183:27199"
        );
    }

    #[test]
    fn test_is_config_error() {
        assert!(Error::config("x").is_config_error());
        assert!(Error::agent_not_found("/x").is_config_error());
        assert!(!Error::bridge("adb push").is_config_error());
    }

    #[test]
    fn test_is_network_error() {
        assert!(Error::connection("x").is_network_error());
        assert!(Error::connection_timeout(12).is_network_error());
        assert!(!Error::AgentExited.is_network_error());
    }

    #[test]
    fn test_is_process_error() {
        assert!(Error::AgentExited.is_process_error());
        assert!(!Error::config("x").is_process_error());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
