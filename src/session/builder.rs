//! Builder pattern for session configuration.
//!
//! Provides a fluent API for configuring and creating [`Server`] instances.
//!
//! # Example
//!
//! ```
//! use scrcpy_session::{Server, ServerParams};
//!
//! # fn example() -> scrcpy_session::Result<()> {
//! let server = Server::builder()
//!     .serial("emulator-5554")
//!     .params(ServerParams::new().with_max_size(1920))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use crate::error::{Error, Result};
use crate::transport::http::{self, DirectControl};

use super::params::ServerParams;
use super::server::{DirectEndpoint, Server};

// ============================================================================
// ServerBuilder
// ============================================================================

/// Builder for configuring a [`Server`] instance.
///
/// Use [`Server::builder()`] to create a new builder. A session targets
/// either a bridge device (optionally picked by serial) or a direct HTTP
/// endpoint; the two are mutually exclusive.
#[derive(Debug, Default, Clone)]
pub struct ServerBuilder {
    /// Device serial for the bridge, if pinned.
    serial: Option<String>,
    /// Direct endpoint base URL, if any.
    direct_url: Option<String>,
    /// Agent launch parameters.
    params: ServerParams,
}

// ============================================================================
// ServerBuilder Implementation
// ============================================================================

impl ServerBuilder {
    /// Creates a new builder with default parameters.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins the bridge to a specific device serial.
    #[inline]
    #[must_use]
    pub fn serial(mut self, serial: impl Into<String>) -> Self {
        self.serial = Some(serial.into());
        self
    }

    /// Targets a direct HTTP endpoint instead of the bridge.
    ///
    /// The URL host must be a literal IPv4 address; it also serves the
    /// data sockets.
    #[inline]
    #[must_use]
    pub fn direct_url(mut self, url: impl Into<String>) -> Self {
        self.direct_url = Some(url.into());
        self
    }

    /// Sets the agent launch parameters.
    #[inline]
    #[must_use]
    pub fn params(mut self, params: ServerParams) -> Self {
        self.params = params;
        self
    }

    /// Builds the server with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if both a serial and a direct URL are set
    /// - [`Error::Config`] if the direct URL host is not an IPv4 literal
    pub fn build(self) -> Result<Server> {
        if self.serial.is_some() && self.direct_url.is_some() {
            return Err(Error::config(
                "serial and direct URL are mutually exclusive",
            ));
        }

        let direct = match self.direct_url {
            Some(url) => {
                let addr = http::parse_host_ipv4(&url)?;
                let control = DirectControl::new(url)?;
                Some(DirectEndpoint { addr, control })
            }
            None => None,
        };

        Ok(Server::new(self.serial, direct, self.params))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_bridge_default_device() {
        let server = ServerBuilder::new().build().expect("build");
        assert!(!server.is_direct());
        assert_eq!(server.serial(), None);
    }

    #[test]
    fn test_build_with_serial() {
        let server = ServerBuilder::new()
            .serial("emulator-5554")
            .build()
            .expect("build");
        assert_eq!(server.serial(), Some("emulator-5554"));
    }

    #[test]
    fn test_build_direct() {
        let server = ServerBuilder::new()
            .direct_url("http://10.0.0.2:8080")
            .build()
            .expect("build");
        assert!(server.is_direct());
    }

    #[test]
    fn test_serial_and_direct_are_exclusive() {
        let err = ServerBuilder::new()
            .serial("emulator-5554")
            .direct_url("http://10.0.0.2:8080")
            .build()
            .unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_direct_url_must_be_ipv4() {
        let err = ServerBuilder::new()
            .direct_url("http://phone.local:8080")
            .build()
            .unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_builder_is_clone() {
        let builder = ServerBuilder::new().serial("a");
        let cloned = builder.clone();
        assert_eq!(builder.serial, cloned.serial);
    }
}
