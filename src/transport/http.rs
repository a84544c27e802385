//! HTTP control endpoint for direct mode.
//!
//! In direct mode there is no bridge: the agent host exposes a small HTTP
//! surface to start and stop the agent, and the data sockets are reached by
//! plain IP. Both endpoints are fire-and-forget GETs whose response body
//! must contain the literal `success`; anything else is a failure.

// ============================================================================
// Imports
// ============================================================================

use std::net::Ipv4Addr;
use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// At most this much of a response body is inspected.
const BODY_PROBE_LIMIT: usize = 1024;

/// Per-request timeout, keeping direct-mode teardown bounded.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// DirectControl
// ============================================================================

/// Client for the agent host's start/stop HTTP endpoints.
pub(crate) struct DirectControl {
    /// Underlying HTTP client with a request timeout.
    client: reqwest::Client,
    /// Endpoint base, without a trailing slash.
    base_url: String,
}

impl DirectControl {
    /// Creates a control client for `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client cannot be constructed.
    pub(crate) fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }

        Ok(Self { client, base_url })
    }

    /// Asks the agent host to start the agent.
    ///
    /// `path_args` is the `/`-joined positional parameter list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on transport failure or [`Error::Control`]
    /// if the host did not confirm the start.
    pub(crate) async fn start_agent(&self, path_args: &str) -> Result<()> {
        let url = format!("{}/startScrcpy/{}", self.base_url, path_args);
        self.get_expect_success(&url).await
    }

    /// Asks the agent host to stop the agent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on transport failure or [`Error::Control`]
    /// if the host did not confirm the stop.
    pub(crate) async fn stop_agent(&self) -> Result<()> {
        let url = format!("{}/stopScrcpy/", self.base_url);
        self.get_expect_success(&url).await
    }

    /// GETs `url` and requires `success` within the bounded body prefix.
    async fn get_expect_success(&self, url: &str) -> Result<()> {
        debug!(url, "direct control request");

        let mut response = self.client.get(url).send().await?;

        let mut body = Vec::with_capacity(256);
        while let Some(chunk) = response.chunk().await? {
            let room = BODY_PROBE_LIMIT - body.len();
            body.extend_from_slice(&chunk[..chunk.len().min(room)]);
            if body.len() >= BODY_PROBE_LIMIT {
                break;
            }
        }

        let body = String::from_utf8_lossy(&body);
        if body.contains("success") {
            debug!(%body, "direct control confirmed");
            Ok(())
        } else {
            Err(Error::control(format!("unexpected response from {url}")))
        }
    }
}

// ============================================================================
// Host Parsing
// ============================================================================

/// Extracts the IPv4 host from a direct endpoint base URL.
///
/// The same host serves both the control endpoints and the data sockets.
///
/// # Errors
///
/// Returns [`Error::Config`] if the host is not a literal IPv4 address.
pub(crate) fn parse_host_ipv4(base_url: &str) -> Result<Ipv4Addr> {
    let rest = base_url
        .strip_prefix("http://")
        .or_else(|| base_url.strip_prefix("https://"))
        .unwrap_or(base_url);

    let host_port = rest.split('/').next().unwrap_or(rest);
    let host = host_port.split(':').next().unwrap_or(host_port);

    host.parse().map_err(|_| {
        Error::config(format!(
            "direct URL host is not an IPv4 address: {base_url}"
        ))
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves a single canned HTTP response on a random loopback port.
    async fn respond_once(body: &'static str) -> u16 {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .expect("bind");
        let port = listener.local_addr().expect("addr").port();

        tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                let mut request = [0u8; 2048];
                let _ = stream.read(&mut request).await;

                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        port
    }

    #[tokio::test]
    async fn test_start_agent_success_body() {
        let port = respond_once("success").await;
        let control = DirectControl::new(format!("http://127.0.0.1:{port}")).expect("client");

        control
            .start_agent("1.17/info/0/8000000")
            .await
            .expect("host confirmed");
    }

    #[tokio::test]
    async fn test_stop_agent_rejects_other_body() {
        let port = respond_once("device busy").await;
        let control = DirectControl::new(format!("http://127.0.0.1:{port}")).expect("client");

        let err = control.stop_agent().await.unwrap_err();
        assert!(matches!(err, Error::Control { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_http_error() {
        // reserve a port, then free it so the GET is refused
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);

        let control = DirectControl::new(format!("http://127.0.0.1:{port}")).expect("client");
        let err = control.stop_agent().await.unwrap_err();
        assert!(matches!(err, Error::Http(_)));
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let control = DirectControl::new("http://10.0.0.2:8080/").expect("client");
        assert_eq!(control.base_url, "http://10.0.0.2:8080");
    }

    #[test]
    fn test_parse_host_ipv4() {
        let addr = parse_host_ipv4("http://10.0.0.2:8080").expect("parse");
        assert_eq!(addr, Ipv4Addr::new(10, 0, 0, 2));
    }

    #[test]
    fn test_parse_host_ipv4_without_port() {
        let addr = parse_host_ipv4("http://192.168.1.20").expect("parse");
        assert_eq!(addr, Ipv4Addr::new(192, 168, 1, 20));
    }

    #[test]
    fn test_parse_host_rejects_names() {
        assert!(parse_host_ipv4("http://device.local:8080").is_err());
    }
}
