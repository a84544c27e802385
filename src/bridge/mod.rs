//! Host-to-device command bridge.
//!
//! [`AdbBridge`] wraps the external `adb` binary. It can copy the agent
//! artifact to the device, register reverse/forward tunnels against the
//! agent's abstract socket name, and launch the agent itself.
//!
//! Every command runs as a subprocess and is awaited for its exit status;
//! a non-zero status surfaces as [`Error::Bridge`] carrying the command
//! label. The bridge binary can be overridden with the `ADB` environment
//! variable.
//!
//! The four tunnel registration calls are also exposed through the
//! [`TunnelBridge`] trait so the tunnel cascade can be exercised against a
//! test double.

// ============================================================================
// Imports
// ============================================================================

use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::debug;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Device-side path the agent artifact is pushed to.
pub const DEVICE_AGENT_PATH: &str = "/data/local/tmp/scrcpy-server.jar";

/// Entry class of the on-device agent.
const AGENT_CLASS: &str = "com.genymobile.scrcpy.Server";

/// Environment variable overriding the bridge binary.
const BRIDGE_ENV: &str = "ADB";

// ============================================================================
// TunnelBridge Trait
// ============================================================================

/// Tunnel registration surface of the bridge.
///
/// A reverse tunnel surfaces device-initiated connections to the named
/// endpoint as inbound connections on the host port; a forward tunnel
/// routes host connections on the local port to the named endpoint on the
/// device.
pub(crate) trait TunnelBridge {
    /// Registers a reverse tunnel from `socket_name` to `local_port`.
    async fn reverse(&self, socket_name: &str, local_port: u16) -> Result<()>;

    /// Removes the reverse tunnel registered for `socket_name`.
    async fn reverse_remove(&self, socket_name: &str) -> Result<()>;

    /// Registers a forward tunnel from `local_port` to `socket_name`.
    async fn forward(&self, local_port: u16, socket_name: &str) -> Result<()>;

    /// Removes the forward tunnel registered at `local_port`.
    async fn forward_remove(&self, local_port: u16) -> Result<()>;
}

// ============================================================================
// AdbBridge
// ============================================================================

/// Facade over the `adb` command-line bridge.
///
/// Holds the bridge binary path and the optional device serial; every
/// command targets that device via `-s`.
#[derive(Debug, Clone)]
pub struct AdbBridge {
    /// Bridge executable, from `$ADB` or plain `adb` on the PATH.
    program: OsString,
    /// Device serial passed with `-s`, if any.
    serial: Option<String>,
}

impl AdbBridge {
    /// Creates a bridge for the given device serial.
    ///
    /// The bridge binary resolves from the `ADB` environment variable,
    /// falling back to `adb` on the PATH.
    #[must_use]
    pub fn new(serial: Option<String>) -> Self {
        let program = std::env::var_os(BRIDGE_ENV).unwrap_or_else(|| OsString::from("adb"));
        Self { program, serial }
    }

    /// Creates a bridge with an explicit executable.
    #[cfg(test)]
    pub(crate) fn with_program(program: impl Into<OsString>, serial: Option<String>) -> Self {
        Self {
            program: program.into(),
            serial,
        }
    }

    /// Base command targeting the configured device.
    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        if let Some(serial) = &self.serial {
            cmd.arg("-s").arg(serial);
        }
        cmd
    }

    /// Runs a bridge command to completion and checks its exit status.
    async fn run_checked(&self, args: &[&str], label: &str) -> Result<()> {
        debug!(command = label, "running bridge command");

        let status = self
            .command()
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .status()
            .await
            .map_err(|e| Error::bridge(format!("{label}: {e}")))?;

        if status.success() {
            Ok(())
        } else {
            Err(Error::bridge(label))
        }
    }

    /// Uploads the agent artifact to the device.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bridge`] if the push command fails.
    pub async fn push(&self, local_path: &Path, device_path: &str) -> Result<()> {
        debug!(
            local = %local_path.display(),
            device = device_path,
            "pushing agent artifact"
        );

        let status = self
            .command()
            .arg("push")
            .arg(local_path)
            .arg(device_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .status()
            .await
            .map_err(|e| Error::bridge(format!("adb push: {e}")))?;

        if status.success() {
            Ok(())
        } else {
            Err(Error::bridge("adb push"))
        }
    }

    /// Launches the agent on the device.
    ///
    /// The returned [`Child`] is the local bridge shell attached to the
    /// remote agent; waiting on it observes agent exit, killing it tears
    /// the agent down. The handle kills on drop so an abandoned session
    /// cannot leak the process.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProcessLaunch`] if the process cannot be spawned.
    pub fn exec_agent(&self, args: &[String]) -> Result<Child> {
        debug!(args = ?args, "launching agent");

        let mut cmd = self.command();
        cmd.arg("shell")
            .arg(format!("CLASSPATH={DEVICE_AGENT_PATH}"))
            .arg("app_process")
            .arg("/") // unused
            .arg(AGENT_CLASS)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        cmd.spawn().map_err(Error::process_launch)
    }
}

// ============================================================================
// AdbBridge - TunnelBridge
// ============================================================================

impl TunnelBridge for AdbBridge {
    async fn reverse(&self, socket_name: &str, local_port: u16) -> Result<()> {
        let spec = format!("localabstract:{socket_name}");
        let local = format!("tcp:{local_port}");
        self.run_checked(&["reverse", &spec, &local], "adb reverse")
            .await
    }

    async fn reverse_remove(&self, socket_name: &str) -> Result<()> {
        let spec = format!("localabstract:{socket_name}");
        self.run_checked(&["reverse", "--remove", &spec], "adb reverse --remove")
            .await
    }

    async fn forward(&self, local_port: u16, socket_name: &str) -> Result<()> {
        let local = format!("tcp:{local_port}");
        let spec = format!("localabstract:{socket_name}");
        self.run_checked(&["forward", &local, &spec], "adb forward")
            .await
    }

    async fn forward_remove(&self, local_port: u16) -> Result<()> {
        let local = format!("tcp:{local_port}");
        self.run_checked(&["forward", "--remove", &local], "adb forward --remove")
            .await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_defaults_to_adb() {
        // ADB is unlikely to be set in the test environment, but either way
        // the bridge must carry a non-empty program
        let bridge = AdbBridge::new(Some("emulator-5554".into()));
        assert!(!bridge.program.is_empty());
        assert_eq!(bridge.serial.as_deref(), Some("emulator-5554"));
    }

    #[tokio::test]
    async fn test_run_checked_success() {
        let bridge = AdbBridge::with_program("true", None);
        bridge
            .run_checked(&[], "true")
            .await
            .expect("zero exit status");
    }

    #[tokio::test]
    async fn test_run_checked_nonzero_exit() {
        let bridge = AdbBridge::with_program("false", None);
        let err = bridge.run_checked(&[], "false").await.unwrap_err();
        assert!(matches!(err, Error::Bridge { .. }));
        assert_eq!(err.to_string(), "Bridge command failed: false");
    }

    #[tokio::test]
    async fn test_run_checked_missing_program() {
        let bridge = AdbBridge::with_program("/nonexistent/bridge", None);
        let err = bridge.run_checked(&[], "bridge").await.unwrap_err();
        assert!(matches!(err, Error::Bridge { .. }));
    }

    #[tokio::test]
    async fn test_exec_agent_spawns() {
        // `true` exits immediately; wait must observe the exit
        let bridge = AdbBridge::with_program("true", None);
        let mut child = bridge.exec_agent(&[]).expect("spawn");
        let status = child.wait().await.expect("wait");
        assert!(status.success());
    }

    #[tokio::test]
    async fn test_exec_agent_missing_program() {
        let bridge = AdbBridge::with_program("/nonexistent/bridge", None);
        let err = bridge.exec_agent(&[]).unwrap_err();
        assert!(err.is_process_error());
    }
}
