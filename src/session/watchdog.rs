//! Agent process watchdog.
//!
//! If the agent dies before connecting back, a reverse-mode `accept` would
//! otherwise block forever. The watchdog owns the agent process handle,
//! waits for it to exit, and then both signals the terminated flag (which
//! the accept path races against) and claims the listening socket's close
//! authority so the port is released promptly.
//!
//! The session's `stop` asks the watchdog to wind down: a bounded wait for
//! a voluntary exit, then a forced kill through the owned handle. Killing
//! through the handle rather than a raw PID means a recycled PID can never
//! be hit.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use tokio::process::Child;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::transport::net::SharedListener;

// ============================================================================
// Watchdog
// ============================================================================

/// Background waiter on the agent process.
pub(crate) struct Watchdog {
    /// The waiting task; joined by [`stop`](Self::stop).
    task: JoinHandle<()>,
    /// One-shot force-kill signal, consumed on timeout.
    kill: Option<oneshot::Sender<()>>,
    /// Observed-exit flag, written once by the task.
    terminated: watch::Receiver<bool>,
}

impl Watchdog {
    /// Spawns the watchdog over a just-launched agent process.
    ///
    /// `listener` is the reverse-mode listening socket, if one exists; the
    /// watchdog claims its close authority after the agent exits.
    pub(crate) fn spawn(mut child: Child, listener: Option<Arc<SharedListener>>) -> Self {
        let (terminated_tx, terminated_rx) = watch::channel(false);
        let (kill_tx, kill_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let exit = tokio::select! {
                status = child.wait() => Some(status),
                _ = kill_rx => None,
            };

            match exit {
                Some(Ok(status)) => debug!(%status, "agent process exited"),
                Some(Err(e)) => warn!(error = %e, "could not wait on agent process"),
                None => {
                    warn!("killing agent process");
                    if let Err(e) = child.kill().await {
                        warn!(error = %e, "could not kill agent process");
                    }
                }
            }

            let _ = terminated_tx.send(true);

            if let Some(listener) = listener {
                if listener.try_close() {
                    debug!("listening socket closed after agent exit");
                }
            }
        });

        Self {
            task,
            kill: Some(kill_tx),
            terminated: terminated_rx,
        }
    }

    /// A receiver over the terminated flag, for racing against `accept`.
    pub(crate) fn terminated(&self) -> watch::Receiver<bool> {
        self.terminated.clone()
    }

    /// Whether the agent process has been observed to exit.
    pub(crate) fn is_terminated(&self) -> bool {
        *self.terminated.borrow()
    }

    /// Waits up to `grace` for the agent to exit, then force-kills it, and
    /// joins the task either way.
    pub(crate) async fn stop(mut self, grace: Duration) {
        if !self.is_terminated() {
            let mut terminated = self.terminated.clone();
            let waited = tokio::time::timeout(grace, terminated.wait_for(|t| *t)).await;
            if waited.is_err() {
                warn!("agent did not exit in time, killing it");
                if let Some(kill) = self.kill.take() {
                    let _ = kill.send(());
                }
            }
        }

        if let Err(e) = self.task.await {
            warn!(error = %e, "watchdog task failed");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Instant;

    use tokio::process::Command;

    use crate::transport::net;

    fn spawn_cmd(program: &str, args: &[&str]) -> Child {
        Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .spawn()
            .expect("spawn")
    }

    #[tokio::test]
    async fn test_marks_terminated_on_exit() {
        let watchdog = Watchdog::spawn(spawn_cmd("true", &[]), None);

        let mut terminated = watchdog.terminated();
        tokio::time::timeout(Duration::from_secs(5), terminated.wait_for(|t| *t))
            .await
            .expect("terminated in time")
            .expect("channel open");

        assert!(watchdog.is_terminated());
        watchdog.stop(Duration::from_millis(100)).await;
    }

    #[tokio::test]
    async fn test_claims_listener_close_on_exit() {
        let listener = Arc::new(
            SharedListener::bind(net::LOCALHOST, 0).await.expect("bind"),
        );

        let watchdog = Watchdog::spawn(spawn_cmd("true", &[]), Some(Arc::clone(&listener)));
        watchdog.stop(Duration::from_secs(5)).await;

        assert!(listener.is_closed());
        assert!(!listener.try_close());
    }

    #[tokio::test]
    async fn test_stop_force_kills_after_grace() {
        let watchdog = Watchdog::spawn(spawn_cmd("sleep", &["30"]), None);
        assert!(!watchdog.is_terminated());

        let started = Instant::now();
        watchdog.stop(Duration::from_millis(100)).await;

        // well under the 30s sleep: the process was killed, not waited out
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_stop_skips_grace_when_already_terminated() {
        let watchdog = Watchdog::spawn(spawn_cmd("true", &[]), None);

        let mut terminated = watchdog.terminated();
        tokio::time::timeout(Duration::from_secs(5), terminated.wait_for(|t| *t))
            .await
            .expect("terminated in time")
            .expect("channel open");

        let started = Instant::now();
        watchdog.stop(Duration::from_secs(60)).await;
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
