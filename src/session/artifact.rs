//! Agent artifact resolution.
//!
//! The host-side copy of the agent is located by trying, in order: the
//! `SCRCPY_SERVER_PATH` environment override, the fixed install location,
//! the directory of the running executable, and finally the bare filename
//! in the current directory. The resolved path must be a regular file
//! before a push is attempted; a missing artifact fails fast with the path
//! in the error.

// ============================================================================
// Imports
// ============================================================================

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Filename of the agent artifact.
const AGENT_FILENAME: &str = "scrcpy-server";

/// Fixed install location checked after the environment override.
const INSTALL_PATH: &str = "/usr/local/share/scrcpy/scrcpy-server";

/// Environment variable overriding the artifact path.
const PATH_ENV: &str = "SCRCPY_SERVER_PATH";

// ============================================================================
// Resolution
// ============================================================================

/// Resolves the local path of the agent artifact.
#[must_use]
pub(crate) fn agent_path() -> PathBuf {
    locate(|name| std::env::var_os(name), Path::new(INSTALL_PATH))
}

/// Resolution chain with the process-global reads injected for testing.
fn locate(env: impl Fn(&str) -> Option<OsString>, install: &Path) -> PathBuf {
    // the override wins unconditionally, even if the file is missing; the
    // regular-file check then reports the path the user asked for
    if let Some(path) = env(PATH_ENV) {
        let path = PathBuf::from(path);
        debug!(path = %path.display(), "using agent path from environment");
        return path;
    }

    if install.is_file() {
        debug!(path = %install.display(), "using installed agent");
        return install.to_path_buf();
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let candidate = dir.join(AGENT_FILENAME);
            if candidate.is_file() {
                debug!(path = %candidate.display(), "using agent next to executable");
                return candidate;
            }
        }
    }

    debug!("agent not found elsewhere, using current directory");
    PathBuf::from(AGENT_FILENAME)
}

/// Checks that `path` names a regular file.
///
/// # Errors
///
/// Returns [`Error::AgentNotFound`] otherwise.
pub(crate) fn ensure_regular_file(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(Error::agent_not_found(path))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs::File;

    #[test]
    fn test_env_override_wins() {
        let dir = tempfile::tempdir().expect("tempdir");
        let install = dir.path().join("installed");
        File::create(&install).expect("create");

        let path = locate(|_| Some(OsString::from("/custom/agent")), &install);
        assert_eq!(path, PathBuf::from("/custom/agent"));
    }

    #[test]
    fn test_install_path_when_present() {
        let dir = tempfile::tempdir().expect("tempdir");
        let install = dir.path().join("scrcpy-server");
        File::create(&install).expect("create");

        let path = locate(|_| None, &install);
        assert_eq!(path, install);
    }

    #[test]
    fn test_falls_back_to_bare_filename() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("nope");

        let path = locate(|_| None, &missing);
        assert_eq!(path, PathBuf::from(AGENT_FILENAME));
    }

    #[test]
    fn test_ensure_regular_file_accepts_file() {
        let file = tempfile::NamedTempFile::new().expect("tempfile");
        ensure_regular_file(file.path()).expect("regular file");
    }

    #[test]
    fn test_ensure_regular_file_rejects_missing() {
        let err = ensure_regular_file(Path::new("/nonexistent/agent")).unwrap_err();
        assert!(matches!(err, Error::AgentNotFound { .. }));
    }

    #[test]
    fn test_ensure_regular_file_rejects_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = ensure_regular_file(dir.path()).unwrap_err();
        assert!(err.is_config_error());
    }
}
