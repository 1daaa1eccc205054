//! C9 — Scheduler / Lifecycle.
//!
//! Single-instance lock and the shutdown signal future. Task supervision
//! itself (spawn-then-join) lives in `main.rs`, following the teacher's
//! flat `main` shape rather than introducing a separate supervisor type.

use lyricline_common::{AppError, Result};
use std::path::{Path, PathBuf};

pub struct InstanceLock {
    path: PathBuf,
}

impl InstanceLock {
    /// Claims the well-known lock file under the data root. If held by
    /// another live PID, returns a `Fatal`-kind error so the caller can
    /// exit with code 2.
    pub fn claim(path: PathBuf) -> Result<Self> {
        if let Some(existing_pid) = Self::read_live_pid(&path) {
            return Err(AppError::Fatal(format!(
                "another instance is already running (pid {existing_pid})"
            )));
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, std::process::id().to_string())?;
        Ok(Self { path })
    }

    fn read_live_pid(path: &Path) -> Option<u32> {
        let contents = std::fs::read_to_string(path).ok()?;
        let pid: u32 = contents.trim().parse().ok()?;
        if Self::pid_is_alive(pid) {
            Some(pid)
        } else {
            None
        }
    }

    #[cfg(unix)]
    fn pid_is_alive(pid: u32) -> bool {
        // Signal 0 probes existence without actually sending a signal.
        unsafe { libc::kill(pid as i32, 0) == 0 }
    }

    #[cfg(not(unix))]
    fn pid_is_alive(_pid: u32) -> bool {
        false
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Resolves when the process receives a termination signal; `tokio::select!`
/// this against task-cancellation tokens to drive the dependency-ordered
/// shutdown (gateway -> bridge hub -> fusers -> sources -> caches).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claiming_twice_in_the_same_process_fails_the_second_time() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lyricline.lock");
        let _first = InstanceLock::claim(path.clone()).unwrap();
        let second = InstanceLock::claim(path);
        assert!(second.is_err());
    }

    #[test]
    fn lock_file_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lyricline.lock");
        {
            let _lock = InstanceLock::claim(path.clone()).unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }
}
