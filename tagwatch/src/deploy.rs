//! Deployment trigger
//!
//! Launches the orchestration command detached: stdout and stderr go to log
//! files next to the manifest, and the caller gets back a handle carrying
//! the child pid and log paths. Nothing waits on the child; whether the
//! redeploy actually succeeded is outside this loop's contract.

use anyhow::{Context, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use tracing::info;

const STDOUT_LOG: &str = "tagwatch-deploy.out.log";
const STDERR_LOG: &str = "tagwatch-deploy.err.log";

/// Handle to a launched, unwaited deployment process.
#[derive(Debug)]
pub struct DeployHandle {
    child: Child,
    pub stdout_log: PathBuf,
    pub stderr_log: PathBuf,
}

impl DeployHandle {
    /// OS pid of the launched process.
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Non-blocking liveness check. There is no wait contract: callers may
    /// peek at this, but nothing in the loop depends on completion.
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }
}

/// Spawns `docker compose up -d` in the manifest's directory without
/// waiting for it.
pub fn trigger(compose_dir: &Path) -> Result<DeployHandle> {
    spawn_logged("docker", &["compose", "up", "-d"], compose_dir)
}

fn spawn_logged(program: &str, args: &[&str], dir: &Path) -> Result<DeployHandle> {
    let stdout_log = dir.join(STDOUT_LOG);
    let stderr_log = dir.join(STDERR_LOG);

    let stdout = File::create(&stdout_log)
        .with_context(|| format!("Failed to create {}", stdout_log.display()))?;
    let stderr = File::create(&stderr_log)
        .with_context(|| format!("Failed to create {}", stderr_log.display()))?;

    let child = Command::new(program)
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr))
        .spawn()
        .with_context(|| format!("Failed to launch '{program}'. Is it installed?"))?;

    info!(
        "Deployment launched (pid {}, logs in {})",
        child.id(),
        dir.display()
    );

    Ok(DeployHandle {
        child,
        stdout_log,
        stderr_log,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_returns_without_waiting() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle = spawn_logged("sh", &["-c", "sleep 2"], dir.path()).unwrap();

        assert!(handle.pid() > 0);
        // Returned while the child is still alive: nothing waited on it.
        assert!(handle.is_running());
        assert!(handle.stdout_log.exists());
        assert!(handle.stderr_log.exists());
    }

    #[test]
    fn launch_failure_is_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let result = spawn_logged("tagwatch-no-such-binary", &[], dir.path());
        assert!(result.is_err());
    }
}
