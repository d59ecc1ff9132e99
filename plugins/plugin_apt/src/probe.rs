use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::debug;
use tracing::trace;

use crate::error::ProbeError;

/// What a finished command printed
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Result of inspecting a path that could be inspected
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathState {
    /// Nothing exists at the path
    Absent,

    /// The path exists and was last modified at `modified`
    Present { modified: SystemTime },
}

/// Runs the external operations the checks are built on
///
/// Implementations do not retry. A failed probe is retried by the next collection pass, if at all.
#[async_trait]
pub trait ProbeRunner: Send + Sync {
    /// Run the executable at `path` with `args` and collect its output
    ///
    /// Must not take longer than until `deadline`. A process still running at the deadline is
    /// killed. A missing executable is reported without trying to spawn it.
    async fn run_command(
        &self,
        path: &Path,
        args: &[&str],
        deadline: Instant,
    ) -> Result<CommandOutput, ProbeError>;

    /// Inspect `path`
    ///
    /// A missing path is not an error but [`PathState::Absent`].
    async fn stat_path(&self, path: &Path) -> Result<PathState, ProbeError>;
}

#[async_trait]
impl<P> ProbeRunner for Arc<P>
where
    P: ProbeRunner + ?Sized,
{
    async fn run_command(
        &self,
        path: &Path,
        args: &[&str],
        deadline: Instant,
    ) -> Result<CommandOutput, ProbeError> {
        self.as_ref().run_command(path, args, deadline).await
    }

    async fn stat_path(&self, path: &Path) -> Result<PathState, ProbeError> {
        self.as_ref().stat_path(path).await
    }
}

/// [`ProbeRunner`] that spawns real processes and inspects the real filesystem
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemProbeRunner;

#[async_trait]
impl ProbeRunner for SystemProbeRunner {
    #[tracing::instrument(skip_all, fields(path = %path.display()))]
    async fn run_command(
        &self,
        path: &Path,
        args: &[&str],
        deadline: Instant,
    ) -> Result<CommandOutput, ProbeError> {
        if let Err(e) = tokio::fs::metadata(path).await {
            if e.kind() == ErrorKind::NotFound {
                return Err(ProbeError::NotFound {
                    path: path.to_path_buf(),
                });
            }
            trace!("Cannot inspect executable, trying to spawn anyways: {}", e);
        }

        let started = Instant::now();
        let child = tokio::process::Command::new(path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            // The executable exists at this point, a NotFound here is about its interpreter
            .map_err(|source| ProbeError::Spawn {
                path: path.to_path_buf(),
                source,
            })?;

        // Dropping the output future on timeout drops the child, which kills it
        let output = tokio::time::timeout_at(deadline, child.wait_with_output())
            .await
            .map_err(|_| ProbeError::Timeout {
                path: path.to_path_buf(),
                timeout: deadline.saturating_duration_since(started),
            })?
            .map_err(|source| ProbeError::Spawn {
                path: path.to_path_buf(),
                source,
            })?;

        debug!(status = %output.status, elapsed = ?started.elapsed(), "Command finished");
        if !output.status.success() {
            let mut raw = String::from_utf8_lossy(&output.stdout).into_owned();
            raw.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(ProbeError::Exit {
                path: path.to_path_buf(),
                status: output.status,
                output: raw,
            });
        }

        Ok(CommandOutput {
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    async fn stat_path(&self, path: &Path) -> Result<PathState, ProbeError> {
        let stat_failed = |source| ProbeError::Stat {
            path: path.to_path_buf(),
            source,
        };

        match tokio::fs::metadata(path).await {
            Ok(meta) => meta
                .modified()
                .map(|modified| PathState::Present { modified })
                .map_err(stat_failed),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(PathState::Absent),
            Err(e) => Err(stat_failed(e)),
        }
    }
}
