//! Interpreted-script tools.
//!
//! A script is run as `<interpreter> <script-path>`. The request payload is
//! written to its stdin; stdout is the result and stderr is kept for
//! diagnostics. Nothing is parsed up front: a broken script only fails when
//! it is executed.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::error::ToolError;

/// Handle to a script tool: the validated path of the script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptHandle {
    path: PathBuf,
}

impl ScriptHandle {
    /// Validate that `path` names a regular file.
    pub fn open(path: &Path) -> Result<Self, ToolError> {
        let metadata = std::fs::metadata(path).map_err(|e| ToolError::load(path, e))?;
        if !metadata.is_file() {
            return Err(ToolError::load(path, "not a regular file"));
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run the script, killing it if it outlives `timeout`.
    pub async fn run(
        &self,
        interpreter: &str,
        input: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>, ToolError> {
        let mut child = Command::new(interpreter)
            .arg(&self.path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ToolError::execution_failed(format!("failed to start {interpreter}: {e}"))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ToolError::internal("child stdin not captured"))?;
        let mut stdout = drain(child.stdout.take());
        let mut stderr = drain(child.stderr.take());

        // One budget covers the process and its pipes: a background child
        // that inherited stdout can hold EOF back after the script exits.
        let deadline = Instant::now() + timeout;

        let run = async {
            // A script may exit without reading its input; that is not an error.
            if let Err(e) = stdin.write_all(input).await {
                debug!("Script closed stdin early: {}", e);
            }
            drop(stdin);
            child.wait().await
        };

        let outcome = tokio::time::timeout_at(deadline, run).await;
        let status = match outcome {
            Ok(status) => status.map_err(|e| ToolError::execution_failed(e.to_string()))?,
            Err(_) => {
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill timed out script {}: {}", self.path.display(), e);
                }
                abort(&stdout, &stderr);
                return Err(ToolError::Timeout(timeout));
            }
        };

        let drained = tokio::time::timeout_at(deadline, async {
            (collect(&mut stdout).await, collect(&mut stderr).await)
        })
        .await;
        let (stdout, stderr) = match drained {
            Ok(output) => output,
            Err(_) => {
                warn!(
                    "Script {} exited but its output stayed open past {:?}",
                    self.path.display(),
                    timeout
                );
                abort(&stdout, &stderr);
                return Err(ToolError::Timeout(timeout));
            }
        };

        if !status.success() {
            return Err(ToolError::execution_failed(format!(
                "script exited with {}, stderr: {}",
                status,
                String::from_utf8_lossy(&stderr).trim()
            )));
        }

        Ok(stdout)
    }
}

/// Read a child pipe to the end on its own task so the child never blocks on
/// a full pipe.
fn drain<R>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    pipe.map(|mut pipe| {
        tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf).await;
            buf
        })
    })
}

async fn collect(task: &mut Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    match task {
        Some(task) => task.await.unwrap_or_default(),
        None => Vec::new(),
    }
}

fn abort(stdout: &Option<JoinHandle<Vec<u8>>>, stderr: &Option<JoinHandle<Vec<u8>>>) {
    for task in [stdout, stderr].into_iter().flatten() {
        task.abort();
    }
}
