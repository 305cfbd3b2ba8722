use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use tokio::{io::AsyncReadExt, process::Command};
use uuid::Uuid;

use crate::engine::config::EngineConfig;

pub const TIMEOUT_PHRASE: &str = "execution timed out";

pub fn timeout_message(timeout: Duration) -> String {
    format!("{TIMEOUT_PHRASE} ({} s limit)", timeout.as_secs().max(1))
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub combined_output: String,
    pub exited_cleanly: bool,
    pub timed_out: bool,
    pub duration_ms: u128,
}

impl RunOutcome {
    fn failed(message: String, started: Instant) -> Self {
        Self {
            combined_output: message,
            exited_cleanly: false,
            timed_out: false,
            duration_ms: started.elapsed().as_millis(),
        }
    }
}

#[async_trait]
pub trait SandboxBackend: Send + Sync {
    fn name(&self) -> &'static str;
    async fn run(&self, source: &str, timeout: Duration) -> RunOutcome;
}

/// Runs one interpreter child process per call inside a throwaway scratch
/// directory. The environment is cleared down to an interpreter search path
/// and a HOME pointing at the scratch area; stdout and stderr are captured
/// with a byte cap and concatenated. The scratch directory is removed on
/// every exit path.
pub struct ProcessSandbox {
    interpreter: String,
    search_path: String,
    scratch_root: PathBuf,
    max_output_bytes: usize,
}

impl ProcessSandbox {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            interpreter: config.interpreter.clone(),
            search_path: config.interpreter_search_path.clone(),
            scratch_root: config.scratch_root.clone(),
            max_output_bytes: config.max_output_bytes,
        }
    }
}

#[async_trait]
impl SandboxBackend for ProcessSandbox {
    fn name(&self) -> &'static str {
        "process"
    }

    async fn run(&self, source: &str, timeout: Duration) -> RunOutcome {
        let started = Instant::now();
        let run_dir = self
            .scratch_root
            .join(format!("run-{}", Uuid::new_v4().as_simple()));
        if let Err(err) = tokio::fs::create_dir_all(&run_dir).await {
            return RunOutcome::failed(
                format!("failed to prepare scratch directory: {err}"),
                started,
            );
        }

        let source_path = run_dir.join("submission.py");
        if let Err(err) = tokio::fs::write(&source_path, source.as_bytes()).await {
            cleanup_dir(&run_dir).await;
            return RunOutcome::failed(format!("failed to write submission: {err}"), started);
        }

        let mut cmd = Command::new(&self.interpreter);
        cmd.arg(&source_path)
            .current_dir(&run_dir)
            .env_clear()
            .env("PATH", &self.search_path)
            .env("HOME", &run_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                cleanup_dir(&run_dir).await;
                return RunOutcome::failed(format!("failed to start interpreter: {err}"), started);
            }
        };

        let limit = self.max_output_bytes;
        let stdout = child.stdout.take();
        let stdout_task = tokio::spawn(async move {
            match stdout {
                Some(reader) => read_limited(reader, limit).await,
                None => Vec::new(),
            }
        });
        let stderr = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            match stderr {
                Some(reader) => read_limited(reader, limit).await,
                None => Vec::new(),
            }
        });

        match tokio::time::timeout(timeout, child.wait()).await {
            Err(_) => {
                let _ = child.kill().await;
                let _ = stdout_task.await;
                let _ = stderr_task.await;
                cleanup_dir(&run_dir).await;
                RunOutcome {
                    combined_output: timeout_message(timeout),
                    exited_cleanly: false,
                    timed_out: true,
                    duration_ms: started.elapsed().as_millis(),
                }
            }
            Ok(Err(err)) => {
                let _ = stdout_task.await;
                let _ = stderr_task.await;
                cleanup_dir(&run_dir).await;
                RunOutcome::failed(format!("interpreter wait failed: {err}"), started)
            }
            Ok(Ok(status)) => {
                let stdout = stdout_task.await.unwrap_or_default();
                let stderr = stderr_task.await.unwrap_or_default();
                cleanup_dir(&run_dir).await;
                let mut combined = String::from_utf8_lossy(&stdout).to_string();
                combined.push_str(&String::from_utf8_lossy(&stderr));
                RunOutcome {
                    combined_output: combined,
                    exited_cleanly: status.success(),
                    timed_out: false,
                    duration_ms: started.elapsed().as_millis(),
                }
            }
        }
    }
}

async fn cleanup_dir(path: &Path) {
    let _ = tokio::fs::remove_dir_all(path).await;
}

async fn read_limited<R>(mut reader: R, limit: usize) -> Vec<u8>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut out = Vec::with_capacity(limit.min(8192));
    let mut chunk = [0u8; 4096];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                if out.len() < limit {
                    let remaining = limit - out.len();
                    out.extend_from_slice(&chunk[..remaining.min(n)]);
                }
            }
            Err(_) => break,
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::{path::PathBuf, time::Duration};

    use uuid::Uuid;

    use super::{ProcessSandbox, SandboxBackend, TIMEOUT_PHRASE};

    fn shell_sandbox(scratch_root: PathBuf) -> ProcessSandbox {
        ProcessSandbox {
            interpreter: "sh".to_string(),
            search_path: "/usr/bin:/bin".to_string(),
            scratch_root,
            max_output_bytes: 64 * 1024,
        }
    }

    fn fresh_scratch_root() -> PathBuf {
        std::env::temp_dir().join(format!("gradebox-test-{}", Uuid::new_v4().as_simple()))
    }

    fn scratch_is_clean(root: &PathBuf) -> bool {
        match std::fs::read_dir(root) {
            Ok(entries) => entries.count() == 0,
            Err(_) => true,
        }
    }

    #[tokio::test]
    async fn clean_exit_captures_output() {
        let root = fresh_scratch_root();
        let sandbox = shell_sandbox(root.clone());
        let outcome = sandbox.run("echo hi", Duration::from_secs(5)).await;
        assert!(outcome.exited_cleanly);
        assert!(!outcome.timed_out);
        assert_eq!(outcome.combined_output, "hi\n");
        assert!(scratch_is_clean(&root));
    }

    #[tokio::test]
    async fn nonzero_exit_is_not_clean() {
        let root = fresh_scratch_root();
        let sandbox = shell_sandbox(root.clone());
        let outcome = sandbox.run("echo broken >&2; exit 3", Duration::from_secs(5)).await;
        assert!(!outcome.exited_cleanly);
        assert!(!outcome.timed_out);
        assert!(outcome.combined_output.contains("broken"));
        assert!(scratch_is_clean(&root));
    }

    #[tokio::test]
    async fn runaway_process_is_killed_and_scratch_removed() {
        let root = fresh_scratch_root();
        let sandbox = shell_sandbox(root.clone());
        let started = std::time::Instant::now();
        let outcome = sandbox.run("sleep 30", Duration::from_millis(250)).await;
        assert!(outcome.timed_out);
        assert!(!outcome.exited_cleanly);
        assert!(outcome.combined_output.contains(TIMEOUT_PHRASE));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(scratch_is_clean(&root));
    }

    #[tokio::test]
    async fn missing_interpreter_is_reported_not_propagated() {
        let root = fresh_scratch_root();
        let sandbox = ProcessSandbox {
            interpreter: "gradebox-no-such-interpreter".to_string(),
            search_path: "/usr/bin:/bin".to_string(),
            scratch_root: root.clone(),
            max_output_bytes: 64 * 1024,
        };
        let outcome = sandbox.run("print(1)", Duration::from_secs(1)).await;
        assert!(!outcome.exited_cleanly);
        assert!(!outcome.timed_out);
        assert!(outcome.combined_output.contains("failed to start interpreter"));
        assert!(scratch_is_clean(&root));
    }
}
