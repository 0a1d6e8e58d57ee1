//! One external pipeline process.
//!
//! Stdout is the relayed byte stream. Stderr is drained by its own task into
//! the tracing log and a bounded [`StderrLog`], so diagnostics never block
//! the relay.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::StreamError;
use crate::pipeline::LaunchCommand;

/// How long teardown waits for the stderr reader after the child is reaped.
const STDERR_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Bounded tail of a pipeline's diagnostic output.
#[derive(Debug, Clone)]
pub struct StderrLog {
    lines: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl StderrLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&self, line: String) {
        let mut lines = self.lines.lock();
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().iter().cloned().collect()
    }

    pub fn last(&self) -> Option<String> {
        self.lines.lock().back().cloned()
    }
}

/// How a process left during teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Teardown {
    /// It had already exited
    Exited,
    /// It exited after SIGINT within the grace period
    Interrupted,
    /// It ignored SIGINT and was killed
    Killed,
}

/// A spawned pipeline with piped output.
pub struct PipelineProcess {
    child: Child,
    stdout: Option<ChildStdout>,
    log_task: Option<JoinHandle<()>>,
}

impl PipelineProcess {
    /// Spawn `command`, tagging diagnostics with `channel_id`.
    pub fn spawn(
        command: &LaunchCommand,
        channel_id: &str,
        log: StderrLog,
    ) -> Result<Self, StreamError> {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| StreamError::Spawn {
                program: command.program.display().to_string(),
                source,
            })?;

        let stdout = child.stdout.take();
        let log_task = child.stderr.take().map(|stderr| {
            let channel_id = channel_id.to_string();
            let pid = child.id();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let line = line.trim_end().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    warn!(channel_id = %channel_id, pid, "transcoder: {}", line);
                    log.push(line);
                }
            })
        });

        debug!(
            channel_id = %channel_id,
            pid = child.id(),
            program = %command.program.display(),
            "Spawned pipeline"
        );

        Ok(Self {
            child,
            stdout,
            log_task,
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Read the next chunk of output. `Ok(0)` means the output is closed.
    pub async fn read_chunk(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self.stdout.as_mut() {
            Some(stdout) => stdout.read(buf).await,
            None => Ok(0),
        }
    }

    /// Stop the process: SIGINT, up to `grace` to exit, then kill.
    ///
    /// Always reaps the child and collects its remaining diagnostics before
    /// returning.
    pub async fn terminate(mut self, grace: Duration) -> Teardown {
        self.stdout = None;
        let teardown = self.stop(grace).await;
        self.drain_stderr().await;
        teardown
    }

    async fn stop(&mut self, grace: Duration) -> Teardown {
        let pid = self.child.id();

        if let Ok(Some(status)) = self.child.try_wait() {
            debug!(pid, %status, "Pipeline already exited");
            return Teardown::Exited;
        }

        self.interrupt();
        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                debug!(pid, %status, "Pipeline exited after interrupt");
                Teardown::Interrupted
            }
            Ok(Err(e)) => {
                warn!(pid, "Failed to wait for pipeline: {}", e);
                self.kill().await;
                Teardown::Killed
            }
            Err(_) => {
                warn!(pid, grace_ms = grace.as_millis() as u64, "Pipeline ignored interrupt, killing");
                self.kill().await;
                Teardown::Killed
            }
        }
    }

    /// Wait for the stderr reader to hit EOF so the exit reason is logged.
    /// A grandchild holding the pipe open only delays this by the timeout.
    async fn drain_stderr(&mut self) {
        let Some(mut task) = self.log_task.take() else {
            return;
        };
        if tokio::time::timeout(STDERR_DRAIN_TIMEOUT, &mut task).await.is_err() {
            debug!(pid = self.child.id(), "Stderr still open after exit, dropping reader");
            task.abort();
        }
    }

    #[cfg(unix)]
    fn interrupt(&mut self) {
        if let Some(pid) = self.child.id() {
            // SAFETY: pid is our own child and has not been reaped yet.
            let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGINT) };
            if rc == 0 {
                return;
            }
        }
        let _ = self.child.start_kill();
    }

    #[cfg(not(unix))]
    fn interrupt(&mut self) {
        let _ = self.child.start_kill();
    }

    async fn kill(&mut self) {
        if let Err(e) = self.child.kill().await {
            warn!(pid = self.child.id(), "Failed to kill pipeline: {}", e);
        }
    }
}

// Only reached without `terminate`, e.g. when the relay task is aborted.
impl Drop for PipelineProcess {
    fn drop(&mut self) {
        if let Some(task) = self.log_task.take() {
            task.abort();
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;

    fn sh(script: &str) -> LaunchCommand {
        LaunchCommand::new("/bin/sh", ["-c", script])
    }

    fn is_running(pid: u32) -> bool {
        // SAFETY: signal 0 only checks for existence.
        unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
    }

    #[test]
    fn test_stderr_log_is_bounded() {
        let log = StderrLog::new(3);
        for i in 0..5 {
            log.push(format!("line {}", i));
        }
        assert_eq!(log.lines(), vec!["line 2", "line 3", "line 4"]);
        assert_eq!(log.last().as_deref(), Some("line 4"));
    }

    #[tokio::test]
    async fn test_reads_output_until_closed() {
        let log = StderrLog::new(8);
        let mut process =
            PipelineProcess::spawn(&sh("printf hello; echo oops >&2"), "1", log.clone()).unwrap();

        let mut out = Vec::new();
        let mut buf = [0u8; 4];
        loop {
            let n = process.read_chunk(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq!(out, b"hello");

        let teardown = process.terminate(Duration::from_secs(2)).await;
        assert_ne!(teardown, Teardown::Killed);
    }

    #[tokio::test]
    async fn test_final_stderr_line_survives_teardown() {
        for _ in 0..50 {
            let log = StderrLog::new(8);
            let mut process = PipelineProcess::spawn(
                &sh("echo 'Connection refused' >&2; exit 1"),
                "1",
                log.clone(),
            )
            .unwrap();

            let mut buf = [0u8; 64];
            while process.read_chunk(&mut buf).await.unwrap() > 0 {}
            process.terminate(Duration::from_secs(1)).await;

            assert_eq!(log.last().as_deref(), Some("Connection refused"));
        }
    }

    #[tokio::test]
    async fn test_spawn_missing_program() {
        let command = LaunchCommand::new("/nonexistent/ffmpeg", ["-version"]);
        let err = PipelineProcess::spawn(&command, "1", StderrLog::new(4))
            .err()
            .unwrap();
        assert!(matches!(err, StreamError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_interrupt_stops_cooperative_process() {
        let process = PipelineProcess::spawn(&sh("exec sleep 30"), "1", StderrLog::new(4)).unwrap();
        let pid = process.pid().unwrap();

        let teardown = process.terminate(Duration::from_secs(2)).await;

        assert_eq!(teardown, Teardown::Interrupted);
        assert!(!is_running(pid));
    }

    #[tokio::test]
    async fn test_hung_process_is_killed_after_grace() {
        let process = PipelineProcess::spawn(
            &sh("trap '' INT; while true; do sleep 1; done"),
            "1",
            StderrLog::new(4),
        )
        .unwrap();
        let pid = process.pid().unwrap();
        // Let the shell install its trap
        tokio::time::sleep(Duration::from_millis(200)).await;

        let started = Instant::now();
        let teardown = process.terminate(Duration::from_millis(300)).await;

        assert_eq!(teardown, Teardown::Killed);
        assert!(started.elapsed() < Duration::from_secs(3));
        assert!(!is_running(pid));
    }
}
