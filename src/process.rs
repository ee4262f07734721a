//! Wall-clock bounded, cancellable child processes.
//!
//! Validators that shell out (tests, compiler, linter, build) and the
//! command-based agent provider all go through [`run_command`]. Output is
//! drained on reader threads so a chatty child never blocks on a full pipe,
//! and the wait is sliced so a [`CancelToken`] can kill the child promptly.

use std::io::Read;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow, bail};
use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// Granularity at which a running child observes cancellation.
const WAIT_SLICE: Duration = Duration::from_millis(50);

/// How long to wait for output readers once the child has exited.
///
/// A grandchild that inherited the pipes can keep them open after the child
/// is gone; its output is abandoned rather than blocking the caller.
const READER_GRACE: Duration = Duration::from_secs(2);

/// Default bound on captured stdout/stderr per stream.
pub const DEFAULT_OUTPUT_LIMIT: usize = 256 * 1024;

/// Shared cancellation flag for one run.
///
/// Cloning yields a handle to the same flag. Aborting a run cancels its token,
/// which kills any child process started with it.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Exited,
    TimedOut,
    Cancelled,
}

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub termination: Termination,
    pub elapsed: Duration,
}

impl CommandOutput {
    /// True when the child exited on its own with status 0.
    pub fn success(&self) -> bool {
        self.termination == Termination::Exited && self.status.success()
    }

    pub fn timed_out(&self) -> bool {
        self.termination == Termination::TimedOut
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Last `max_lines` lines of combined stdout and stderr.
    pub fn tail(&self, max_lines: usize) -> String {
        let combined = format!("{}\n{}", self.stdout_lossy(), self.stderr_lossy());
        let lines: Vec<&str> = combined.lines().filter(|l| !l.trim().is_empty()).collect();
        let start = lines.len().saturating_sub(max_lines);
        lines[start..].join("\n")
    }
}

/// Split a configured command line into a [`Command`] rooted at `cwd`.
///
/// Uses shell-style word splitting; no shell is spawned.
pub fn command_from_line(line: &str, cwd: &Path) -> Result<Command> {
    let words = shell_words::split(line).with_context(|| format!("parse command '{}'", line))?;
    let (program, args) = words
        .split_first()
        .ok_or_else(|| anyhow!("command line is empty"))?;

    let mut cmd = Command::new(program);
    cmd.args(args).current_dir(cwd);
    Ok(cmd)
}

/// Run a command with a timeout and cancellation, capturing its output.
///
/// The child is killed when `timeout` elapses or `cancel` fires; the returned
/// [`Termination`] tells the two apart. Spawn and wait failures are errors.
pub fn run_command(
    mut cmd: Command,
    timeout: Duration,
    cancel: &CancelToken,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    if cancel.is_cancelled() {
        bail!("run was cancelled before the command started");
    }

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!(command = ?cmd, timeout_ms = timeout.as_millis() as u64, "spawning child process");
    let started = Instant::now();
    let mut child = cmd.spawn().context("spawn command")?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_rx = spawn_reader(stdout, output_limit_bytes);
    let stderr_rx = spawn_reader(stderr, output_limit_bytes);

    let mut termination = Termination::Exited;
    let status = loop {
        if let Some(status) = child.wait_timeout(WAIT_SLICE).context("wait for command")? {
            break status;
        }

        let stop = if cancel.is_cancelled() {
            Some(Termination::Cancelled)
        } else if started.elapsed() >= timeout {
            Some(Termination::TimedOut)
        } else {
            None
        };

        if let Some(reason) = stop {
            warn!(?reason, timeout_ms = timeout.as_millis() as u64, "killing child process");
            termination = reason;
            // The child may exit between the wait and the kill.
            let _ = child.kill();
            break child.wait().context("wait command after kill")?;
        }
    };

    let elapsed = started.elapsed();
    let stdout = collect_output(&stdout_rx, "stdout")?;
    let stderr = collect_output(&stderr_rx, "stderr")?;

    debug!(exit_code = ?status.code(), ?termination, elapsed_ms = elapsed.as_millis() as u64, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        termination,
        elapsed,
    })
}

fn spawn_reader<R: Read + Send + 'static>(reader: R, limit: usize) -> Receiver<Result<Vec<u8>>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(read_stream_limited(reader, limit));
    });
    rx
}

fn collect_output(rx: &Receiver<Result<Vec<u8>>>, label: &str) -> Result<Vec<u8>> {
    match rx.recv_timeout(READER_GRACE) {
        Ok(result) => result.with_context(|| format!("read {}", label)),
        Err(mpsc::RecvTimeoutError::Timeout) => {
            warn!(stream = label, "output still open after child exit, abandoning reader");
            Ok(Vec::new())
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            Err(anyhow!("{} reader thread panicked", label))
        }
    }
}

/// Read a stream to the end, keeping at most `limit` bytes.
fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let room = limit.saturating_sub(buf.len());
        buf.extend_from_slice(&chunk[..n.min(room)]);
    }

    Ok(buf)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", script]);
        cmd
    }

    #[test]
    fn test_captures_output_and_exit_status() {
        let out = run_command(
            sh("echo hello; echo oops >&2; exit 3"),
            Duration::from_secs(10),
            &CancelToken::new(),
            DEFAULT_OUTPUT_LIMIT,
        )
        .unwrap();

        assert_eq!(out.termination, Termination::Exited);
        assert_eq!(out.status.code(), Some(3));
        assert!(!out.success());
        assert_eq!(out.stdout_lossy().trim(), "hello");
        assert_eq!(out.stderr_lossy().trim(), "oops");
    }

    #[test]
    fn test_timeout_kills_child() {
        let out = run_command(
            sh("exec sleep 5"),
            Duration::from_millis(200),
            &CancelToken::new(),
            DEFAULT_OUTPUT_LIMIT,
        )
        .unwrap();

        assert!(out.timed_out());
        assert!(!out.success());
        assert!(out.elapsed < Duration::from_secs(4));
    }

    #[test]
    fn test_cancel_kills_child() {
        let token = CancelToken::new();
        let canceller = token.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(150));
            canceller.cancel();
        });

        let out = run_command(sh("exec sleep 5"), Duration::from_secs(30), &token, 1024).unwrap();
        handle.join().unwrap();

        assert_eq!(out.termination, Termination::Cancelled);
        assert!(out.elapsed < Duration::from_secs(4));
    }

    #[test]
    fn test_already_cancelled_token_refuses_to_spawn() {
        let token = CancelToken::new();
        token.cancel();
        assert!(run_command(sh("true"), Duration::from_secs(1), &token, 1024).is_err());
    }

    #[test]
    fn test_output_is_bounded() {
        let out = run_command(
            sh("yes x | head -c 100000"),
            Duration::from_secs(10),
            &CancelToken::new(),
            1000,
        )
        .unwrap();
        assert_eq!(out.stdout.len(), 1000);
    }

    #[test]
    fn test_command_from_line_splits_words() {
        let dir = TempDir::new().unwrap();
        let cmd = command_from_line("sh -c 'echo \"a b\"'", dir.path()).unwrap();
        let out = run_command(cmd, Duration::from_secs(10), &CancelToken::new(), 1024).unwrap();
        assert_eq!(out.stdout_lossy().trim(), "a b");

        assert!(command_from_line("   ", dir.path()).is_err());
    }

    #[test]
    fn test_tail_keeps_last_lines() {
        let out = run_command(
            sh("for i in 1 2 3 4 5; do echo line$i; done"),
            Duration::from_secs(10),
            &CancelToken::new(),
            DEFAULT_OUTPUT_LIMIT,
        )
        .unwrap();
        assert_eq!(out.tail(2), "line4\nline5");
    }
}
