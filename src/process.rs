#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{
    ffi::{OsStr, OsString},
    path::Path,
    process::{ExitStatus, Stdio},
    time::Duration,
};

use anyhow::{Context, Result};
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    process::{Child, Command},
    sync::mpsc,
    task::JoinHandle,
    time::{Instant, sleep, timeout},
};

/// Drop guard that terminates a spawned child process if callers forget to
/// await it.
struct ChildDropGuard(Option<Child>);

impl ChildDropGuard {
    /// Wraps the provided child process with the drop guard.
    fn new(child: Child) -> Self {
        Self(Some(child))
    }

    /// Returns a mutable reference to the underlying child process.
    fn child_mut(&mut self) -> anyhow::Result<&mut Child> {
        self.0
            .as_mut()
            .context("child process already taken from guard")
    }

    /// Prevents the guard from killing the process on drop.
    fn disarm(mut self) {
        self.0 = None;
    }
}

impl Drop for ChildDropGuard {
    fn drop(&mut self) {
        if let Some(child) = self.0.as_mut() {
            let _ = child.start_kill();
        }
    }
}

/// Captured result of a finished subprocess.
#[derive(Debug)]
pub struct Collected {
    /// Exit status returned by the process.
    pub status: ExitStatus,
    /// Contents written to stdout.
    pub stdout: Vec<u8>,
    /// Contents written to stderr.
    pub stderr: Vec<u8>,
}

/// Describes how stdin should be wired for the spawned process.
#[derive(Debug)]
pub enum StdinSource {
    /// Attach nothing to stdin.
    Null,
    /// Write the provided bytes, then close stdin.
    Bytes(Vec<u8>),
}

/// Builds a command with piped output streams and the requested stdin.
fn piped_command(
    program: impl AsRef<OsStr>,
    args: &[OsString],
    stdin: &StdinSource,
    cwd: Option<&Path>,
) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    match stdin {
        StdinSource::Null => {
            cmd.stdin(Stdio::null());
        }
        StdinSource::Bytes(_) => {
            cmd.stdin(Stdio::piped());
        }
    }

    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    cmd
}

/// Feeds `stdin` to the child on a separate task so a child that never reads
/// cannot stall the caller, then closes the pipe.
fn feed_stdin(guard: &mut ChildDropGuard, stdin: StdinSource) -> Result<()> {
    let StdinSource::Bytes(bytes) = stdin else {
        return Ok(());
    };
    if let Some(mut handle) = guard.child_mut()?.stdin.take() {
        tokio::spawn(async move {
            if !bytes.is_empty() {
                let _ = handle.write_all(&bytes).await;
            }
            let _ = handle.shutdown().await;
        });
    }
    Ok(())
}

/// Reads a pipe to the end on its own task.
fn read_to_end_task<R>(pipe: R, label: &'static str) -> JoinHandle<Result<Vec<u8>>>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(pipe);
        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .await
            .with_context(|| format!("failed to read {label}"))?;
        Ok(buf)
    })
}

/// Spawns a command, optionally feeds stdin, and collects stdout/stderr.
///
/// If `deadline` elapses the child is killed and an error is returned.
pub async fn run_collect(
    program: impl AsRef<OsStr>,
    args: &[OsString],
    stdin: StdinSource,
    cwd: Option<&Path>,
    deadline: Option<Duration>,
) -> Result<Collected> {
    let mut cmd = piped_command(program, args, &stdin, cwd);
    let mut guard = ChildDropGuard::new(cmd.spawn().context("failed to spawn process")?);
    feed_stdin(&mut guard, stdin)?;

    let stdout = guard
        .child_mut()?
        .stdout
        .take()
        .context("missing stdout pipe")?;
    let stderr = guard
        .child_mut()?
        .stderr
        .take()
        .context("missing stderr pipe")?;

    let out_task = read_to_end_task(stdout, "stdout");
    let err_task = read_to_end_task(stderr, "stderr");

    let wait_future = async move {
        let mut guard = guard;
        let status = guard
            .child_mut()?
            .wait()
            .await
            .context("failed to wait on process")?;
        let stdout = out_task.await.context("stdout task join error")??;
        let stderr = err_task.await.context("stderr task join error")??;
        guard.disarm();
        Ok(Collected {
            status,
            stdout,
            stderr,
        })
    };

    match deadline {
        Some(limit) => timeout(limit, wait_future)
            .await
            .context("subprocess timed out")?,
        None => wait_future.await,
    }
}

/// Deadline used when a time limit is too large to add to the clock.
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

/// Budgets for [`run_time_boxed`].
#[derive(Debug, Clone, Copy)]
pub struct RunLimits {
    /// Wall-clock budget measured from spawn.
    pub time_limit:    Duration,
    /// Upper bound on each sleep of the supervising loop.
    pub poll_interval: Duration,
    /// How long to keep collecting output once the child is gone.
    pub output_grace:  Duration,
}

/// Outcome of a time-boxed run.
#[derive(Debug)]
pub struct TimeBoxed {
    /// Exit status, if the child could be reaped.
    pub status:    Option<ExitStatus>,
    /// Everything read from stdout, byte for byte.
    pub stdout:    Vec<u8>,
    /// Everything read from stderr (best effort after a kill).
    pub stderr:    Vec<u8>,
    /// Time from spawn until the child exited or was killed.
    pub elapsed:   Duration,
    /// Whether the child was killed for exceeding the budget.
    pub timed_out: bool,
    /// OS process id the child had while it was alive.
    pub pid:       Option<u32>,
}

impl TimeBoxed {
    /// True if the child exited on its own with status zero.
    pub fn success(&self) -> bool {
        !self.timed_out && self.status.is_some_and(|status| status.success())
    }
}

/// Runs a command under a wall-clock budget without ever blocking on its
/// output pipes.
///
/// Stdout is read line by line on a dedicated task and pushed through a
/// channel that the supervising loop drains between checks of the child and
/// the clock, so a child that is silent and never exits still gets killed on
/// time. Stderr is collected on another task and gathered on a best-effort
/// basis once the child is gone.
pub async fn run_time_boxed(
    program: impl AsRef<OsStr>,
    args: &[OsString],
    stdin: StdinSource,
    cwd: Option<&Path>,
    limits: RunLimits,
) -> Result<TimeBoxed> {
    let mut cmd = piped_command(program, args, &stdin, cwd);
    let mut guard = ChildDropGuard::new(cmd.spawn().context("failed to spawn process")?);
    let started = Instant::now();
    let pid = guard.child_mut()?.id();
    let deadline = started
        .checked_add(limits.time_limit)
        .or_else(|| started.checked_add(FAR_FUTURE))
        .unwrap_or(started);
    feed_stdin(&mut guard, stdin)?;

    let stdout = guard
        .child_mut()?
        .stdout
        .take()
        .context("missing stdout pipe")?;
    let stderr = guard
        .child_mut()?
        .stderr
        .take()
        .context("missing stderr pipe")?;

    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let mut out_task = tokio::spawn(async move {
        let mut reader = BufReader::new(stdout);
        loop {
            let mut line = Vec::new();
            match reader.read_until(b'\n', &mut line).await {
                Ok(0) => break,
                Ok(_) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!("stdout reader stopped: {e}");
                    break;
                }
            }
        }
    });
    let mut err_task = read_to_end_task(stderr, "stderr");

    let mut output = Vec::new();
    let (status, elapsed, timed_out) = loop {
        while let Ok(chunk) = rx.try_recv() {
            output.extend_from_slice(&chunk);
        }

        // An exit that raced the deadline still counts as an exit.
        if let Some(status) = guard
            .child_mut()?
            .try_wait()
            .context("failed to poll process")?
        {
            break (Some(status), started.elapsed().min(limits.time_limit), false);
        }

        let now = Instant::now();
        if now >= deadline {
            let child = guard.child_mut()?;
            if let Err(e) = child.start_kill() {
                tracing::debug!("kill after time limit failed (already exited?): {e}");
            }
            let elapsed = started.elapsed();
            let status = child.wait().await.ok();
            break (status, elapsed, true);
        }

        let nap = limits.poll_interval.min(deadline - now);
        let child = guard.child_mut()?;
        tokio::select! {
            status = child.wait() => {
                let status = status.context("failed to wait on process")?;
                break (Some(status), started.elapsed().min(limits.time_limit), false);
            }
            _ = sleep(nap) => {}
        }
    };
    guard.disarm();

    if timeout(limits.output_grace, &mut out_task).await.is_err() {
        tracing::debug!("stdout still open after the child ended; giving up on the rest");
        out_task.abort();
    }
    while let Ok(chunk) = rx.try_recv() {
        output.extend_from_slice(&chunk);
    }

    let stderr = match timeout(limits.output_grace, &mut err_task).await {
        Ok(Ok(Ok(bytes))) => bytes,
        Ok(Ok(Err(e))) => {
            tracing::debug!("{e:#}");
            Vec::new()
        }
        Ok(Err(e)) => {
            tracing::debug!("stderr task join error: {e}");
            Vec::new()
        }
        Err(_) => {
            err_task.abort();
            Vec::new()
        }
    };

    Ok(TimeBoxed {
        status,
        stdout: output,
        stderr,
        elapsed,
        timed_out,
        pid,
    })
}

/// Returns the exit code of `status`, or the terminating signal number on
/// unix when the process was killed by a signal.
pub fn exit_signal(status: &ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return signal;
        }
    }
    -1
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<OsString> {
        vec!["-c".into(), script.into()]
    }

    fn limits(ms: u64) -> RunLimits {
        RunLimits {
            time_limit:    Duration::from_millis(ms),
            poll_interval: Duration::from_millis(10),
            output_grace:  Duration::from_millis(500),
        }
    }

    #[tokio::test]
    async fn collects_output_and_status() {
        let out = run_collect(
            "sh",
            &sh("echo out; echo err >&2; exit 4"),
            StdinSource::Null,
            None,
            Some(Duration::from_secs(10)),
        )
        .await
        .unwrap();
        assert_eq!(out.stdout, b"out\n");
        assert_eq!(out.stderr, b"err\n");
        assert_eq!(out.status.code(), Some(4));
    }

    #[tokio::test]
    async fn run_collect_deadline_is_an_error() {
        let res = run_collect(
            "sh",
            &sh("exec sleep 5"),
            StdinSource::Null,
            None,
            Some(Duration::from_millis(100)),
        )
        .await;
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn time_boxed_feeds_stdin_and_keeps_bytes() {
        let run = run_time_boxed(
            "cat",
            &[],
            StdinSource::Bytes(b"10\n11\n12".to_vec()),
            None,
            limits(3000),
        )
        .await
        .unwrap();
        assert!(run.success());
        assert_eq!(run.stdout, b"10\n11\n12");
        assert!(run.elapsed <= Duration::from_millis(3000));
    }

    #[tokio::test]
    async fn time_boxed_kills_silent_child() {
        let started = std::time::Instant::now();
        let run = run_time_boxed("sh", &sh("exec sleep 10"), StdinSource::Null, None, limits(300))
            .await
            .unwrap();
        assert!(run.timed_out);
        assert!(!run.success());
        assert!(run.elapsed >= Duration::from_millis(300));
        assert!(started.elapsed() < Duration::from_millis(300 + 1000));
        // reaped: the status is known and the pid is gone
        assert!(run.status.is_some());
        #[cfg(target_os = "linux")]
        {
            let pid = run.pid.unwrap();
            assert!(!std::path::Path::new(&format!("/proc/{pid}")).exists());
        }
    }

    #[tokio::test]
    async fn huge_time_limit_does_not_overflow() {
        let mut budget = limits(0);
        budget.time_limit = Duration::MAX;
        let run = run_time_boxed("sh", &sh("echo ok"), StdinSource::Null, None, budget)
            .await
            .unwrap();
        assert!(run.success());
        assert_eq!(run.stdout, b"ok\n");
    }

    #[tokio::test]
    async fn success_never_reports_more_than_the_budget() {
        for _ in 0..5 {
            let run = run_time_boxed(
                "sh",
                &sh("exec sleep 0.1"),
                StdinSource::Null,
                None,
                limits(100),
            )
            .await
            .unwrap();
            if !run.timed_out {
                assert!(run.elapsed <= Duration::from_millis(100), "{:?}", run.elapsed);
            }
        }
    }

    #[tokio::test]
    async fn time_boxed_keeps_partial_output_on_timeout() {
        let run = run_time_boxed(
            "sh",
            &sh("echo started; exec sleep 10"),
            StdinSource::Null,
            None,
            limits(300),
        )
        .await
        .unwrap();
        assert!(run.timed_out);
        assert_eq!(run.stdout, b"started\n");
    }

    #[tokio::test]
    async fn time_boxed_reports_crash() {
        let run = run_time_boxed(
            "sh",
            &sh("echo boom >&2; exit 1"),
            StdinSource::Null,
            None,
            limits(3000),
        )
        .await
        .unwrap();
        assert!(!run.timed_out);
        assert!(!run.success());
        assert_eq!(run.stderr, b"boom\n");
        assert_eq!(exit_signal(run.status.as_ref().unwrap()), 1);
    }

    #[tokio::test]
    async fn killed_child_reports_signal() {
        let run = run_time_boxed("sh", &sh("exec sleep 10"), StdinSource::Null, None, limits(100))
            .await
            .unwrap();
        assert_eq!(exit_signal(run.status.as_ref().unwrap()), 9);
    }
}
