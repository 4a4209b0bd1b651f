//! Execute external processes (git, tar) with line-buffered streaming,
//! timeout, and cancellation.

mod redact;

pub use redact::should_redact_env_key;

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Why a command did not produce a clean `exit(0)`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunErrorKind {
    #[error("exited successfully")]
    Ok,
    #[error("exited with code {0}")]
    NonZeroExit(i32),
    #[error("timed out")]
    Timeout,
    #[error("command not found: {0}")]
    CommandNotFound(String),
    #[error("failed to spawn: {0}")]
    SpawnFailed(String),
    #[error("cancelled")]
    Cancelled,
}

/// A single invocation to run, synchronously or streamed.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: HashMap<String, String>,
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: HashMap::new(),
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn timeout(mut self, dur: Duration) -> Self {
        self.timeout = Some(dur);
        self
    }

    fn build(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        // Guarantees a timed-out `run_sync` call's dropped wait-future still
        // reaps the child instead of leaking it.
        cmd.kill_on_drop(true);
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        // The environment does not inherit secrets by default — start from an empty slate plus a minimal PATH/HOME so
        // git and tar still resolve, then layer on the caller's vars.
        cmd.env_clear();
        if let Ok(path) = std::env::var("PATH") {
            cmd.env("PATH", path);
        }
        if let Ok(home) = std::env::var("HOME") {
            cmd.env("HOME", home);
        }
        for (key, value) in &self.env {
            if should_redact_env_key(key) {
                debug!(env_key = %key, "setting redacted env var");
            } else {
                debug!(env_key = %key, env_value = %value, "setting env var");
            }
            cmd.env(key, value);
        }
        cmd
    }
}

/// Outcome of a synchronous run.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub exit_code: Option<i32>,
    pub output: String,
    pub duration: Duration,
    pub kind: RunErrorKind,
}

impl SyncOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self.kind, RunErrorKind::Ok)
    }
}

/// Run to completion, collecting merged stdout+stderr. The wall-clock
/// timeout starts at spawn; exceeding it kills the child and returns
/// `RunErrorKind::Timeout`.
pub async fn run_sync(spec: &CommandSpec) -> SyncOutcome {
    let start = Instant::now();
    let mut cmd = spec.build();
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return SyncOutcome {
                exit_code: None,
                output: String::new(),
                duration: start.elapsed(),
                kind: RunErrorKind::CommandNotFound(spec.program.clone()),
            };
        }
        Err(e) => {
            return SyncOutcome {
                exit_code: None,
                output: String::new(),
                duration: start.elapsed(),
                kind: RunErrorKind::SpawnFailed(e.to_string()),
            };
        }
    };

    let wait = async {
        let output = child.wait_with_output().await;
        output
    };

    let output = match spec.timeout {
        Some(dur) => match tokio::time::timeout(dur, wait).await {
            Ok(result) => result,
            Err(_) => {
                return SyncOutcome {
                    exit_code: None,
                    output: String::new(),
                    duration: start.elapsed(),
                    kind: RunErrorKind::Timeout,
                };
            }
        },
        None => wait.await,
    };

    match output {
        Ok(output) => {
            let mut merged = String::from_utf8_lossy(&output.stdout).into_owned();
            merged.push_str(&String::from_utf8_lossy(&output.stderr));
            let code = output.status.code();
            let kind = match code {
                Some(0) => RunErrorKind::Ok,
                Some(c) => RunErrorKind::NonZeroExit(c),
                None => RunErrorKind::NonZeroExit(-1),
            };
            SyncOutcome {
                exit_code: code,
                output: merged,
                duration: start.elapsed(),
                kind,
            }
        }
        Err(e) => SyncOutcome {
            exit_code: None,
            output: String::new(),
            duration: start.elapsed(),
            kind: RunErrorKind::SpawnFailed(e.to_string()),
        },
    }
}

/// One tagged line from an async run.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Stdout(String),
    Stderr(String),
    Done(SyncOutcome),
}

/// Spawn the child under a lifetime-bounded task, emitting line-buffered
/// tagged records to `sink` as they arrive, and a terminal `Done` record.
/// Cancellation is cooperative: dropping the cancellation token's guard (or
/// calling `token.cancel()`) closes stdio and sends the child a terminate
/// signal.
pub async fn run_streamed(
    spec: CommandSpec,
    sink: UnboundedSender<StreamEvent>,
    cancel: CancellationToken,
) {
    let start = Instant::now();
    let mut cmd = spec.build();
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let _ = sink.send(StreamEvent::Done(SyncOutcome {
                exit_code: None,
                output: String::new(),
                duration: start.elapsed(),
                kind: RunErrorKind::CommandNotFound(spec.program.clone()),
            }));
            return;
        }
        Err(e) => {
            let _ = sink.send(StreamEvent::Done(SyncOutcome {
                exit_code: None,
                output: String::new(),
                duration: start.elapsed(),
                kind: RunErrorKind::SpawnFailed(e.to_string()),
            }));
            return;
        }
    };

    // Each stream is consumed on its own background reader so a chatty
    // stderr never back-pressures stdout.
    if let Some(stdout) = child.stdout.take() {
        let tx = sink.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let _ = tx.send(StreamEvent::Stdout(line));
            }
        });
    }
    if let Some(stderr) = child.stderr.take() {
        let tx = sink.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let _ = tx.send(StreamEvent::Stderr(line));
            }
        });
    }

    let wait = child.wait();
    let timeout_fut = async {
        match spec.timeout {
            Some(dur) => {
                tokio::time::sleep(dur).await;
            }
            None => std::future::pending::<()>().await,
        }
    };

    let outcome = tokio::select! {
        status = wait => match status {
            Ok(status) => {
                let code = status.code();
                let kind = match code {
                    Some(0) => RunErrorKind::Ok,
                    Some(c) => RunErrorKind::NonZeroExit(c),
                    None => RunErrorKind::NonZeroExit(-1),
                };
                SyncOutcome { exit_code: code, output: String::new(), duration: start.elapsed(), kind }
            }
            Err(e) => SyncOutcome {
                exit_code: None,
                output: String::new(),
                duration: start.elapsed(),
                kind: RunErrorKind::SpawnFailed(e.to_string()),
            },
        },
        _ = timeout_fut => {
            warn!(program = %spec.program, "command timed out, terminating child");
            let _ = child.start_kill();
            let _ = child.wait().await;
            SyncOutcome { exit_code: None, output: String::new(), duration: start.elapsed(), kind: RunErrorKind::Timeout }
        }
        _ = cancel.cancelled() => {
            let _ = child.start_kill();
            let _ = child.wait().await;
            SyncOutcome { exit_code: None, output: String::new(), duration: start.elapsed(), kind: RunErrorKind::Cancelled }
        }
    };

    let _ = sink.send(StreamEvent::Done(outcome));
}
