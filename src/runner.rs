//! Shell-command collaborators for submit and describe calls.
//!
//! Each call runs through `sh -c` with the operation descriptor in the
//! environment (`SETTLE_ID`, `SETTLE_KEY`, `SETTLE_SECONDARY`). A command
//! that exits 0 prints its answer on stdout; one that fails reports the
//! remote error on stderr, ideally in the SDK's `Code=... Message=...` form.
//!
//! A [`CallBudget`] bounds how long commands may run. A command still
//! running at the deadline, or when the budget's token is cancelled, is
//! killed and reported as a transport error.

use crate::resource::StateFamily;
use convergence::{CancelToken, Describe, Observation, OperationDescriptor, RemoteError, Submit};
use std::io::Read;
use std::marker::PhantomData;
use std::process::{Child, Command, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Service code used when a describe command prints a token the family
/// does not define
pub const UNKNOWN_STATE_CODE: &str = "UnknownState";

/// Service code used when a submit command prints an unusable descriptor
pub const INVALID_DESCRIPTOR_CODE: &str = "InvalidDescriptor";

/// How often a running command is checked for exit, expiry and cancellation
const POLL_SLICE: Duration = Duration::from_millis(20);

/// Wall-clock budget shared by every call a collaborator makes.
///
/// The clock starts on the first call, so a budget built before a submit
/// covers the wait that follows it rather than the time spent submitting.
#[derive(Debug, Clone)]
pub struct CallBudget {
    timeout: Duration,
    cancel: CancelToken,
    started: Option<Instant>,
}

impl CallBudget {
    pub fn new(timeout: Duration, cancel: &CancelToken) -> Self {
        Self {
            timeout,
            cancel: cancel.clone(),
            started: None,
        }
    }

    fn deadline(&mut self) -> Option<Instant> {
        let started = *self.started.get_or_insert_with(Instant::now);
        started.checked_add(self.timeout)
    }
}

/// Run `command` through `sh -c`, capturing output.
///
/// With a budget the child is killed once the deadline passes or the
/// token is cancelled.
fn run_shell(
    command: &str,
    descriptor: Option<&OperationDescriptor>,
    budget: Option<&mut CallBudget>,
) -> Result<Output, RemoteError> {
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    if let Some(descriptor) = descriptor {
        cmd.env("SETTLE_ID", descriptor.to_string())
            .env("SETTLE_KEY", descriptor.key());
        match descriptor.secondary() {
            Some(secondary) => cmd.env("SETTLE_SECONDARY", secondary),
            None => cmd.env_remove("SETTLE_SECONDARY"),
        };
    }

    let (deadline, cancel) = match budget {
        Some(budget) => (budget.deadline(), Some(budget.cancel.clone())),
        None => (None, None),
    };

    log::trace!("sh -c {command:?}");
    let mut child = cmd
        .spawn()
        .map_err(|e| RemoteError::transport(format!("failed to run '{command}': {e}")))?;
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                return Ok(Output {
                    status,
                    stdout: collect(stdout),
                    stderr: collect(stderr),
                });
            }
            Ok(None) => {}
            Err(e) => {
                kill(&mut child, command);
                return Err(RemoteError::transport(format!(
                    "failed to wait for '{command}': {e}"
                )));
            }
        }

        let now = Instant::now();
        if cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            kill(&mut child, command);
            return Err(RemoteError::transport(format!("'{command}' cancelled")));
        }
        let slice = match deadline {
            Some(deadline) if now >= deadline => {
                kill(&mut child, command);
                return Err(RemoteError::transport(format!(
                    "'{command}' timed out and was killed"
                )));
            }
            Some(deadline) => POLL_SLICE.min(deadline - now),
            None => POLL_SLICE,
        };

        match &cancel {
            Some(cancel) => {
                cancel.wait_timeout(slice);
            }
            None => thread::sleep(slice),
        }
    }
}

/// Read a pipe to the end on its own thread so a chatty child never blocks
fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Err(e) = pipe.read_to_end(&mut buf) {
            log::debug!("reading command output failed: {e}");
        }
        buf
    })
}

fn collect(reader: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

/// Kill and reap `child`. Output readers are left to finish on their own.
fn kill(child: &mut Child, command: &str) {
    if let Err(e) = child.kill() {
        log::debug!("killing '{command}' failed: {e}");
    }
    if let Err(e) = child.wait() {
        log::debug!("reaping '{command}' failed: {e}");
    }
}

/// Stdout of a successful command, or the remote error it reported
fn answer(command: &str, output: &Output) -> Result<String, RemoteError> {
    if output.status.success() {
        return Ok(String::from_utf8_lossy(&output.stdout).trim().to_string());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    match parse_sdk_error(&stderr) {
        Some(error) => Err(error),
        None => {
            let detail = stderr.trim();
            let status = output
                .status
                .code()
                .map_or_else(|| "killed by signal".to_string(), |c| format!("exit {c}"));
            Err(RemoteError::transport(if detail.is_empty() {
                format!("'{command}' failed ({status})")
            } else {
                format!("'{command}' failed ({status}): {detail}")
            }))
        }
    }
}

/// Parse `Code=<code>, Message=<text>, RequestId=<id>` from error text.
///
/// Only `Code` is required. The message runs up to `, RequestId=` or the
/// end of the line.
pub fn parse_sdk_error(text: &str) -> Option<RemoteError> {
    let line = text.lines().find(|line| line.contains("Code="))?;
    let rest = &line[line.find("Code=")? + "Code=".len()..];

    let code: String = rest
        .chars()
        .take_while(|c| !c.is_whitespace() && *c != ',')
        .collect();
    if code.is_empty() {
        return None;
    }

    let message = line.find("Message=").map_or("", |start| {
        let tail = &line[start + "Message=".len()..];
        tail.find(", RequestId=").map_or(tail, |end| &tail[..end]).trim()
    });

    let error = RemoteError::service(code, message);
    let request_id = line.find("RequestId=").map(|start| {
        line[start + "RequestId=".len()..]
            .split(|c: char| c.is_whitespace() || c == ',')
            .next()
            .unwrap_or_default()
    });

    Some(match request_id {
        Some(id) if !id.is_empty() => error.with_request_id(id),
        _ => error,
    })
}

/// Describe collaborator backed by a shell command.
///
/// Stdout is the state token; `not_found_token` means the resource does
/// not exist.
#[derive(Debug, Clone)]
pub struct ShellDescribe<F> {
    command: String,
    not_found_token: String,
    budget: Option<CallBudget>,
    family: PhantomData<fn() -> F>,
}

impl<F: StateFamily> ShellDescribe<F> {
    pub fn new(command: impl Into<String>, not_found_token: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            not_found_token: not_found_token.into(),
            budget: None,
            family: PhantomData,
        }
    }

    /// Kill describe commands that outlive `budget`.
    pub fn with_budget(mut self, budget: CallBudget) -> Self {
        self.budget = Some(budget);
        self
    }

    fn interpret(&self, token: &str) -> Result<Observation<F>, RemoteError> {
        if token == self.not_found_token {
            return Ok(Observation::NotFound);
        }
        F::parse_token(token)
            .map(Observation::Found)
            .map_err(|e| RemoteError::service(UNKNOWN_STATE_CODE, e.to_string()))
    }
}

impl<F: StateFamily> Describe for ShellDescribe<F> {
    type State = F;
    type Error = RemoteError;

    fn describe(&mut self, descriptor: &OperationDescriptor) -> Result<Observation<F>, RemoteError> {
        let output = run_shell(&self.command, Some(descriptor), self.budget.as_mut())?;
        let token = answer(&self.command, &output)?;
        log::debug!("{descriptor}: describe printed {token:?}");
        self.interpret(&token)
    }
}

/// Submit collaborator backed by a shell command.
///
/// The last non-empty stdout line is the descriptor (`key` or
/// `key#secondary`).
#[derive(Debug, Clone)]
pub struct ShellSubmit {
    command: String,
    budget: Option<CallBudget>,
}

impl ShellSubmit {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            budget: None,
        }
    }

    /// Kill submit commands that outlive `budget`.
    pub fn with_budget(mut self, budget: CallBudget) -> Self {
        self.budget = Some(budget);
        self
    }
}

impl Submit for ShellSubmit {
    type Request = ();
    type Error = RemoteError;

    fn submit(&mut self, (): &()) -> Result<OperationDescriptor, RemoteError> {
        let output = run_shell(&self.command, None, self.budget.as_mut())?;
        let stdout = answer(&self.command, &output)?;
        let line = stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or_default();

        line.parse().map_err(|e| {
            RemoteError::service(
                INVALID_DESCRIPTOR_CODE,
                format!("submit printed {line:?}: {e}"),
            )
        })
    }
}
