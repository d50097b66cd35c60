//! Supervised execution of one shell operation with a progress indicator.
//!
//! A call moves through `Starting -> Waiting -> {Completed | TimedOut}`.
//! The indicator is started before the operation is spawned and stopped,
//! with exactly one status line, on every way out of the call. Capture
//! files are dropped before the call returns.

use std::collections::HashMap;
use std::io;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};

use crate::capture::{sweep_stale_captures, CaptureFiles};
use crate::config::{expand_working_directory, SupervisorConfig};
use crate::error::{Error, Result};
use crate::indicator::Indicator;
use crate::policy::{ExitPolicy, TIMEOUT_EXIT_CODE, UNKNOWN_EXIT_CODE};
use crate::status::{Status, StatusStream};
use crate::steps::StepCounter;

/// Number of stderr lines logged for a failed operation in debug mode.
const DEBUG_TAIL_LINES: usize = 5;

/// The time budget is this many times the caller's estimate.
const TIMEOUT_FACTOR: u64 = 3;

/// Normalized outcome of one supervised operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisedResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl SupervisedResult {
    pub fn timed_out() -> Self {
        Self {
            exit_code: TIMEOUT_EXIT_CODE,
            stdout: String::new(),
            stderr: String::new(),
            timed_out: true,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// One operation to supervise.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub message: String,
    pub estimated_seconds: u64,
    pub operation: String,
    pub environment: Option<HashMap<String, String>>,
    pub working_directory: Option<String>,
    pub policy: ExitPolicy,
}

impl RunRequest {
    pub fn new(message: &str, estimated_seconds: u64, operation: &str) -> Self {
        Self {
            message: message.to_string(),
            estimated_seconds,
            operation: operation.to_string(),
            environment: None,
            working_directory: None,
            policy: ExitPolicy::strict(),
        }
    }

    pub fn with_policy(mut self, policy: ExitPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_environment(mut self, environment: Option<HashMap<String, String>>) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_working_directory(mut self, working_directory: Option<String>) -> Self {
        self.working_directory = working_directory;
        self
    }

    /// Deadline for the operation, `None` when no estimate was given.
    pub fn timeout(&self) -> Option<Duration> {
        if self.estimated_seconds == 0 {
            return None;
        }

        Some(Duration::from_secs(
            self.estimated_seconds.saturating_mul(TIMEOUT_FACTOR),
        ))
    }
}

/// Runs operations one at a time, driving the indicator and step counter.
pub struct Supervisor {
    pub(crate) config: SupervisorConfig,
    pub(crate) indicator: Indicator,
    steps: StepCounter,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig, stream: StatusStream) -> Self {
        let indicator = Indicator::from_config(&config, stream);

        Self {
            config,
            indicator,
            steps: StepCounter::default(),
        }
    }

    /// Supervisor reporting to stderr.
    pub fn from_config(config: SupervisorConfig) -> Self {
        let stream = StatusStream::stderr(config.color);
        Self::new(config, stream)
    }

    pub fn with_steps(mut self, steps: StepCounter) -> Self {
        self.steps = steps;
        self
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub fn steps(&self) -> &StepCounter {
        &self.steps
    }

    pub fn steps_mut(&mut self) -> &mut StepCounter {
        &mut self.steps
    }

    /// Whether a spinner loop is still animating.
    pub fn indicator_running(&self) -> bool {
        self.indicator.is_running()
    }

    /// Writes a status line without running anything.
    pub fn report(&mut self, status: Status, message: &str) {
        self.indicator.stop(status, message);
    }

    /// Advances the step counter and prefixes `message` when steps are shown.
    pub(crate) fn display_message(&mut self, message: &str) -> String {
        if !self.steps.is_enabled() {
            return message.to_string();
        }

        self.steps.increment();
        format!("{} {message}", self.steps.progress())
    }

    /// Runs `operation` in the shell, treating the package manager's
    /// "nothing to do" code as success.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyOperation`] without starting anything if
    /// `operation` is blank, or an error if the operation cannot be spawned
    /// or its output cannot be read. A failing or timed out operation is not
    /// an error; see [`SupervisedResult::exit_code`].
    pub fn run_with_progress(
        &mut self,
        message: &str,
        estimated_seconds: u64,
        operation: &str,
    ) -> Result<SupervisedResult> {
        let request = RunRequest::new(message, estimated_seconds, operation)
            .with_policy(ExitPolicy::package_manager());

        self.run(&request)
    }

    /// Runs one request to completion or timeout.
    ///
    /// # Errors
    ///
    /// See [`Supervisor::run_with_progress`].
    pub fn run(&mut self, request: &RunRequest) -> Result<SupervisedResult> {
        if request.operation.trim().is_empty() {
            return Err(Error::EmptyOperation);
        }

        sweep_stale_captures(&self.config.temp_root);

        let label = self.display_message(&request.message);
        self.indicator.start(&label);

        let result = match self.supervise(request) {
            Ok(result) => result,
            Err(e) => {
                self.indicator
                    .stop(Status::Error, &format!("{} ({e})", request.message));
                return Err(e);
            }
        };

        if result.timed_out {
            let seconds = request.timeout().map_or(0, |timeout| timeout.as_secs());
            self.indicator.stop(
                Status::Error,
                &format!("{}: Timeout after {seconds}s", request.message),
            );
        } else if result.success() {
            self.indicator.stop(Status::Success, &request.message);
        } else {
            self.indicator.stop(
                Status::Error,
                &format!("{} (exit {})", request.message, result.exit_code),
            );

            if let Some(excerpt) = debug_excerpt(&self.config, &result) {
                log_stderr_tail(&request.message, &excerpt);
            }
        }

        Ok(result)
    }

    fn supervise(&self, request: &RunRequest) -> Result<SupervisedResult> {
        let captures = CaptureFiles::create(&self.config.temp_root)?;
        let (stdout, stderr) = captures.child_handles()?;

        let mut command = Command::new(&self.config.shell);
        command
            .arg("-c")
            .arg(&request.operation)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr));

        if let Some(environment) = &request.environment {
            info!("Executing with environment variables: {:?}", environment);
            command.envs(environment);
        }

        if let Some(working_directory) = expand_working_directory(&request.working_directory) {
            command.current_dir(working_directory);
        }

        // Own process group, so a timeout takes the whole pipeline down.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        debug!("Spawning `{}`", request.operation);
        let child = command.spawn()?;
        let pid = child.id();
        let exited = wait_in_background(child)?;

        let status = match request.timeout() {
            None => exited.recv().ok(),
            Some(timeout) => match exited.recv_timeout(timeout) {
                Ok(status) => Some(status),
                Err(RecvTimeoutError::Timeout) => {
                    warn!(
                        "`{}` exceeded {}s, terminating it",
                        request.operation,
                        timeout.as_secs()
                    );
                    terminate(&self.config.shell, pid);
                    if exited.recv_timeout(self.config.kill_grace).is_err() {
                        debug!("Process {pid} was not reaped after termination");
                    }
                    return Ok(SupervisedResult::timed_out());
                }
                Err(RecvTimeoutError::Disconnected) => None,
            },
        };

        let exit_code = match status {
            Some(Ok(status)) => status.code().unwrap_or(UNKNOWN_EXIT_CODE),
            Some(Err(e)) => {
                debug!("Waiting for process {pid} failed: {e}");
                UNKNOWN_EXIT_CODE
            }
            None => {
                debug!("Lost track of process {pid}");
                UNKNOWN_EXIT_CODE
            }
        };

        Ok(SupervisedResult {
            exit_code: request.policy.normalize(exit_code),
            stdout: captures.read_stdout()?,
            stderr: captures.read_stderr()?,
            timed_out: false,
        })
    }
}

/// Moves `child` to a thread that reports its exit status once it ends.
fn wait_in_background(mut child: Child) -> Result<Receiver<io::Result<ExitStatus>>> {
    let (sender, receiver) = mpsc::channel();

    thread::Builder::new()
        .name("tcad-wait".to_string())
        .spawn(move || {
            // The supervisor may have stopped listening after a timeout.
            let _ = sender.send(child.wait());
        })?;

    Ok(receiver)
}

/// Sends SIGKILL to the process group led by `pid`. Not retried.
///
/// Goes through the shell's `kill` builtin, which exists even where no
/// standalone `kill` binary is installed.
#[cfg(unix)]
fn terminate(shell: &str, pid: u32) {
    let result = Command::new(shell)
        .arg("-c")
        .arg(format!("kill -KILL -{pid}"))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match result {
        Ok(status) if status.success() => {}
        Ok(status) => debug!("kill for process group {pid} exited with {status}"),
        Err(e) => debug!("Could not run kill for process group {pid}: {e}"),
    }
}

#[cfg(not(unix))]
fn terminate(_shell: &str, pid: u32) {
    let result = Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/T", "/F"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    if let Err(e) = result {
        debug!("Could not run taskkill for process {pid}: {e}");
    }
}

fn tail_lines(text: &str, count: usize) -> Vec<&str> {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(count);
    lines[start..].to_vec()
}

/// The last lines of stderr to surface for `result`.
///
/// `None` unless debug mode is on and the operation failed without timing out.
pub fn debug_excerpt<'a>(
    config: &SupervisorConfig,
    result: &'a SupervisedResult,
) -> Option<Vec<&'a str>> {
    if !config.debug || result.success() || result.timed_out {
        return None;
    }

    Some(tail_lines(&result.stderr, DEBUG_TAIL_LINES))
}

fn log_stderr_tail(message: &str, tail: &[&str]) {
    if tail.is_empty() {
        warn!("{message}: no output on stderr");
        return;
    }

    warn!("{message}: last lines of stderr:");
    for line in tail {
        warn!("  {line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_three_times_the_estimate() {
        let request = RunRequest::new("Install foo", 20, "true");
        assert_eq!(request.timeout(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_zero_estimate_has_no_deadline() {
        let request = RunRequest::new("Install foo", 0, "true");
        assert_eq!(request.timeout(), None);
    }

    #[test]
    fn test_request_defaults_to_strict_policy() {
        let request = RunRequest::new("Install foo", 1, "true");
        assert_eq!(request.policy, ExitPolicy::strict());
    }

    #[test]
    fn test_tail_lines() {
        let text = "one\ntwo\nthree\nfour\nfive\nsix\nseven\n";
        assert_eq!(tail_lines(text, 3), vec!["five", "six", "seven"]);
        assert_eq!(tail_lines("only", 5), vec!["only"]);
        assert!(tail_lines("", 5).is_empty());
    }

    #[test]
    fn test_debug_excerpt_only_for_failures_in_debug_mode() {
        let failed = SupervisedResult {
            exit_code: 2,
            stdout: String::new(),
            stderr: "1\n2\n3\n4\n5\n6\n".to_string(),
            timed_out: false,
        };
        let succeeded = SupervisedResult {
            exit_code: 0,
            ..failed.clone()
        };

        let mut config = SupervisorConfig::default();
        assert_eq!(debug_excerpt(&config, &failed), None);

        config.debug = true;
        assert_eq!(
            debug_excerpt(&config, &failed),
            Some(vec!["2", "3", "4", "5", "6"])
        );
        assert_eq!(debug_excerpt(&config, &succeeded), None);
        assert_eq!(debug_excerpt(&config, &SupervisedResult::timed_out()), None);
    }

    #[test]
    fn test_display_message_prefixes_steps() {
        let (stream, _buffer) = StatusStream::memory();
        let mut supervisor =
            Supervisor::new(SupervisorConfig::default(), stream).with_steps(StepCounter::new(4));
        assert_eq!(supervisor.display_message("Install foo"), "[1/4] Install foo");
        assert_eq!(supervisor.display_message("Install bar"), "[2/4] Install bar");
    }

    #[test]
    fn test_display_message_without_steps() {
        let (stream, _buffer) = StatusStream::memory();
        let mut supervisor = Supervisor::new(SupervisorConfig::default(), stream)
            .with_steps(StepCounter::disabled());
        assert_eq!(supervisor.display_message("Install foo"), "Install foo");
        assert_eq!(supervisor.steps().current(), 0);
    }

    #[test]
    fn test_timed_out_result() {
        let result = SupervisedResult::timed_out();
        assert_eq!(result.exit_code, 124);
        assert!(result.timed_out);
        assert!(!result.success());
    }
}
