//! Behaviour of supervised operations as seen by a caller: exit codes,
//! captured output, status lines, timeouts and cleanup of capture files.

mod common;

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use common::{assert_indicator_stopped, is_empty_dir, supervisor_in, FakePackageManager};
use termux_cad_core::error::Error;
use termux_cad_core::package::PackageAction;
use termux_cad_core::policy::ExitPolicy;
use termux_cad_core::steps::StepCounter;
use termux_cad_core::supervisor::{debug_excerpt, RunRequest};

#[test]
fn test_successful_operation() {
    let temp_root = tempfile::tempdir().unwrap();
    let (mut supervisor, status) = supervisor_in(temp_root.path());

    let result = supervisor.run_with_progress("Install foo", 20, "exit 0").unwrap();

    assert_eq!(result.exit_code, 0);
    assert!(!result.timed_out);
    assert_eq!(status.finished_lines(), vec!["✓ Install foo".to_string()]);
    assert!(is_empty_dir(temp_root.path()));
    assert_indicator_stopped(&supervisor, &status);
}

#[test]
fn test_package_manager_noop_code_is_success() {
    let temp_root = tempfile::tempdir().unwrap();
    let (mut supervisor, status) = supervisor_in(temp_root.path());

    let result = supervisor.run_with_progress("Install foo", 20, "exit 100").unwrap();

    assert_eq!(result.exit_code, 0);
    assert_eq!(status.finished_lines(), vec!["✓ Install foo".to_string()]);
}

#[test]
fn test_strict_policy_keeps_code_100() {
    let temp_root = tempfile::tempdir().unwrap();
    let (mut supervisor, status) = supervisor_in(temp_root.path());

    let request = RunRequest::new("Probe", 5, "exit 100").with_policy(ExitPolicy::strict());
    let result = supervisor.run(&request).unwrap();

    assert_eq!(result.exit_code, 100);
    assert_eq!(status.finished_lines(), vec!["✗ Probe (exit 100)".to_string()]);
}

#[test]
fn test_failing_operation() {
    let temp_root = tempfile::tempdir().unwrap();
    let (mut supervisor, status) = supervisor_in(temp_root.path());

    let result = supervisor
        .run_with_progress("Install foo", 20, "echo broken >&2; exit 3")
        .unwrap();

    assert_eq!(result.exit_code, 3);
    assert_eq!(result.stderr, "broken\n");
    assert_eq!(status.finished_lines(), vec!["✗ Install foo (exit 3)".to_string()]);
    assert!(is_empty_dir(temp_root.path()));
    assert_indicator_stopped(&supervisor, &status);
}

#[test]
fn test_stdout_and_stderr_are_captured_separately() {
    let temp_root = tempfile::tempdir().unwrap();
    let (mut supervisor, _status) = supervisor_in(temp_root.path());

    let result = supervisor
        .run_with_progress("Talk", 5, "echo out; echo err >&2; echo more")
        .unwrap();

    assert_eq!(result.stdout, "out\nmore\n");
    assert_eq!(result.stderr, "err\n");
}

#[test]
fn test_timeout_kills_the_operation() {
    let temp_root = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let pid_file = scratch.path().join("pid");
    let (mut supervisor, status) = supervisor_in(temp_root.path());

    let operation = format!("echo $$ > '{}'; exec sleep 10", pid_file.display());
    let started = Instant::now();
    let result = supervisor.run_with_progress("Install foo", 1, &operation).unwrap();
    let elapsed = started.elapsed();

    assert_eq!(result.exit_code, 124);
    assert!(result.timed_out);
    assert!(result.stdout.is_empty());
    assert!(elapsed >= Duration::from_secs(3));
    assert!(elapsed < Duration::from_secs(7), "took {elapsed:?}");

    let lines = status.finished_lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("✗ "));
    assert!(lines[0].contains("Timeout after 3s"));

    assert!(is_empty_dir(temp_root.path()));
    assert_indicator_stopped(&supervisor, &status);

    if Path::new("/proc/self").exists() {
        let pid = fs::read_to_string(&pid_file).unwrap();
        assert!(!Path::new("/proc").join(pid.trim()).exists());
    }
}

#[test]
fn test_empty_operation_starts_nothing() {
    let temp_root = tempfile::tempdir().unwrap();
    let (mut supervisor, status) = supervisor_in(temp_root.path());

    let result = supervisor.run_with_progress("", 5, "");

    assert!(matches!(result, Err(Error::EmptyOperation)));
    assert!(status.contents().is_empty());
    assert!(is_empty_dir(temp_root.path()));

    let result = supervisor.run_with_progress("Blank", 5, "   ");
    assert!(matches!(result, Err(Error::EmptyOperation)));
    assert!(status.contents().is_empty());
}

#[test]
fn test_one_status_line_per_call() {
    let temp_root = tempfile::tempdir().unwrap();
    let (mut supervisor, status) = supervisor_in(temp_root.path());

    supervisor.run_with_progress("First", 5, "true").unwrap();
    supervisor.run_with_progress("Second", 5, "false").unwrap();
    supervisor.run_with_progress("Third", 5, "exit 100").unwrap();

    assert_eq!(
        status.finished_lines(),
        vec![
            "✓ First".to_string(),
            "✗ Second (exit 1)".to_string(),
            "✓ Third".to_string(),
        ]
    );
}

#[test]
fn test_step_prefix_is_display_only() {
    let temp_root = tempfile::tempdir().unwrap();
    let (supervisor, status) = supervisor_in(temp_root.path());
    let mut supervisor = supervisor.with_steps(StepCounter::new(5));

    supervisor.run_with_progress("Install foo", 5, "true").unwrap();
    supervisor.run_with_progress("Install bar", 5, "true").unwrap();

    let contents = status.contents();
    assert!(contents.contains("[1/5] Install foo"));
    assert!(contents.contains("[2/5] Install bar"));
    assert_eq!(supervisor.steps().progress(), "[2/5]");
    assert_eq!(
        status.finished_lines(),
        vec!["✓ Install foo".to_string(), "✓ Install bar".to_string()]
    );
}

#[test]
fn test_environment_and_working_directory() {
    let temp_root = tempfile::tempdir().unwrap();
    let work_dir = tempfile::tempdir().unwrap();
    let (mut supervisor, _status) = supervisor_in(temp_root.path());

    let mut environment = HashMap::new();
    environment.insert("GREETING".to_string(), "hello".to_string());
    let request = RunRequest::new("Greet", 5, "echo $GREETING; pwd")
        .with_environment(Some(environment))
        .with_working_directory(Some(work_dir.path().display().to_string()));

    let result = supervisor.run(&request).unwrap();

    let mut lines = result.stdout.lines();
    assert_eq!(lines.next(), Some("hello"));
    let reported = fs::canonicalize(lines.next().unwrap()).unwrap();
    assert_eq!(reported, fs::canonicalize(work_dir.path()).unwrap());
}

#[test]
fn test_missing_working_directory_is_an_error_with_one_line() {
    let temp_root = tempfile::tempdir().unwrap();
    let (mut supervisor, status) = supervisor_in(temp_root.path());

    let request = RunRequest::new("Nowhere", 5, "true")
        .with_working_directory(Some("/this/path/does/not/exist".to_string()));
    let result = supervisor.run(&request);

    assert!(matches!(result, Err(Error::SubProcess(_))));
    let lines = status.finished_lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("✗ Nowhere"));
    assert!(is_empty_dir(temp_root.path()));
    assert_indicator_stopped(&supervisor, &status);
}

#[test]
fn test_debug_mode_surfaces_stderr_tail_without_changing_the_result() {
    let temp_root = tempfile::tempdir().unwrap();
    let (supervisor, _status) = supervisor_in(temp_root.path());
    let mut config = supervisor.config().clone();
    config.debug = true;
    let (stream, status) = termux_cad_core::status::StatusStream::memory();
    let mut supervisor = termux_cad_core::supervisor::Supervisor::new(config, stream)
        .with_steps(StepCounter::disabled());

    let result = supervisor
        .run_with_progress("Noisy", 5, "echo a >&2; echo b >&2; exit 4")
        .unwrap();

    assert_eq!(result.exit_code, 4);
    assert_eq!(result.stderr, "a\nb\n");
    assert_eq!(status.finished_lines(), vec!["✗ Noisy (exit 4)".to_string()]);
    assert_eq!(
        debug_excerpt(supervisor.config(), &result),
        Some(vec!["a", "b"])
    );
}

#[test]
fn test_package_already_installed_short_circuits() {
    let temp_root = tempfile::tempdir().unwrap();
    let (supervisor, status) = supervisor_in(temp_root.path());
    let mut supervisor = supervisor.with_steps(StepCounter::new(3));
    let manager = FakePackageManager::new(&["nano"], "exit 1");

    let result = supervisor
        .package_install(&manager, "nano", PackageAction::Install)
        .unwrap();

    assert_eq!(result.exit_code, 0);
    assert_eq!(supervisor.steps().current(), 0);
    assert_eq!(status.finished_lines(), vec!["✓ nano already installed".to_string()]);
}

#[test]
fn test_package_install_runs_the_manager_command() {
    let temp_root = tempfile::tempdir().unwrap();
    let (mut supervisor, status) = supervisor_in(temp_root.path());

    let manager = FakePackageManager::new(&[], "exit 100");
    let result = supervisor
        .package_install(&manager, "xfce4", PackageAction::Install)
        .unwrap();
    assert_eq!(result.exit_code, 0);

    let manager = FakePackageManager::new(&[], "exit 2");
    let result = supervisor
        .package_install(&manager, "freecad", PackageAction::Upgrade)
        .unwrap();
    assert_eq!(result.exit_code, 2);

    assert_eq!(
        status.finished_lines(),
        vec![
            "✓ Installing xfce4".to_string(),
            "✗ Upgrading freecad (exit 2)".to_string(),
        ]
    );
}
