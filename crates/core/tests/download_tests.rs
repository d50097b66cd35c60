//! Downloads against a local HTTP server.

mod common;

use std::fs;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{serve, supervisor_in};
use termux_cad_core::config::DownloadPolicy;
use termux_cad_core::error::Error;

fn quick_policy() -> DownloadPolicy {
    DownloadPolicy {
        attempts: 3,
        retry_delay: Duration::from_millis(10),
        attempt_timeout: Duration::from_secs(5),
        use_system_proxy: false,
    }
}

#[test]
fn test_download_writes_the_body() {
    let temp_root = tempfile::tempdir().unwrap();
    let target_dir = tempfile::tempdir().unwrap();
    let output = target_dir.path().join("apks").join("viewer.apk");
    let (url, hits) = serve("200 OK", "hello");
    let (mut supervisor, status) = supervisor_in(temp_root.path());

    let result = supervisor
        .download(
            &format!("{url}/viewer.apk"),
            output.to_str().unwrap(),
            "viewer",
            &quick_policy(),
        )
        .unwrap();

    assert_eq!(result.exit_code, 0);
    assert_eq!(fs::read_to_string(&output).unwrap(), "hello");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(status.finished_lines(), vec!["✓ Downloaded viewer".to_string()]);
    assert!(status.contents().contains("Downloading viewer (attempt 1/3)"));
}

#[test]
fn test_download_retries_then_fails() {
    let temp_root = tempfile::tempdir().unwrap();
    let target_dir = tempfile::tempdir().unwrap();
    let output = target_dir.path().join("missing.apk");
    let (url, hits) = serve("404 Not Found", "nope");
    let (mut supervisor, status) = supervisor_in(temp_root.path());

    let result = supervisor
        .download(
            &format!("{url}/missing.apk"),
            output.to_str().unwrap(),
            "missing",
            &quick_policy(),
        )
        .unwrap();

    assert_eq!(result.exit_code, 1);
    assert!(result.stderr.contains("404"));
    assert_eq!(hits.load(Ordering::SeqCst), 3);

    let lines = status.finished_lines();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("⚠ Attempt 1/3 failed"));
    assert!(lines[1].starts_with("⚠ Attempt 2/3 failed"));
    assert_eq!(lines[2], "✗ Failed to download missing after 3 attempts");
}

#[test]
fn test_download_without_url_is_rejected() {
    let temp_root = tempfile::tempdir().unwrap();
    let (mut supervisor, status) = supervisor_in(temp_root.path());

    let result = supervisor.download("", "/tmp/never", "nothing", &quick_policy());

    assert!(matches!(result, Err(Error::EmptyUrl)));
    assert!(status.contents().is_empty());
}

#[test]
fn test_download_description_defaults_to_url() {
    let temp_root = tempfile::tempdir().unwrap();
    let target_dir = tempfile::tempdir().unwrap();
    let output = target_dir.path().join("file.bin");
    let (url, _hits) = serve("200 OK", "data");
    let (mut supervisor, status) = supervisor_in(temp_root.path());
    let url = format!("{url}/file.bin");

    supervisor
        .download(&url, output.to_str().unwrap(), "", &quick_policy())
        .unwrap();

    assert_eq!(status.finished_lines(), vec![format!("✓ Downloaded {url}")]);
}
