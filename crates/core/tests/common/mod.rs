//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use termux_cad_core::config::SupervisorConfig;
use termux_cad_core::package::{PackageAction, PackageManager};
use termux_cad_core::status::{MemoryBuffer, StatusStream};
use termux_cad_core::steps::StepCounter;
use termux_cad_core::supervisor::Supervisor;

/// A supervisor writing captures to `temp_root` and status lines to memory.
pub fn supervisor_in(temp_root: &Path) -> (Supervisor, MemoryBuffer) {
    let config = SupervisorConfig {
        temp_root: temp_root.to_path_buf(),
        spinner_delay: Duration::from_millis(10),
        kill_grace: Duration::from_secs(2),
        color: false,
        ..SupervisorConfig::default()
    };
    let (stream, buffer) = StatusStream::memory();

    (
        Supervisor::new(config, stream).with_steps(StepCounter::disabled()),
        buffer,
    )
}

/// Asserts the spinner loop has ended: no loop is owned and nothing more
/// is drawn after several frame periods.
pub fn assert_indicator_stopped(supervisor: &Supervisor, status: &MemoryBuffer) {
    assert!(!supervisor.indicator_running());

    let written = status.contents().len();
    thread::sleep(Duration::from_millis(100));
    assert_eq!(status.contents().len(), written);
}

pub fn is_empty_dir(path: &Path) -> bool {
    std::fs::read_dir(path).unwrap().next().is_none()
}

/// Package manager whose state and commands are fixed up front.
pub struct FakePackageManager {
    pub installed: HashSet<String>,
    pub command: String,
}

impl FakePackageManager {
    pub fn new(installed: &[&str], command: &str) -> Self {
        Self {
            installed: installed.iter().map(ToString::to_string).collect(),
            command: command.to_string(),
        }
    }
}

impl PackageManager for FakePackageManager {
    fn is_installed(&self, name: &str) -> bool {
        self.installed.contains(name)
    }

    fn command(&self, _name: &str, _action: PackageAction) -> String {
        self.command.clone()
    }
}

/// Serves the same HTTP response to every connection on a local port.
///
/// Returns the base URL and a counter of accepted connections.
pub fn serve(status_line: &'static str, body: &'static str) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else {
                continue;
            };
            counter.fetch_add(1, Ordering::SeqCst);

            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            while reader.read_line(&mut line).unwrap_or(0) > 0 {
                if line == "\r\n" {
                    break;
                }
                line.clear();
            }

            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes());
            let _ = stream.flush();
        }
    });

    (format!("http://{address}"), hits)
}
