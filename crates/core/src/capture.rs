//! Temporary capture files for the output of one supervised operation.
//!
//! Files live under the configured temp root and carry the owning process
//! id in their name, so leftovers from a crashed process can be recognised
//! and swept by the next one.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process;

use log::debug;
use tempfile::{Builder, NamedTempFile};

use crate::error::{Error, Result};

const CAPTURE_PREFIX: &str = "tcad-";
const STDOUT_SUFFIX: &str = "-stdout";
const STDERR_SUFFIX: &str = "-stderr";

/// The stdout and stderr buffers of one call. Both files are removed on drop.
pub struct CaptureFiles {
    stdout: NamedTempFile,
    stderr: NamedTempFile,
}

impl CaptureFiles {
    pub fn create(temp_root: &Path) -> Result<Self> {
        Ok(Self {
            stdout: create_capture(temp_root, STDOUT_SUFFIX)?,
            stderr: create_capture(temp_root, STDERR_SUFFIX)?,
        })
    }

    /// Fresh handles for the child's stdout and stderr.
    pub fn child_handles(&self) -> Result<(File, File)> {
        Ok((self.stdout.reopen()?, self.stderr.reopen()?))
    }

    pub fn read_stdout(&self) -> Result<String> {
        read_capture(self.stdout.path())
    }

    pub fn read_stderr(&self) -> Result<String> {
        read_capture(self.stderr.path())
    }

    pub fn paths(&self) -> (PathBuf, PathBuf) {
        (self.stdout.path().to_path_buf(), self.stderr.path().to_path_buf())
    }
}

fn create_capture(temp_root: &Path, suffix: &str) -> Result<NamedTempFile> {
    let prefix = format!("{CAPTURE_PREFIX}{}-", process::id());

    Builder::new()
        .prefix(&prefix)
        .suffix(suffix)
        .tempfile_in(temp_root)
        .map_err(|e| {
            Error::io_error(
                "capture".to_string(),
                temp_root.display().to_string(),
                e,
            )
        })
}

fn read_capture(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| {
        Error::io_error("capture".to_string(), path.display().to_string(), e)
    })?;

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Extracts the owning process id from a capture file name.
fn owner_pid(file_name: &str) -> Option<u32> {
    if !file_name.ends_with(STDOUT_SUFFIX) && !file_name.ends_with(STDERR_SUFFIX) {
        return None;
    }

    file_name
        .strip_prefix(CAPTURE_PREFIX)?
        .split('-')
        .next()?
        .parse()
        .ok()
}

/// Removes capture files whose owning process no longer exists.
///
/// Needs `/proc` to tell live processes apart; without it nothing is removed.
/// Failures are only logged.
pub fn sweep_stale_captures(temp_root: &Path) {
    let proc_root = Path::new("/proc");
    if !proc_root.join("self").exists() {
        return;
    }

    let entries = match fs::read_dir(temp_root) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Could not list `{}` for stale captures: {e}", temp_root.display());
            return;
        }
    };

    let own_pid = process::id();
    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let Some(pid) = owner_pid(&file_name.to_string_lossy()) else {
            continue;
        };

        if pid == own_pid || proc_root.join(pid.to_string()).exists() {
            continue;
        }

        match fs::remove_file(entry.path()) {
            Ok(()) => debug!("Removed stale capture `{}`", entry.path().display()),
            Err(e) => debug!("Could not remove stale capture `{}`: {e}", entry.path().display()),
        }
    }
}
