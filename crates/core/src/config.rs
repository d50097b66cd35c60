//! Configuration for the supervisor and path utilities for termux-cad.
//!
//! This module provides the tunable settings of the progress engine, read
//! from the process environment, and functions for resolving the plan and
//! run state paths (expanding shell variables like `~`).

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::debug;

/// Default path for the install plan file
const DEFAULT_PLAN_PATH: &str = "~/.termux-cad/plan.yml";
/// Default path for storing the progress of the last plan run
const DEFAULT_RUN_STATE_PATH: &str = "~/.termux-cad/last_run.yml";

/// Default shell used to run supervised operations
pub const DEFAULT_SHELL: &str = "sh";

/// Environment variable enabling debug output of failed operations
pub const DEBUG_ENV: &str = "TCAD_DEBUG";
/// Environment variable overriding the spinner frame delay in milliseconds
pub const SPINNER_DELAY_ENV: &str = "TCAD_SPINNER_DELAY_MS";
/// Environment variable overriding the temp root for capture files
pub const TMPDIR_ENV: &str = "TCAD_TMPDIR";

const DEFAULT_SPINNER_DELAY: Duration = Duration::from_millis(80);
const DEFAULT_MAX_LABEL_WIDTH: usize = 60;
const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(2);

/// Settings of the command supervisor and its indicator.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Shell used as `<shell> -c <operation>`.
    pub shell: String,
    /// Delay between two spinner frames.
    pub spinner_delay: Duration,
    /// Labels longer than this (in chars) are cut and end with `...`.
    pub max_label_width: usize,
    /// Log the tail of stderr for failed operations.
    pub debug: bool,
    /// Directory holding the per-call capture files.
    pub temp_root: PathBuf,
    /// How long to wait for a killed operation to be reaped.
    pub kill_grace: Duration,
    /// Emit colors on the status stream.
    pub color: bool,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            shell: DEFAULT_SHELL.to_string(),
            spinner_delay: DEFAULT_SPINNER_DELAY,
            max_label_width: DEFAULT_MAX_LABEL_WIDTH,
            debug: false,
            temp_root: get_temp_root(),
            kill_grace: DEFAULT_KILL_GRACE,
            color: true,
        }
    }
}

impl SupervisorConfig {
    /// Builds a configuration from the defaults and the process environment.
    ///
    /// `TCAD_DEBUG` enables debug mode when set to `1`, `true` or `yes`,
    /// `TCAD_SPINNER_DELAY_MS` sets the frame delay and `NO_COLOR` disables
    /// colors. Unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(value) = env::var(DEBUG_ENV) {
            config.debug = parse_flag(&value);
        }

        if let Ok(value) = env::var(SPINNER_DELAY_ENV) {
            match value.trim().parse::<u64>() {
                Ok(millis) if millis > 0 => config.spinner_delay = Duration::from_millis(millis),
                _ => debug!("Ignoring invalid {SPINNER_DELAY_ENV} value `{value}`"),
            }
        }

        if env::var_os("NO_COLOR").is_some() {
            config.color = false;
        }

        config
    }
}

/// Retry settings for downloads.
#[derive(Debug, Clone)]
pub struct DownloadPolicy {
    pub attempts: u32,
    pub retry_delay: Duration,
    pub attempt_timeout: Duration,
    /// Honour `HTTP_PROXY` and friends.
    pub use_system_proxy: bool,
}

impl Default for DownloadPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            retry_delay: Duration::from_secs(2),
            attempt_timeout: Duration::from_secs(300),
            use_system_proxy: true,
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Resolves the directory used for temporary capture files.
///
/// Uses `TCAD_TMPDIR` if set, then `$PREFIX/tmp` (the Termux temp root) if
/// it exists, and finally the OS temp directory.
pub fn get_temp_root() -> PathBuf {
    if let Ok(dir) = env::var(TMPDIR_ENV) {
        return PathBuf::from(shellexpand::tilde(&dir).to_string());
    }

    if let Ok(prefix) = env::var("PREFIX") {
        let termux_tmp = Path::new(&prefix).join("tmp");
        if termux_tmp.is_dir() {
            return termux_tmp;
        }
    }

    env::temp_dir()
}

/// Resolves the plan file path.
///
/// If a custom path is provided, uses that path. Otherwise, uses the default
/// plan path. Shell expansions like `~` are resolved.
///
/// # Examples
///
/// ```
/// use termux_cad_core::config::get_plan_path;
///
/// let default_path = get_plan_path(&None);
/// let custom_path = get_plan_path(&Some("/path/to/plan.yml".to_string()));
/// assert_eq!(custom_path, "/path/to/plan.yml");
/// ```
pub fn get_plan_path(plan_path_arg: &Option<String>) -> String {
    let plan_path = match plan_path_arg {
        Some(plan_path) => plan_path,
        None => DEFAULT_PLAN_PATH,
    };

    shellexpand::tilde(plan_path).to_string()
}

/// Resolves the run state file path, expanding `~`.
pub fn get_run_state_path(run_state_path_arg: &Option<String>) -> String {
    let run_state_path = match run_state_path_arg {
        Some(run_state_path) => run_state_path,
        None => DEFAULT_RUN_STATE_PATH,
    };

    shellexpand::tilde(run_state_path).to_string()
}

/// Expands shell variables in a working directory path.
///
/// Returns None if no working directory is provided.
pub fn expand_working_directory(working_directory: &Option<String>) -> Option<String> {
    working_directory
        .as_ref()
        .map(|working_directory| shellexpand::tilde(working_directory).to_string())
}
