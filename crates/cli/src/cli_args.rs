//! Command-line argument parsing.
//!
//! This module defines the command-line interface structure of the `tcad`
//! binary using the `clap` crate.

use clap::{Parser, Subcommand};
use termux_cad_core::package::PackageAction;
use termux_cad_core::plan_definitions::DEFAULT_COMMAND_ESTIMATE_SECONDS;

/// Command-line arguments for the termux-cad CLI tool.
///
/// # Examples
///
/// ```rust
/// use clap::Parser;
/// use termux_cad_cli::cli_args::Args;
///
/// let args = Args::parse_from(["tcad", "install", "nano"]);
/// assert!(!args.debug);
/// ```
#[derive(Parser, Debug)]
#[command(name = "tcad", version, about)]
#[command(term_width = 0)] // Just to make testing across clap features easier
pub struct Args {
    /// Log the tail of stderr of failed operations and raise the log level to debug.
    #[arg(long, global = true, action)]
    pub debug: bool,

    /// Do not color the status lines.
    #[arg(long, global = true, action)]
    pub no_color: bool,

    /// Total number of steps shown as `[current/total]` before each message.
    ///
    /// Zero or absent disables the prefix. Plans always show their own step count.
    #[arg(long, global = true)]
    pub total_steps: Option<u32>,

    /// Position of this call among `--total-steps`, for scripts driving one step at a time.
    #[arg(long, global = true, requires = "total_steps")]
    pub step: Option<u32>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one shell operation with a progress indicator.
    Run(RunArgs),
    /// Install a package unless it is already present.
    Install(InstallArgs),
    /// Download a file, retrying on failure.
    Download(DownloadArgs),
    /// Run an install plan.
    Plan(PlanArgs),
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Message shown next to the indicator and in the final status line.
    #[arg(long, short = 'm')]
    pub message: String,

    /// Expected duration in seconds; the operation is killed after three times this.
    ///
    /// Zero disables the deadline.
    #[arg(long, short = 'e', default_value_t = DEFAULT_COMMAND_ESTIMATE_SECONDS)]
    pub estimate: u64,

    /// Treat only exit code 0 as success (by default 100 is accepted too).
    #[arg(long, action, conflicts_with = "accept")]
    pub strict: bool,

    /// Additional exit codes treated as success.
    #[arg(long, short = 'a', action = clap::ArgAction::Append)]
    pub accept: Vec<i32>,

    /// Environment variables for the operation in the format key=value.
    #[arg(long = "env", short = 'E', action = clap::ArgAction::Append)]
    pub environment: Vec<String>,

    /// Directory to run the operation in.
    #[arg(long, short = 'C')]
    pub working_directory: Option<String>,

    /// The shell operation, joined with spaces and run with `sh -c`.
    ///
    /// Quoting of separate words is lost in the join, so pass anything that
    /// needs quotes, pipes or redirections as one quoted string.
    ///
    /// # Examples
    /// ```bash
    /// tcad run -m "Updating packages" -e 60 -- pkg update -y
    /// tcad run -m "Greeting" -- 'echo "hi there" | tee ~/greeting.txt'
    /// ```
    #[arg(trailing_var_arg = true, required = true, num_args = 1..)]
    pub operation: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub struct InstallArgs {
    /// Package name.
    pub name: String,

    /// Upgrade the package instead of installing it.
    #[arg(long, action, conflicts_with = "reinstall")]
    pub upgrade: bool,

    /// Reinstall the package.
    #[arg(long, action)]
    pub reinstall: bool,
}

impl InstallArgs {
    pub fn action(&self) -> PackageAction {
        if self.upgrade {
            PackageAction::Upgrade
        } else if self.reinstall {
            PackageAction::Reinstall
        } else {
            PackageAction::Install
        }
    }
}

#[derive(clap::Args, Debug)]
pub struct DownloadArgs {
    pub url: String,

    /// Destination file; parent directories are created.
    pub output: String,

    /// Human readable name used in the status lines; defaults to the URL.
    #[arg(long, short = 'd')]
    pub description: Option<String>,

    /// Number of attempts before giving up.
    #[arg(long, default_value_t = 3)]
    pub attempts: u32,
}

#[derive(clap::Args, Debug)]
#[allow(clippy::struct_excessive_bools)] // silence clippy's warning on this struct
pub struct PlanArgs {
    /// Path to the install plan YAML.
    ///
    /// If not provided, defaults to `~/.termux-cad/plan.yml`.
    pub plan_path: Option<String>,

    /// Path to the file that stores the progress of the last run.
    ///
    /// If not provided, defaults to `~/.termux-cad/last_run.yml`.
    #[arg(long, short = 'l')]
    pub run_state_path: Option<String>,

    /// Print the rendered steps without running them.
    #[arg(long, short = 'd', action)]
    pub dry_run: bool,

    /// Run the plan without asking for confirmation first.
    #[arg(long, short = 'f', action)]
    pub force: bool,

    /// Skip the steps completed by the last run of the same plan.
    #[arg(long, short = 'r', action)]
    pub resume: bool,

    /// Do not record progress, so the run cannot be resumed.
    #[arg(long, short = 's', action)]
    pub skip_state_save: bool,

    /// Plan variable overrides in the format key=value.
    ///
    /// # Examples
    /// ```bash
    /// tcad plan -p apk_dir=/sdcard/Download -p mirror=https://example.org
    /// ```
    #[arg(long = "param", short = 'p', action = clap::ArgAction::Append)]
    pub parameters: Vec<String>,
}
