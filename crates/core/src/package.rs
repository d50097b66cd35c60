//! Package installation through the system package manager.

use std::fmt::{Display, Formatter};
use std::process::{Command, Stdio};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::policy::ExitPolicy;
use crate::status::Status;
use crate::supervisor::{RunRequest, SupervisedResult, Supervisor};

/// Estimate used for every package operation.
pub const PACKAGE_ESTIMATE_SECONDS: u64 = 20;

#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PackageAction {
    #[default]
    Install,
    Upgrade,
    Reinstall,
}

impl Display for PackageAction {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(match self {
            PackageAction::Install => "install",
            PackageAction::Upgrade => "upgrade",
            PackageAction::Reinstall => "reinstall",
        })
    }
}

/// Queries and drives a package manager.
pub trait PackageManager {
    fn is_installed(&self, name: &str) -> bool;

    /// Shell command performing `action` on `name` without prompting.
    fn command(&self, name: &str, action: PackageAction) -> String;
}

/// The Termux `pkg` front-end, queried through `dpkg`.
#[derive(Debug, Clone, Default)]
pub struct Pkg;

impl PackageManager for Pkg {
    fn is_installed(&self, name: &str) -> bool {
        let status = Command::new("dpkg")
            .args(["-s", name])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(status) => status.success(),
            Err(e) => {
                debug!("Could not query dpkg for `{name}`: {e}");
                false
            }
        }
    }

    fn command(&self, name: &str, action: PackageAction) -> String {
        format!("pkg {action} -y {name}")
    }
}

impl Supervisor {
    /// Installs `name` unless the package manager reports it as present.
    ///
    /// An already present package is reported as success without spawning
    /// anything and without advancing the step counter.
    ///
    /// # Errors
    ///
    /// See [`Supervisor::run`].
    pub fn package_install<M: PackageManager + ?Sized>(
        &mut self,
        manager: &M,
        name: &str,
        action: PackageAction,
    ) -> Result<SupervisedResult> {
        if manager.is_installed(name) {
            self.report(Status::Success, &format!("{name} already installed"));
            return Ok(SupervisedResult {
                exit_code: 0,
                stdout: String::new(),
                stderr: String::new(),
                timed_out: false,
            });
        }

        let request = RunRequest::new(
            &format!("{} {name}", action_verb(action)),
            PACKAGE_ESTIMATE_SECONDS,
            &manager.command(name, action),
        )
        .with_policy(ExitPolicy::package_manager());

        self.run(&request)
    }
}

fn action_verb(action: PackageAction) -> &'static str {
    match action {
        PackageAction::Install => "Installing",
        PackageAction::Upgrade => "Upgrading",
        PackageAction::Reinstall => "Reinstalling",
    }
}
