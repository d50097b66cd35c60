use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::package::PackageAction;
use crate::policy::ExitPolicy;

/// Estimate for command steps that do not give one.
pub const DEFAULT_COMMAND_ESTIMATE_SECONDS: u64 = 60;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct DownloadDefinition {
    pub url: String,
    pub output: String,
    pub description: Option<String>,
}

/// One step of an install plan.
///
/// `command`, `download.url` and `download.output` are templates: `{name}`
/// is replaced by the plan variable `name`. Braces meant for the shell must
/// be escaped with a backslash, so `${PREFIX}` is written `$\{PREFIX\}` and
/// `awk '{print $1}'` is written `awk '\{print $1\}'`. In YAML, use single
/// quotes or a plain scalar for such commands so the backslashes are kept.
#[derive(Deserialize, Debug, Clone)]
pub struct StepDefinition {
    pub id: Option<String>,
    pub message: Option<String>,
    pub estimate: Option<u64>,
    pub command: Option<String>,
    pub package: Option<String>,
    #[serde(default)]
    pub action: PackageAction,
    pub download: Option<DownloadDefinition>,
    pub environment: Option<HashMap<String, String>>,
    pub working_directory: Option<String>,
    pub accept_codes: Option<Vec<i32>>,
    #[serde(default)]
    pub continue_on_error: bool,
}

/// What a step does, borrowed from its definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind<'a> {
    Command(&'a str),
    Package {
        name: &'a str,
        action: PackageAction,
    },
    Download(&'a DownloadDefinition),
}

impl StepDefinition {
    /// The single kind of work this step defines.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StepKind`] unless exactly one of `command`, `package`
    /// or `download` is set.
    pub fn kind(&self) -> Result<StepKind<'_>> {
        match (&self.command, &self.package, &self.download) {
            (Some(command), None, None) => Ok(StepKind::Command(command)),
            (None, Some(name), None) => Ok(StepKind::Package {
                name,
                action: self.action,
            }),
            (None, None, Some(download)) => Ok(StepKind::Download(download)),
            _ => Err(Error::StepKind(self.to_string())),
        }
    }

    /// Exit codes accepted for command steps: the package manager's no-op
    /// code plus any listed in `accept_codes`.
    pub fn policy(&self) -> ExitPolicy {
        let mut codes = vec![crate::policy::PACKAGE_MANAGER_NOOP];
        if let Some(accept_codes) = &self.accept_codes {
            codes.extend(accept_codes.iter().copied());
        }

        ExitPolicy::accepting(codes)
    }

    pub fn estimate_seconds(&self) -> u64 {
        self.estimate.unwrap_or(DEFAULT_COMMAND_ESTIMATE_SECONDS)
    }

    /// Text templates of this step that may contain `{variables}`.
    pub fn templates(&self) -> Vec<&str> {
        let mut templates = Vec::new();
        if let Some(command) = &self.command {
            templates.push(command.as_str());
        }
        if let Some(download) = &self.download {
            templates.push(download.url.as_str());
            templates.push(download.output.as_str());
        }
        templates
    }
}

impl Display for StepDefinition {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match (&self.id, &self.message) {
            (Some(id), Some(message)) => write!(formatter, "{id} ({message})"),
            (Some(id), None) => formatter.write_str(id),
            (None, Some(message)) => formatter.write_str(message),
            (None, None) => {
                // Fall back to whatever the step does
                if let Some(command) = &self.command {
                    formatter.write_str(command)
                } else if let Some(package) = &self.package {
                    write!(formatter, "{} {package}", self.action)
                } else if let Some(download) = &self.download {
                    write!(formatter, "download {}", download.url)
                } else {
                    formatter.write_str("<empty step>")
                }
            }
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct Plan {
    #[serde(default)]
    pub variables: IndexMap<String, String>,
    pub steps: Vec<StepDefinition>,
}

impl Plan {
    /// Sets or adds variables, e.g. from command-line overrides.
    pub fn override_variables<I: IntoIterator<Item = (String, String)>>(&mut self, overrides: I) {
        for (key, value) in overrides {
            self.variables.insert(key, value);
        }
    }
}

/// Progress of a plan, persisted between runs.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RunState {
    pub plan_path: String,
    pub completed_steps: usize,
}
