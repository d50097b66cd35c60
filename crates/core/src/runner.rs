//! Execution of install plans, one supervised step after another.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use indexmap::IndexMap;
use log::{info, warn};

use crate::config::DownloadPolicy;
use crate::error::{Error, Result};
use crate::file_handling::{clear_run_state, get_run_state, write_run_state};
use crate::interpolation::interpolate;
use crate::package::{PackageAction, PackageManager};
use crate::plan_definitions::{Plan, RunState, StepDefinition, StepKind};
use crate::supervisor::{RunRequest, SupervisedResult, Supervisor};

/// A step with all variables substituted, ready to run.
#[derive(Debug, Clone)]
pub enum RenderedStep {
    Command {
        request: RunRequest,
        continue_on_error: bool,
    },
    Package {
        name: String,
        action: PackageAction,
        continue_on_error: bool,
    },
    Download {
        url: String,
        output: String,
        description: String,
        continue_on_error: bool,
    },
}

impl RenderedStep {
    pub fn continue_on_error(&self) -> bool {
        match self {
            RenderedStep::Command {
                continue_on_error, ..
            }
            | RenderedStep::Package {
                continue_on_error, ..
            }
            | RenderedStep::Download {
                continue_on_error, ..
            } => *continue_on_error,
        }
    }

    pub fn environment(&self) -> Option<&HashMap<String, String>> {
        match self {
            RenderedStep::Command { request, .. } => request.environment.as_ref(),
            _ => None,
        }
    }
}

impl Display for RenderedStep {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderedStep::Command { request, .. } => {
                write!(formatter, "{}: {}", request.message, request.operation)
            }
            RenderedStep::Package { name, action, .. } => {
                write!(formatter, "{action} package {name}")
            }
            RenderedStep::Download {
                url,
                output,
                description,
                ..
            } => write!(formatter, "{description}: download {url} to {output}"),
        }
    }
}

/// Substitutes the plan variables into one step.
///
/// # Errors
///
/// Returns an error if the step kind is invalid or a template fails to render.
pub fn render_step(step: &StepDefinition, variables: &IndexMap<String, String>) -> Result<RenderedStep> {
    let continue_on_error = step.continue_on_error;

    Ok(match step.kind()? {
        StepKind::Command(command) => {
            let operation = interpolate(command, variables)?;
            let message = step.message.clone().unwrap_or_else(|| step.to_string());
            let request = RunRequest::new(&message, step.estimate_seconds(), &operation)
                .with_policy(step.policy())
                .with_environment(step.environment.clone())
                .with_working_directory(step.working_directory.clone());

            RenderedStep::Command {
                request,
                continue_on_error,
            }
        }
        StepKind::Package { name, action } => RenderedStep::Package {
            name: name.to_string(),
            action,
            continue_on_error,
        },
        StepKind::Download(download) => {
            let url = interpolate(&download.url, variables)?;
            let description = download
                .description
                .clone()
                .or_else(|| step.message.clone())
                .unwrap_or_else(|| url.clone());

            RenderedStep::Download {
                output: interpolate(&download.output, variables)?,
                url,
                description,
                continue_on_error,
            }
        }
    })
}

/// Renders every step of `plan`, failing before anything runs.
pub fn render_plan(plan: &Plan) -> Result<Vec<RenderedStep>> {
    plan.steps
        .iter()
        .map(|step| render_step(step, &plan.variables))
        .collect()
}

#[derive(Debug, Clone)]
pub struct PlanOptions {
    /// Path the plan was loaded from, recorded in the run state.
    pub plan_path: String,
    /// Where progress is persisted; `None` disables resuming.
    pub run_state_path: Option<String>,
    /// Skip the steps a previous run of the same plan completed.
    pub resume: bool,
    pub download_policy: DownloadPolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanSummary {
    pub completed: usize,
    pub skipped: usize,
    /// Steps that failed but were allowed to.
    pub failed: Vec<String>,
}

fn steps_to_skip(options: &PlanOptions, step_count: usize) -> Result<usize> {
    if !options.resume {
        return Ok(0);
    }

    let Some(run_state_path) = &options.run_state_path else {
        return Ok(0);
    };

    match get_run_state(run_state_path)? {
        Some(state) if state.plan_path == options.plan_path => {
            Ok(state.completed_steps.min(step_count))
        }
        Some(state) => {
            warn!(
                "Ignoring run state of another plan (`{}`), starting from the first step",
                state.plan_path
            );
            Ok(0)
        }
        None => Ok(0),
    }
}

fn execute_step<M: PackageManager + ?Sized>(
    supervisor: &mut Supervisor,
    manager: &M,
    step: &RenderedStep,
    download_policy: &DownloadPolicy,
) -> Result<SupervisedResult> {
    match step {
        RenderedStep::Command { request, .. } => supervisor.run(request),
        RenderedStep::Package { name, action, .. } => {
            supervisor.package_install(manager, name, *action)
        }
        RenderedStep::Download {
            url,
            output,
            description,
            ..
        } => supervisor.download(url, output, description, download_policy),
    }
}

/// Runs every step of `plan` in order.
///
/// The step counter is reset to the number of steps, so each status line
/// carries its position in the plan. After each finished step the run state
/// is saved; a plan that completes clears it.
///
/// # Errors
///
/// Returns [`Error::StepFailed`] for the first failing step that does not
/// set `continue_on_error`, or any error raised while rendering or running
/// a step.
pub fn run_plan<M: PackageManager + ?Sized>(
    supervisor: &mut Supervisor,
    manager: &M,
    plan: &Plan,
    options: &PlanOptions,
) -> Result<PlanSummary> {
    let rendered = render_plan(plan)?;
    let skipped = steps_to_skip(options, rendered.len())?;

    let total = u32::try_from(rendered.len()).unwrap_or(u32::MAX);
    supervisor.steps_mut().reset(total);
    supervisor
        .steps_mut()
        .advance_to(u32::try_from(skipped).unwrap_or(u32::MAX));

    if skipped > 0 {
        info!("Resuming plan after {skipped} completed steps");
    }

    let mut summary = PlanSummary {
        skipped,
        ..PlanSummary::default()
    };

    for (index, (step, definition)) in rendered.iter().zip(&plan.steps).enumerate().skip(skipped) {
        // Package steps that are already satisfied do not advance the counter.
        supervisor
            .steps_mut()
            .advance_to(u32::try_from(index).unwrap_or(u32::MAX));

        let result = execute_step(supervisor, manager, step, &options.download_policy)?;

        if !result.success() {
            if !step.continue_on_error() {
                return Err(Error::step_failed(definition.to_string(), result.exit_code));
            }

            warn!("Step {definition} failed with exit code {}, continuing", result.exit_code);
            summary.failed.push(definition.to_string());
        }

        summary.completed += 1;

        if let Some(run_state_path) = &options.run_state_path {
            let state = RunState {
                plan_path: options.plan_path.clone(),
                completed_steps: index + 1,
            };
            if let Err(e) = write_run_state(run_state_path, &state) {
                warn!("Could not save progress: {e}");
            }
        }
    }

    if let Some(run_state_path) = &options.run_state_path {
        clear_run_state(run_state_path);
    }

    Ok(summary)
}
