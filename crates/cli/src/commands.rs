//! Execution of the `tcad` subcommands.
//!
//! Each subcommand resolves to an exit code: the supervised exit code for
//! single operations, `0` for a plan that ran to the end.

use std::collections::HashMap;
use std::io::Write;

use itertools::Itertools;
use log::{debug, info, warn};
use termux_cad_core::config::{
    get_plan_path, get_run_state_path, DownloadPolicy, SupervisorConfig,
};
use termux_cad_core::error::{Error, Result};
use termux_cad_core::file_handling::get_plan;
use termux_cad_core::package::{PackageManager, Pkg};
use termux_cad_core::policy::{ExitPolicy, PACKAGE_MANAGER_NOOP};
use termux_cad_core::runner::{render_plan, run_plan, PlanOptions, PlanSummary, RenderedStep};
use termux_cad_core::steps::StepCounter;
use termux_cad_core::supervisor::{RunRequest, Supervisor};

use crate::arguments::{join_operation, parse_key_values};
use crate::cli_args::{Args, Commands, DownloadArgs, InstallArgs, PlanArgs, RunArgs};
use crate::confirmation::confirm_plan_should_run;

/// Status byte for exit codes outside `0..=255`.
const UNKNOWN_EXIT_STATUS: u8 = 1;

/// Supervisor settings from the environment, adjusted by the global flags.
pub fn build_config(args: &Args) -> SupervisorConfig {
    let mut config = SupervisorConfig::from_env();
    if args.debug {
        config.debug = true;
    }
    if args.no_color {
        config.color = false;
    }
    config
}

/// Step counter for `--total-steps` and `--step`.
///
/// `--step N` means this call is shown as step `N`, so the counter starts
/// one below it.
pub fn step_counter(total_steps: Option<u32>, step: Option<u32>) -> StepCounter {
    match total_steps {
        None | Some(0) => StepCounter::disabled(),
        Some(total) => {
            let mut counter = StepCounter::new(total);
            if let Some(step) = step {
                counter.advance_to(step.saturating_sub(1));
            }
            counter
        }
    }
}

/// Builds the request for `tcad run`.
///
/// # Errors
///
/// Returns an error if an `--env` argument is not in the format key=value.
pub fn build_request(run: &RunArgs) -> Result<RunRequest> {
    let policy = if run.strict {
        ExitPolicy::strict()
    } else {
        ExitPolicy::accepting(
            std::iter::once(PACKAGE_MANAGER_NOOP).chain(run.accept.iter().copied()),
        )
    };

    let environment = parse_key_values(&run.environment)?;
    let environment: Option<HashMap<String, String>> =
        (!environment.is_empty()).then(|| environment.into_iter().collect());

    Ok(
        RunRequest::new(&run.message, run.estimate, &join_operation(&run.operation))
            .with_policy(policy)
            .with_environment(environment)
            .with_working_directory(run.working_directory.clone()),
    )
}

/// Runs the parsed command line to an exit code.
///
/// # Errors
///
/// Returns an error if the subcommand cannot be carried out at all; failed
/// operations are reported through the exit code instead.
pub fn execute(args: &Args) -> Result<i32> {
    let config = build_config(args);
    debug!("Supervisor configuration: {config:?}");

    let mut supervisor = Supervisor::from_config(config)
        .with_steps(step_counter(args.total_steps, args.step));

    match &args.command {
        Commands::Run(run) => execute_run(&mut supervisor, run),
        Commands::Install(install) => execute_install(&mut supervisor, &Pkg, install),
        Commands::Download(download) => execute_download(&mut supervisor, download),
        Commands::Plan(plan) => execute_plan(&mut supervisor, &Pkg, plan),
    }
}

/// # Errors
///
/// See [`Supervisor::run`].
pub fn execute_run(supervisor: &mut Supervisor, run: &RunArgs) -> Result<i32> {
    let request = build_request(run)?;
    Ok(supervisor.run(&request)?.exit_code)
}

/// # Errors
///
/// See [`Supervisor::package_install`].
pub fn execute_install<M: PackageManager + ?Sized>(
    supervisor: &mut Supervisor,
    manager: &M,
    install: &InstallArgs,
) -> Result<i32> {
    Ok(supervisor
        .package_install(manager, &install.name, install.action())?
        .exit_code)
}

/// # Errors
///
/// See [`Supervisor::download`].
pub fn execute_download(supervisor: &mut Supervisor, download: &DownloadArgs) -> Result<i32> {
    let policy = DownloadPolicy {
        attempts: download.attempts.max(1),
        ..DownloadPolicy::default()
    };
    let description = download.description.as_deref().unwrap_or_default();

    Ok(supervisor
        .download(&download.url, &download.output, description, &policy)?
        .exit_code)
}

/// Loads, shows, confirms and runs an install plan.
///
/// # Errors
///
/// Returns an error if the plan is invalid, a variable override is
/// malformed or a step fails without `continue_on_error`.
pub fn execute_plan<M: PackageManager + ?Sized>(
    supervisor: &mut Supervisor,
    manager: &M,
    args: &PlanArgs,
) -> Result<i32> {
    let plan_path = get_plan_path(&args.plan_path);
    debug!("Plan path: `{plan_path}`");

    let mut plan = get_plan(&plan_path)?;
    let overrides = parse_key_values(&args.parameters)?;
    for key in overrides.keys() {
        if !plan.variables.contains_key(key) {
            warn!("Variable `{key}` is not defined by the plan");
        }
    }
    plan.override_variables(overrides);

    let rendered = render_plan(&plan)?;
    print_plan(&mut std::io::stdout(), &rendered).map_err(Error::Stdio)?;

    if args.dry_run {
        println!("Dry run is specified, exiting without executing.");
        return Ok(0);
    }

    if !args.force && !confirm_plan_should_run(rendered.len())? {
        println!("Plan execution cancelled by user.");
        return Ok(0);
    }

    let run_state_path = if args.skip_state_save {
        info!("Skipping state save was specified. The run cannot be resumed.");
        None
    } else {
        Some(get_run_state_path(&args.run_state_path))
    };

    let options = PlanOptions {
        plan_path,
        run_state_path,
        resume: args.resume,
        download_policy: DownloadPolicy::default(),
    };

    let summary = run_plan(supervisor, manager, &plan, &options)?;
    print_summary(&mut std::io::stdout(), &summary).map_err(Error::Stdio)?;

    Ok(0)
}

/// Writes the numbered rendered steps and their environments.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn print_plan<W: Write>(output: &mut W, steps: &[RenderedStep]) -> std::io::Result<()> {
    writeln!(output, "Plan steps:")?;

    for (index, step) in steps.iter().enumerate() {
        writeln!(output, "{:>3}. {step}", index + 1)?;

        if let Some(environment) = step.environment() {
            for (key, value) in environment.iter().sorted() {
                writeln!(output, "\t\"{key}\": \"{value}\"")?;
            }
        }
    }

    Ok(())
}

/// # Errors
///
/// Returns an error if writing fails.
pub fn print_summary<W: Write>(output: &mut W, summary: &PlanSummary) -> std::io::Result<()> {
    write!(output, "Plan finished: {} steps run", summary.completed)?;
    if summary.skipped > 0 {
        write!(output, ", {} skipped", summary.skipped)?;
    }
    writeln!(output)?;

    if !summary.failed.is_empty() {
        writeln!(output, "Failed but continued:")?;
        for step in &summary.failed {
            writeln!(output, "\t{step}")?;
        }
    }

    Ok(())
}

/// Maps a supervised exit code to a process exit status byte.
pub fn process_exit_code(exit_code: i32) -> u8 {
    u8::try_from(exit_code).unwrap_or(UNKNOWN_EXIT_STATUS)
}
