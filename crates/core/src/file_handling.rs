//! File handling and validation for termux-cad plans.
//!
//! This module provides functions for reading install plans and for reading
//! and writing the run state used to resume an interrupted plan, along with
//! validation of step IDs, step kinds and template variables.

use std::collections::HashSet;
use std::fs::{self, File};
use std::path::Path;

use log::debug;

use crate::error::Error::{
    EmptyId, IdWithColon, IdWithSpace, NonUniqueStepId, NumericId, UndefinedVariable,
};
use crate::error::{Error, Result};
use crate::interpolation::{get_templates, get_tokens};
use crate::plan_definitions::{Plan, RunState, StepDefinition};

fn get_reader(file_description: &str, path: &str) -> Result<File> {
    File::open(path)
        .map_err(|e| Error::io_error(file_description.to_string(), path.to_string(), e))
}

/// Reads the state of the last plan run from disk.
///
/// Returns None if the file doesn't exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn get_run_state(run_state_path: &str) -> Result<Option<RunState>> {
    if !Path::new(run_state_path).exists() {
        return Ok(None);
    }

    let reader = get_reader("run state", run_state_path)?;

    serde_yaml::from_reader(reader).map(Some).map_err(|e| {
        Error::yaml_error(
            "reading".to_string(),
            "run state".to_string(),
            run_state_path.to_string(),
            e,
        )
    })
}

/// Writes the run state to disk, creating the parent directory if needed.
///
/// # Errors
///
/// Returns an error if the file cannot be created or serialization fails.
pub fn write_run_state(path: &str, run_state: &RunState) -> Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::io_error("run state".to_string(), parent.display().to_string(), e)
            })?;
        }
    }

    let f = File::create(path)
        .map_err(|e| Error::io_error("run state".to_string(), path.to_string(), e))?;

    serde_yaml::to_writer(f, run_state).map_err(|e| {
        Error::yaml_error(
            "writing".to_string(),
            "run state".to_string(),
            path.to_string(),
            e,
        )
    })
}

/// Removes the run state file. A missing file is not an error.
pub fn clear_run_state(path: &str) {
    match fs::remove_file(path) {
        Ok(()) => debug!("Cleared run state `{path}`"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => debug!("Could not clear run state `{path}`: {e}"),
    }
}

fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(EmptyId);
    }

    if id.contains(' ') {
        return Err(IdWithSpace(id.to_string()));
    }

    if id.contains(':') {
        return Err(IdWithColon(id.to_string()));
    }

    if id.chars().all(|c| c.is_numeric()) {
        return Err(NumericId(id.to_string()));
    }

    Ok(())
}

fn validate_variables(step: &StepDefinition, plan: &Plan) -> Result<()> {
    let texts = step.templates();
    let templates = get_templates(&texts)?;

    for token in get_tokens(&templates) {
        if !plan.variables.contains_key(&token) {
            return Err(UndefinedVariable(step.to_string(), token));
        }
    }

    Ok(())
}

fn validate_plan(plan: &Plan) -> Result<()> {
    let mut ids = HashSet::new();

    for step in &plan.steps {
        if let Some(id) = &step.id {
            validate_id(id)?;

            if !ids.insert(id.clone()) {
                return Err(NonUniqueStepId(id.clone()));
            }
        }

        step.kind()?;
        validate_variables(step, plan)?;
    }

    Ok(())
}

/// Loads and validates an install plan.
///
/// # Errors
///
/// Returns an error if:
/// - The plan file cannot be read
/// - The YAML is malformed or doesn't match the expected structure
/// - The plan has no steps
/// - Step IDs are invalid or non-unique
/// - A step does not define exactly one kind of work
/// - A step references a variable the plan does not define
///
/// # Examples
///
/// ```no_run
/// use termux_cad_core::file_handling::get_plan;
///
/// let plan = get_plan("/data/data/com.termux/files/home/.termux-cad/plan.yml")?;
/// println!("Loaded {} steps", plan.steps.len());
/// # Ok::<(), termux_cad_core::error::Error>(())
/// ```
pub fn get_plan(plan_path: &str) -> Result<Plan> {
    let reader = get_reader("plan", plan_path)?;

    let plan: Plan = serde_yaml::from_reader(reader).map_err(|e| {
        Error::yaml_error(
            "reading".to_string(),
            "plan".to_string(),
            plan_path.to_string(),
            e,
        )
    })?;

    if plan.steps.is_empty() {
        return Err(Error::empty_plan(plan_path.to_string()));
    }

    validate_plan(&plan)?;

    Ok(plan)
}
