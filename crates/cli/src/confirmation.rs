use std::io::{stdin, stdout, BufRead, Write};

use termux_cad_core::error::{Error, Result};

/// Asks on the terminal whether the plan should be run.
///
/// # Errors
///
/// Returns an error if the terminal cannot be read or written.
pub fn confirm_plan_should_run(step_count: usize) -> Result<bool> {
    confirm_with(&mut stdin().lock(), &mut stdout(), step_count)
}

/// Prompts on `output` until `input` gives a yes or no answer.
///
/// An empty answer means yes. End of input counts as no.
///
/// # Errors
///
/// Returns an error if reading or writing fails.
pub fn confirm_with<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    step_count: usize,
) -> Result<bool> {
    loop {
        write!(
            output,
            "Are you sure you want to run {step_count} steps? ([Y]es/[n]o): "
        )
        .map_err(Error::Stdio)?;
        output.flush().map_err(Error::Stdio)?;

        let mut answer = String::new();
        if input.read_line(&mut answer).map_err(Error::Stdio)? == 0 {
            return Ok(false);
        }

        match answer.trim().to_lowercase().as_str() {
            "" | "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => {}
        }
    }
}
