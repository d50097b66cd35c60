use leon::{ParseError, RenderError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("No operation was given to run.")]
    EmptyOperation,

    #[error("No URL was given to download.")]
    EmptyUrl,

    #[error("Error with sub process: {}", _0)]
    SubProcess(#[from] std::io::Error),

    #[error("Error {} {} file at `{}`: {}", .action, .file_description, .path, .original)]
    Yaml {
        action: String,
        file_description: String,
        path: String,
        original: serde_yaml::Error,
    },

    #[error("IO error with {} file at path `{}`: {}", .file_description, .path, .original)]
    Io {
        file_description: String,
        path: String,
        original: std::io::Error,
    },

    #[error("Error building HTTP client: {}", .0)]
    Http(#[from] reqwest::Error),

    #[error("Error parsing placeholder string: {}", .0)]
    Parse(#[from] ParseError),

    #[error("Error rendering placeholder template string: {}", .0)]
    Render(#[from] RenderError),

    #[error("No steps were found in the plan YAML. Is `{}` empty?", .path)]
    EmptyPlan { path: String },

    #[error("Step {} must define exactly one of `command`, `package` or `download`.", .0)]
    StepKind(String),

    #[error("Step {} uses an undefined variable: `{}`", .0, .1)]
    UndefinedVariable(String, String),

    #[error("Step {} failed with exit code {}.", .step, .exit_code)]
    StepFailed { step: String, exit_code: i32 },

    #[error("Invalid variable override `{}`: expected the format key=value", .0)]
    VariableFormat(String),

    #[error("STDIO error: {}", .0)]
    Stdio(std::io::Error),

    #[error("Found a non-unique step ID: `{}`", .0)]
    NonUniqueStepId(String),

    #[error("Invalid ID: ID may not be empty")]
    EmptyId,

    #[error("Invalid ID `{}`: ID may not contain spaces", .0)]
    IdWithSpace(String),

    #[error("Invalid ID `{}`: ID may not contain a colon (reserved for future use)", .0)]
    IdWithColon(String),

    #[error("Invalid ID `{}`: ID cannot be purely numeric", .0)]
    NumericId(String),
}

impl Error {
    pub fn empty_plan(path: String) -> Self {
        Self::EmptyPlan { path }
    }

    pub fn step_failed(step: String, exit_code: i32) -> Self {
        Self::StepFailed { step, exit_code }
    }

    pub fn yaml_error(
        action: String,
        file_description: String,
        path: String,
        original: serde_yaml::Error,
    ) -> Self {
        Self::Yaml {
            action,
            file_description,
            path,
            original,
        }
    }

    pub fn io_error(file_description: String, path: String, original: std::io::Error) -> Self {
        Self::Io {
            file_description,
            path,
            original,
        }
    }
}
