//! termux-cad Core Library
//!
//! This crate provides the engine behind termux-cad, a tool that turns a
//! Termux environment into a CAD-capable desktop by running install steps
//! (package installs, shell commands and downloads) under supervision.
//!
//! # Key Features
//!
//! - **Supervised Commands**: Run one shell operation with a time budget,
//!   capture stdout and stderr separately and normalize its exit code
//! - **Progress Indicator**: Animated status line on stderr while an
//!   operation runs, finished by exactly one status line
//! - **Step Accounting**: `[current/total]` prefixes for multi-step runs
//! - **Install Plans**: YAML plans with variables, validation and resume
//! - **Error Handling**: Comprehensive error types for all failure modes
//!
//! # Examples
//!
//! Running one operation:
//!
//! ```no_run
//! use termux_cad_core::config::SupervisorConfig;
//! use termux_cad_core::supervisor::Supervisor;
//!
//! let mut supervisor = Supervisor::from_config(SupervisorConfig::from_env());
//! let result = supervisor.run_with_progress("Updating packages", 60, "pkg update -y")?;
//! println!("exit code {}", result.exit_code);
//! # Ok::<(), termux_cad_core::error::Error>(())
//! ```

pub mod capture;
pub mod config;
pub mod download;
pub mod error;
pub mod file_handling;
pub mod indicator;
pub mod interpolation;
pub mod package;
pub mod plan_definitions;
pub mod policy;
pub mod runner;
pub mod status;
pub mod steps;
pub mod supervisor;
