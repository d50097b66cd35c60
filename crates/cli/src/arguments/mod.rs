//! Processing of `key=value` arguments given on the command line.
//!
//! Both plan variable overrides (`-p`) and operation environment variables
//! (`-E`) use this format.

pub mod processing;

pub use processing::{join_operation, parse_key_values};
