//! CLI command implementations
//!
//! Each command follows the same pattern: an `Args` struct for clap and a
//! `Command` struct carrying the execution logic.

pub mod fetch;
pub mod serve;
