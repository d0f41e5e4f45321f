//! Side-effecting collaborators of the harness.

pub mod config;
pub mod model;
pub mod process;
pub mod prompt;
pub mod run_log;
pub mod tools;
