//! Debugctl library - exposes command handlers for integration tests

pub mod cli;
pub mod commands;
pub mod display;
pub mod errors;
pub mod selftest_command;
