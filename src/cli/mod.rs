//! Command-line adapter

pub mod args;
pub mod commands;
pub mod host;

pub use args::{Cli, Commands, LogFormat};
