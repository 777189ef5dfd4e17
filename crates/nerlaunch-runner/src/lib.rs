//! # nerlaunch Runner
//!
//! Command-line front end and process supervision for the external NER
//! trainer: flag parsing, configuration layering, logging setup and the
//! launcher that runs the trainer and hands back its exit status.

pub mod app;
pub mod cli;
pub mod inspect;
pub mod launch;
pub mod logging;
pub mod settings;

pub use app::{exit_code_for, run};
pub use cli::Cli;
pub use launch::{LaunchOutcome, Launcher, SpawnError};
