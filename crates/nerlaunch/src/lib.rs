//! Launcher for word/character-level NER training runs.
//!
//! This crate bundles [`core`] (run configuration, validation, corpus and
//! embedding inspection, trainer command lines) and [`runner`] (the
//! command-line front end and child process supervision).

pub use nerlaunch_core as core;
pub use nerlaunch_runner as runner;

pub use nerlaunch_core::{LaunchError, RunConfig, TrainerCommand};
pub use nerlaunch_runner::{LaunchOutcome, Launcher};
