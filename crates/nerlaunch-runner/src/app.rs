//! Subcommand dispatch and exit-code policy of the `nerlaunch` binary.

use std::io::Write;

use anyhow::{Context, Result};
use nerlaunch_core::LaunchError;
use tracing::info;

use crate::cli::{Cli, Commands, TrainArgs};
use crate::inspect;
use crate::launch::{Launcher, SpawnError};
use crate::settings;

/// Usage or configuration problem.
pub const EXIT_USAGE: i32 = 2;
/// The trainer program could not be started.
pub const EXIT_SPAWN: i32 = 127;
/// Any other launcher failure.
pub const EXIT_FAILURE: i32 = 1;

/// Exit code for an error that stopped the launcher before the trainer
/// could report its own.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<SpawnError>().is_some() {
        return EXIT_SPAWN;
    }
    match err.downcast_ref::<LaunchError>() {
        Some(
            LaunchError::MissingPath { .. }
            | LaunchError::UnreadablePath { .. }
            | LaunchError::NonUtf8Path { .. }
            | LaunchError::ConfigFile { .. }
            | LaunchError::InvalidConfig(_)
            | LaunchError::CheckpointNotDir(_),
        ) => EXIT_USAGE,
        _ => EXIT_FAILURE,
    }
}

fn launcher_for(args: &TrainArgs) -> Launcher {
    Launcher::new(args.launcher.python.clone(), args.launcher.script.clone())
}

/// Run one CLI invocation and return the process exit code.
pub async fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Train(args) => {
            let launcher = launcher_for(&args);
            let config = settings::resolve(args.trainer.into_config(), &args.launcher)?;
            let outcome = launcher.run(config).await?;
            Ok(outcome.exit_code())
        }
        Commands::Check(args) => {
            let launcher = launcher_for(&args);
            let config = settings::resolve(args.trainer.into_config(), &args.launcher)?;
            config.validate()?;
            info!(checkpoint = %config.checkpoint.dir().display(), "configuration is valid");
            println!("{}", launcher.command_line(&config));
            Ok(0)
        }
        Commands::InspectCorpus(args) => {
            let report = inspect::inspect_corpus(&args)?;
            print_json(&report)?;
            Ok(0)
        }
        Commands::InspectEmbedding(args) => {
            let report = inspect::inspect_embedding(&args)?;
            print_json(&report)?;
            Ok(0)
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{json}").context("Failed to write report")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_exit_codes() {
        let usage = anyhow::Error::new(LaunchError::InvalidConfig(vec!["--emb_file is required".into()]));
        assert_eq!(exit_code_for(&usage), EXIT_USAGE);

        let missing = anyhow::Error::new(LaunchError::MissingPath {
            flag: "--train_file",
            path: PathBuf::from("merge.tsv"),
        })
        .context("while launching");
        assert_eq!(exit_code_for(&missing), EXIT_USAGE);

        let config = anyhow::Error::new(LaunchError::ConfigFile {
            path: PathBuf::from("bc5cdr.json"),
            reason: "No such file or directory (os error 2)".into(),
        });
        assert_eq!(exit_code_for(&config), EXIT_USAGE);

        let spawn = anyhow::Error::new(SpawnError {
            program: "python".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        });
        assert_eq!(exit_code_for(&spawn), EXIT_SPAWN);

        let other = anyhow::anyhow!("disk full");
        assert_eq!(exit_code_for(&other), EXIT_FAILURE);
    }
}
