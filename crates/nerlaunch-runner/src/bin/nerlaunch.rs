use std::process::ExitCode;

use clap::Parser;
use nerlaunch_runner::{exit_code_for, logging, run, Cli};
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet);

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            exit_code_for(&e)
        }
    };

    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
