//! Tracing subscriber setup for the `nerlaunch` binary.

use tracing::Level;

/// Map `-q`/`-v` to a maximum log level.
pub fn level_for(verbose: u8, quiet: bool) -> Level {
    match (quiet, verbose) {
        (true, _) => Level::WARN,
        (false, 0) => Level::INFO,
        (false, 1) => Level::DEBUG,
        (false, _) => Level::TRACE,
    }
}

/// Install the global subscriber. Logs go to stderr so the trainer's own
/// stdout stays clean when piped.
pub fn init(verbose: u8, quiet: bool) {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level_for(verbose, quiet))
        .with_target(false)
        .with_writer(std::io::stderr);

    // Already installed (tests, embedding applications)
    let _ = subscriber.try_init();
}
