//! Configuration layering: per-user default file, explicit `--config` file,
//! then command-line flags on top.

use std::path::{Path, PathBuf};

use anyhow::Result;
use nerlaunch_core::RunConfig;
use tracing::debug;

use crate::cli::LauncherArgs;

/// Per-user default configuration file
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("nerlaunch").join("config.json"))
}

fn load(path: &Path) -> Result<RunConfig> {
    Ok(RunConfig::from_json_file(path)?)
}

/// Pick the configuration file to layer under the command line, if any.
///
/// An explicit `--config` must exist; the per-user default is only used
/// when present.
pub fn config_file(launcher: &LauncherArgs, default: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = &launcher.config {
        return Some(path.clone());
    }
    if launcher.no_default_config {
        return None;
    }
    default.filter(|path| path.is_file())
}

/// Merge the command-line configuration over the selected file.
pub fn resolve(cli: RunConfig, launcher: &LauncherArgs) -> Result<RunConfig> {
    match config_file(launcher, default_config_path()) {
        Some(path) => {
            debug!(path = %path.display(), "layering configuration file");
            Ok(cli.merged_over(load(&path)?))
        }
        None => Ok(cli),
    }
}
