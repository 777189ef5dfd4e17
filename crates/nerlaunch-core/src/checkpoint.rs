//! Checkpoint directory layout.
//!
//! The trainer owns the directory and its model files. The launcher only
//! adds `launch.json` (what was run and how it ended) and `train.log`
//! (the trainer's console output).

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::argv::TrainerCommand;
use crate::config::RunConfig;
use crate::error::{LaunchError, Result};

pub const MANIFEST_FILE: &str = "launch.json";
pub const LOG_FILE: &str = "train.log";

/// Record of one launch, rewritten when the trainer exits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchManifest {
    pub config: RunConfig,
    pub program: String,
    pub script: String,
    pub argv: TrainerCommand,
    pub started_at_unix: u64,
    pub finished_at_unix: Option<u64>,
    pub exit_code: Option<i32>,
    /// Last epoch number seen in trainer output.
    pub last_epoch: Option<u32>,
    /// Best dev F1 seen in trainer output.
    pub best_f1: Option<f64>,
    /// Test F1 reported with the best dev F1.
    #[serde(default)]
    pub test_f1: Option<f64>,
}

impl LaunchManifest {
    pub fn new(config: RunConfig, program: &str, script: &str) -> Self {
        let argv = TrainerCommand::from_config(&config);
        Self {
            config,
            program: program.to_string(),
            script: script.to_string(),
            argv,
            started_at_unix: unix_now(),
            finished_at_unix: None,
            exit_code: None,
            last_epoch: None,
            best_f1: None,
            test_f1: None,
        }
    }

    pub fn finish(&mut self, exit_code: Option<i32>) {
        self.finished_at_unix = Some(unix_now());
        self.exit_code = exit_code;
    }
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[derive(Debug, Clone)]
pub struct CheckpointLayout {
    root: PathBuf,
}

impl CheckpointLayout {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn for_config(config: &RunConfig) -> Self {
        Self::new(config.checkpoint.dir())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn log_path(&self) -> PathBuf {
        self.root.join(LOG_FILE)
    }

    /// Create the directory (and parents) if absent.
    pub fn ensure(&self) -> Result<()> {
        if self.root.exists() && !self.root.is_dir() {
            return Err(LaunchError::CheckpointNotDir(self.root.clone()));
        }
        if !self.root.exists() {
            fs::create_dir_all(&self.root)?;
            info!(path = %self.root.display(), "created checkpoint directory");
        }
        Ok(())
    }

    pub fn write_manifest(&self, manifest: &LaunchManifest) -> Result<()> {
        let json = serde_json::to_string_pretty(manifest)?;
        fs::write(self.manifest_path(), json)?;
        Ok(())
    }

    pub fn read_manifest(&self) -> Result<LaunchManifest> {
        let text = fs::read_to_string(self.manifest_path())?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Open the log for appending so resumed runs keep earlier output.
    pub fn open_log(&self) -> Result<File> {
        Ok(OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path())?)
    }
}
