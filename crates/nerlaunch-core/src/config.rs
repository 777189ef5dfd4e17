//! Run configuration for one trainer invocation.
//!
//! Every scalar is optional: `None` means "not given", and the flag is then
//! left out of the trainer command line so the trainer's own default
//! applies. Presence-only toggles are plain `bool`s.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{LaunchError, Result};

/// Checkpoint directory the trainer falls back to when `--checkpoint` is absent.
pub const DEFAULT_CHECKPOINT_DIR: &str = "./checkpoint/";

/// Optimizer update rule accepted by `--update`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateRule {
    Sgd,
    Adam,
}

impl FromStr for UpdateRule {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "sgd" => Ok(UpdateRule::Sgd),
            "adam" => Ok(UpdateRule::Adam),
            other => Err(format!("unknown update rule {other:?}, expected sgd or adam")),
        }
    }
}

impl fmt::Display for UpdateRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateRule::Sgd => write!(f, "sgd"),
            UpdateRule::Adam => write!(f, "adam"),
        }
    }
}

/// Model-selection metric accepted by `--eva_matrix`: accuracy or F1 + accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvalMatrix {
    A,
    Fa,
}

impl FromStr for EvalMatrix {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "a" => Ok(EvalMatrix::A),
            "fa" => Ok(EvalMatrix::Fa),
            other => Err(format!("unknown evaluation matrix {other:?}, expected a or fa")),
        }
    }
}

impl fmt::Display for EvalMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalMatrix::A => write!(f, "a"),
            EvalMatrix::Fa => write!(f, "fa"),
        }
    }
}

fn fill<T>(slot: &mut Option<T>, base: Option<T>) {
    if slot.is_none() {
        *slot = base;
    }
}

fn fill_paths(slot: &mut Vec<PathBuf>, base: Vec<PathBuf>) {
    if slot.is_empty() {
        *slot = base;
    }
}

/// Train/dev/test splits. Several files per split select the multi-task
/// trainer, which keeps one CRF head per training file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusPaths {
    pub train: Vec<PathBuf>,
    pub dev: Vec<PathBuf>,
    pub test: Vec<PathBuf>,
}

impl CorpusPaths {
    /// Every split file together with the flag it came from.
    pub fn flagged(&self) -> impl Iterator<Item = (&'static str, &PathBuf)> {
        let train = self.train.iter().map(|p| ("--train_file", p));
        let dev = self.dev.iter().map(|p| ("--dev_file", p));
        let test = self.test.iter().map(|p| ("--test_file", p));
        train.chain(dev).chain(test)
    }

    fn merge_from(&mut self, base: CorpusPaths) {
        fill_paths(&mut self.train, base.train);
        fill_paths(&mut self.dev, base.dev);
        fill_paths(&mut self.test, base.test);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingOptions {
    pub emb_file: Option<PathBuf>,
    pub word_dim: Option<u32>,
    pub caseless: bool,
    pub fine_tune: bool,
    pub shrink_embedding: bool,
    pub rand_embedding: bool,
    /// Minimum corpus frequency for a word to enter the vocabulary.
    pub mini_count: Option<u32>,
    /// Token the trainer uses for unknown words.
    pub unk: Option<String>,
}

impl EmbeddingOptions {
    fn merge_from(&mut self, base: EmbeddingOptions) {
        fill(&mut self.emb_file, base.emb_file);
        fill(&mut self.word_dim, base.word_dim);
        fill(&mut self.mini_count, base.mini_count);
        fill(&mut self.unk, base.unk);
        self.caseless |= base.caseless;
        self.fine_tune |= base.fine_tune;
        self.shrink_embedding |= base.shrink_embedding;
        self.rand_embedding |= base.rand_embedding;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelOptions {
    pub attention: bool,
    pub char_dim: Option<u32>,
    pub char_hidden: Option<u32>,
    pub word_hidden: Option<u32>,
    pub char_layers: Option<u32>,
    pub word_layers: Option<u32>,
    pub drop_out: Option<f64>,
    pub small_crf: bool,
    pub high_way: bool,
    pub highway_layers: Option<u32>,
    pub co_train: bool,
    /// Weight of the language-model loss when co-training.
    pub lambda0: Option<f64>,
}

impl ModelOptions {
    fn merge_from(&mut self, base: ModelOptions) {
        fill(&mut self.char_dim, base.char_dim);
        fill(&mut self.char_hidden, base.char_hidden);
        fill(&mut self.word_hidden, base.word_hidden);
        fill(&mut self.char_layers, base.char_layers);
        fill(&mut self.word_layers, base.word_layers);
        fill(&mut self.drop_out, base.drop_out);
        fill(&mut self.highway_layers, base.highway_layers);
        fill(&mut self.lambda0, base.lambda0);
        self.attention |= base.attention;
        self.small_crf |= base.small_crf;
        self.high_way |= base.high_way;
        self.co_train |= base.co_train;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerOptions {
    pub update: Option<UpdateRule>,
    pub lr: Option<f64>,
    pub lr_decay: Option<f64>,
    pub momentum: Option<f64>,
    pub clip_grad: Option<f64>,
    pub batch_size: Option<u32>,
}

impl OptimizerOptions {
    fn merge_from(&mut self, base: OptimizerOptions) {
        fill(&mut self.update, base.update);
        fill(&mut self.lr, base.lr);
        fill(&mut self.lr_decay, base.lr_decay);
        fill(&mut self.momentum, base.momentum);
        fill(&mut self.clip_grad, base.clip_grad);
        fill(&mut self.batch_size, base.batch_size);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleOptions {
    pub epoch: Option<u32>,
    pub start_epoch: Option<u32>,
    /// Early-stopping patience in epochs.
    pub patience: Option<u32>,
    pub least_iters: Option<u32>,
    pub eva_matrix: Option<EvalMatrix>,
}

impl ScheduleOptions {
    fn merge_from(&mut self, base: ScheduleOptions) {
        fill(&mut self.epoch, base.epoch);
        fill(&mut self.start_epoch, base.start_epoch);
        fill(&mut self.patience, base.patience);
        fill(&mut self.least_iters, base.least_iters);
        fill(&mut self.eva_matrix, base.eva_matrix);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceOptions {
    pub gpu: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointOptions {
    pub checkpoint: Option<PathBuf>,
    pub load_check_point: Option<PathBuf>,
    pub load_opt: bool,
}

impl CheckpointOptions {
    /// The directory the trainer will write to.
    pub fn dir(&self) -> PathBuf {
        self.checkpoint
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CHECKPOINT_DIR))
    }

    fn merge_from(&mut self, base: CheckpointOptions) {
        fill(&mut self.checkpoint, base.checkpoint);
        fill(&mut self.load_check_point, base.load_check_point);
        self.load_opt |= base.load_opt;
    }
}

/// The full, immutable configuration of one training run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub corpus: CorpusPaths,
    pub embedding: EmbeddingOptions,
    pub model: ModelOptions,
    pub optimizer: OptimizerOptions,
    pub schedule: ScheduleOptions,
    pub device: DeviceOptions,
    pub checkpoint: CheckpointOptions,
}

impl RunConfig {
    /// Load a (possibly partial) configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config_error = |reason: String| LaunchError::ConfigFile {
            path: path.to_path_buf(),
            reason,
        };
        let text = fs::read_to_string(path).map_err(|e| config_error(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| config_error(e.to_string()))
    }

    /// Fill every field not set here from `base`. Values already present
    /// win; toggles are OR-ed since a presence-only flag cannot be unset.
    pub fn merge_from(&mut self, base: RunConfig) {
        self.corpus.merge_from(base.corpus);
        self.embedding.merge_from(base.embedding);
        self.model.merge_from(base.model);
        self.optimizer.merge_from(base.optimizer);
        self.schedule.merge_from(base.schedule);
        fill(&mut self.device.gpu, base.device.gpu);
        self.checkpoint.merge_from(base.checkpoint);
    }

    /// Convenience wrapper around [`RunConfig::merge_from`].
    pub fn merged_over(mut self, base: RunConfig) -> Self {
        self.merge_from(base);
        self
    }
}
