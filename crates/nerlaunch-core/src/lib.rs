//! # nerlaunch Core
//!
//! The configuration contract of the word/character-level NER trainer:
//! run configuration, pre-launch validation, trainer command-line rendering,
//! checkpoint layout, plus the IOBES corpus and embedding inspection used
//! to sanity-check inputs before a long training run.
//!
//! ## Quick Start
//!
//! ```rust
//! use nerlaunch_core::{RunConfig, TrainerCommand};
//!
//! let mut config = RunConfig::default();
//! config.corpus.train = vec!["data/BC5CDR-IOBES/merge.tsv".into()];
//! config.embedding.word_dim = Some(200);
//! config.embedding.caseless = true;
//!
//! let cmd = TrainerCommand::from_config(&config);
//! assert_eq!(
//!     cmd.args(),
//!     ["--train_file", "data/BC5CDR-IOBES/merge.tsv", "--word_dim", "200", "--caseless"]
//! );
//! ```
pub mod argv;
pub mod checkpoint;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod progress;
pub mod tags;
pub mod validate;

// Re-export primary API
pub use argv::TrainerCommand;
pub use checkpoint::{CheckpointLayout, LaunchManifest};
pub use config::{
    CheckpointOptions, CorpusPaths, DeviceOptions, EmbeddingOptions, EvalMatrix, ModelOptions,
    OptimizerOptions, RunConfig, ScheduleOptions, UpdateRule,
};
pub use corpus::{load_corpus, CorpusStats, Sentence, Vocabulary};
pub use embedding::{Coverage, EmbeddingProbe};
pub use error::{LaunchError, Result};
pub use progress::ProgressTracker;
pub use tags::{iob_to_iobes, Span, Tag};
pub use validate::ValidationReport;
