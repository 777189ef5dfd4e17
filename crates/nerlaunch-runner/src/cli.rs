//! Command-line interface.
//!
//! Trainer flags keep the trainer's own snake_case spelling so existing
//! experiment scripts can switch to the launcher by swapping the program
//! name. Launcher-only options are kebab-case.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use nerlaunch_core::config::{
    CheckpointOptions, CorpusPaths, DeviceOptions, EmbeddingOptions, EvalMatrix, ModelOptions,
    OptimizerOptions, RunConfig, ScheduleOptions, UpdateRule,
};

/// CLI arguments
#[derive(Debug, Parser)]
#[command(name = "nerlaunch")]
#[command(about = "Validate, record and launch word/character-level NER training runs")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Validate the configuration, prepare the checkpoint directory and run the trainer
    Train(TrainArgs),
    /// Validate the configuration and print the trainer command line without running it
    Check(TrainArgs),
    /// Print statistics of IOBES-tagged corpus files as JSON
    InspectCorpus(InspectCorpusArgs),
    /// Probe a word-vector file and report its overlap with a corpus
    InspectEmbedding(InspectEmbeddingArgs),
}

#[derive(Debug, Args)]
pub struct TrainArgs {
    #[command(flatten)]
    pub launcher: LauncherArgs,

    #[command(flatten)]
    pub trainer: TrainerFlags,
}

/// Options consumed by the launcher itself, never forwarded.
#[derive(Debug, Clone, Args)]
pub struct LauncherArgs {
    /// Interpreter used to run the trainer script
    #[arg(long, env = "NERLAUNCH_PYTHON", default_value = "python")]
    pub python: String,

    /// Trainer script
    #[arg(long, env = "NERLAUNCH_SCRIPT", default_value = "train_wc.py")]
    pub script: PathBuf,

    /// JSON file with a partial run configuration; flags given here override it
    #[arg(long, env = "NERLAUNCH_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Ignore the per-user default configuration file
    #[arg(long)]
    pub no_default_config: bool,
}

/// Flags forwarded to the trainer. Unset values are not forwarded.
#[derive(Debug, Clone, Default, Args)]
pub struct TrainerFlags {
    /// Training split(s), TSV with IOBES tags
    #[arg(long = "train_file", value_name = "FILE", num_args = 1.., action = ArgAction::Append)]
    pub train_file: Vec<PathBuf>,

    /// Validation split(s), one per training file
    #[arg(long = "dev_file", value_name = "FILE", num_args = 1.., action = ArgAction::Append)]
    pub dev_file: Vec<PathBuf>,

    /// Test split(s), one per training file
    #[arg(long = "test_file", value_name = "FILE", num_args = 1.., action = ArgAction::Append)]
    pub test_file: Vec<PathBuf>,

    /// Pretrained word-vector file
    #[arg(long = "emb_file", value_name = "FILE")]
    pub emb_file: Option<PathBuf>,

    /// Word embedding dimension [trainer default: 100]
    #[arg(long = "word_dim")]
    pub word_dim: Option<u32>,

    /// Case-insensitive words
    #[arg(long = "caseless")]
    pub caseless: bool,

    /// Fine-tune pretrained embeddings
    #[arg(long = "fine_tune")]
    pub fine_tune: bool,

    /// Keep only embedding rows of words that occur in the corpora
    #[arg(long = "shrink_embedding")]
    pub shrink_embedding: bool,

    /// Randomly initialise word embeddings
    #[arg(long = "rand_embedding")]
    pub rand_embedding: bool,

    /// Minimum word frequency to enter the vocabulary [trainer default: 5]
    #[arg(long = "mini_count")]
    pub mini_count: Option<u32>,

    /// Unknown-word token [trainer default: unk]
    #[arg(long = "unk")]
    pub unk: Option<String>,

    /// Enable the word-level attention encoder
    #[arg(long = "attention")]
    pub attention: bool,

    /// Character embedding dimension [trainer default: 30]
    #[arg(long = "char_dim")]
    pub char_dim: Option<u32>,

    /// Character LSTM hidden size [trainer default: 300]
    #[arg(long = "char_hidden")]
    pub char_hidden: Option<u32>,

    /// Word LSTM hidden size [trainer default: 300]
    #[arg(long = "word_hidden")]
    pub word_hidden: Option<u32>,

    /// Character LSTM layers [trainer default: 1]
    #[arg(long = "char_layers")]
    pub char_layers: Option<u32>,

    /// Word LSTM layers [trainer default: 1]
    #[arg(long = "word_layers")]
    pub word_layers: Option<u32>,

    /// Dropout ratio [trainer default: 0.55]
    #[arg(long = "drop_out")]
    pub drop_out: Option<f64>,

    /// Use the small CRF layer
    #[arg(long = "small_crf")]
    pub small_crf: bool,

    /// Add highway layers
    #[arg(long = "high_way")]
    pub high_way: bool,

    /// Number of highway layers [trainer default: 1]
    #[arg(long = "highway_layers")]
    pub highway_layers: Option<u32>,

    /// Co-train the character-level language model
    #[arg(long = "co_train")]
    pub co_train: bool,

    /// Language-model loss weight when co-training [trainer default: 1]
    #[arg(long = "lambda0")]
    pub lambda0: Option<f64>,

    /// Optimizer [trainer default: sgd]
    #[arg(long = "update", value_name = "sgd|adam")]
    pub update: Option<UpdateRule>,

    /// Initial learning rate [trainer default: 0.015]
    #[arg(long = "lr")]
    pub lr: Option<f64>,

    /// Learning-rate decay [trainer default: 0.05]
    #[arg(long = "lr_decay")]
    pub lr_decay: Option<f64>,

    /// SGD momentum [trainer default: 0.9]
    #[arg(long = "momentum")]
    pub momentum: Option<f64>,

    /// Gradient clipping norm [trainer default: 5.0]
    #[arg(long = "clip_grad")]
    pub clip_grad: Option<f64>,

    /// Batch size [trainer default: 10]
    #[arg(long = "batch_size")]
    pub batch_size: Option<u32>,

    /// Maximum number of epochs [trainer default: 200]
    #[arg(long = "epoch")]
    pub epoch: Option<u32>,

    /// First epoch number, for resumed runs [trainer default: 0]
    #[arg(long = "start_epoch")]
    pub start_epoch: Option<u32>,

    /// Early-stopping patience in epochs [trainer default: 15]
    #[arg(long = "patience")]
    pub patience: Option<u32>,

    /// Minimum number of epochs before early stopping [trainer default: 50]
    #[arg(long = "least_iters")]
    pub least_iters: Option<u32>,

    /// Model-selection metric [trainer default: fa]
    #[arg(long = "eva_matrix", value_name = "a|fa")]
    pub eva_matrix: Option<EvalMatrix>,

    /// GPU index [trainer default: 0]
    #[arg(long = "gpu")]
    pub gpu: Option<u32>,

    /// Output directory for model state [trainer default: ./checkpoint/]
    #[arg(long = "checkpoint", value_name = "DIR")]
    pub checkpoint: Option<PathBuf>,

    /// Checkpoint to resume from
    #[arg(long = "load_check_point", value_name = "FILE")]
    pub load_check_point: Option<PathBuf>,

    /// Also restore optimizer state when resuming
    #[arg(long = "load_opt")]
    pub load_opt: bool,
}

impl TrainerFlags {
    pub fn into_config(self) -> RunConfig {
        RunConfig {
            corpus: CorpusPaths {
                train: self.train_file,
                dev: self.dev_file,
                test: self.test_file,
            },
            embedding: EmbeddingOptions {
                emb_file: self.emb_file,
                word_dim: self.word_dim,
                caseless: self.caseless,
                fine_tune: self.fine_tune,
                shrink_embedding: self.shrink_embedding,
                rand_embedding: self.rand_embedding,
                mini_count: self.mini_count,
                unk: self.unk,
            },
            model: ModelOptions {
                attention: self.attention,
                char_dim: self.char_dim,
                char_hidden: self.char_hidden,
                word_hidden: self.word_hidden,
                char_layers: self.char_layers,
                word_layers: self.word_layers,
                drop_out: self.drop_out,
                small_crf: self.small_crf,
                high_way: self.high_way,
                highway_layers: self.highway_layers,
                co_train: self.co_train,
                lambda0: self.lambda0,
            },
            optimizer: OptimizerOptions {
                update: self.update,
                lr: self.lr,
                lr_decay: self.lr_decay,
                momentum: self.momentum,
                clip_grad: self.clip_grad,
                batch_size: self.batch_size,
            },
            schedule: ScheduleOptions {
                epoch: self.epoch,
                start_epoch: self.start_epoch,
                patience: self.patience,
                least_iters: self.least_iters,
                eva_matrix: self.eva_matrix,
            },
            device: DeviceOptions { gpu: self.gpu },
            checkpoint: CheckpointOptions {
                checkpoint: self.checkpoint,
                load_check_point: self.load_check_point,
                load_opt: self.load_opt,
            },
        }
    }
}

#[derive(Debug, Args)]
pub struct InspectCorpusArgs {
    /// Corpus files to read
    #[arg(required = true, value_name = "FILE")]
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Args)]
pub struct InspectEmbeddingArgs {
    /// Pretrained word-vector file
    #[arg(long = "emb_file", value_name = "FILE")]
    pub emb_file: PathBuf,

    /// Expected dimension
    #[arg(long = "word_dim")]
    pub word_dim: Option<u32>,

    /// Match words case-insensitively
    #[arg(long = "caseless")]
    pub caseless: bool,

    /// Corpus files to measure coverage against (scans the whole embedding file)
    #[arg(long, value_name = "FILE", num_args = 1.., action = ArgAction::Append)]
    pub corpus: Vec<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn train_config(args: &[&str]) -> RunConfig {
        let argv = std::iter::once("nerlaunch")
            .chain(std::iter::once("train"))
            .chain(args.iter().copied());
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Train(train) => train.trainer.into_config(),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    const ATTENTION_RUN: &[&str] = &[
        "--train_file", "merge.tsv",
        "--dev_file", "devel.tsv",
        "--test_file", "test.tsv",
        "--caseless", "--fine_tune",
        "--emb_file", "embedding/wikipedia-pubmed-and-PMC-w2v.txt",
        "--word_dim", "200",
        "--gpu", "0",
        "--shrink_embedding",
        "--patience", "30",
        "--epoch", "100",
        "--attention",
        "--checkpoint", "./checkpoint/attention/",
    ];

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_attention_run() {
        let config = train_config(ATTENTION_RUN);
        assert_eq!(config.corpus.train, vec![PathBuf::from("merge.tsv")]);
        assert_eq!(config.embedding.word_dim, Some(200));
        assert_eq!(config.device.gpu, Some(0));
        assert_eq!(config.schedule.patience, Some(30));
        assert_eq!(config.schedule.epoch, Some(100));
        assert!(config.embedding.caseless);
        assert!(config.embedding.fine_tune);
        assert!(config.embedding.shrink_embedding);
        assert!(config.model.attention);
        assert_eq!(
            config.checkpoint.checkpoint,
            Some(PathBuf::from("./checkpoint/attention/"))
        );
    }

    #[test]
    fn test_flag_order_does_not_matter() {
        let forward = train_config(ATTENTION_RUN);

        // Reverse the flag/value groups
        let mut groups: Vec<Vec<&str>> = Vec::new();
        for &arg in ATTENTION_RUN {
            if arg.starts_with("--") {
                groups.push(vec![arg]);
            } else if let Some(group) = groups.last_mut() {
                group.push(arg);
            }
        }
        groups.reverse();
        let reversed: Vec<&str> = groups.into_iter().flatten().collect();

        assert_eq!(train_config(&reversed), forward);
    }

    #[test]
    fn test_toggles_default_to_false() {
        let config = train_config(&["--train_file", "merge.tsv"]);
        assert!(!config.embedding.caseless);
        assert!(!config.embedding.fine_tune);
        assert!(!config.embedding.shrink_embedding);
        assert!(!config.model.attention);
        assert_eq!(config.embedding.word_dim, None);
    }

    #[test]
    fn test_negative_integers_are_rejected() {
        for flag in ["--word_dim", "--gpu", "--patience", "--epoch"] {
            let result = Cli::try_parse_from(["nerlaunch", "train", flag, "-1"]);
            assert!(result.is_err(), "{flag} accepted -1");
        }
        assert!(Cli::try_parse_from(["nerlaunch", "train", "--epoch", "ten"]).is_err());
    }

    #[test]
    fn test_multi_file_splits() {
        let config = train_config(&[
            "--train_file", "bc5cdr.tsv", "bc4chemd.tsv",
            "--dev_file", "bc5cdr-dev.tsv",
            "--dev_file", "bc4chemd-dev.tsv",
        ]);
        assert_eq!(config.corpus.train.len(), 2);
        assert_eq!(config.corpus.dev.len(), 2);
    }

    #[test]
    fn test_enum_flags() {
        let config = train_config(&["--update", "adam", "--eva_matrix", "a"]);
        assert_eq!(config.optimizer.update, Some(UpdateRule::Adam));
        assert_eq!(config.schedule.eva_matrix, Some(EvalMatrix::A));
        assert!(Cli::try_parse_from(["nerlaunch", "train", "--update", "rmsprop"]).is_err());
    }

    #[test]
    fn test_launcher_defaults() {
        let cli = Cli::try_parse_from(["nerlaunch", "check", "--python", "python3"]).unwrap();
        match cli.command {
            Commands::Check(args) => {
                assert_eq!(args.launcher.python, "python3");
                assert!(!args.launcher.no_default_config);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
