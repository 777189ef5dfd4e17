//! Rendering a [`RunConfig`] into the trainer's command line.
//!
//! Flags are emitted in a fixed order, so the same configuration always
//! produces the same argument vector regardless of how it was assembled.

use std::ffi::OsString;
use std::fmt::Display;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::RunConfig;

/// Argument vector for the external trainer, without the program and script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainerCommand {
    args: Vec<String>,
}

impl TrainerCommand {
    pub fn from_config(config: &RunConfig) -> Self {
        let mut cmd = Self::default();

        let corpus = &config.corpus;
        cmd.paths("--train_file", &corpus.train);
        cmd.paths("--dev_file", &corpus.dev);
        cmd.paths("--test_file", &corpus.test);

        let emb = &config.embedding;
        cmd.path("--emb_file", emb.emb_file.as_ref());
        cmd.value("--word_dim", emb.word_dim);
        cmd.toggle("--caseless", emb.caseless);
        cmd.toggle("--fine_tune", emb.fine_tune);
        cmd.toggle("--shrink_embedding", emb.shrink_embedding);
        cmd.toggle("--rand_embedding", emb.rand_embedding);
        cmd.value("--mini_count", emb.mini_count);
        cmd.value("--unk", emb.unk.as_ref());

        let model = &config.model;
        cmd.toggle("--attention", model.attention);
        cmd.value("--char_dim", model.char_dim);
        cmd.value("--char_hidden", model.char_hidden);
        cmd.value("--word_hidden", model.word_hidden);
        cmd.value("--char_layers", model.char_layers);
        cmd.value("--word_layers", model.word_layers);
        cmd.value("--drop_out", model.drop_out);
        cmd.toggle("--small_crf", model.small_crf);
        cmd.toggle("--high_way", model.high_way);
        cmd.value("--highway_layers", model.highway_layers);
        cmd.toggle("--co_train", model.co_train);
        cmd.value("--lambda0", model.lambda0);

        let opt = &config.optimizer;
        cmd.value("--update", opt.update);
        cmd.value("--lr", opt.lr);
        cmd.value("--lr_decay", opt.lr_decay);
        cmd.value("--momentum", opt.momentum);
        cmd.value("--clip_grad", opt.clip_grad);
        cmd.value("--batch_size", opt.batch_size);

        let schedule = &config.schedule;
        cmd.value("--epoch", schedule.epoch);
        cmd.value("--start_epoch", schedule.start_epoch);
        cmd.value("--patience", schedule.patience);
        cmd.value("--least_iters", schedule.least_iters);
        cmd.value("--eva_matrix", schedule.eva_matrix);

        cmd.value("--gpu", config.device.gpu);

        let ckpt = &config.checkpoint;
        cmd.path("--checkpoint", ckpt.checkpoint.as_ref());
        cmd.path("--load_check_point", ckpt.load_check_point.as_ref());
        cmd.toggle("--load_opt", ckpt.load_opt);

        cmd
    }

    fn toggle(&mut self, flag: &str, on: bool) {
        if on {
            self.args.push(flag.to_string());
        }
    }

    fn value<T: Display>(&mut self, flag: &str, value: Option<T>) {
        if let Some(v) = value {
            self.args.push(flag.to_string());
            self.args.push(v.to_string());
        }
    }

    // Paths are checked for UTF-8 during validation, so `display` is lossless here.
    fn path(&mut self, flag: &str, path: Option<&PathBuf>) {
        self.value(flag, path.map(|p| p.display()));
    }

    fn paths(&mut self, flag: &str, paths: &[PathBuf]) {
        if paths.is_empty() {
            return;
        }
        self.args.push(flag.to_string());
        self.args
            .extend(paths.iter().map(|p| p.display().to_string()));
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn to_os_args(&self) -> Vec<OsString> {
        self.args.iter().map(OsString::from).collect()
    }

    /// Shell-style rendering for logs and `check` output.
    pub fn render(&self, program: &str, script: &str) -> String {
        std::iter::once(program)
            .chain(std::iter::once(script))
            .chain(self.args.iter().map(String::as_str))
            .map(shell_quote)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}
