//! Pre-launch validation of a [`RunConfig`].
//!
//! All problems are collected in one pass and reported together.

use std::fs::File;
use std::path::Path;

use tracing::{debug, warn};

use crate::config::RunConfig;
use crate::embedding::{self, EmbeddingProbe};
use crate::error::{LaunchError, Result};

/// Outcome of a successful validation.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Suspicious but non-fatal settings.
    pub warnings: Vec<String>,
    /// Probe of the embedding file, when one was readable.
    pub embedding: Option<EmbeddingProbe>,
}

/// Fail unless `path` is valid UTF-8, exists and can be opened for reading
/// as a file.
pub fn check_readable(flag: &'static str, path: &Path) -> Result<()> {
    check_utf8(flag, path)?;
    if !path.exists() {
        return Err(LaunchError::MissingPath {
            flag,
            path: path.to_path_buf(),
        });
    }
    if path.is_dir() {
        return Err(LaunchError::UnreadablePath {
            flag,
            path: path.to_path_buf(),
            source: std::io::Error::other("is a directory"),
        });
    }
    File::open(path).map_err(|source| LaunchError::UnreadablePath {
        flag,
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// The trainer receives paths as text, so they must survive the trip.
pub fn check_utf8(flag: &'static str, path: &Path) -> Result<()> {
    match path.to_str() {
        Some(_) => Ok(()),
        None => Err(LaunchError::NonUtf8Path {
            flag,
            path: path.to_path_buf(),
        }),
    }
}

fn check_range(
    errors: &mut Vec<String>,
    flag: &str,
    value: Option<f64>,
    ok: impl Fn(f64) -> bool,
    expected: &str,
) {
    if let Some(v) = value {
        if !v.is_finite() || !ok(v) {
            errors.push(format!("{flag} must be {expected}, got {v}"));
        }
    }
}

impl RunConfig {
    /// Check the configuration against the filesystem and value ranges.
    pub fn validate(&self) -> Result<ValidationReport> {
        let mut errors = Vec::new();
        let mut report = ValidationReport::default();

        self.validate_paths(&mut errors, &mut report);
        self.validate_values(&mut errors);
        self.collect_warnings(&mut report.warnings);

        for warning in &report.warnings {
            warn!("{warning}");
        }

        if errors.is_empty() {
            debug!("run configuration is valid");
            Ok(report)
        } else {
            Err(LaunchError::InvalidConfig(errors))
        }
    }

    fn validate_paths(&self, errors: &mut Vec<String>, report: &mut ValidationReport) {
        let corpus = &self.corpus;
        for (flag, paths) in [
            ("--train_file", &corpus.train),
            ("--dev_file", &corpus.dev),
            ("--test_file", &corpus.test),
        ] {
            if paths.is_empty() {
                errors.push(format!("{flag} is required"));
            }
        }

        let trains = corpus.train.len();
        for (flag, count) in [("--dev_file", corpus.dev.len()), ("--test_file", corpus.test.len())] {
            if trains > 0 && count > 0 && count != trains {
                errors.push(format!(
                    "{flag} lists {count} file(s) but --train_file lists {trains}"
                ));
            }
        }

        for (flag, path) in corpus.flagged() {
            if let Err(e) = check_readable(flag, path) {
                errors.push(e.to_string());
            }
        }

        match &self.embedding.emb_file {
            None => errors.push("--emb_file is required".to_string()),
            Some(path) => match check_readable("--emb_file", path) {
                Err(e) => errors.push(e.to_string()),
                Ok(()) => match embedding::probe(path) {
                    Ok(probe) => {
                        if let Some(dim) = self.embedding.word_dim {
                            if !self.embedding.rand_embedding && probe.dimension != dim as usize {
                                errors.push(format!(
                                    "--word_dim is {dim} but {} has {}-dimensional vectors",
                                    path.display(),
                                    probe.dimension
                                ));
                            }
                        }
                        report.embedding = Some(probe);
                    }
                    Err(e) => errors.push(e.to_string()),
                },
            },
        }

        if let Some(path) = &self.checkpoint.load_check_point {
            if let Err(e) = check_readable("--load_check_point", path) {
                errors.push(e.to_string());
            }
        }

        if let Some(dir) = &self.checkpoint.checkpoint {
            if let Err(e) = check_utf8("--checkpoint", dir) {
                errors.push(e.to_string());
            } else if dir.exists() && !dir.is_dir() {
                errors.push(LaunchError::CheckpointNotDir(dir.clone()).to_string());
            }
        }
    }

    fn validate_values(&self, errors: &mut Vec<String>) {
        let model = &self.model;
        let opt = &self.optimizer;
        let schedule = &self.schedule;

        check_range(errors, "--drop_out", model.drop_out, |v| (0.0..1.0).contains(&v), "in [0, 1)");
        check_range(errors, "--lambda0", model.lambda0, |v| v >= 0.0, "non-negative");
        check_range(errors, "--lr", opt.lr, |v| v > 0.0, "positive");
        check_range(errors, "--lr_decay", opt.lr_decay, |v| v >= 0.0, "non-negative");
        check_range(errors, "--momentum", opt.momentum, |v| (0.0..=1.0).contains(&v), "in [0, 1]");
        check_range(errors, "--clip_grad", opt.clip_grad, |v| v > 0.0, "positive");

        if opt.batch_size == Some(0) {
            errors.push("--batch_size must be at least 1".to_string());
        }
        if schedule.epoch == Some(0) {
            errors.push("--epoch must be at least 1".to_string());
        }
        if let (Some(start), Some(epoch)) = (schedule.start_epoch, schedule.epoch) {
            if start >= epoch {
                errors.push(format!(
                    "--start_epoch ({start}) must be lower than --epoch ({epoch})"
                ));
            }
        }
    }

    fn collect_warnings(&self, warnings: &mut Vec<String>) {
        if self.model.highway_layers.is_some() && !self.model.high_way {
            warnings.push("--highway_layers has no effect without --high_way".to_string());
        }
        if self.model.lambda0.is_some() && !self.model.co_train {
            warnings.push("--lambda0 has no effect without --co_train".to_string());
        }
        if self.checkpoint.load_opt && self.checkpoint.load_check_point.is_none() {
            warnings.push("--load_opt has no effect without --load_check_point".to_string());
        }
        if self.embedding.rand_embedding && self.embedding.fine_tune {
            warnings.push("--fine_tune is implied by --rand_embedding".to_string());
        }
    }
}
