//! # Pretrained Embedding Probe
//!
//! Cheap inspection of word-vector files before handing them to the trainer.
//! Files are `word v1 ... vd` per line, optionally gzip-compressed and
//! optionally preceded by a word2vec-style `<count> <dim>` header.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use serde::Serialize;
use tracing::debug;

use crate::corpus::Vocabulary;
use crate::error::{LaunchError, Result};

/// What the first lines of an embedding file reveal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbeddingProbe {
    pub path: PathBuf,
    /// Number of vector components per word.
    pub dimension: usize,
    /// Whether a `<count> <dim>` header line was found.
    pub has_header: bool,
    pub compressed: bool,
}

/// Vocabulary overlap between a corpus and an embedding file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Coverage {
    /// Distinct corpus words.
    pub vocab_size: usize,
    /// Corpus words that have a vector.
    pub covered: usize,
    /// Vector rows in the file.
    pub embedding_rows: usize,
    /// Rows that survive when the embedding is shrunk to the corpus.
    pub kept_rows_if_shrunk: usize,
}

impl Coverage {
    /// Fraction of the corpus vocabulary that has a vector.
    pub fn ratio(&self) -> f64 {
        if self.vocab_size == 0 {
            0.0
        } else {
            self.covered as f64 / self.vocab_size as f64
        }
    }
}

fn is_gzip(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}

fn open_lines(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path)?;
    let reader: Box<dyn Read> = if is_gzip(path) {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    Ok(Box::new(BufReader::new(reader)))
}

/// A `<count> <dim>` line: exactly two non-negative integers.
fn parse_header(line: &str) -> Option<(usize, usize)> {
    let mut parts = line.split_ascii_whitespace();
    let count = parts.next()?.parse().ok()?;
    let dim = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((count, dim))
}

/// Split a vector line into its word and component count.
fn split_vector_line(line: &str) -> Option<(&str, usize)> {
    let mut parts = line.split_ascii_whitespace();
    let word = parts.next()?;
    let dim = parts.count();
    (dim > 0).then_some((word, dim))
}

/// Read the first vector line and report the embedding dimension.
pub fn probe<P: AsRef<Path>>(path: P) -> Result<EmbeddingProbe> {
    let path = path.as_ref();
    let mut lines = open_lines(path)?.lines();
    let malformed = |reason: &str| LaunchError::Embedding {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let first = loop {
        match lines.next() {
            Some(line) => {
                let line = line?;
                if !line.trim().is_empty() {
                    break line;
                }
            }
            None => return Err(malformed("file has no vectors")),
        }
    };

    let (has_header, vector_line) = match parse_header(&first) {
        Some((count, dim)) => {
            debug!(count, dim, "embedding file has a word2vec header");
            let next = lines
                .next()
                .transpose()?
                .ok_or_else(|| malformed("header is not followed by any vector"))?;
            (true, next)
        }
        None => (false, first),
    };

    let (_, dimension) =
        split_vector_line(&vector_line).ok_or_else(|| malformed("first vector line has no components"))?;

    Ok(EmbeddingProbe {
        path: path.to_path_buf(),
        dimension,
        has_header,
        compressed: is_gzip(path),
    })
}

/// Scan the whole file and measure its overlap with `vocab`.
///
/// Words are folded the same way the vocabulary folds them, so a caseless
/// vocabulary matches `Aspirin` against an `aspirin` row.
pub fn coverage<P: AsRef<Path>>(path: P, vocab: &Vocabulary) -> Result<Coverage> {
    let path = path.as_ref();
    let mut seen = HashSet::new();
    let mut report = Coverage {
        vocab_size: vocab.len(),
        ..Coverage::default()
    };

    for (idx, line) in open_lines(path)?.lines().enumerate() {
        let line = line?;
        if idx == 0 && parse_header(&line).is_some() {
            continue;
        }
        let Some((word, _)) = split_vector_line(&line) else {
            continue;
        };

        report.embedding_rows += 1;
        if vocab.contains(word) {
            report.kept_rows_if_shrunk += 1;
            seen.insert(vocab.normalize(word));
        }
    }

    report.covered = seen.len();
    Ok(report)
}
