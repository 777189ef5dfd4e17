//! `inspect-corpus` and `inspect-embedding` reports.

use std::path::PathBuf;

use anyhow::{Context, Result};
use nerlaunch_core::corpus::{load_corpus, CorpusStats, Vocabulary};
use nerlaunch_core::embedding::{self, Coverage, EmbeddingProbe};
use serde::Serialize;
use tracing::info;

use crate::cli::{InspectCorpusArgs, InspectEmbeddingArgs};

#[derive(Debug, Serialize)]
pub struct FileStats {
    pub path: PathBuf,
    #[serde(flatten)]
    pub stats: CorpusStats,
}

#[derive(Debug, Serialize)]
pub struct CorpusReport {
    pub files: Vec<FileStats>,
    pub total: CorpusStats,
}

pub fn inspect_corpus(args: &InspectCorpusArgs) -> Result<CorpusReport> {
    let mut files = Vec::with_capacity(args.files.len());
    let mut total = CorpusStats::default();

    for path in &args.files {
        let sentences = load_corpus(path)
            .with_context(|| format!("Failed to read corpus {}", path.display()))?;
        let stats = CorpusStats::collect(&sentences);
        info!(
            path = %path.display(),
            sentences = stats.sentences,
            tokens = stats.tokens,
            "corpus loaded"
        );
        total.merge(&stats);
        files.push(FileStats {
            path: path.clone(),
            stats,
        });
    }

    Ok(CorpusReport { files, total })
}

#[derive(Debug, Serialize)]
pub struct EmbeddingReport {
    pub probe: EmbeddingProbe,
    /// `None` when no `--word_dim` was given.
    pub word_dim_matches: Option<bool>,
    pub coverage: Option<Coverage>,
    pub coverage_ratio: Option<f64>,
}

pub fn inspect_embedding(args: &InspectEmbeddingArgs) -> Result<EmbeddingReport> {
    let probe = embedding::probe(&args.emb_file)
        .with_context(|| format!("Failed to probe {}", args.emb_file.display()))?;
    let word_dim_matches = args.word_dim.map(|dim| dim as usize == probe.dimension);

    let coverage = if args.corpus.is_empty() {
        None
    } else {
        let mut vocab = Vocabulary::new(args.caseless);
        for path in &args.corpus {
            let sentences = load_corpus(path)
                .with_context(|| format!("Failed to read corpus {}", path.display()))?;
            vocab.add_sentences(&sentences);
        }
        info!(words = vocab.len(), "scanning embedding file for corpus vocabulary");
        Some(embedding::coverage(&args.emb_file, &vocab)?)
    };

    Ok(EmbeddingReport {
        probe,
        word_dim_matches,
        coverage_ratio: coverage.as_ref().map(Coverage::ratio),
        coverage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, PathBuf, PathBuf) {
        let dir = TempDir::new().unwrap();
        let corpus = dir.path().join("train.tsv");
        std::fs::write(
            &corpus,
            "Naloxone\tS-Chemical\nreverses\tO\n\nClonidine\tS-Chemical\n",
        )
        .unwrap();
        let vectors = dir.path().join("vec.txt");
        std::fs::write(&vectors, "naloxone 1 2\nclonidine 3 4\nheparin 5 6\n").unwrap();
        (dir, corpus, vectors)
    }

    #[test]
    fn test_inspect_corpus() {
        let (_dir, corpus, _) = fixture();
        let report = inspect_corpus(&InspectCorpusArgs {
            files: vec![corpus.clone(), corpus],
        })
        .unwrap();
        assert_eq!(report.files.len(), 2);
        assert_eq!(report.total.sentences, 4);
        assert_eq!(report.total.entities.get("Chemical"), Some(&4));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["files"][0]["tokens"], 3);
    }

    #[test]
    fn test_inspect_embedding_with_coverage() {
        let (_dir, corpus, vectors) = fixture();
        let report = inspect_embedding(&InspectEmbeddingArgs {
            emb_file: vectors,
            word_dim: Some(200),
            caseless: true,
            corpus: vec![corpus],
        })
        .unwrap();

        assert_eq!(report.probe.dimension, 2);
        assert_eq!(report.word_dim_matches, Some(false));
        let coverage = report.coverage.unwrap();
        assert_eq!(coverage.vocab_size, 3);
        assert_eq!(coverage.covered, 2);
        assert_eq!(coverage.embedding_rows, 3);
    }

    #[test]
    fn test_inspect_embedding_probe_only() {
        let (_dir, _, vectors) = fixture();
        let report = inspect_embedding(&InspectEmbeddingArgs {
            emb_file: vectors,
            word_dim: None,
            caseless: false,
            corpus: Vec::new(),
        })
        .unwrap();
        assert!(report.coverage.is_none());
        assert!(report.word_dim_matches.is_none());
    }
}
