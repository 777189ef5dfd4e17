//! Reading IOBES-tagged TSV corpora.
//!
//! One token per line, tab-separated columns with the tag in the last
//! column. A blank line ends a sentence and `-DOCSTART-` lines are skipped.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use serde::Serialize;

use crate::error::{LaunchError, Result};
use crate::tags::{count_invalid_transitions, spans, Tag};

/// A single tagged sentence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    pub tokens: Vec<String>,
    pub tags: Vec<Tag>,
}

impl Sentence {
    pub fn new(tokens: Vec<String>, tags: Vec<Tag>) -> Self {
        Self { tokens, tags }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Load every sentence of a corpus file.
pub fn load_corpus<P: AsRef<Path>>(path: P) -> Result<Vec<Sentence>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    read_corpus(file, path)
}

/// Read sentences from any reader; `origin` is only used in error messages.
pub fn read_corpus<R: Read>(reader: R, origin: &Path) -> Result<Vec<Sentence>> {
    let reader = BufReader::new(reader);

    let mut sentences = Vec::new();
    let mut tokens = Vec::new();
    let mut tags = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim_end_matches(['\r', '\n']);

        if line.trim().is_empty() {
            if !tokens.is_empty() {
                sentences.push(Sentence::new(
                    std::mem::take(&mut tokens),
                    std::mem::take(&mut tags),
                ));
            }
            continue;
        }

        if line.starts_with("-DOCSTART-") {
            continue;
        }

        let columns: Vec<&str> = line.split('\t').collect();
        if columns.len() < 2 {
            return Err(LaunchError::Corpus {
                path: origin.to_path_buf(),
                line: idx + 1,
                reason: "expected at least two tab-separated columns".into(),
            });
        }

        let label = columns[columns.len() - 1].trim();
        let tag = Tag::parse(label).map_err(|_| LaunchError::Corpus {
            path: origin.to_path_buf(),
            line: idx + 1,
            reason: format!("invalid IOBES tag {label:?}"),
        })?;

        tokens.push(columns[0].to_string());
        tags.push(tag);
    }

    // Last sentence may not be followed by a blank line
    if !tokens.is_empty() {
        sentences.push(Sentence::new(tokens, tags));
    }

    Ok(sentences)
}

/// Summary statistics over one or more corpus files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CorpusStats {
    pub sentences: usize,
    pub tokens: usize,
    pub max_sentence_len: usize,
    /// Entity span count per entity type.
    pub entities: BTreeMap<String, usize>,
    /// Every distinct tag label seen, sorted.
    pub labels: BTreeSet<String>,
    /// Transitions that break the IOBES rules.
    pub invalid_transitions: usize,
}

impl CorpusStats {
    pub fn collect(sentences: &[Sentence]) -> Self {
        let mut stats = Self::default();
        for sentence in sentences {
            stats.add(sentence);
        }
        stats
    }

    pub fn add(&mut self, sentence: &Sentence) {
        self.sentences += 1;
        self.tokens += sentence.len();
        self.max_sentence_len = self.max_sentence_len.max(sentence.len());
        self.invalid_transitions += count_invalid_transitions(&sentence.tags);

        for tag in &sentence.tags {
            self.labels.insert(tag.to_string());
        }
        for span in spans(&sentence.tags) {
            *self.entities.entry(span.entity_type).or_insert(0) += 1;
        }
    }

    /// Merge statistics of another file into this one.
    pub fn merge(&mut self, other: &CorpusStats) {
        self.sentences += other.sentences;
        self.tokens += other.tokens;
        self.max_sentence_len = self.max_sentence_len.max(other.max_sentence_len);
        self.invalid_transitions += other.invalid_transitions;
        self.labels.extend(other.labels.iter().cloned());
        for (entity, count) in &other.entities {
            *self.entities.entry(entity.clone()).or_insert(0) += count;
        }
    }
}

/// Word frequencies over a set of sentences.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    counts: HashMap<String, usize>,
    caseless: bool,
}

impl Vocabulary {
    pub fn new(caseless: bool) -> Self {
        Self {
            counts: HashMap::new(),
            caseless,
        }
    }

    pub fn add_sentences(&mut self, sentences: &[Sentence]) {
        for sentence in sentences {
            for token in &sentence.tokens {
                let key = self.normalize(token);
                *self.counts.entry(key).or_insert(0) += 1;
            }
        }
    }

    /// Apply the same case folding as the vocabulary was built with.
    pub fn normalize(&self, word: &str) -> String {
        if self.caseless {
            word.to_lowercase()
        } else {
            word.to_string()
        }
    }

    pub fn contains(&self, word: &str) -> bool {
        self.counts.contains_key(&self.normalize(word))
    }

    pub fn count(&self, word: &str) -> usize {
        self.counts.get(&self.normalize(word)).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}
